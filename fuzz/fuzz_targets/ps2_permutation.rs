#![no_main]

// Packs palette indices into 32-bit GS units and back again.
// The linear surface must survive the trip unchanged.

use libfuzzer_sys::{arbitrary, fuzz_target};
use rwtxd_common::permute::{pack_texels, packed_dimensions, unpack_texels, SurfaceShape};
use rwtxd_common::PixelEncoding;

#[derive(Clone, Debug, arbitrary::Arbitrary)]
pub struct Surface {
    pub width: u8,
    pub height: u8,
    pub seed: Vec<u8>,
}

fuzz_target!(|surface: Surface| {
    let width = (surface.width as u32 % 128) + 1;
    let height = (surface.height as u32 % 128) + 1;
    let raw = PixelEncoding::IdTex8;
    let packed = PixelEncoding::Tex32;

    let raw_shape = SurfaceShape::new(width, height, 1);
    let texels: Vec<u8> = (0..raw_shape.data_size(raw.depth()))
        .map(|index| {
            surface
                .seed
                .get(index % surface.seed.len().max(1))
                .copied()
                .unwrap_or(index as u8)
        })
        .collect();

    let (packed_width, packed_height) = packed_dimensions(raw, packed, width, height).unwrap();
    let packed_shape = SurfaceShape::new(packed_width, packed_height, 4);

    let packed_texels = pack_texels(raw, packed, raw_shape, &texels, packed_shape).unwrap();
    let unpacked = unpack_texels(raw, packed, packed_shape, &packed_texels, raw_shape).unwrap();

    assert_eq!(texels, unpacked, "{width}x{height} surface changed after packing");
});
