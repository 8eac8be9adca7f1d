//! # PSP Swizzling
//!
//! Mipmaps of at least 16x8 texels are stored swizzled:
//!
//! - Direct color mipmaps are cut into 16 byte x 8 row clusters ([`TileLayout::PSP`]).
//! - Palette mipmaps are packed into 32-bit units like PS2 `TEX32` uploads, but with
//!   [`broken_packed_dimensions`]. Samples outside those dimensions are lost.
//!
//! Smaller mipmaps are stored linearly with 4 bit indices low nibble first.
//! Every buffer handled here has unpadded rows.

use rwtxd_api::TxdResult;
use rwtxd_common::formats::{row_size, texel_data_size};
use rwtxd_common::permute::{broken_packed_dimensions, permute_texels, SurfaceShape};
use rwtxd_common::{PixelEncoding, TileLayout};

/// Smallest width of swizzled mipmaps.
pub const SWIZZLE_MIN_WIDTH: u32 = 16;
/// Smallest height of swizzled mipmaps.
pub const SWIZZLE_MIN_HEIGHT: u32 = 8;

/// Whether a mipmap of the given dimensions is stored swizzled.
pub fn is_swizzling_required(width: u32, height: u32) -> bool {
    width >= SWIZZLE_MIN_WIDTH && height >= SWIZZLE_MIN_HEIGHT
}

/// Encoding of linear texels of the given depth.
pub fn linear_encoding(depth: u32) -> PixelEncoding {
    match depth {
        4 => PixelEncoding::IdTex4,
        8 => PixelEncoding::IdTex8,
        16 => PixelEncoding::Tex16,
        _ => PixelEncoding::Tex32,
    }
}

fn is_packed(depth: u32, swizzled: bool) -> bool {
    swizzled && depth < 16
}

/// Dimensions of the stored surface.
pub fn stored_dimensions(depth: u32, width: u32, height: u32, swizzled: bool) -> TxdResult<(u32, u32)> {
    if !is_packed(depth, swizzled) {
        return Ok((width, height));
    }
    Ok(broken_packed_dimensions(linear_encoding(depth), PixelEncoding::Tex32, width, height)?)
}

/// Bytes of the stored surface.
pub fn stored_size(depth: u32, width: u32, height: u32, swizzled: bool) -> TxdResult<usize> {
    let (stored_width, stored_height) = stored_dimensions(depth, width, height, swizzled)?;
    let stored_depth = if is_packed(depth, swizzled) { 32 } else { depth };
    Ok(texel_data_size(stored_width, stored_height, stored_depth, 1))
}

/// Swizzles a linear mipmap.
pub fn swizzle(depth: u32, width: u32, height: u32, linear: &[u8]) -> TxdResult<Vec<u8>> {
    if depth >= 16 {
        return Ok(TileLayout::PSP.swizzle(linear, row_size(width, depth, 1), height)?);
    }
    let (packed_width, packed_height) = stored_dimensions(depth, width, height, true)?;
    Ok(permute_texels(
        linear_encoding(depth),
        PixelEncoding::Tex32,
        SurfaceShape::new(width, height, 1),
        linear,
        SurfaceShape::new(packed_width, packed_height, 1),
    )?)
}

/// Inverse of [`swizzle`].
pub fn unswizzle(depth: u32, width: u32, height: u32, stored: &[u8]) -> TxdResult<Vec<u8>> {
    if depth >= 16 {
        return Ok(TileLayout::PSP.unswizzle(stored, row_size(width, depth, 1), height)?);
    }
    let (packed_width, packed_height) = stored_dimensions(depth, width, height, true)?;
    Ok(permute_texels(
        PixelEncoding::Tex32,
        linear_encoding(depth),
        SurfaceShape::new(packed_width, packed_height, 1),
        stored,
        SurfaceShape::new(width, height, 1),
    )?)
}

/// Swaps the two indices of every byte of a 4 bit surface.
pub fn swap_nibbles(texels: &mut [u8]) {
    for byte in texels {
        *byte = byte.rotate_left(4);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(16, 8, true)]
    #[case(8, 8, false)]
    #[case(16, 4, false)]
    #[case(512, 512, true)]
    fn threshold(#[case] width: u32, #[case] height: u32, #[case] expected: bool) {
        assert_eq!(is_swizzling_required(width, height), expected);
    }

    #[rstest]
    #[case(8, 32, 16, (16, 8))]
    #[case(4, 32, 16, (8, 8))]
    // Too narrow to hold every index.
    #[case(4, 16, 8, (4, 4))]
    #[case(32, 16, 8, (16, 8))]
    fn stored_shapes(#[case] depth: u32, #[case] width: u32, #[case] height: u32, #[case] expected: (u32, u32)) {
        assert_eq!(stored_dimensions(depth, width, height, true).unwrap(), expected);
    }

    #[test]
    fn direct_color_clusters() {
        // 16x8 at 16 bits: two clusters side by side.
        let linear: Vec<u8> = (0..16 * 8 * 2).map(|i| i as u8).collect();
        let tiled = swizzle(16, 16, 8, &linear).unwrap();
        assert_eq!(&tiled[..16], &linear[..16]);
        assert_eq!(&tiled[16..32], &linear[32..48]);
        assert_eq!(&tiled[128..144], &linear[16..32]);
        assert_eq!(unswizzle(16, 16, 8, &tiled).unwrap(), linear);
    }

    #[test]
    fn palette_indices_round_trip() {
        let linear: Vec<u8> = (0..32 * 16).map(|i| (i * 5) as u8).collect();
        let packed = swizzle(8, 32, 16, &linear).unwrap();
        assert_eq!(packed.len(), stored_size(8, 32, 16, true).unwrap());
        assert_eq!(unswizzle(8, 32, 16, &packed).unwrap(), linear);
    }

    #[test]
    fn nibble_swap() {
        let mut texels = vec![0x12, 0xA0];
        swap_nibbles(&mut texels);
        assert_eq!(texels, vec![0x21, 0x0A]);
    }
}
