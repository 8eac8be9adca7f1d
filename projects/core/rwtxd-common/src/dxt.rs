//! DXTn (BC1-BC3) block decoding; based on etcpak
//! <https://github.com/wolfpld/etcpak> and MSDN
//! <https://learn.microsoft.com/en-us/windows/win32/direct3d9/opaque-and-1-bit-alpha-textures>
//!
//! Only decoding is provided. Native textures that cannot store block compressed
//! data receive decompressed [`Color8888`] texels instead.

use crate::color::Color8888;
use crate::color_565::Color565;
use crate::endian::{read_u16_le, read_u32_le, read_u64_le};
use crate::error::{PixelFormatError, PixelResult};
use crate::formats::CompressionType;
use alloc::vec;
use alloc::vec::Vec;

/// Represents a decoded 4x4 block of DXTn pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded4x4Block {
    /// The 16 pixels in the block (row-major order)
    /// (i.e. `pixels[0]` is top-left, `pixels[3]` is top-right, etc.)
    pub pixels: [Color8888; 16],
}

impl Decoded4x4Block {
    /// Constructs a new decoded block initialised with 16 copies of the provided pixel.
    pub fn new(pixel: Color8888) -> Self {
        Self {
            pixels: [pixel; 16],
        }
    }

    /// Gets a pixel at the specified coordinates, or [`None`] outside the block.
    #[inline]
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Color8888> {
        if x < 4 && y < 4 {
            Some(self.pixels[y * 4 + x])
        } else {
            None
        }
    }
}

/// Builds the 4 entry color dictionary of a DXT1 style color block.
///
/// `allow_punch_through` enables the 3 color + transparent mode used by DXT1
/// when `c0 <= c1`.
fn color_dictionary(c0: Color565, c1: Color565, allow_punch_through: bool) -> [Color8888; 4] {
    let mut dict = [Color8888::TRANSPARENT; 4];
    dict[0] = c0.to_color_8888_with_alpha(255);
    dict[1] = c1.to_color_8888_with_alpha(255);

    if c0.greater_than(&c1) || !allow_punch_through {
        // Four-color block
        dict[2] = Color565::blend(&c0, 2, &c1, 1, 3);
        dict[3] = Color565::blend(&c0, 1, &c1, 2, 3);
    } else {
        // Three-color block, index 3 is transparent black
        dict[2] = Color565::blend(&c0, 1, &c1, 1, 2);
    }
    dict
}

/// Decodes the 8 byte color half shared by all DXTn formats.
fn decode_color_half(src: &[u8], allow_punch_through: bool) -> Option<Decoded4x4Block> {
    let c0 = Color565::from_raw(read_u16_le(src, 0)?);
    let c1 = Color565::from_raw(read_u16_le(src, 2)?);
    let indices = read_u32_le(src, 4)?;
    let dict = color_dictionary(c0, c1, allow_punch_through);

    let mut block = Decoded4x4Block::new(Color8888::TRANSPARENT);
    for (pixel_index, pixel) in block.pixels.iter_mut().enumerate() {
        *pixel = dict[((indices >> (pixel_index * 2)) & 0x3) as usize];
    }
    Some(block)
}

/// Decodes a DXT1 block (8 bytes).
///
/// Returns [`None`] if `src` is shorter than a block.
pub fn decode_dxt1_block(src: &[u8]) -> Option<Decoded4x4Block> {
    decode_color_half(src, true)
}

/// Decodes a DXT2/DXT3 block (16 bytes): explicit 4 bit alpha followed by a color block.
pub fn decode_dxt3_block(src: &[u8]) -> Option<Decoded4x4Block> {
    let alpha_bits = read_u64_le(src, 0)?;
    let mut block = decode_color_half(src.get(8..16)?, false)?;
    for (pixel_index, pixel) in block.pixels.iter_mut().enumerate() {
        let alpha = ((alpha_bits >> (pixel_index * 4)) & 0xF) as u8;
        pixel.a = (alpha << 4) | alpha;
    }
    Some(block)
}

/// Decodes a DXT4/DXT5 block (16 bytes): interpolated alpha followed by a color block.
pub fn decode_dxt5_block(src: &[u8]) -> Option<Decoded4x4Block> {
    let alpha0 = *src.first()? as u16;
    let alpha1 = *src.get(1)? as u16;
    let mut alpha_values = [0u8; 8];
    alpha_values[0] = alpha0 as u8;
    alpha_values[1] = alpha1 as u8;

    if alpha0 > alpha1 {
        // 8 interpolated alpha values
        for step in 1..7u16 {
            alpha_values[step as usize + 1] = (((7 - step) * alpha0 + step * alpha1) / 7) as u8;
        }
    } else {
        // 6 interpolated alpha values + transparent and opaque
        for step in 1..5u16 {
            alpha_values[step as usize + 1] = (((5 - step) * alpha0 + step * alpha1) / 5) as u8;
        }
        alpha_values[6] = 0;
        alpha_values[7] = 255;
    }

    // 48 bits of 3 bit indices
    let index_bytes = src.get(2..8)?;
    let alpha_indices = index_bytes
        .iter()
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | *byte as u64);

    let mut block = decode_color_half(src.get(8..16)?, false)?;
    for (pixel_index, pixel) in block.pixels.iter_mut().enumerate() {
        let index = ((alpha_indices >> (pixel_index * 3)) & 0x7) as usize;
        pixel.a = alpha_values[index];
    }
    Some(block)
}

/// Decompresses a whole DXTn surface into tightly packed RGBA [`Color8888`] bytes.
///
/// # Parameters
///
/// - `compression`: One of the DXT compression types
/// - `width`, `height`: Logical surface dimensions; partial edge blocks are clipped
/// - `data`: Compressed blocks in row-major block order
///
/// # Returns
///
/// `width * height * 4` bytes, rows without padding.
pub fn decompress_dxt(
    compression: CompressionType,
    width: u32,
    height: u32,
    data: &[u8],
) -> PixelResult<Vec<u8>> {
    let Some(block_size) = compression.block_size().filter(|_| compression.is_dxt()) else {
        return Err(PixelFormatError::UndecodableCompression(compression));
    };
    let blocks_x = width.div_ceil(4) as usize;
    let blocks_y = height.div_ceil(4) as usize;
    let expected = blocks_x * blocks_y * block_size;
    if data.len() < expected {
        return Err(PixelFormatError::BufferTooSmall {
            expected,
            actual: data.len(),
        });
    }

    let decode: fn(&[u8]) -> Option<Decoded4x4Block> = match compression {
        CompressionType::Dxt1 => decode_dxt1_block,
        CompressionType::Dxt2 | CompressionType::Dxt3 => decode_dxt3_block,
        _ => decode_dxt5_block,
    };

    let width = width as usize;
    let height = height as usize;
    let mut out = vec![0u8; width * height * 4];
    for block_y in 0..blocks_y {
        for block_x in 0..blocks_x {
            let offset = (block_y * blocks_x + block_x) * block_size;
            let block = decode(&data[offset..offset + block_size]).ok_or(
                PixelFormatError::BufferTooSmall {
                    expected: offset + block_size,
                    actual: data.len(),
                },
            )?;

            for y in 0..4 {
                let dst_y = block_y * 4 + y;
                if dst_y >= height {
                    break;
                }
                for x in 0..4 {
                    let dst_x = block_x * 4 + x;
                    if dst_x >= width {
                        break;
                    }
                    let pixel = block.pixels[y * 4 + x];
                    let at = (dst_y * width + dst_x) * 4;
                    out[at..at + 4].copy_from_slice(&[pixel.r, pixel.g, pixel.b, pixel.a]);
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[test]
    fn solid_red_dxt1_block() {
        let block = [
            0x00, 0xF8, // c0 = R:31 G:0 B:0
            0x00, 0xF8, // c1 = R:31 G:0 B:0 (identical to create solid color)
            0x00, 0x00, 0x00, 0x00, // All pixels use index 0
        ];
        let decoded = decode_dxt1_block(&block).unwrap();
        assert!(decoded
            .pixels
            .iter()
            .all(|pixel| *pixel == Color8888::new(255, 0, 0, 255)));
    }

    #[test]
    fn dxt1_punch_through_index_is_transparent() {
        // c0 <= c1 selects 3 color mode; index 3 everywhere.
        let block = [0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let decoded = decode_dxt1_block(&block).unwrap();
        assert!(decoded.pixels.iter().all(|pixel| pixel.a == 0));
    }

    #[test]
    fn dxt3_explicit_alpha() {
        let mut block = [0u8; 16];
        // Pixel 0 alpha = 0xF, pixel 1 alpha = 0x8
        block[0] = 0x8F;
        block[8..10].copy_from_slice(&[0xFF, 0xFF]); // white c0
        let decoded = decode_dxt3_block(&block).unwrap();
        assert_eq!(decoded.get_pixel(0, 0).unwrap().a, 0xFF);
        assert_eq!(decoded.get_pixel(1, 0).unwrap().a, 0x88);
        assert_eq!(decoded.get_pixel(2, 0).unwrap().a, 0x00);
        assert_eq!(decoded.get_pixel(0, 0).unwrap().r, 0xFF);
    }

    #[rstest]
    #[case(0, 200)]
    #[case(1, 100)]
    fn dxt5_alpha_endpoints(#[case] index: u64, #[case] expected: u8) {
        let mut block = [0u8; 16];
        block[0] = 200;
        block[1] = 100;
        // Every pixel uses `index`
        let mut bits = 0u64;
        for pixel in 0..16 {
            bits |= index << (pixel * 3);
        }
        block[2..8].copy_from_slice(&bits.to_le_bytes()[..6]);
        let decoded = decode_dxt5_block(&block).unwrap();
        assert!(decoded.pixels.iter().all(|pixel| pixel.a == expected));
    }

    #[test]
    fn decompress_clips_partial_blocks() {
        let block = [0x00, 0xF8, 0x00, 0xF8, 0, 0, 0, 0];
        let out = decompress_dxt(CompressionType::Dxt1, 3, 2, &block).unwrap();
        assert_eq!(out.len(), 3 * 2 * 4);
        assert!(out.chunks(4).all(|pixel| pixel == [255, 0, 0, 255]));
    }

    #[test]
    fn decompress_rejects_short_input() {
        let result = decompress_dxt(CompressionType::Dxt5, 8, 8, &[0u8; 32]);
        assert_eq!(
            result,
            Err(PixelFormatError::BufferTooSmall {
                expected: 64,
                actual: 32
            })
        );
        assert!(decompress_dxt(CompressionType::AtcRgb, 4, 4, &[0u8; 8]).is_err());
    }
}
