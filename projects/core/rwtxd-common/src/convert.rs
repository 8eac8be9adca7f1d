//! # Texel Conversion
//!
//! Moves whole surfaces between raster layouts using the [`ColorDispatcher`].
//!
//! Supported conversions:
//!
//! - direct color to direct color (any format, ordering, depth, row alignment)
//! - palette to direct color (palette lookup)
//! - palette to palette (index remapping, e.g. PAL4 to PAL8 or PAL4 to PAL4_LSB)
//! - DXT1..DXT5 to anything uncompressed (block decoding)
//!
//! Palette generation (quantization) and block compression are not provided and
//! report [`PixelFormatError::UnsupportedConversion`].

use crate::bits::{fetch_sample, row_slice, row_slice_mut, store_sample};
use crate::dispatch::ColorDispatcher;
use crate::dxt::decompress_dxt;
use crate::error::{PixelFormatError, PixelResult};
use crate::formats::{row_size, ColorOrdering, CompressionType, PaletteType, RasterFormat};
use alloc::vec;
use alloc::vec::Vec;

/// Describes the memory layout of a texel surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexelFormat<'a> {
    /// Sample format (of the palette entries, for palette rasters).
    pub raster_format: RasterFormat,
    /// Bits per texel.
    pub depth: u32,
    /// Byte alignment of every row.
    pub row_alignment: u32,
    /// Channel ordering.
    pub color_order: ColorOrdering,
    /// Palette kind.
    pub palette_type: PaletteType,
    /// Palette entries.
    pub palette: &'a [u8],
    /// Number of valid palette entries.
    pub palette_size: u32,
    /// Block compression, if any.
    pub compression: CompressionType,
}

impl<'a> TexelFormat<'a> {
    /// Layout of an uncompressed direct color surface.
    pub fn direct(
        raster_format: RasterFormat,
        depth: u32,
        row_alignment: u32,
        color_order: ColorOrdering,
    ) -> Self {
        Self {
            raster_format,
            depth,
            row_alignment,
            color_order,
            palette_type: PaletteType::None,
            palette: &[],
            palette_size: 0,
            compression: CompressionType::None,
        }
    }

    /// Layout of an uncompressed palette surface.
    pub fn palettized(
        raster_format: RasterFormat,
        palette_type: PaletteType,
        row_alignment: u32,
        color_order: ColorOrdering,
        palette: &'a [u8],
        palette_size: u32,
    ) -> Self {
        Self {
            raster_format,
            depth: palette_type.index_depth(),
            row_alignment,
            color_order,
            palette_type,
            palette,
            palette_size,
            compression: CompressionType::None,
        }
    }

    /// Creates the dispatcher for this layout.
    pub fn dispatcher(&self) -> PixelResult<ColorDispatcher<'a>> {
        ColorDispatcher::new(
            self.raster_format,
            self.color_order,
            self.depth,
            self.palette_type,
            self.palette,
            self.palette_size,
        )
    }

    /// Whether texels of both layouts are bit-identical per sample.
    ///
    /// Row alignment and palette contents are not compared.
    pub fn has_same_samples(&self, other: &TexelFormat<'_>) -> bool {
        self.raster_format == other.raster_format
            && self.depth == other.depth
            && self.color_order == other.color_order
            && self.palette_type == other.palette_type
            && self.compression == other.compression
    }

    /// Size of a `width` x `height` surface in this layout.
    pub fn surface_size(&self, width: u32, height: u32) -> usize {
        match self.compression.data_size(width, height) {
            Some(size) => size,
            None => row_size(width, self.depth, self.row_alignment) * height as usize,
        }
    }
}

/// Converts a surface between two layouts.
///
/// # Parameters
///
/// - `src`: Layout of `texels`
/// - `texels`: Source surface
/// - `width`, `height`: Surface dimensions
/// - `dst`: Requested layout
///
/// # Returns
///
/// A new buffer of [`TexelFormat::surface_size`] bytes in the `dst` layout.
pub fn convert_texels(
    src: &TexelFormat<'_>,
    texels: &[u8],
    width: u32,
    height: u32,
    dst: &TexelFormat<'_>,
) -> PixelResult<Vec<u8>> {
    if src.compression.is_compressed() {
        if src.compression == dst.compression {
            return copy_exact(texels, src.surface_size(width, height));
        }
        if !src.compression.is_dxt() {
            return Err(PixelFormatError::UndecodableCompression(src.compression));
        }
        let rgba = decompress_dxt(src.compression, width, height, texels)?;
        let intermediate = TexelFormat::direct(RasterFormat::Raster8888, 32, 1, ColorOrdering::Rgba);
        return convert_texels(&intermediate, &rgba, width, height, dst);
    }
    if dst.compression.is_compressed() {
        return Err(PixelFormatError::UnsupportedConversion(
            "texels cannot be block compressed",
        ));
    }

    let src_row_size = row_size(width, src.depth, src.row_alignment);
    let dst_row_size = row_size(width, dst.depth, dst.row_alignment);
    let needed = src_row_size * height as usize;
    if texels.len() < needed {
        return Err(PixelFormatError::BufferTooSmall {
            expected: needed,
            actual: texels.len(),
        });
    }

    let mut out = vec![0u8; dst_row_size * height as usize];

    if src.has_same_samples(dst) {
        let used = row_size(width, src.depth, 1);
        for y in 0..height {
            let (Some(src_row), Some(dst_row)) = (
                row_slice(texels, src_row_size, y),
                row_slice_mut(&mut out, dst_row_size, y),
            ) else {
                break;
            };
            dst_row[..used].copy_from_slice(&src_row[..used]);
        }
        return Ok(out);
    }

    let src_dispatch = src.dispatcher()?;
    let dst_dispatch = dst.dispatcher()?;

    match (src.palette_type.is_palette(), dst.palette_type.is_palette()) {
        (true, true) => {
            let limit = dst.palette_type.item_count();
            for_each_texel(texels, src_row_size, &mut out, dst_row_size, width, height, |src_row, dst_row, x| {
                let index = src_dispatch.get_palette_index(src_row, x).unwrap_or(0);
                if index >= limit {
                    return Err(PixelFormatError::PaletteIndexOverflow {
                        index,
                        palette_type: dst.palette_type,
                    });
                }
                dst_dispatch.set_palette_index(dst_row, x, index);
                Ok(())
            })?;
        }
        (false, true) => {
            return Err(PixelFormatError::UnsupportedConversion(
                "direct color cannot be converted to a palette",
            ));
        }
        (_, false) => {
            for_each_texel(texels, src_row_size, &mut out, dst_row_size, width, height, |src_row, dst_row, x| {
                if let Some(color) = src_dispatch.get_color(src_row, x) {
                    dst_dispatch.set_color(dst_row, x, &color);
                }
                Ok(())
            })?;
        }
    }
    Ok(out)
}

fn for_each_texel<F>(
    src: &[u8],
    src_row_size: usize,
    dst: &mut [u8],
    dst_row_size: usize,
    width: u32,
    height: u32,
    mut func: F,
) -> PixelResult<()>
where
    F: FnMut(&[u8], &mut [u8], u32) -> PixelResult<()>,
{
    for y in 0..height {
        let (Some(src_row), Some(dst_row)) = (
            row_slice(src, src_row_size, y),
            row_slice_mut(dst, dst_row_size, y),
        ) else {
            break;
        };
        for x in 0..width {
            func(src_row, dst_row, x)?;
        }
    }
    Ok(())
}

fn copy_exact(texels: &[u8], size: usize) -> PixelResult<Vec<u8>> {
    texels
        .get(..size)
        .map(<[u8]>::to_vec)
        .ok_or(PixelFormatError::BufferTooSmall {
            expected: size,
            actual: texels.len(),
        })
}

/// Converts `count` palette entries between formats and orderings.
///
/// Entries are stored at the natural depth of their raster format, without padding.
pub fn convert_palette(
    src_format: RasterFormat,
    src_order: ColorOrdering,
    palette: &[u8],
    count: u32,
    dst_format: RasterFormat,
    dst_order: ColorOrdering,
) -> PixelResult<Vec<u8>> {
    let src = TexelFormat::direct(src_format, src_format.natural_depth(), 1, src_order);
    let dst = TexelFormat::direct(dst_format, dst_format.natural_depth(), 1, dst_order);
    convert_texels(&src, palette, count, 1, &dst)
}

/// Copies the overlapping area of two surfaces with different dimensions.
///
/// Texels outside the source area are zero in the result. Used to pad surfaces to
/// hardware alignment and to truncate padding away again.
#[allow(clippy::too_many_arguments)]
pub fn copy_texel_rect(
    src: &[u8],
    src_width: u32,
    src_height: u32,
    src_alignment: u32,
    dst_width: u32,
    dst_height: u32,
    dst_alignment: u32,
    depth: u32,
    lsb_first: bool,
) -> PixelResult<Vec<u8>> {
    let src_row_size = row_size(src_width, depth, src_alignment);
    let dst_row_size = row_size(dst_width, depth, dst_alignment);
    let needed = src_row_size * src_height as usize;
    if src.len() < needed {
        return Err(PixelFormatError::BufferTooSmall {
            expected: needed,
            actual: src.len(),
        });
    }

    let mut out = vec![0u8; dst_row_size * dst_height as usize];
    let copy_width = src_width.min(dst_width);
    for y in 0..src_height.min(dst_height) {
        let (Some(src_row), Some(dst_row)) = (
            row_slice(src, src_row_size, y),
            row_slice_mut(&mut out, dst_row_size, y),
        ) else {
            break;
        };
        if depth % 8 == 0 {
            let bytes = row_size(copy_width, depth, 1);
            dst_row[..bytes].copy_from_slice(&src_row[..bytes]);
        } else {
            for x in 0..copy_width {
                if let Some(value) = fetch_sample(src_row, x, depth, lsb_first) {
                    store_sample(dst_row, x, depth, lsb_first, value);
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color8888;
    use crate::test_prelude::*;

    #[test]
    fn direct_conversion_swaps_channels_and_realigns_rows() {
        // 3x2 RGBA8888 with row alignment 1 into BGRA 565 aligned to 4
        let src_fmt = TexelFormat::direct(RasterFormat::Raster8888, 32, 1, ColorOrdering::Rgba);
        let dst_fmt = TexelFormat::direct(RasterFormat::Raster565, 16, 4, ColorOrdering::Bgra);
        let texels: Vec<u8> = core::iter::repeat([255u8, 0, 0, 255]).take(6).flatten().collect();
        let out = convert_texels(&src_fmt, &texels, 3, 2, &dst_fmt).unwrap();
        assert_eq!(out.len(), 8 * 2);
        assert_eq!(&out[0..2], &0xF800u16.to_le_bytes());
        assert_eq!(&out[6..8], &[0, 0]); // row padding
    }

    #[test]
    fn palette_expands_to_direct_color() {
        let palette = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let src_fmt = TexelFormat::palettized(
            RasterFormat::Raster8888,
            PaletteType::Pal8,
            4,
            ColorOrdering::Rgba,
            &palette,
            2,
        );
        let dst_fmt = TexelFormat::direct(RasterFormat::Raster8888, 32, 4, ColorOrdering::Bgra);
        let out = convert_texels(&src_fmt, &[1, 0, 0, 0], 2, 1, &dst_fmt).unwrap();
        assert_eq!(out, vec![7, 6, 5, 8, 3, 2, 1, 4]);
    }

    #[test]
    fn pal4_to_pal4_lsb_swaps_nibbles() {
        let src_fmt = TexelFormat::palettized(
            RasterFormat::Raster8888,
            PaletteType::Pal4,
            1,
            ColorOrdering::Rgba,
            &[],
            0,
        );
        let dst_fmt = TexelFormat {
            palette_type: PaletteType::Pal4Lsb,
            ..src_fmt
        };
        let out = convert_texels(&src_fmt, &[0x12, 0x30], 4, 1, &dst_fmt).unwrap();
        assert_eq!(out, vec![0x21, 0x03]);
    }

    #[test]
    fn pal8_to_pal4_requires_small_indices() {
        let src_fmt = TexelFormat::palettized(
            RasterFormat::Raster8888,
            PaletteType::Pal8,
            1,
            ColorOrdering::Rgba,
            &[],
            0,
        );
        let dst_fmt = TexelFormat::palettized(
            RasterFormat::Raster8888,
            PaletteType::Pal4,
            1,
            ColorOrdering::Rgba,
            &[],
            0,
        );
        assert_eq!(
            convert_texels(&src_fmt, &[3, 15], 2, 1, &dst_fmt).unwrap(),
            vec![0x3F]
        );
        assert_eq!(
            convert_texels(&src_fmt, &[3, 16], 2, 1, &dst_fmt),
            Err(PixelFormatError::PaletteIndexOverflow {
                index: 16,
                palette_type: PaletteType::Pal4
            })
        );
    }

    #[test]
    fn direct_to_palette_is_unsupported() {
        let src_fmt = TexelFormat::direct(RasterFormat::Raster8888, 32, 4, ColorOrdering::Rgba);
        let dst_fmt = TexelFormat::palettized(
            RasterFormat::Raster8888,
            PaletteType::Pal8,
            4,
            ColorOrdering::Rgba,
            &[],
            0,
        );
        assert!(matches!(
            convert_texels(&src_fmt, &[0; 4], 1, 1, &dst_fmt),
            Err(PixelFormatError::UnsupportedConversion(_))
        ));
    }

    #[test]
    fn dxt1_decodes_into_direct_color() {
        let src_fmt = TexelFormat {
            compression: CompressionType::Dxt1,
            ..TexelFormat::direct(RasterFormat::Raster565, 16, 4, ColorOrdering::Bgra)
        };
        let dst_fmt = TexelFormat::direct(RasterFormat::Raster8888, 32, 4, ColorOrdering::Bgra);
        let block = [0x00, 0xF8, 0x00, 0xF8, 0, 0, 0, 0];
        let out = convert_texels(&src_fmt, &block, 4, 4, &dst_fmt).unwrap();
        assert_eq!(out.len(), 64);
        assert!(out.chunks(4).all(|pixel| pixel == [0, 0, 255, 255]));
    }

    #[test]
    fn luminance_expands_to_grey() {
        let src_fmt = TexelFormat::direct(RasterFormat::Lum, 8, 1, ColorOrdering::Rgba);
        let dst_fmt = TexelFormat::direct(RasterFormat::Raster8888, 32, 1, ColorOrdering::Rgba);
        let out = convert_texels(&src_fmt, &[0x40], 1, 1, &dst_fmt).unwrap();
        assert_eq!(out, vec![0x40, 0x40, 0x40, 0xFF]);
    }

    #[test]
    fn palette_entries_convert() {
        let out = convert_palette(
            RasterFormat::Raster8888,
            ColorOrdering::Rgba,
            &[0xFF, 0x00, 0x00, 0xFF, 0x00, 0x00, 0xFF, 0x00],
            2,
            RasterFormat::Raster1555,
            ColorOrdering::Rgba,
        )
        .unwrap();
        assert_eq!(out, vec![0x1F, 0x80, 0x00, 0x7C]);
        let back = convert_palette(
            RasterFormat::Raster1555,
            ColorOrdering::Rgba,
            &out,
            2,
            RasterFormat::Raster8888,
            ColorOrdering::Rgba,
        )
        .unwrap();
        let first = Color8888::new(back[0], back[1], back[2], back[3]);
        assert_eq!(first, Color8888::new(255, 0, 0, 255));
    }

    #[rstest]
    #[case(8, false)]
    #[case(4, false)]
    #[case(4, true)]
    fn rect_copy_pads_and_truncates(#[case] depth: u32, #[case] lsb_first: bool) {
        let src: Vec<u8> = (1..=8u8).collect();
        // 2 rows of 4 bytes
        let width = 4 * 8 / depth;
        let padded = copy_texel_rect(&src, width, 2, 1, width * 2, 4, 1, depth, lsb_first).unwrap();
        assert_eq!(padded.len(), 8 * 4);
        assert_eq!(&padded[0..4], &src[0..4]);
        assert_eq!(&padded[8..12], &src[4..8]);
        assert!(padded[16..].iter().all(|byte| *byte == 0));

        let back = copy_texel_rect(&padded, width * 2, 4, 1, width, 2, 1, depth, lsb_first).unwrap();
        assert_eq!(back, src);
    }
}
