//! # Pixel Format Dispatcher
//!
//! [`ColorDispatcher`] reads and writes individual samples of a texel row for
//! any combination of [`RasterFormat`], [`ColorOrdering`], depth and
//! [`PaletteType`]. Codecs never touch sample bits directly; they describe the
//! layout once and let the dispatcher do the per pixel work.
//!
//! ## Sample layout
//!
//! The layout of a sample is resolved once, in [`ColorDispatcher::new`]:
//!
//! - RGBA formats: each channel gets a bit offset by walking the
//!   [`ColorOrdering::channel_slots`] from the least significant bit.
//! - Luminance formats: luminance occupies the low bits, alpha (if any) the high bits.
//! - Depth formats: the whole sample is a single value, read back as grey.
//!
//! Palette rasters decode the index first (with the nibble order dictated by the
//! palette type) and then decode the referenced palette entry, which uses the
//! natural depth of the raster format.

use crate::bits::{fetch_sample, store_sample};
use crate::color::{scale_channel, AbstractColor, Color8888};
use crate::error::{PixelFormatError, PixelResult};
use crate::formats::{Channel, ColorModel, ColorOrdering, PaletteType, RasterFormat};

/// Resolved bit positions of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleLayout {
    Rgba {
        /// `(offset, width)` per channel, in `[R, G, B, A]` order.
        channels: [(u32, u32); 4],
        /// Whether the alpha bits carry alpha rather than padding.
        alpha_stored: bool,
    },
    Luminance {
        lum_bits: u32,
        alpha_bits: u32,
    },
    Depth {
        bits: u32,
    },
}

impl SampleLayout {
    fn resolve(format: RasterFormat, order: ColorOrdering, depth: u32) -> Self {
        match format.color_model() {
            ColorModel::Rgba => {
                let widths = format.rgba_widths(depth);
                let mut channels = [(0u32, 0u32); 4];
                let mut offset = 0;
                for channel in order.channel_slots() {
                    let slot = channel_index(channel);
                    channels[slot] = (offset, widths[slot]);
                    offset += widths[slot];
                }
                Self::Rgba {
                    channels,
                    alpha_stored: format.stores_alpha(),
                }
            }
            ColorModel::Luminance => match (format, depth) {
                (RasterFormat::LumAlpha, 16) => Self::Luminance {
                    lum_bits: 8,
                    alpha_bits: 8,
                },
                (RasterFormat::LumAlpha, _) => Self::Luminance {
                    lum_bits: 4,
                    alpha_bits: 4,
                },
                (_, bits) => Self::Luminance {
                    lum_bits: bits,
                    alpha_bits: 0,
                },
            },
            ColorModel::Depth => Self::Depth { bits: depth },
        }
    }

    fn decode(&self, value: u32) -> Color8888 {
        match *self {
            Self::Rgba {
                channels,
                alpha_stored,
            } => {
                let extract = |(offset, width): (u32, u32)| {
                    if width == 0 {
                        return 255;
                    }
                    let raw = (value >> offset) & ((1u32 << width) - 1);
                    scale_channel(raw, width, 8) as u8
                };
                let alpha = if alpha_stored { extract(channels[3]) } else { 255 };
                Color8888::new(
                    extract(channels[0]),
                    extract(channels[1]),
                    extract(channels[2]),
                    alpha,
                )
            }
            Self::Luminance {
                lum_bits,
                alpha_bits,
            } => {
                let lum = scale_channel(value & ((1u32 << lum_bits) - 1), lum_bits, 8) as u8;
                let alpha = if alpha_bits == 0 {
                    255
                } else {
                    let raw = (value >> lum_bits) & ((1u32 << alpha_bits) - 1);
                    scale_channel(raw, alpha_bits, 8) as u8
                };
                Color8888::from_luminance(lum, alpha)
            }
            Self::Depth { bits } => {
                // Keep the most significant byte.
                let grey = if bits > 8 { value >> (bits - 8) } else { value };
                Color8888::from_luminance(grey as u8, 255)
            }
        }
    }

    fn encode(&self, color: Color8888) -> u32 {
        match *self {
            Self::Rgba {
                channels,
                alpha_stored,
            } => {
                let mut value = 0u32;
                for (slot, (offset, width)) in channels.iter().enumerate() {
                    if *width == 0 {
                        continue;
                    }
                    let channel_value = if slot == 3 && !alpha_stored {
                        // Padding bits are filled
                        (1u32 << width) - 1
                    } else {
                        scale_channel(color.channel(channel_at(slot)) as u32, 8, *width)
                    };
                    value |= channel_value << offset;
                }
                value
            }
            Self::Luminance {
                lum_bits,
                alpha_bits,
            } => {
                let lum = scale_channel(color.luminance() as u32, 8, lum_bits);
                let alpha = scale_channel(color.a as u32, 8, alpha_bits);
                lum | (alpha << lum_bits)
            }
            Self::Depth { bits } => {
                let grey = color.luminance() as u32;
                if bits > 8 {
                    // Replicate the byte across the sample.
                    let mut value = 0u32;
                    let mut filled = 0;
                    while filled < bits {
                        value = (value << 8) | grey;
                        filled += 8;
                    }
                    value
                } else {
                    grey
                }
            }
        }
    }
}

#[inline]
fn channel_index(channel: Channel) -> usize {
    match channel {
        Channel::Red => 0,
        Channel::Green => 1,
        Channel::Blue => 2,
        Channel::Alpha => 3,
    }
}

#[inline]
fn channel_at(index: usize) -> Channel {
    match index {
        0 => Channel::Red,
        1 => Channel::Green,
        2 => Channel::Blue,
        _ => Channel::Alpha,
    }
}

/// Per-call sample accessor for one raster layout.
///
/// All `get_*` functions return [`None`] and all `set_*` functions return `false`
/// when the sample index lies outside the provided row.
#[derive(Debug, Clone, Copy)]
pub struct ColorDispatcher<'a> {
    format: RasterFormat,
    depth: u32,
    palette_type: PaletteType,
    palette: &'a [u8],
    palette_size: u32,
    layout: SampleLayout,
    entry_depth: u32,
}

impl<'a> ColorDispatcher<'a> {
    /// Creates a dispatcher for direct color or palette rasters.
    ///
    /// # Parameters
    ///
    /// - `format`: Raster format of the samples (of the palette entries, for palette rasters)
    /// - `order`: Channel ordering of the samples
    /// - `depth`: Bits per texel (the index depth, for palette rasters)
    /// - `palette_type`: Palette kind; [`PaletteType::None`] for direct color
    /// - `palette`: Palette entries, ignored for direct color
    /// - `palette_size`: Number of valid entries in `palette`
    ///
    /// # Errors
    ///
    /// [`PixelFormatError::UnsupportedDepth`] when `depth` does not match the format
    /// (or the palette type).
    pub fn new(
        format: RasterFormat,
        order: ColorOrdering,
        depth: u32,
        palette_type: PaletteType,
        palette: &'a [u8],
        palette_size: u32,
    ) -> PixelResult<Self> {
        let entry_depth = format.natural_depth();
        let valid = if palette_type.is_palette() {
            palette_type.index_depth() == depth && format != RasterFormat::Default
        } else {
            format.supports_depth(depth)
        };
        if !valid {
            return Err(PixelFormatError::UnsupportedDepth { format, depth });
        }

        let sample_depth = if palette_type.is_palette() {
            entry_depth
        } else {
            depth
        };
        Ok(Self {
            format,
            depth,
            palette_type,
            palette,
            palette_size,
            layout: SampleLayout::resolve(format, order, sample_depth),
            entry_depth,
        })
    }

    /// Creates a dispatcher for direct color rasters.
    pub fn direct(format: RasterFormat, order: ColorOrdering, depth: u32) -> PixelResult<Self> {
        Self::new(format, order, depth, PaletteType::None, &[], 0)
    }

    /// Raster format this dispatcher decodes.
    #[inline]
    pub fn format(&self) -> RasterFormat {
        self.format
    }

    /// Bits per texel.
    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Palette kind.
    #[inline]
    pub fn palette_type(&self) -> PaletteType {
        self.palette_type
    }

    /// Reads the palette index stored at `index`.
    #[inline]
    pub fn get_palette_index(&self, row: &[u8], index: u32) -> Option<u32> {
        if !self.palette_type.is_palette() {
            return None;
        }
        fetch_sample(row, index, self.depth, self.palette_type.is_lsb_first())
    }

    /// Stores a palette index at `index`.
    #[inline]
    pub fn set_palette_index(&self, row: &mut [u8], index: u32, value: u32) -> bool {
        if !self.palette_type.is_palette() || value >= (1u32 << self.depth) {
            return false;
        }
        store_sample(
            row,
            index,
            self.depth,
            self.palette_type.is_lsb_first(),
            value,
        )
    }

    /// Decodes palette entry `entry`; out of range entries read as transparent black.
    #[inline]
    pub fn palette_entry(&self, entry: u32) -> Color8888 {
        if entry >= self.palette_size {
            return Color8888::TRANSPARENT;
        }
        match fetch_sample(self.palette, entry, self.entry_depth, false) {
            Some(value) => self.layout.decode(value),
            None => Color8888::TRANSPARENT,
        }
    }

    /// Reads the sample at `index` as 8-bit RGBA.
    pub fn get_rgba(&self, row: &[u8], index: u32) -> Option<Color8888> {
        if self.palette_type.is_palette() {
            let entry = self.get_palette_index(row, index)?;
            return Some(self.palette_entry(entry));
        }
        let value = fetch_sample(row, index, self.depth, false)?;
        Some(self.layout.decode(value))
    }

    /// Stores an 8-bit RGBA color at `index`.
    ///
    /// Palette rasters cannot be written by color; use [`Self::set_palette_index`].
    pub fn set_rgba(&self, row: &mut [u8], index: u32, color: Color8888) -> bool {
        if self.palette_type.is_palette() {
            return false;
        }
        store_sample(row, index, self.depth, false, self.layout.encode(color))
    }

    /// Reads the sample at `index` as `(luminance, alpha)`.
    pub fn get_luminance(&self, row: &[u8], index: u32) -> Option<(u8, u8)> {
        let color = self.get_rgba(row, index)?;
        match self.layout {
            SampleLayout::Luminance { .. } | SampleLayout::Depth { .. } => Some((color.r, color.a)),
            SampleLayout::Rgba { .. } => Some((color.luminance(), color.a)),
        }
    }

    /// Stores a luminance/alpha pair at `index`.
    pub fn set_luminance(&self, row: &mut [u8], index: u32, lum: u8, alpha: u8) -> bool {
        self.set_rgba(row, index, Color8888::from_luminance(lum, alpha))
    }

    /// Reads the sample at `index` as an [`AbstractColor`] matching the color model.
    pub fn get_color(&self, row: &[u8], index: u32) -> Option<AbstractColor> {
        match self.layout {
            SampleLayout::Luminance { .. } if !self.palette_type.is_palette() => {
                let (lum, alpha) = self.get_luminance(row, index)?;
                Some(AbstractColor::Luminance {
                    lum: lum as f32 / 255.0,
                    alpha: alpha as f32 / 255.0,
                })
            }
            _ => self.get_rgba(row, index).map(AbstractColor::from_color8888),
        }
    }

    /// Stores an [`AbstractColor`] at `index`, converting between color models.
    pub fn set_color(&self, row: &mut [u8], index: u32, color: &AbstractColor) -> bool {
        self.set_rgba(row, index, color.to_color8888())
    }

    /// Clears the sample at `index`: transparent black, or palette index 0.
    pub fn set_cleared_color(&self, row: &mut [u8], index: u32) -> bool {
        if self.palette_type.is_palette() {
            return self.set_palette_index(row, index, 0);
        }
        store_sample(row, index, self.depth, false, 0)
    }
}

/// Validates that a palette buffer holds `palette_size` entries of `format`.
pub fn check_palette_size(format: RasterFormat, palette: &[u8], palette_size: u32) -> PixelResult<()> {
    let expected = crate::formats::row_size(palette_size, format.natural_depth(), 1);
    if palette.len() < expected {
        return Err(PixelFormatError::BufferTooSmall {
            expected,
            actual: palette.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(ColorOrdering::Rgba, [0x10, 0x20, 0x30, 0x40])]
    #[case(ColorOrdering::Bgra, [0x30, 0x20, 0x10, 0x40])]
    #[case(ColorOrdering::Abgr, [0x40, 0x30, 0x20, 0x10])]
    #[case(ColorOrdering::Argb, [0x40, 0x10, 0x20, 0x30])]
    #[case(ColorOrdering::Barg, [0x30, 0x40, 0x10, 0x20])]
    fn rgba8888_byte_order(#[case] order: ColorOrdering, #[case] bytes: [u8; 4]) {
        let dispatcher = ColorDispatcher::direct(RasterFormat::Raster8888, order, 32).unwrap();
        let color = Color8888::new(0x10, 0x20, 0x30, 0x40);
        let mut row = [0u8; 4];
        assert!(dispatcher.set_rgba(&mut row, 0, color));
        assert_eq!(row, bytes);
        assert_eq!(dispatcher.get_rgba(&row, 0), Some(color));
    }

    #[test]
    fn format_1555_bgra_matches_direct3d_layout() {
        let dispatcher =
            ColorDispatcher::direct(RasterFormat::Raster1555, ColorOrdering::Bgra, 16).unwrap();
        let mut row = [0u8; 2];
        assert!(dispatcher.set_rgba(&mut row, 0, Color8888::new(255, 0, 0, 1)));
        // A1 R5 G5 B5: alpha bit 15, red bits 10..14
        assert_eq!(u16::from_le_bytes(row), 0xFC00);
        assert!(dispatcher.set_rgba(&mut row, 0, Color8888::new(0, 0, 255, 0)));
        assert_eq!(u16::from_le_bytes(row), 0x001F);
        assert_eq!(dispatcher.get_rgba(&row, 0), Some(Color8888::new(0, 0, 255, 0)));
    }

    #[test]
    fn format_565_has_opaque_alpha() {
        let dispatcher =
            ColorDispatcher::direct(RasterFormat::Raster565, ColorOrdering::Bgra, 16).unwrap();
        let row = 0xFFFFu16.to_le_bytes();
        assert_eq!(dispatcher.get_rgba(&row, 0), Some(Color8888::new(255, 255, 255, 255)));
    }

    #[test]
    fn format_555_writes_padding_bit() {
        let dispatcher =
            ColorDispatcher::direct(RasterFormat::Raster555, ColorOrdering::Bgra, 16).unwrap();
        let mut row = [0u8; 2];
        assert!(dispatcher.set_rgba(&mut row, 0, Color8888::new(0, 0, 0, 0)));
        assert_eq!(u16::from_le_bytes(row), 0x8000);
        assert_eq!(dispatcher.get_rgba(&row, 0).unwrap().a, 255);
    }

    #[test]
    fn format_4444_abgr_matches_gl_packing() {
        let dispatcher =
            ColorDispatcher::direct(RasterFormat::Raster4444, ColorOrdering::Abgr, 16).unwrap();
        let mut row = [0u8; 2];
        assert!(dispatcher.set_rgba(&mut row, 0, Color8888::new(0xFF, 0, 0, 0x00)));
        // GL_UNSIGNED_SHORT_4_4_4_4 keeps red in the top nibble
        assert_eq!(u16::from_le_bytes(row), 0xF000);
    }

    #[test]
    fn format_888_24_bit_is_opaque() {
        let dispatcher =
            ColorDispatcher::direct(RasterFormat::Raster888, ColorOrdering::Bgra, 24).unwrap();
        let mut row = [0u8; 6];
        assert!(dispatcher.set_rgba(&mut row, 1, Color8888::new(1, 2, 3, 0)));
        assert_eq!(&row[3..], &[3, 2, 1]);
        assert_eq!(dispatcher.get_rgba(&row, 1), Some(Color8888::new(1, 2, 3, 255)));
    }

    #[rstest]
    #[case(RasterFormat::Lum, 8, [0x80], (0x80, 0xFF))]
    #[case(RasterFormat::Lum, 4, [0xF0], (0xFF, 0xFF))]
    #[case(RasterFormat::LumAlpha, 8, [0x3F], (0xFF, 0x33))]
    fn luminance_formats(
        #[case] format: RasterFormat,
        #[case] depth: u32,
        #[case] row: [u8; 1],
        #[case] expected: (u8, u8),
    ) {
        let dispatcher = ColorDispatcher::direct(format, ColorOrdering::Rgba, depth).unwrap();
        assert_eq!(dispatcher.get_luminance(&row, 0), Some(expected));
        assert!(matches!(
            dispatcher.get_color(&row, 0),
            Some(AbstractColor::Luminance { .. })
        ));
    }

    #[test]
    fn luminance_alpha_16_round_trip() {
        let dispatcher =
            ColorDispatcher::direct(RasterFormat::LumAlpha, ColorOrdering::Rgba, 16).unwrap();
        let mut row = [0u8; 4];
        assert!(dispatcher.set_luminance(&mut row, 1, 0x12, 0x34));
        assert_eq!(&row[2..], &[0x12, 0x34]);
        assert_eq!(dispatcher.get_luminance(&row, 1), Some((0x12, 0x34)));
    }

    #[rstest]
    #[case(PaletteType::Pal4, [0x12], 0, 1)]
    #[case(PaletteType::Pal4, [0x12], 1, 2)]
    #[case(PaletteType::Pal4Lsb, [0x12], 0, 2)]
    #[case(PaletteType::Pal8, [0x02], 0, 2)]
    fn palette_index_addressing(
        #[case] palette_type: PaletteType,
        #[case] row: [u8; 1],
        #[case] index: u32,
        #[case] expected_entry: usize,
    ) {
        let palette: Vec<u8> = (0..4u8).flat_map(|i| [i * 10, i * 20, i * 30, 255]).collect();
        let dispatcher = ColorDispatcher::new(
            RasterFormat::Raster8888,
            ColorOrdering::Rgba,
            palette_type.index_depth(),
            palette_type,
            &palette,
            4,
        )
        .unwrap();
        let entry = &palette[expected_entry * 4..expected_entry * 4 + 4];
        assert_eq!(
            dispatcher.get_rgba(&row, index),
            Some(Color8888::new(entry[0], entry[1], entry[2], entry[3]))
        );
    }

    #[test]
    fn out_of_range_palette_index_is_transparent() {
        let palette = [255u8; 8];
        let dispatcher = ColorDispatcher::new(
            RasterFormat::Raster8888,
            ColorOrdering::Rgba,
            8,
            PaletteType::Pal8,
            &palette,
            2,
        )
        .unwrap();
        assert_eq!(dispatcher.get_rgba(&[5], 0), Some(Color8888::TRANSPARENT));
        assert!(!dispatcher.set_rgba(&mut [0], 0, Color8888::TRANSPARENT));
        let mut row = [7u8];
        assert!(dispatcher.set_cleared_color(&mut row, 0));
        assert_eq!(row, [0]);
    }

    #[rstest]
    #[case(RasterFormat::Raster8888, 16)]
    #[case(RasterFormat::Raster565, 32)]
    #[case(RasterFormat::Lum, 16)]
    #[case(RasterFormat::Default, 32)]
    fn mismatched_depth_is_rejected(#[case] format: RasterFormat, #[case] depth: u32) {
        assert_eq!(
            ColorDispatcher::direct(format, ColorOrdering::Rgba, depth).map(|_| ()),
            Err(PixelFormatError::UnsupportedDepth { format, depth })
        );
    }

    #[test]
    fn depth_formats_read_as_grey() {
        let dispatcher =
            ColorDispatcher::direct(RasterFormat::Depth16, ColorOrdering::Rgba, 16).unwrap();
        let mut row = [0u8; 2];
        assert!(dispatcher.set_luminance(&mut row, 0, 0xAB, 0xFF));
        assert_eq!(row, [0xAB, 0xAB]);
        assert_eq!(dispatcher.get_luminance(&row, 0), Some((0xAB, 0xFF)));
    }

    #[test]
    fn palette_size_check() {
        assert!(check_palette_size(RasterFormat::Raster8888, &[0u8; 64], 16).is_ok());
        assert!(check_palette_size(RasterFormat::Raster8888, &[0u8; 63], 16).is_err());
    }
}
