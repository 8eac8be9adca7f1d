//! # Raster Formats
//!
//! Enumerations describing how texels are laid out in memory, shared by all
//! native texture codecs:
//!
//! - [`RasterFormat`]: the sample type (1555, 8888, LUM, ...).
//! - [`ColorOrdering`]: the order of the color channels inside one sample.
//! - [`PaletteType`]: whether texels are palette indices, and how they are addressed.
//! - [`CompressionType`]: block compressed payloads.
//!
//! Plus row size helpers used for every buffer size computation.

use derive_enum_all_values::AllValues;

/// Raster (sample) format of a texture.
///
/// The discriminants are the values stored in bits 24..31 of the raster format flags.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, AllValues)]
pub enum RasterFormat {
    /// No explicit format.
    #[default]
    Default = 0,
    /// 16 bits: R5 G5 B5 A1.
    Raster1555 = 1,
    /// 16 bits: R5 G6 B5.
    Raster565 = 2,
    /// 16 bits: R4 G4 B4 A4.
    Raster4444 = 3,
    /// 4 or 8 bit luminance.
    Lum = 4,
    /// 32 bits: R8 G8 B8 A8.
    Raster8888 = 5,
    /// 24 or 32 bits: R8 G8 B8.
    Raster888 = 6,
    /// 16 bit depth.
    Depth16 = 7,
    /// 24 bit depth.
    Depth24 = 8,
    /// 32 bit depth.
    Depth32 = 9,
    /// 16 bits: R5 G5 B5, top bit unused.
    Raster555 = 10,
    /// Luminance plus alpha, 8 (4:4) or 16 (8:8) bits.
    LumAlpha = 11,
}

/// Color model implied by a [`RasterFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorModel {
    /// Red, green, blue and alpha channels.
    Rgba,
    /// Luminance with optional alpha.
    Luminance,
    /// Depth values, read back as grey.
    Depth,
}

/// A single color channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Red.
    Red,
    /// Green.
    Green,
    /// Blue.
    Blue,
    /// Alpha.
    Alpha,
}

impl RasterFormat {
    /// Converts the raw flag value into a [`RasterFormat`].
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Default,
            1 => Self::Raster1555,
            2 => Self::Raster565,
            3 => Self::Raster4444,
            4 => Self::Lum,
            5 => Self::Raster8888,
            6 => Self::Raster888,
            7 => Self::Depth16,
            8 => Self::Depth24,
            9 => Self::Depth32,
            10 => Self::Raster555,
            11 => Self::LumAlpha,
            _ => return None,
        })
    }

    /// Raw flag value of this format.
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// The color model samples of this format decode into.
    pub fn color_model(self) -> ColorModel {
        match self {
            Self::Lum | Self::LumAlpha => ColorModel::Luminance,
            Self::Depth16 | Self::Depth24 | Self::Depth32 => ColorModel::Depth,
            _ => ColorModel::Rgba,
        }
    }

    /// Depth a single sample of this format naturally occupies.
    ///
    /// This is the size of a palette entry when the format is used by a palette.
    pub fn natural_depth(self) -> u32 {
        match self {
            Self::Raster1555
            | Self::Raster565
            | Self::Raster4444
            | Self::Raster555
            | Self::Depth16 => 16,
            Self::Lum | Self::LumAlpha => 8,
            Self::Depth24 => 24,
            Self::Default | Self::Raster8888 | Self::Raster888 | Self::Depth32 => 32,
        }
    }

    /// Whether direct (non palette) samples of this format can be stored at `depth`.
    pub fn supports_depth(self, depth: u32) -> bool {
        match self {
            Self::Raster888 => depth == 24 || depth == 32,
            Self::Lum => depth == 4 || depth == 8,
            Self::LumAlpha => depth == 8 || depth == 16,
            Self::Default => false,
            other => other.natural_depth() == depth,
        }
    }

    /// Whether samples of this format carry an alpha channel.
    pub fn has_alpha_channel(self) -> bool {
        matches!(
            self,
            Self::Raster1555 | Self::Raster4444 | Self::Raster8888 | Self::LumAlpha
        )
    }

    /// Bit widths of the red, green, blue and alpha channels for RGBA formats.
    ///
    /// An alpha width of zero means the channel is absent (reads as opaque).
    /// `depth` selects between the 24 and 32 bit flavours of [`RasterFormat::Raster888`].
    pub(crate) fn rgba_widths(self, depth: u32) -> [u32; 4] {
        match self {
            Self::Raster1555 | Self::Raster555 => [5, 5, 5, 1],
            Self::Raster565 => [5, 6, 5, 0],
            Self::Raster4444 => [4, 4, 4, 4],
            Self::Raster888 if depth == 24 => [8, 8, 8, 0],
            _ => [8, 8, 8, 8],
        }
    }

    /// Whether the alpha bits of the sample hold real alpha (as opposed to padding).
    pub(crate) fn stores_alpha(self) -> bool {
        !matches!(self, Self::Raster555 | Self::Raster888 | Self::Raster565)
    }

    /// Short display name, as used in texture format strings.
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Raster1555 => "1555",
            Self::Raster565 => "565",
            Self::Raster4444 => "4444",
            Self::Lum => "LUM",
            Self::Raster8888 => "8888",
            Self::Raster888 => "888",
            Self::Depth16 => "DEPTH16",
            Self::Depth24 => "DEPTH24",
            Self::Depth32 => "DEPTH32",
            Self::Raster555 => "555",
            Self::LumAlpha => "LUM_ALPHA",
        }
    }
}

/// Order in which the color channels appear inside a sample.
///
/// The order lists channel slots starting at the least significant bit; for byte
/// sized channels this is their order in memory. Channels of zero width
/// (e.g. alpha in 565) take no bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, AllValues)]
pub enum ColorOrdering {
    /// Red first.
    #[default]
    Rgba,
    /// Blue first, as used by Direct3D.
    Bgra,
    /// Alpha first, then blue.
    Abgr,
    /// Alpha first, then red.
    Argb,
    /// Blue, alpha, red, green.
    Barg,
}

impl ColorOrdering {
    /// Channel slots from the least significant bit upwards.
    pub fn channel_slots(self) -> [Channel; 4] {
        use Channel::*;
        match self {
            Self::Rgba => [Red, Green, Blue, Alpha],
            Self::Bgra => [Blue, Green, Red, Alpha],
            Self::Abgr => [Alpha, Blue, Green, Red],
            Self::Argb => [Alpha, Red, Green, Blue],
            Self::Barg => [Blue, Alpha, Red, Green],
        }
    }
}

/// Palette kind of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, AllValues)]
pub enum PaletteType {
    /// Texels are direct color samples.
    #[default]
    None,
    /// 4 bit indices, high nibble first.
    Pal4,
    /// 4 bit indices, low nibble first.
    Pal4Lsb,
    /// 8 bit indices.
    Pal8,
}

impl PaletteType {
    /// Value stored in bits 8..15 of the raster format flags.
    pub fn to_flags_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Pal8 => 0x20,
            Self::Pal4 => 0x40,
            Self::Pal4Lsb => 0x80,
        }
    }

    /// Parses bits 8..15 of the raster format flags.
    pub fn from_flags_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            0x20 => Some(Self::Pal8),
            0x40 => Some(Self::Pal4),
            0x80 => Some(Self::Pal4Lsb),
            _ => None,
        }
    }

    /// Whether texels are palette indices.
    #[inline]
    pub fn is_palette(self) -> bool {
        self != Self::None
    }

    /// Number of entries a palette of this kind holds.
    pub fn item_count(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Pal4 | Self::Pal4Lsb => 16,
            Self::Pal8 => 256,
        }
    }

    /// Bits per texel index.
    pub fn index_depth(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Pal4 | Self::Pal4Lsb => 4,
            Self::Pal8 => 8,
        }
    }

    /// Whether 4 bit indices are addressed low nibble first.
    #[inline]
    pub fn is_lsb_first(self) -> bool {
        self == Self::Pal4Lsb
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Pal4 | Self::Pal4Lsb => "PAL4",
            Self::Pal8 => "PAL8",
        }
    }
}

/// Block compression applied to texel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionType {
    /// Uncompressed.
    #[default]
    None,
    /// DXT1 / BC1.
    Dxt1,
    /// DXT2 (premultiplied DXT3).
    Dxt2,
    /// DXT3 / BC2.
    Dxt3,
    /// DXT4 (premultiplied DXT5).
    Dxt4,
    /// DXT5 / BC3.
    Dxt5,
    /// AMD ATC, RGB.
    AtcRgb,
    /// AMD ATC, RGBA with explicit alpha.
    AtcRgbaExplicitAlpha,
    /// AMD ATC, RGBA with interpolated alpha.
    AtcRgbaInterpolatedAlpha,
    /// PowerVR PVRTC 2bpp, RGB.
    Pvrtc2bppRgb,
    /// PowerVR PVRTC 2bpp, RGBA.
    Pvrtc2bppRgba,
    /// PowerVR PVRTC 4bpp, RGB.
    Pvrtc4bppRgb,
    /// PowerVR PVRTC 4bpp, RGBA.
    Pvrtc4bppRgba,
}

impl CompressionType {
    /// Whether this is one of the DXTn formats.
    pub fn is_dxt(self) -> bool {
        matches!(
            self,
            Self::Dxt1 | Self::Dxt2 | Self::Dxt3 | Self::Dxt4 | Self::Dxt5
        )
    }

    /// Whether texel data is compressed at all.
    #[inline]
    pub fn is_compressed(self) -> bool {
        self != Self::None
    }

    /// DXT compression index as used by Direct3D style headers (1..5), 0 when not DXT.
    pub fn dxt_index(self) -> u8 {
        match self {
            Self::Dxt1 => 1,
            Self::Dxt2 => 2,
            Self::Dxt3 => 3,
            Self::Dxt4 => 4,
            Self::Dxt5 => 5,
            _ => 0,
        }
    }

    /// Inverse of [`CompressionType::dxt_index`]. Returns [`None`] for values above 5.
    pub fn from_dxt_index(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::Dxt1,
            2 => Self::Dxt2,
            3 => Self::Dxt3,
            4 => Self::Dxt4,
            5 => Self::Dxt5,
            _ => return None,
        })
    }

    /// Number of bytes one 4x4 block occupies, for the block based formats.
    pub fn block_size(self) -> Option<usize> {
        match self {
            Self::Dxt1 | Self::AtcRgb => Some(8),
            Self::Dxt2
            | Self::Dxt3
            | Self::Dxt4
            | Self::Dxt5
            | Self::AtcRgbaExplicitAlpha
            | Self::AtcRgbaInterpolatedAlpha => Some(16),
            _ => None,
        }
    }

    /// Size of a compressed surface with the given dimensions.
    ///
    /// Returns [`None`] for uncompressed data.
    pub fn data_size(self, width: u32, height: u32) -> Option<usize> {
        let width = width as usize;
        let height = height as usize;
        match self {
            Self::None => None,
            Self::Pvrtc2bppRgb | Self::Pvrtc2bppRgba => {
                Some(width.max(16) * height.max(8) * 2 / 8)
            }
            Self::Pvrtc4bppRgb | Self::Pvrtc4bppRgba => Some(width.max(8) * height.max(8) * 4 / 8),
            block_based => {
                let block_size = block_based.block_size()?;
                Some(width.div_ceil(4) * height.div_ceil(4) * block_size)
            }
        }
    }

    /// Rounds surface dimensions up to what the compression stores physically.
    pub fn physical_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self.block_size() {
            Some(_) => (width.div_ceil(4) * 4, height.div_ceil(4) * 4),
            None => (width, height),
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Dxt1 => "DXT1",
            Self::Dxt2 => "DXT2",
            Self::Dxt3 => "DXT3",
            Self::Dxt4 => "DXT4",
            Self::Dxt5 => "DXT5",
            Self::AtcRgb => "ATC_RGB",
            Self::AtcRgbaExplicitAlpha => "ATC_RGBA_EXPLICIT",
            Self::AtcRgbaInterpolatedAlpha => "ATC_RGBA_INTERPOLATED",
            Self::Pvrtc2bppRgb => "PVRTC_2BPP_RGB",
            Self::Pvrtc2bppRgba => "PVRTC_2BPP_RGBA",
            Self::Pvrtc4bppRgb => "PVRTC_4BPP_RGB",
            Self::Pvrtc4bppRgba => "PVRTC_4BPP_RGBA",
        }
    }
}

/// Size in bytes of one row of `width` samples at `depth` bits, padded to `alignment`.
///
/// `ceil(width * depth / 8 / alignment) * alignment`; an alignment of 0 is treated as 1.
#[inline]
pub fn row_size(width: u32, depth: u32, alignment: u32) -> usize {
    let bytes = (width as usize * depth as usize).div_ceil(8);
    let alignment = alignment.max(1) as usize;
    bytes.div_ceil(alignment) * alignment
}

/// Size in bytes of an uncompressed surface.
#[inline]
pub fn texel_data_size(width: u32, height: u32, depth: u32, alignment: u32) -> usize {
    row_size(width, depth, alignment) * height as usize
}

/// Whether two row alignments produce different row sizes for the same surface.
///
/// When they do, texels cannot be moved with one bulk copy and must be transferred
/// row by row.
pub fn has_conflicting_addressing(
    width: u32,
    depth: u32,
    src_alignment: u32,
    dst_alignment: u32,
) -> bool {
    row_size(width, depth, src_alignment) != row_size(width, depth, dst_alignment)
}

/// Dimensions of mipmap level `level` for a base surface of `width` x `height`.
#[inline]
pub fn mip_dimensions(width: u32, height: u32, level: u32) -> (u32, u32) {
    (
        width.checked_shr(level).unwrap_or(0).max(1),
        height.checked_shr(level).unwrap_or(0).max(1),
    )
}
