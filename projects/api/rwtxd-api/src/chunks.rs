//! Chunk ids, platform descriptors and the headers shared by every native texture.

use crate::block::BlockProvider;
use crate::engine::Engine;
use crate::error::{TxdError, TxdResult};
use crate::native::TextureInfo;
use bitfield::bitfield;
use rwtxd_common::{PaletteType, RasterFormat};

/// Generic structure payload.
pub const CHUNK_STRUCT: u32 = 0x01;
/// String payload.
pub const CHUNK_STRING: u32 = 0x02;
/// Container of plugin extension chunks.
pub const CHUNK_EXTENSION: u32 = 0x03;
/// One native texture.
pub const CHUNK_TEXTURENATIVE: u32 = 0x15;

/// Builds a four character code from its ASCII bytes.
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

/// Direct3D 8.
pub const PLATFORM_D3D8: u32 = 8;
/// Direct3D 9.
pub const PLATFORM_D3D9: u32 = 9;
/// XBOX.
pub const PLATFORM_XBOX: u32 = 5;
/// PlayStation 2.
pub const PLATFORM_PS2: u32 = fourcc(b"PS2\0");
/// PlayStation Portable.
pub const PLATFORMDESC_PSP: u32 = fourcc(b"PSP\0");
/// AMD texture compression (mobile).
pub const PLATFORMDESC_ATC: u32 = fourcc(b"ATC\0");
/// PowerVR texture compression (mobile).
pub const PLATFORMDESC_PVR: u32 = fourcc(b"PVR\0");
/// S3TC on mobile.
pub const PLATFORMDESC_DXT_MOBILE: u32 = fourcc(b"DXT\0");
/// Uncompressed mobile.
pub const PLATFORMDESC_UNC_MOBILE: u32 = fourcc(b"UNC\0");

/// Longest string accepted from a string chunk.
pub const MAX_STRING_LENGTH: u32 = i32::MAX as u32;

bitfield! {
    /// Raster format flags word shared by every platform.
    ///
    /// Bit layout:
    /// - Bits 0-7: Raster type byte
    /// - Bits 8-15: Palette type (0x20 PAL8, 0x40 PAL4, 0x80 PAL4_LSB)
    /// - Bit 16: Has mipmaps (PS2: has swizzle)
    /// - Bit 17: Auto mipmaps (PS2: requires headers)
    /// - Bits 24-31: Raster format
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RasterFormatFlags(u32);
    impl Debug;
    u32;

    /// Raster type byte (8 bits)
    pub raster_type, set_raster_type: 7, 0;
    /// Palette type byte (8 bits)
    pub palette_bits, set_palette_bits: 15, 8;
    /// Has mipmaps (1 bit)
    pub has_mipmaps, set_has_mipmaps: 16, 16;
    /// Auto mipmaps (1 bit)
    pub auto_mipmaps, set_auto_mipmaps: 17, 17;
    /// Raster format enum (8 bits)
    pub format_bits, set_format_bits: 31, 24;
}

impl RasterFormatFlags {
    /// Packs a raster description.
    pub fn new(
        raster_format: RasterFormat,
        palette_type: PaletteType,
        has_mipmaps: bool,
        auto_mipmaps: bool,
        raster_type: u8,
    ) -> Self {
        let mut flags = Self::default();
        flags.set_raster_type(raster_type as u32);
        flags.set_palette_bits(palette_type.to_flags_byte() as u32);
        flags.set_has_mipmaps(has_mipmaps as u32);
        flags.set_auto_mipmaps(auto_mipmaps as u32);
        flags.set_format_bits(raster_format.to_u8() as u32);
        flags
    }

    /// Raster format, if the stored value is known.
    pub fn raster_format(&self) -> Option<RasterFormat> {
        RasterFormat::from_u8(self.format_bits() as u8)
    }

    /// Palette type, if the stored value is known.
    pub fn palette_type(&self) -> Option<PaletteType> {
        PaletteType::from_flags_byte(self.palette_bits() as u8)
    }
}

impl From<u32> for RasterFormatFlags {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<RasterFormatFlags> for u32 {
    fn from(flags: RasterFormatFlags) -> u32 {
        flags.0
    }
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FilterMode {
    /// No filtering.
    None = 0,
    /// Point sampling.
    Nearest = 1,
    /// Bilinear.
    #[default]
    Linear = 2,
    /// Point sampling, nearest mipmap.
    MipNearest = 3,
    /// Point sampling, blended mipmaps.
    MipLinear = 4,
    /// Bilinear, nearest mipmap.
    LinearMipNearest = 5,
    /// Trilinear.
    LinearMipLinear = 6,
}

impl FilterMode {
    /// Parses the on-disk value.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::Nearest,
            2 => Self::Linear,
            3 => Self::MipNearest,
            4 => Self::MipLinear,
            5 => Self::LinearMipNearest,
            6 => Self::LinearMipLinear,
            _ => return None,
        })
    }

    /// Whether this filter samples mipmaps.
    pub fn uses_mipmaps(self) -> bool {
        matches!(
            self,
            Self::MipNearest | Self::MipLinear | Self::LinearMipNearest | Self::LinearMipLinear
        )
    }
}

/// Texture coordinate addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AddressingMode {
    /// No addressing.
    None = 0,
    /// Repeat.
    #[default]
    Wrap = 1,
    /// Mirrored repeat.
    Mirror = 2,
    /// Clamp to edge.
    Clamp = 3,
    /// Clamp to border color.
    Border = 4,
}

impl AddressingMode {
    /// Parses the on-disk value.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::Wrap,
            2 => Self::Mirror,
            3 => Self::Clamp,
            4 => Self::Border,
            _ => return None,
        })
    }
}

/// Mipmap flag byte: texture has mipmaps.
pub const TEXFORMAT_HAS_MIPMAPS: u8 = 0x01;
/// Mipmap flag byte: mipmaps are generated at runtime.
pub const TEXFORMAT_AUTO_MIPMAPS: u8 = 0x02;

/// The 16-byte `texFormatInfo` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TexFormatInfo {
    /// Horizontal addressing mode.
    pub u_addressing: u8,
    /// Vertical addressing mode.
    pub v_addressing: u8,
    /// Filter mode.
    pub filtering: u8,
    /// Mipmap flag byte ([`TEXFORMAT_HAS_MIPMAPS`], [`TEXFORMAT_AUTO_MIPMAPS`]).
    pub mipmap_flags: u8,
    /// Raster format flags word.
    pub raster_flags: RasterFormatFlags,
    /// Name field marker, preserved verbatim.
    pub name_marker: u32,
    /// Mask name field marker, preserved verbatim.
    pub mask_marker: u32,
}

impl TexFormatInfo {
    /// Size on disk.
    pub const SIZE: usize = 16;

    /// Builds the header from the shared texture properties.
    pub fn from_texture_info(
        info: &TextureInfo,
        raster_flags: RasterFormatFlags,
        has_mipmaps: bool,
        auto_mipmaps: bool,
    ) -> Self {
        let mut mipmap_flags = 0;
        if has_mipmaps {
            mipmap_flags |= TEXFORMAT_HAS_MIPMAPS;
        }
        if auto_mipmaps {
            mipmap_flags |= TEXFORMAT_AUTO_MIPMAPS;
        }
        Self {
            u_addressing: info.u_addressing as u8,
            v_addressing: info.v_addressing as u8,
            filtering: info.filter_mode as u8,
            mipmap_flags,
            raster_flags,
            name_marker: info.name_marker,
            mask_marker: info.mask_marker,
        }
    }

    /// Copies sampling state and markers into `info`, warning about unknown values.
    pub fn apply_to(&self, engine: &Engine, info: &mut TextureInfo) {
        info.filter_mode = FilterMode::from_u8(self.filtering).unwrap_or_else(|| {
            engine.push_warning(2, format!("unknown filter mode {}; using linear", self.filtering));
            FilterMode::default()
        });
        info.u_addressing = AddressingMode::from_u8(self.u_addressing).unwrap_or_else(|| {
            engine.push_warning(2, format!("unknown u addressing {}; using wrap", self.u_addressing));
            AddressingMode::default()
        });
        info.v_addressing = AddressingMode::from_u8(self.v_addressing).unwrap_or_else(|| {
            engine.push_warning(2, format!("unknown v addressing {}; using wrap", self.v_addressing));
            AddressingMode::default()
        });
        info.name_marker = self.name_marker;
        info.mask_marker = self.mask_marker;
    }

    /// Whether the auto mipmap bit is set.
    pub fn auto_mipmaps(&self) -> bool {
        self.mipmap_flags & TEXFORMAT_AUTO_MIPMAPS != 0
    }

    /// Reads the header.
    pub fn read(block: &mut BlockProvider<'_>) -> TxdResult<Self> {
        let bytes = block.read_array::<{ Self::SIZE }>()?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Writes the header.
    pub fn write(&self, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        block.write(&self.to_bytes())
    }

    /// Parses the header from its 16 bytes.
    pub fn from_bytes(bytes: &[u8; 16]) -> Self {
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Self {
            u_addressing: bytes[0],
            v_addressing: bytes[1],
            filtering: bytes[2],
            mipmap_flags: bytes[3],
            raster_flags: RasterFormatFlags(word(4)),
            name_marker: word(8),
            mask_marker: word(12),
        }
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0] = self.u_addressing;
        bytes[1] = self.v_addressing;
        bytes[2] = self.filtering;
        bytes[3] = self.mipmap_flags;
        bytes[4..8].copy_from_slice(&self.raster_flags.0.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.name_marker.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.mask_marker.to_le_bytes());
        bytes
    }
}

/// Reads a string chunk child of `parent`.
///
/// Everything from the first NUL on is ignored.
pub fn read_string_chunk(parent: &mut BlockProvider<'_>) -> TxdResult<String> {
    BlockProvider::read_expected_child(parent, CHUNK_STRING, |block| {
        let length = block.block_length();
        if length >= MAX_STRING_LENGTH {
            return Err(TxdError::structural(format!("string chunk of {length} bytes")));
        }
        let bytes = block.read_vec(length as usize)?;
        Ok(decode_fixed_string(&bytes))
    })
}

/// Writes `value` as a string chunk child of `parent`, NUL terminated and padded to 4 bytes.
pub fn write_string_chunk(parent: &mut BlockProvider<'_>, value: &str) -> TxdResult<()> {
    BlockProvider::write_child(parent, CHUNK_STRING, |block| {
        let bytes = value.as_bytes();
        let padded = (bytes.len() + 1).next_multiple_of(4);
        block.write(bytes)?;
        block.write_zeros(padded - bytes.len())
    })
}

/// Decodes a NUL padded string field.
pub fn decode_fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|byte| *byte == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Encodes a string into a fixed size NUL padded field, truncating to `N - 1` bytes.
pub fn encode_fixed_string<const N: usize>(engine: &Engine, value: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let bytes = value.as_bytes();
    let length = bytes.len().min(N.saturating_sub(1));
    if length < bytes.len() {
        engine.push_warning(
            2,
            format!("name '{value}' longer than {} bytes; truncated", N - 1),
        );
    }
    field[..length].copy_from_slice(&bytes[..length]);
    field
}
