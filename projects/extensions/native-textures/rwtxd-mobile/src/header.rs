//! The fixed header at the start of the struct chunk.

use rwtxd_api::chunks::{decode_fixed_string, encode_fixed_string, TexFormatInfo};
use rwtxd_api::{BlockProvider, Engine, TxdError, TxdResult};
use rwtxd_common::endian::{ByteReader, ByteWriter};

/// Bytes of each name field.
pub const NAME_FIELD_SIZE: usize = 32;

/// Header of a mobile texture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MobileHeader {
    /// Platform descriptor.
    pub platform: u32,
    /// Sampling state and raster flags.
    pub format_info: TexFormatInfo,
    /// Texture name.
    pub name: String,
    /// Mask name.
    pub mask_name: String,
    /// Width of mipmap 0.
    pub width: u32,
    /// Height of mipmap 0.
    pub height: u32,
    /// Bits per texel.
    pub depth: u32,
    /// Number of stored mipmaps.
    pub mipmap_count: u32,
    /// Whether the texels carry alpha.
    pub has_alpha: bool,
    /// OpenGL ES format enum.
    pub internal_format: u32,
    /// Unknown, kept as read.
    pub unknown1: u32,
    /// Unknown, kept as read.
    pub unknown2: u32,
    /// Bytes of the mipmap section, byte counts included.
    pub image_data_section_size: u32,
}

impl MobileHeader {
    /// Size on disk.
    pub const SIZE: usize = 4 + TexFormatInfo::SIZE + 2 * NAME_FIELD_SIZE + 9 * 4;

    /// Reads the header.
    pub fn read(block: &mut BlockProvider<'_>) -> TxdResult<Self> {
        let bytes = block.read_array::<{ Self::SIZE }>()?;
        let mut reader = ByteReader::new(&bytes);
        Self::parse(&mut reader).ok_or_else(|| TxdError::structural("mobile texture header is truncated"))
    }

    fn parse(reader: &mut ByteReader<'_>) -> Option<Self> {
        Some(Self {
            platform: reader.read_u32()?,
            format_info: TexFormatInfo::from_bytes(&reader.read_array::<{ TexFormatInfo::SIZE }>()?),
            name: decode_fixed_string(reader.read_bytes(NAME_FIELD_SIZE)?),
            mask_name: decode_fixed_string(reader.read_bytes(NAME_FIELD_SIZE)?),
            width: reader.read_u32()?,
            height: reader.read_u32()?,
            depth: reader.read_u32()?,
            mipmap_count: reader.read_u32()?,
            has_alpha: reader.read_u32()? != 0,
            internal_format: reader.read_u32()?,
            unknown1: reader.read_u32()?,
            unknown2: reader.read_u32()?,
            image_data_section_size: reader.read_u32()?,
        })
    }

    /// Writes the header.
    pub fn write(&self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        let mut writer = ByteWriter::with_capacity(Self::SIZE);
        writer.put_u32(self.platform);
        writer.put_bytes(&self.format_info.to_bytes());
        writer.put_bytes(&encode_fixed_string::<NAME_FIELD_SIZE>(engine, &self.name));
        writer.put_bytes(&encode_fixed_string::<NAME_FIELD_SIZE>(engine, &self.mask_name));
        for value in [
            self.width,
            self.height,
            self.depth,
            self.mipmap_count,
            self.has_alpha as u32,
            self.internal_format,
            self.unknown1,
            self.unknown2,
            self.image_data_section_size,
        ] {
            writer.put_u32(value);
        }
        block.write(&writer.into_inner())
    }
}
