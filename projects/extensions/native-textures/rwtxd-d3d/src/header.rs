//! The fixed header at the start of the struct chunk.

use rwtxd_api::chunks::{decode_fixed_string, encode_fixed_string, TexFormatInfo};
use rwtxd_api::{BlockProvider, Engine, TxdError, TxdResult};
use rwtxd_common::endian::{ByteReader, ByteWriter};

/// Bytes of each name field.
pub const NAME_FIELD_SIZE: usize = 32;

/// Header flag: the texture is a cube map.
pub const FLAG_CUBEMAP: u8 = 0x01;
/// Header flag: mipmaps are generated at runtime.
pub const FLAG_AUTO_MIPMAPS: u8 = 0x02;

/// Header of a Direct3D style texture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct D3dHeader {
    /// Platform descriptor.
    pub platform: u32,
    /// Sampling state and raster flags.
    pub format_info: TexFormatInfo,
    /// Texture name.
    pub name: String,
    /// Mask name.
    pub mask_name: String,
    /// Whether any texel is translucent.
    pub has_alpha: bool,
    /// Width of mipmap 0.
    pub width: u16,
    /// Height of mipmap 0.
    pub height: u16,
    /// Bits per texel.
    pub depth: u8,
    /// Number of stored mipmaps.
    pub mipmap_count: u8,
    /// Raster type byte.
    pub raster_type: u8,
    /// DXT compression index, 0 when uncompressed.
    pub dxt_compression: u8,
    /// [`FLAG_CUBEMAP`] and [`FLAG_AUTO_MIPMAPS`].
    pub flags: u8,
}

impl D3dHeader {
    /// Size on disk.
    pub const SIZE: usize = 4 + TexFormatInfo::SIZE + 2 * NAME_FIELD_SIZE + 16;

    /// Reads the header.
    pub fn read(block: &mut BlockProvider<'_>) -> TxdResult<Self> {
        let bytes = block.read_array::<{ Self::SIZE }>()?;
        let mut reader = ByteReader::new(&bytes);
        Self::parse(&mut reader).ok_or_else(|| TxdError::structural("Direct3D header is truncated"))
    }

    fn parse(reader: &mut ByteReader<'_>) -> Option<Self> {
        let platform = reader.read_u32()?;
        let format_info = TexFormatInfo::from_bytes(&reader.read_array::<{ TexFormatInfo::SIZE }>()?);
        let name = decode_fixed_string(reader.read_bytes(NAME_FIELD_SIZE)?);
        let mask_name = decode_fixed_string(reader.read_bytes(NAME_FIELD_SIZE)?);
        let header = Self {
            platform,
            format_info,
            name,
            mask_name,
            has_alpha: reader.read_u32()? != 0,
            width: reader.read_u16()?,
            height: reader.read_u16()?,
            depth: reader.read_u8()?,
            mipmap_count: reader.read_u8()?,
            raster_type: reader.read_u8()?,
            dxt_compression: reader.read_u8()?,
            flags: reader.read_u8()?,
        };
        reader.skip(3)?;
        Some(header)
    }

    /// Writes the header; names longer than their field are truncated with a warning.
    pub fn write(&self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        let mut writer = ByteWriter::with_capacity(Self::SIZE);
        writer.put_u32(self.platform);
        writer.put_bytes(&self.format_info.to_bytes());
        writer.put_bytes(&encode_fixed_string::<NAME_FIELD_SIZE>(engine, &self.name));
        writer.put_bytes(&encode_fixed_string::<NAME_FIELD_SIZE>(engine, &self.mask_name));
        writer.put_u32(self.has_alpha as u32);
        writer.put_u16(self.width);
        writer.put_u16(self.height);
        writer.put_u8(self.depth);
        writer.put_u8(self.mipmap_count);
        writer.put_u8(self.raster_type);
        writer.put_u8(self.dxt_compression);
        writer.put_u8(self.flags);
        writer.put_zeros(3);
        block.write(&writer.into_inner())
    }

    /// Whether the cube map flag is set.
    pub fn is_cubemap(&self) -> bool {
        self.flags & FLAG_CUBEMAP != 0
    }

    /// Whether the auto mipmap flag is set.
    pub fn auto_mipmaps(&self) -> bool {
        self.flags & FLAG_AUTO_MIPMAPS != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_one_hundred_bytes() {
        assert_eq!(D3dHeader::SIZE, 100);
    }
}
