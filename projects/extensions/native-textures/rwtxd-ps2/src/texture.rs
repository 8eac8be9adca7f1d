//! # PS2 Native Texture
//!
//! On disk a PS2 texture native block holds:
//!
//! 1. A struct chunk with the platform descriptor and the `texFormatInfo` header.
//! 2. The texture and mask name string chunks.
//! 3. A struct chunk holding the [`TextureMeta`] chunk and the GS packet chunk with
//!    one [`GsPacket`] per mipmap followed by one for the CLUT.
//! 4. The extension block.
//!
//! Mipmaps are kept in the encoding they are uploaded with (see [`required_encoding`]),
//! so reading and writing a texture never touches its texels. Conversion into and
//! out of that encoding happens in [`Ps2NativeTexture::get_pixel_data`] and
//! [`Ps2NativeTexture::set_pixel_data`].

use crate::clut::{clut_dimensions, decode_clut, encode_clut, entry_size};
use crate::gif::{GsPacket, TransferHeader};
use crate::memory::{allocate, ClutRule, GsAllocation, GsMemoryLayout, GsSurface};
use crate::registers::{filter_to_gs, GsRegisters, MipTbp, Tex0, Tex1};
use crate::Ps2NativeTextureType;
use core::any::Any;
use rwtxd_api::chunks::{
    read_string_chunk, write_string_chunk, RasterFormatFlags, TexFormatInfo, CHUNK_STRUCT,
    PLATFORM_PS2,
};
use rwtxd_api::extension::{read_extensions, write_extensions};
use rwtxd_api::pixel_data::RASTER_TYPE_TEXTURE;
use rwtxd_api::{
    AcquireFeedback, BlockProvider, Engine, LibraryVersion, MipmapLayer, NativeTexture,
    NativeTextureType, PixelData, RasterLayout, SizeRules, TextureInfo, TxdError, TxdResult,
};
use rwtxd_common::alpha::{convert_alpha_in_place, pc_alpha_to_ps2, ps2_alpha_to_pc};
use rwtxd_common::endian::{ByteReader, ByteWriter};
use rwtxd_common::formats::mip_dimensions;
use rwtxd_common::permute::{packed_dimensions, permute_texels, SurfaceShape};
use rwtxd_common::{ColorOrdering, PaletteType, PixelEncoding, RasterFormat};

/// Most mipmaps a PS2 texture can carry.
pub const PS2_MAX_MIPMAPS: usize = 7;

/// Default LOD parameters (`L` and `K` of TEX1) stored with every texture.
pub const DEFAULT_SKY_MIPMAP_VAL: u32 = 0xFC0;

/// Dimension limits of PS2 textures.
pub const PS2_SIZE_RULES: SizeRules = SizeRules::power_of_two_up_to(1024);

/// Meta chunk flag: palette mipmaps are swizzled into 32-bit units.
const META_HAS_SWIZZLE: u32 = 1 << 16;
/// Meta chunk flag: every upload carries its transfer registers.
const META_REQUIRES_HEADERS: u32 = 1 << 17;

/// Encoding of a linear surface of the given raster.
pub fn linear_encoding(raster_format: RasterFormat, palette_type: PaletteType) -> PixelEncoding {
    match palette_type {
        PaletteType::Pal4 | PaletteType::Pal4Lsb => PixelEncoding::IdTex4,
        PaletteType::Pal8 => PixelEncoding::IdTex8,
        PaletteType::None if raster_format == RasterFormat::Raster1555 => PixelEncoding::Tex16,
        PaletteType::None => PixelEncoding::Tex32,
    }
}

/// Encoding mipmaps of the given raster are uploaded with.
///
/// Palette indices are swizzled into 32-bit units only by libraries after minor
/// version 2, and only when the texture asks for swizzling or transfer headers.
pub fn required_encoding(
    raster_format: RasterFormat,
    palette_type: PaletteType,
    lib_minor: u8,
    has_swizzle: bool,
    requires_headers: bool,
) -> PixelEncoding {
    let swizzled = lib_minor > 2 && (has_swizzle || requires_headers);
    match palette_type {
        PaletteType::Pal4 | PaletteType::Pal4Lsb if swizzled => PixelEncoding::Tex32,
        PaletteType::Pal4 | PaletteType::Pal4Lsb => PixelEncoding::IdTex8Compressed,
        PaletteType::Pal8 if swizzled => PixelEncoding::Tex32,
        PaletteType::Pal8 => PixelEncoding::IdTex8,
        PaletteType::None => linear_encoding(raster_format, palette_type),
    }
}

/// Dimensions of an uploaded surface.
///
/// Swizzled surfaces take the packed dimensions; all others are padded to whole
/// columns of their encoding.
pub fn stored_dimensions(linear: PixelEncoding, stored: PixelEncoding, width: u32, height: u32) -> TxdResult<(u32, u32)> {
    let dimensions = if linear.depth() == stored.depth() {
        packed_dimensions(stored, stored, width, height)?
    } else {
        packed_dimensions(linear, stored, width, height)?
    };
    Ok(dimensions)
}

/// Layout the GS samples the raster in.
fn sampled_layout(raster_format: RasterFormat, palette_type: PaletteType) -> GsMemoryLayout {
    match palette_type {
        PaletteType::Pal4 | PaletteType::Pal4Lsb => GsMemoryLayout::Psmt4,
        PaletteType::Pal8 => GsMemoryLayout::Psmt8,
        PaletteType::None => clut_layout(raster_format),
    }
}

fn clut_layout(raster_format: RasterFormat) -> GsMemoryLayout {
    match raster_format {
        RasterFormat::Raster1555 => GsMemoryLayout::Psmct16,
        _ => GsMemoryLayout::Psmct32,
    }
}

/// `PSM` code data of the given encoding is transferred with.
fn transfer_psm(encoding: PixelEncoding) -> u64 {
    match encoding {
        PixelEncoding::Tex16 => GsMemoryLayout::Psmct16.psm(),
        PixelEncoding::IdTex8 => GsMemoryLayout::Psmt8.psm(),
        PixelEncoding::IdTex4 | PixelEncoding::IdTex8Compressed => GsMemoryLayout::Psmt4.psm(),
        PixelEncoding::Tex32 | PixelEncoding::Unknown => GsMemoryLayout::Psmct32.psm(),
    }
}

/// Bits per texel of the raster.
fn raster_depth(raster_format: RasterFormat, palette_type: PaletteType) -> u32 {
    match palette_type {
        PaletteType::None => linear_encoding(raster_format, palette_type).depth(),
        palette => palette.index_depth(),
    }
}

/// Raster a portable layout is stored as.
fn target_raster(layout: &RasterLayout) -> (RasterFormat, PaletteType) {
    match layout.palette_type {
        PaletteType::None if layout.raster_format == RasterFormat::Raster1555 && !layout.compression.is_compressed() => {
            (RasterFormat::Raster1555, PaletteType::None)
        }
        PaletteType::None => (RasterFormat::Raster8888, PaletteType::None),
        palette => {
            let entries = match layout.raster_format {
                RasterFormat::Raster1555 => RasterFormat::Raster1555,
                _ => RasterFormat::Raster8888,
            };
            let palette = match palette {
                PaletteType::Pal8 => PaletteType::Pal8,
                _ => PaletteType::Pal4,
            };
            (entries, palette)
        }
    }
}

fn portable_layout(raster_format: RasterFormat, palette_type: PaletteType) -> RasterLayout {
    match palette_type {
        PaletteType::None => RasterLayout::direct(
            raster_format,
            raster_depth(raster_format, palette_type),
            4,
            ColorOrdering::Rgba,
        ),
        palette => RasterLayout::palettized(raster_format, palette, 4, ColorOrdering::Rgba),
    }
}

/// The 64-byte texture meta chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureMeta {
    /// Width of mipmap 0.
    pub width: u32,
    /// Height of mipmap 0.
    pub height: u32,
    /// Bits per texel.
    pub depth: u32,
    /// Raster flags; bit 16 is has-swizzle and bit 17 requires-headers.
    pub raster_flags: RasterFormatFlags,
    /// Register values.
    pub registers: GsRegisters,
    /// Bytes of mipmap packets.
    pub image_data_size: u32,
    /// Bytes of the CLUT packet.
    pub palette_data_size: u32,
    /// GS memory needed by the texture, 2048 byte aligned.
    pub combined_gpu_data_size: u32,
    /// `L` (bits 12-13) and `K` (bits 0-11) of TEX1.
    pub sky_mipmap_val: u32,
}

impl TextureMeta {
    /// Size on disk.
    pub const SIZE: usize = 64;

    fn read(block: &mut BlockProvider<'_>) -> TxdResult<Self> {
        let bytes = block.read_array::<{ Self::SIZE }>()?;
        let mut reader = ByteReader::new(&bytes);
        let mut word = || reader.read_u64();
        let mut meta = Self::default();
        let truncated = || TxdError::structural("PS2 meta chunk is truncated");
        let first = word().ok_or_else(truncated)?;
        let second = word().ok_or_else(truncated)?;
        meta.width = first as u32;
        meta.height = (first >> 32) as u32;
        meta.depth = second as u32;
        meta.raster_flags = RasterFormatFlags::from((second >> 32) as u32);
        meta.registers.tex0 = Tex0::from(word().ok_or_else(truncated)?);
        meta.registers.tex1 = Tex1::from(word().ok_or_else(truncated)?);
        meta.registers.miptbp1 = MipTbp::from(word().ok_or_else(truncated)?);
        meta.registers.miptbp2 = MipTbp::from(word().ok_or_else(truncated)?);
        let sizes = word().ok_or_else(truncated)?;
        let tail = word().ok_or_else(truncated)?;
        meta.image_data_size = sizes as u32;
        meta.palette_data_size = (sizes >> 32) as u32;
        meta.combined_gpu_data_size = tail as u32;
        meta.sky_mipmap_val = (tail >> 32) as u32;
        Ok(meta)
    }

    fn write(&self, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        let mut writer = ByteWriter::with_capacity(Self::SIZE);
        writer.put_u32(self.width);
        writer.put_u32(self.height);
        writer.put_u32(self.depth);
        writer.put_u32(self.raster_flags.into());
        writer.put_u64(self.registers.tex0.into());
        writer.put_u64(self.registers.tex1.into());
        writer.put_u64(self.registers.miptbp1.into());
        writer.put_u64(self.registers.miptbp2.into());
        writer.put_u32(self.image_data_size);
        writer.put_u32(self.palette_data_size);
        writer.put_u32(self.combined_gpu_data_size);
        writer.put_u32(self.sky_mipmap_val);
        block.write(&writer.into_inner())
    }
}

/// One mipmap in its upload encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ps2Mipmap {
    /// Visible width.
    pub width: u32,
    /// Visible height.
    pub height: u32,
    /// Width of the uploaded surface.
    pub swizzle_width: u32,
    /// Height of the uploaded surface.
    pub swizzle_height: u32,
    /// Encoding of `texels`.
    pub encoding: PixelEncoding,
    /// Uploaded data, alpha in GS range.
    pub texels: Vec<u8>,
}

/// A PlayStation 2 texture.
#[derive(Debug, Clone)]
pub struct Ps2NativeTexture {
    version: LibraryVersion,
    info: TextureInfo,
    raster_format: RasterFormat,
    palette_type: PaletteType,
    raster_type: u8,
    auto_mipmaps: bool,
    has_swizzle: bool,
    requires_headers: bool,
    sky_mipmap_val: u32,
    recommended_buffer_base_pointer: u32,
    mipmaps: Vec<Ps2Mipmap>,
    clut: Vec<u8>,
}

impl Ps2NativeTexture {
    /// Empty texture for the engine's version.
    pub fn new(engine: &Engine) -> Self {
        Self {
            version: engine.version(),
            info: TextureInfo::default(),
            raster_format: RasterFormat::Raster8888,
            palette_type: PaletteType::None,
            raster_type: RASTER_TYPE_TEXTURE,
            auto_mipmaps: false,
            has_swizzle: true,
            requires_headers: false,
            sky_mipmap_val: DEFAULT_SKY_MIPMAP_VAL,
            recommended_buffer_base_pointer: 0,
            mipmaps: Vec::new(),
            clut: Vec::new(),
        }
    }

    /// Raster format of the texels (palette entries, for palette rasters).
    pub fn raster_format(&self) -> RasterFormat {
        self.raster_format
    }

    /// Palette kind.
    pub fn palette_type(&self) -> PaletteType {
        self.palette_type
    }

    /// Whether palette mipmaps are swizzled into 32-bit units.
    pub fn has_swizzle(&self) -> bool {
        self.has_swizzle
    }

    /// Whether uploads carry their transfer registers.
    pub fn requires_headers(&self) -> bool {
        self.requires_headers
    }

    /// LOD parameters stored in TEX1.
    pub fn sky_mipmap_val(&self) -> u32 {
        self.sky_mipmap_val
    }

    /// Sets the LOD parameters stored in TEX1.
    pub fn set_sky_mipmap_val(&mut self, value: u32) {
        self.sky_mipmap_val = value;
    }

    /// Offset added to every base pointer by libraries up to minor version 2.
    pub fn recommended_buffer_base_pointer(&self) -> u32 {
        self.recommended_buffer_base_pointer
    }

    /// Mipmaps in upload encoding.
    pub fn mipmaps(&self) -> &[Ps2Mipmap] {
        &self.mipmaps
    }

    /// CLUT texture in upload order, empty for direct color rasters.
    pub fn clut(&self) -> &[u8] {
        &self.clut
    }

    /// Encoding of the CLUT texture.
    pub fn clut_encoding(&self) -> PixelEncoding {
        match self.raster_format {
            RasterFormat::Raster1555 => PixelEncoding::Tex16,
            _ => PixelEncoding::Tex32,
        }
    }

    /// Encoding mipmaps are uploaded with.
    pub fn swizzle_encoding(&self) -> PixelEncoding {
        required_encoding(
            self.raster_format,
            self.palette_type,
            self.version.lib_minor,
            self.has_swizzle,
            self.requires_headers,
        )
    }

    /// Enables or disables palette swizzling, re-encoding the mipmaps.
    pub fn set_has_swizzle(&mut self, engine: &Engine, has_swizzle: bool) -> TxdResult<()> {
        self.transcode(engine, self.version, has_swizzle, self.requires_headers)
    }

    /// Enables or disables transfer headers, re-encoding the mipmaps.
    pub fn set_requires_headers(&mut self, engine: &Engine, requires_headers: bool) -> TxdResult<()> {
        self.transcode(engine, self.version, self.has_swizzle, requires_headers)
    }

    /// Places mipmaps and CLUT in GS memory.
    pub fn allocation(&self) -> TxdResult<GsAllocation> {
        let layout = sampled_layout(self.raster_format, self.palette_type);
        let surfaces: Vec<GsSurface> = self
            .mipmaps
            .iter()
            .map(|mipmap| GsSurface {
                layout,
                width: mipmap.width,
                height: mipmap.height,
            })
            .collect();
        let clut = self.palette_type.is_palette().then(|| {
            let (width, height) = clut_dimensions(self.palette_type, self.version.lib_minor);
            let rule = match self.palette_type {
                PaletteType::Pal8 => ClutRule::LastPageCorner,
                _ => ClutRule::AfterMipmaps,
            };
            let surface = GsSurface {
                layout: clut_layout(self.raster_format),
                width,
                height,
            };
            (surface, rule)
        });
        allocate(&surfaces, clut)
    }

    /// Register values derived from the current texture.
    pub fn gs_registers(&self) -> TxdResult<GsRegisters> {
        Ok(self.registers_from(&self.allocation()?))
    }

    fn base_pointer_offset(&self) -> u32 {
        match self.version.lib_minor {
            0..=2 => self.recommended_buffer_base_pointer,
            _ => 0,
        }
    }

    fn registers_from(&self, allocation: &GsAllocation) -> GsRegisters {
        let offset = self.base_pointer_offset() as u64;
        let mut registers = GsRegisters::default();
        let (Some(base), Some(placement)) = (self.mipmaps.first(), allocation.mipmaps.first()) else {
            return registers;
        };

        let tex0 = &mut registers.tex0;
        tex0.set_tbp0(placement.base_pointer as u64 + offset);
        tex0.set_tbw(placement.buffer_width as u64);
        tex0.set_psm(sampled_layout(self.raster_format, self.palette_type).psm());
        tex0.set_tw(base.width.next_power_of_two().trailing_zeros() as u64);
        tex0.set_th(base.height.next_power_of_two().trailing_zeros() as u64);
        tex0.set_tcc(self.raster_format.has_alpha_channel() as u64);
        if let Some(clut) = &allocation.clut {
            tex0.set_cbp(clut.base_pointer as u64 + offset);
            tex0.set_cpsm(clut_layout(self.raster_format).psm());
            tex0.set_cld(1);
        }

        let tex1 = &mut registers.tex1;
        let (mmag, mmin) = filter_to_gs(self.info.filter_mode as u8);
        tex1.set_mxl((self.mipmaps.len() as u64).saturating_sub(1));
        tex1.set_mmag(mmag);
        tex1.set_mmin(mmin);
        tex1.set_l(((self.sky_mipmap_val >> 12) & 3) as u64);
        tex1.set_k((self.sky_mipmap_val & 0xFFF) as u64);

        for (level, placement) in allocation.mipmaps.iter().enumerate().skip(1) {
            let miptbp = match level {
                1..=3 => &mut registers.miptbp1,
                _ => &mut registers.miptbp2,
            };
            miptbp.set_level((level - 1) % 3, placement.base_pointer as u64 + offset, placement.buffer_width as u64);
        }
        registers
    }

    fn reset(&mut self) {
        self.mipmaps.clear();
        self.clut.clear();
        self.recommended_buffer_base_pointer = 0;
    }

    fn read_native(&mut self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        let format_info = BlockProvider::read_expected_child(block, CHUNK_STRUCT, |header| {
            let platform = header.read_u32()?;
            if platform != PLATFORM_PS2 {
                return Err(TxdError::structural(format!(
                    "platform {platform:#x} is not a PS2 texture"
                )));
            }
            TexFormatInfo::read(header)
        })?;
        format_info.apply_to(engine, &mut self.info);
        self.auto_mipmaps = format_info.auto_mipmaps();
        self.info.name = read_string_chunk(block)?;
        self.info.mask_name = read_string_chunk(block)?;

        let (meta, packets) = BlockProvider::read_expected_child(block, CHUNK_STRUCT, |native| {
            let meta = BlockProvider::read_expected_child(native, CHUNK_STRUCT, TextureMeta::read)?;
            let packets = BlockProvider::read_expected_child(native, CHUNK_STRUCT, |gs| {
                let length = gs.block_length() as usize;
                gs.read_vec(length)
            })?;
            Ok((meta, packets))
        })?;
        self.decode_native(engine, &meta, &packets)?;

        read_extensions(block, &mut self.info.extensions)
    }

    fn decode_native(&mut self, engine: &Engine, meta: &TextureMeta, packets: &[u8]) -> TxdResult<()> {
        let flags = meta.raster_flags;
        let raster_format = flags
            .raster_format()
            .ok_or_else(|| TxdError::unsupported(format!("raster format {}", flags.format_bits())))?;
        let palette_type = match flags.palette_type() {
            Some(PaletteType::Pal4Lsb) => PaletteType::Pal4,
            Some(palette) => palette,
            None => return Err(TxdError::unsupported(format!("palette type {:#x}", flags.palette_bits()))),
        };
        let expected_depth = raster_depth(raster_format, palette_type);
        if meta.depth != expected_depth {
            return Err(TxdError::structural(format!(
                "depth {} does not match {} {}",
                meta.depth,
                palette_type.name(),
                raster_format.name()
            )));
        }
        if palette_type.is_palette() {
            entry_size(raster_format)?;
        }
        if meta.width == 0 || meta.height == 0 {
            return Err(TxdError::structural("PS2 texture without dimensions"));
        }

        self.raster_format = raster_format;
        self.palette_type = palette_type;
        self.raster_type = flags.raster_type() as u8;
        self.has_swizzle = u32::from(meta.raster_flags) & META_HAS_SWIZZLE != 0;
        self.requires_headers = u32::from(meta.raster_flags) & META_REQUIRES_HEADERS != 0;
        self.sky_mipmap_val = meta.sky_mipmap_val;

        let count = meta.registers.tex1.mxl() as usize + 1;
        if count > PS2_MAX_MIPMAPS {
            return Err(TxdError::structural(format!("{count} mipmaps exceed the PS2 limit")));
        }

        let linear = linear_encoding(raster_format, palette_type);
        let encoding = self.swizzle_encoding();
        let mut reader = ByteReader::new(packets);
        let mut image_data_size = 0;
        for level in 0..count {
            let (width, height) = mip_dimensions(meta.width, meta.height, level as u32);
            let (stored_width, stored_height) = stored_dimensions(linear, encoding, width, height)?;
            let size = SurfaceShape::new(stored_width, stored_height, 1).data_size(encoding.depth());
            let packet = GsPacket::read(engine, &mut reader, self.requires_headers, size)?;
            let (swizzle_width, swizzle_height) = packet
                .header
                .map_or((stored_width, stored_height), |header| header.dimensions());
            let needed = SurfaceShape::new(swizzle_width, swizzle_height, 1).data_size(encoding.depth());
            if packet.data.len() < needed {
                return Err(TxdError::structural(format!(
                    "mipmap {level} holds {} bytes, needs {needed}",
                    packet.data.len()
                )));
            }
            image_data_size += packet.stored_size();
            self.mipmaps.push(Ps2Mipmap {
                width,
                height,
                swizzle_width,
                swizzle_height,
                encoding,
                texels: packet.data,
            });
        }
        if image_data_size != meta.image_data_size as usize {
            engine.push_warning(
                2,
                format!("PS2 image data size is {}, packets hold {image_data_size}", meta.image_data_size),
            );
        }

        if palette_type.is_palette() {
            let (width, height) = clut_dimensions(palette_type, self.version.lib_minor);
            let size = SurfaceShape::new(width, height, 1).data_size(self.clut_encoding().depth());
            let packet = GsPacket::read(engine, &mut reader, self.requires_headers, size)?;
            if packet.data.len() < palette_type.item_count() as usize * entry_size(raster_format)? {
                return Err(TxdError::structural("CLUT is smaller than the palette"));
            }
            if packet.stored_size() != meta.palette_data_size as usize {
                engine.push_warning(
                    2,
                    format!("PS2 palette data size is {}, packet holds {}", meta.palette_data_size, packet.stored_size()),
                );
            }
            self.clut = packet.data;
        }
        if reader.remaining() > 0 {
            engine.push_warning(3, format!("{} unused bytes after the PS2 GS packets", reader.remaining()));
        }

        let allocation = self.allocation()?;
        let combined = allocation.combined_gpu_data_size();
        if meta.combined_gpu_data_size < combined {
            return Err(TxdError::CodecInvariantViolation(format!(
                "combined GPU data size {} is below the required {combined}",
                meta.combined_gpu_data_size
            )));
        }
        if meta.combined_gpu_data_size > combined {
            engine.push_warning(
                2,
                format!("combined GPU data size {} exceeds the required {combined}", meta.combined_gpu_data_size),
            );
        }

        if self.version.lib_minor <= 2 {
            let base = allocation.mipmaps.first().map_or(0, |placement| placement.base_pointer);
            self.recommended_buffer_base_pointer = (meta.registers.tex0.tbp0() as u32).saturating_sub(base);
        }
        self.verify_registers(engine, &meta.registers, &self.registers_from(&allocation));
        Ok(())
    }

    fn verify_registers(&self, engine: &Engine, read: &GsRegisters, expected: &GsRegisters) {
        let checks = [
            (1, "TEX1", u64::from(read.tex1), u64::from(expected.tex1)),
            (2, "TEX0", u64::from(read.tex0), u64::from(expected.tex0)),
            (3, "MIPTBP1", u64::from(read.miptbp1), u64::from(expected.miptbp1)),
            (3, "MIPTBP2", u64::from(read.miptbp2), u64::from(expected.miptbp2)),
        ];
        for (level, name, read, expected) in checks {
            if read != expected {
                engine.push_warning(
                    level,
                    format!("texture '{}': {name} is {read:#x}, expected {expected:#x}", self.info.name),
                );
            }
        }
    }

    fn encode(&self, engine: &Engine) -> TxdResult<(TextureMeta, Vec<u8>)> {
        let allocation = self.allocation()?;
        let registers = self.registers_from(&allocation);
        let offset = self.base_pointer_offset();

        let mut writer = ByteWriter::new();
        let mut image_data_size = 0;
        for (mipmap, placement) in self.mipmaps.iter().zip(&allocation.mipmaps) {
            let packet = GsPacket {
                header: self.requires_headers.then(|| {
                    TransferHeader::upload(
                        placement.base_pointer + offset,
                        placement.buffer_width,
                        transfer_psm(mipmap.encoding),
                        mipmap.swizzle_width,
                        mipmap.swizzle_height,
                    )
                }),
                data: mipmap.texels.clone(),
            };
            packet.write(&mut writer)?;
            image_data_size += packet.stored_size();
        }

        let mut palette_data_size = 0;
        if let Some(placement) = &allocation.clut {
            let (width, height) = clut_dimensions(self.palette_type, self.version.lib_minor);
            let encoding = self.clut_encoding();
            let packet = GsPacket {
                header: self.requires_headers.then(|| {
                    TransferHeader::upload(
                        placement.base_pointer + offset,
                        placement.buffer_width,
                        transfer_psm(encoding),
                        width,
                        height,
                    )
                }),
                data: self.clut.clone(),
            };
            packet.write(&mut writer)?;
            palette_data_size = packet.stored_size();
        }
        log::trace!(
            target: "rwtxd",
            "PS2 texture '{}' uses {} bytes of GS memory",
            self.info.name,
            allocation.combined_gpu_data_size()
        );
        if engine.is_warning_enabled(4) && self.mipmaps.len() > 1 && !self.info.filter_mode.uses_mipmaps() {
            engine.push_warning(4, format!("texture '{}' has mipmaps but a non-mipmap filter", self.info.name));
        }

        let base = self
            .mipmaps
            .first()
            .ok_or_else(|| TxdError::structural("PS2 texture has no mipmaps to write"))?;
        let mut raster_flags = u32::from(self.raster_flags()) & !(META_HAS_SWIZZLE | META_REQUIRES_HEADERS);
        if self.has_swizzle {
            raster_flags |= META_HAS_SWIZZLE;
        }
        if self.requires_headers {
            raster_flags |= META_REQUIRES_HEADERS;
        }
        let meta = TextureMeta {
            width: base.width,
            height: base.height,
            depth: raster_depth(self.raster_format, self.palette_type),
            raster_flags: RasterFormatFlags::from(raster_flags),
            registers,
            image_data_size: image_data_size as u32,
            palette_data_size: palette_data_size as u32,
            combined_gpu_data_size: allocation.combined_gpu_data_size(),
            sky_mipmap_val: self.sky_mipmap_val,
        };
        Ok((meta, writer.into_inner()))
    }

    fn raster_flags(&self) -> RasterFormatFlags {
        RasterFormatFlags::new(
            self.raster_format,
            self.palette_type,
            self.mipmaps.len() > 1,
            self.auto_mipmaps,
            self.raster_type,
        )
    }

    /// Encodes `pixels` for the given version and flags and adopts the result.
    fn acquire(
        &mut self,
        engine: &Engine,
        pixels: PixelData,
        version: LibraryVersion,
        has_swizzle: bool,
        requires_headers: bool,
    ) -> TxdResult<()> {
        PS2_SIZE_RULES.verify_pixel_data(&pixels)?;
        let (raster_format, palette_type) = target_raster(&pixels.layout);
        let target = portable_layout(raster_format, palette_type);
        let mut pixels = if pixels.layout == target {
            pixels
        } else {
            log::debug!(
                target: "rwtxd",
                "converting {} {} pixels for PS2",
                pixels.layout.palette_type.name(),
                pixels.layout.raster_format.name()
            );
            pixels.convert(target)?
        };
        if pixels.mipmaps.len() > PS2_MAX_MIPMAPS {
            engine.push_warning(
                2,
                format!("{} mipmaps exceed the PS2 limit; keeping {PS2_MAX_MIPMAPS}", pixels.mipmaps.len()),
            );
            pixels.mipmaps.truncate(PS2_MAX_MIPMAPS);
        }
        pixels.verify()?;

        let Some((base_width, base_height)) = pixels.base_dimensions() else {
            return Err(TxdError::structural("pixel data without mipmaps"));
        };
        let linear = linear_encoding(raster_format, palette_type);
        let encoding = required_encoding(raster_format, palette_type, version.lib_minor, has_swizzle, requires_headers);
        let direct_alpha = palette_type == PaletteType::None && raster_format == RasterFormat::Raster8888;

        let mut mipmaps = Vec::with_capacity(pixels.mipmaps.len());
        for (level, layer) in pixels.mipmaps.iter().enumerate() {
            let (width, height) = mip_dimensions(base_width, base_height, level as u32);
            if (layer.layer_width, layer.layer_height) != (width, height) {
                return Err(TxdError::structural(format!(
                    "mipmap {level} is {}x{}, expected {width}x{height}",
                    layer.layer_width, layer.layer_height
                )));
            }
            let (swizzle_width, swizzle_height) = stored_dimensions(linear, encoding, width, height)?;
            let mut texels = layer.texels.clone();
            if direct_alpha {
                convert_alpha_in_place(&mut texels, 3, pc_alpha_to_ps2);
            }
            let texels = permute_texels(
                linear,
                encoding,
                SurfaceShape::new(layer.width, layer.height, target.row_alignment),
                &texels,
                SurfaceShape::new(swizzle_width, swizzle_height, 1),
            )?;
            mipmaps.push(Ps2Mipmap {
                width,
                height,
                swizzle_width,
                swizzle_height,
                encoding,
                texels,
            });
        }
        let clut = match palette_type {
            PaletteType::None => Vec::new(),
            palette => encode_clut(&pixels.palette, pixels.palette_size, raster_format, palette, version.lib_minor)?,
        };

        let candidate = Self {
            version,
            info: TextureInfo::default(),
            raster_format,
            palette_type,
            raster_type: pixels.raster_type,
            auto_mipmaps: pixels.auto_mipmaps,
            has_swizzle,
            requires_headers,
            sky_mipmap_val: self.sky_mipmap_val,
            recommended_buffer_base_pointer: match version.lib_minor {
                0..=2 => self.recommended_buffer_base_pointer,
                _ => 0,
            },
            mipmaps,
            clut,
        };
        candidate.allocation()?;

        let info = core::mem::take(&mut self.info);
        *self = Self { info, ..candidate };
        Ok(())
    }

    fn transcode(&mut self, engine: &Engine, version: LibraryVersion, has_swizzle: bool, requires_headers: bool) -> TxdResult<()> {
        if self.mipmaps.is_empty() {
            self.version = version;
            self.has_swizzle = has_swizzle;
            self.requires_headers = requires_headers;
            return Ok(());
        }
        let pixels = self.get_pixel_data(engine)?;
        self.acquire(engine, pixels, version, has_swizzle, requires_headers)
    }
}

impl NativeTexture for Ps2NativeTexture {
    fn type_name(&self) -> &'static str {
        Ps2NativeTextureType.name()
    }

    fn clone_box(&self) -> Box<dyn NativeTexture> {
        Box::new(self.clone())
    }

    fn serialize(&self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        if self.mipmaps.is_empty() {
            return Err(TxdError::structural("PS2 texture has no mipmaps to write"));
        }
        let (meta, packets) = self.encode(engine)?;

        BlockProvider::write_child(block, CHUNK_STRUCT, |header| {
            header.write_u32(PLATFORM_PS2)?;
            TexFormatInfo::from_texture_info(&self.info, self.raster_flags(), self.mipmaps.len() > 1, self.auto_mipmaps)
                .write(header)
        })?;
        write_string_chunk(block, &self.info.name)?;
        write_string_chunk(block, &self.info.mask_name)?;
        BlockProvider::write_child(block, CHUNK_STRUCT, |native| {
            BlockProvider::write_child(native, CHUNK_STRUCT, |chunk| meta.write(chunk))?;
            BlockProvider::write_child(native, CHUNK_STRUCT, |chunk| chunk.write(&packets))
        })?;
        write_extensions(block, &self.info.extensions)
    }

    fn deserialize(&mut self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        self.reset();
        self.version = block.block_version();
        let result = self.read_native(engine, block);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn get_pixel_data(&self, _engine: &Engine) -> TxdResult<PixelData> {
        if self.mipmaps.is_empty() {
            return Err(TxdError::structural("PS2 texture has no mipmaps"));
        }
        let layout = portable_layout(self.raster_format, self.palette_type);
        let linear = linear_encoding(self.raster_format, self.palette_type);
        let direct_alpha = self.palette_type == PaletteType::None && self.raster_format == RasterFormat::Raster8888;

        let mut pixels = PixelData::new(layout);
        for mipmap in &self.mipmaps {
            let mut texels = permute_texels(
                mipmap.encoding,
                linear,
                SurfaceShape::new(mipmap.swizzle_width, mipmap.swizzle_height, 1),
                &mipmap.texels,
                SurfaceShape::new(mipmap.width, mipmap.height, layout.row_alignment),
            )?;
            if direct_alpha {
                convert_alpha_in_place(&mut texels, 3, ps2_alpha_to_pc);
            }
            pixels.mipmaps.push(MipmapLayer::new(mipmap.width, mipmap.height, texels));
        }
        if self.palette_type.is_palette() {
            pixels.palette = decode_clut(&self.clut, self.raster_format, self.palette_type)?;
            pixels.palette_size = self.palette_type.item_count();
        }
        pixels.auto_mipmaps = self.auto_mipmaps;
        pixels.raster_type = self.raster_type;
        pixels.has_alpha = pixels.detect_alpha()?;
        Ok(pixels)
    }

    fn set_pixel_data(&mut self, engine: &Engine, pixels: PixelData) -> TxdResult<AcquireFeedback> {
        let has_swizzle = pixels.layout.palette_type.is_palette();
        self.acquire(engine, pixels, self.version, has_swizzle, self.requires_headers)?;
        Ok(AcquireFeedback {
            directly_acquired: false,
        })
    }

    fn unset_pixel_data(&mut self, _engine: &Engine) {
        self.reset();
    }

    fn mipmap_count(&self) -> usize {
        self.mipmaps.len()
    }

    fn texture_format_string(&self) -> String {
        match self.palette_type {
            PaletteType::None => self.raster_format.name().into(),
            palette => format!("{} {}", palette.name(), self.raster_format.name()),
        }
    }

    fn version(&self) -> LibraryVersion {
        self.version
    }

    fn set_version(&mut self, engine: &Engine, version: LibraryVersion) {
        if let Err(error) = self.transcode(engine, version, self.has_swizzle, self.requires_headers) {
            engine.push_warning(1, format!("PS2 texture kept version {}: {error}", self.version));
        }
    }

    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut TextureInfo {
        &mut self.info
    }

    fn size_rules(&self) -> SizeRules {
        PS2_SIZE_RULES
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;
    use rwtxd_api::BlockMode;
    use std::io::Cursor;

    fn write_texture(engine: &Engine, texture: &Ps2NativeTexture) -> Vec<u8> {
        let mut stream = Cursor::new(Vec::new());
        let mut root = BlockProvider::new(engine, &mut stream, BlockMode::Write);
        root.set_block_id(rwtxd_api::chunks::CHUNK_TEXTURENATIVE);
        root.set_block_version(texture.version());
        root.scoped(|block| texture.serialize(engine, block)).unwrap();
        stream.into_inner()
    }

    fn read_texture(engine: &Engine, bytes: Vec<u8>) -> TxdResult<Ps2NativeTexture> {
        let mut stream = Cursor::new(bytes);
        let mut root = BlockProvider::new(engine, &mut stream, BlockMode::Read);
        let mut texture = Ps2NativeTexture::new(engine);
        root.scoped(|block| texture.deserialize(engine, block))?;
        Ok(texture)
    }

    fn pal8_pixels(size: u32) -> PixelData {
        let layout = RasterLayout::palettized(RasterFormat::Raster8888, PaletteType::Pal8, 4, ColorOrdering::Rgba);
        let indices: Vec<u8> = (0..size * size).map(|i| (i * 7) as u8).collect();
        let palette: Vec<u8> = (0..256u32).flat_map(|i| [i as u8, 0x10, !i as u8, 0xFF]).collect();
        PixelData::from_surface(layout, size, size, indices).with_palette(palette, 256)
    }

    #[rstest]
    #[case(RasterFormat::Raster8888, PaletteType::Pal4, 2, false, PixelEncoding::IdTex8Compressed)]
    #[case(RasterFormat::Raster8888, PaletteType::Pal4, 6, true, PixelEncoding::Tex32)]
    #[case(RasterFormat::Raster8888, PaletteType::Pal4, 6, false, PixelEncoding::IdTex8Compressed)]
    #[case(RasterFormat::Raster8888, PaletteType::Pal8, 2, true, PixelEncoding::IdTex8)]
    #[case(RasterFormat::Raster8888, PaletteType::Pal8, 6, true, PixelEncoding::Tex32)]
    #[case(RasterFormat::Raster1555, PaletteType::None, 6, true, PixelEncoding::Tex16)]
    #[case(RasterFormat::Raster8888, PaletteType::None, 6, true, PixelEncoding::Tex32)]
    fn encodings(
        #[case] format: RasterFormat,
        #[case] palette: PaletteType,
        #[case] minor: u8,
        #[case] swizzle: bool,
        #[case] expected: PixelEncoding,
    ) {
        assert_eq!(required_encoding(format, palette, minor, swizzle, false), expected);
    }

    #[test]
    fn pal8_texture_round_trips() {
        let engine = Engine::with_config(EngineConfig::default().with_version(LibraryVersion::new(3, 6, 0, 0)));
        let mut texture = Ps2NativeTexture::new(&engine);
        texture.info_mut().name = "palette".into();
        let source = pal8_pixels(16);
        texture.set_pixel_data(&engine, source.clone()).unwrap();
        assert_eq!(texture.swizzle_encoding(), PixelEncoding::Tex32);
        assert_eq!(texture.texture_format_string(), "PAL8 8888");

        let bytes = write_texture(&engine, &texture);
        let read = read_texture(&engine, bytes.clone()).unwrap();
        assert_eq!(read.info().name, "palette");
        let pixels = read.get_pixel_data(&engine).unwrap();
        assert_eq!(pixels.palette, source.palette);
        assert_eq!(&pixels.mipmaps[0].texels, &source.mipmaps[0].texels);
        assert_eq!(write_texture(&engine, &read), bytes);
    }

    #[test]
    fn pal4_clut_is_placed_after_the_mipmap_chain() {
        let engine = Engine::with_config(EngineConfig::default().with_version(LibraryVersion::new(3, 2, 0, 0)));
        let layout = RasterLayout::palettized(RasterFormat::Raster8888, PaletteType::Pal4, 4, ColorOrdering::Rgba);
        let palette: Vec<u8> = (0..16u8).flat_map(|i| [i * 16, i, !i, 0xFF]).collect();
        let mut pixels = PixelData::new(layout).with_palette(palette, 16);
        for size in [64u32, 32, 16] {
            let texels = (0..size * size / 2).map(|i| (i * 3) as u8).collect();
            pixels.mipmaps.push(MipmapLayer::new(size, size, texels));
        }

        let mut texture = Ps2NativeTexture::new(&engine);
        texture.set_pixel_data(&engine, pixels).unwrap();
        let allocation = texture.allocation().unwrap();
        let bases: Vec<u32> = allocation.mipmaps.iter().map(|mipmap| mipmap.base_pointer).collect();
        assert_eq!(bases, [0, 8, 10]);
        let clut = allocation.clut.as_ref().unwrap();
        assert_eq!(clut.blocks, [11]);
        assert!(allocation.mipmaps.iter().all(|mipmap| !mipmap.blocks.contains(&11)));
        assert_eq!(allocation.combined_gpu_data_size(), 2048);

        let bytes = write_texture(&engine, &texture);
        let read = read_texture(&engine, bytes).unwrap();
        assert_eq!(read.mipmap_count(), 3);
        assert_eq!(read.allocation().unwrap(), allocation);
    }

    #[test]
    fn direct_color_alpha_moves_into_gs_range() {
        let engine = Engine::new();
        let mut texture = Ps2NativeTexture::new(&engine);
        let texels = [0x10u8, 0x20, 0x30, 0xFF].repeat(4 * 4);
        let layout = RasterLayout::direct(RasterFormat::Raster8888, 32, 4, ColorOrdering::Rgba);
        texture
            .set_pixel_data(&engine, PixelData::from_surface(layout, 4, 4, texels.clone()))
            .unwrap();
        assert_eq!(&texture.mipmaps()[0].texels[..4], &[0x10, 0x20, 0x30, 0x80]);
        // Padded to whole 8x2 columns.
        assert_eq!(texture.mipmaps()[0].swizzle_width, 8);

        let pixels = texture.get_pixel_data(&engine).unwrap();
        assert_eq!(pixels.mipmaps[0].texels, texels);
        assert!(!pixels.has_alpha);
    }

    #[test]
    fn headers_wrap_every_upload() {
        let engine = Engine::new();
        let mut texture = Ps2NativeTexture::new(&engine);
        texture.set_pixel_data(&engine, pal8_pixels(32)).unwrap();
        let plain = write_texture(&engine, &texture);
        texture.set_requires_headers(&engine, true).unwrap();
        let framed = write_texture(&engine, &texture);
        assert_eq!(framed.len(), plain.len() + 2 * crate::gif::HEADER_OVERHEAD);

        let read = read_texture(&engine, framed).unwrap();
        assert!(read.requires_headers());
        assert_eq!(
            read.get_pixel_data(&engine).unwrap().mipmaps[0].texels,
            pal8_pixels(32).mipmaps[0].texels
        );
    }

    #[test]
    fn mipmap_chain_is_capped() {
        let (engine, warnings) = recording_engine(EngineConfig::default());
        let mut texture = Ps2NativeTexture::new(&engine);
        let mut pixels = PixelData::new(RasterLayout::RGBA8888);
        for level in 0..9 {
            let size = 256 >> level;
            pixels.mipmaps.push(MipmapLayer::new(size, size, vec![0xFF; (size * size * 4) as usize]));
        }
        texture.set_pixel_data(&engine, pixels).unwrap();
        assert_eq!(texture.mipmap_count(), PS2_MAX_MIPMAPS);
        assert_eq!(warnings.len(), 1);
        assert_eq!(texture.gs_registers().unwrap().tex1.mxl(), 6);
    }

    #[test]
    fn size_rules_are_enforced() {
        let engine = Engine::new();
        let mut texture = Ps2NativeTexture::new(&engine);
        let pixels = PixelData::from_surface(RasterLayout::RGBA8888, 24, 16, vec![0; 24 * 16 * 4]);
        assert!(matches!(
            texture.set_pixel_data(&engine, pixels),
            Err(TxdError::Structural(_))
        ));
        assert_eq!(texture.mipmap_count(), 0);
    }

    #[test]
    fn understated_gpu_size_is_fatal() {
        let engine = Engine::new();
        let mut texture = Ps2NativeTexture::new(&engine);
        texture.set_pixel_data(&engine, pal8_pixels(16)).unwrap();
        let mut bytes = write_texture(&engine, &texture);
        // Root header, struct with platform and texFormatInfo, two string chunks, the
        // native struct header and the meta struct header precede the meta payload.
        let meta = 12 + (12 + 20) + (12 + 4) + (12 + 4) + 12 + 12;
        let combined = meta + 56;
        assert_eq!(&bytes[combined..combined + 4], &2048u32.to_le_bytes());
        bytes[combined..combined + 4].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            read_texture(&engine, bytes),
            Err(TxdError::CodecInvariantViolation(_))
        ));
    }

    #[test]
    fn version_change_reencodes_palette_mipmaps() {
        let engine = Engine::new();
        let mut texture = Ps2NativeTexture::new(&engine);
        let source = pal8_pixels(16);
        texture.set_pixel_data(&engine, source.clone()).unwrap();
        assert_eq!(texture.mipmaps()[0].encoding, PixelEncoding::Tex32);

        texture.set_version(&engine, LibraryVersion::new(3, 1, 0, 0));
        assert_eq!(texture.version(), LibraryVersion::new(3, 1, 0, 0));
        assert_eq!(texture.mipmaps()[0].encoding, PixelEncoding::IdTex8);
        let pixels = texture.get_pixel_data(&engine).unwrap();
        assert_eq!(pixels.mipmaps[0].texels, source.mipmaps[0].texels);
    }

    #[test]
    fn register_mismatch_only_warns() {
        let (engine, warnings) = recording_engine(EngineConfig::default().with_warning_level(3));
        let mut texture = Ps2NativeTexture::new(&engine);
        texture.set_pixel_data(&engine, pal8_pixels(16)).unwrap();
        let mut bytes = write_texture(&engine, &texture);
        let meta = 12 + (12 + 20) + (12 + 4) + (12 + 4) + 12 + 12;
        let tex1 = meta + 24;
        bytes[tex1 + 4] ^= 0x01;
        let read = read_texture(&engine, bytes).unwrap();
        assert_eq!(read.mipmap_count(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings.warnings()[0].contains("TEX1"));
    }
}
