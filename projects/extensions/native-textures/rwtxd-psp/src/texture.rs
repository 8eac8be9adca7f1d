//! # PSP Native Texture
//!
//! Block layout:
//!
//! 1. Struct chunk: `"PSP\0"` and the `texFormatInfo` header.
//! 2. Texture and mask name string chunks.
//! 3. Struct chunk with a [`PspMeta`] struct chunk and the GPU data struct chunk
//!    (every mipmap in stored form, then the palette).
//! 4. Extension block.

use crate::swizzle::{is_swizzling_required, stored_size, swap_nibbles, swizzle, unswizzle};
use crate::PspNativeTextureType;
use core::any::Any;
use rwtxd_api::chunks::{
    read_string_chunk, write_string_chunk, RasterFormatFlags, TexFormatInfo, CHUNK_STRUCT,
    PLATFORMDESC_PSP,
};
use rwtxd_api::extension::{read_extensions, write_extensions};
use rwtxd_api::pixel_data::RASTER_TYPE_TEXTURE;
use rwtxd_api::{
    AcquireFeedback, BlockProvider, Engine, LibraryVersion, MipmapLayer, NativeTexture,
    NativeTextureType, PixelData, RasterLayout, SizeRules, TextureInfo, TxdError, TxdResult,
};
use rwtxd_common::alpha::{convert_alpha_in_place, pc_alpha_to_ps2, ps2_alpha_to_pc};
use rwtxd_common::formats::mip_dimensions;
use rwtxd_common::permute::{permute_texels, SurfaceShape};
use rwtxd_common::{ColorOrdering, PaletteType, RasterFormat};

/// Dimension limits of PSP textures.
pub const PSP_SIZE_RULES: SizeRules = SizeRules::power_of_two_up_to(512);

/// Bytes per palette entry.
const PALETTE_ENTRY_SIZE: usize = 4;

/// Raster stored at `depth` bits per texel.
pub fn raster_for_depth(depth: u32) -> TxdResult<(RasterFormat, PaletteType)> {
    match depth {
        32 => Ok((RasterFormat::Raster8888, PaletteType::None)),
        16 => Ok((RasterFormat::Raster1555, PaletteType::None)),
        8 => Ok((RasterFormat::Raster8888, PaletteType::Pal8)),
        4 => Ok((RasterFormat::Raster8888, PaletteType::Pal4)),
        other => Err(TxdError::structural(format!("invalid PSP texture depth {other}"))),
    }
}

fn depth_for_raster(raster_format: RasterFormat, palette_type: PaletteType) -> u32 {
    match palette_type {
        PaletteType::None if raster_format == RasterFormat::Raster1555 => 16,
        PaletteType::None => 32,
        palette => palette.index_depth(),
    }
}

fn portable_layout(raster_format: RasterFormat, palette_type: PaletteType) -> RasterLayout {
    match palette_type {
        PaletteType::None => RasterLayout::direct(raster_format, depth_for_raster(raster_format, palette_type), 4, ColorOrdering::Rgba),
        palette => RasterLayout::palettized(raster_format, palette, 4, ColorOrdering::Rgba),
    }
}

/// The 20-byte meta chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PspMeta {
    /// Width of mipmap 0.
    pub width: u32,
    /// Height of mipmap 0.
    pub height: u32,
    /// Bits per texel.
    pub depth: u32,
    /// Number of mipmaps.
    pub mipmap_count: u32,
    /// Unknown, kept as read.
    pub unknown: u32,
}

impl PspMeta {
    fn read(block: &mut BlockProvider<'_>) -> TxdResult<Self> {
        Ok(Self {
            width: block.read_u32()?,
            height: block.read_u32()?,
            depth: block.read_u32()?,
            mipmap_count: block.read_u32()?,
            unknown: block.read_u32()?,
        })
    }

    fn write(&self, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        for value in [self.width, self.height, self.depth, self.mipmap_count, self.unknown] {
            block.write_u32(value)?;
        }
        Ok(())
    }
}

/// One mipmap as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PspMipmap {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
    /// Whether `texels` is swizzled.
    pub swizzled: bool,
    /// Stored texels, alpha in GS range.
    pub texels: Vec<u8>,
}

/// A PlayStation Portable texture.
#[derive(Debug, Clone)]
pub struct PspNativeTexture {
    version: LibraryVersion,
    info: TextureInfo,
    raster_format: RasterFormat,
    palette_type: PaletteType,
    raster_type: u8,
    auto_mipmaps: bool,
    unknown: u32,
    mipmaps: Vec<PspMipmap>,
    palette: Vec<u8>,
}

impl PspNativeTexture {
    /// Empty texture for the engine's version.
    pub fn new(engine: &Engine) -> Self {
        Self {
            version: engine.version(),
            info: TextureInfo::default(),
            raster_format: RasterFormat::Raster8888,
            palette_type: PaletteType::None,
            raster_type: RASTER_TYPE_TEXTURE,
            auto_mipmaps: false,
            unknown: 0,
            mipmaps: Vec::new(),
            palette: Vec::new(),
        }
    }

    /// Bits per texel.
    pub fn depth(&self) -> u32 {
        depth_for_raster(self.raster_format, self.palette_type)
    }

    /// Palette kind.
    pub fn palette_type(&self) -> PaletteType {
        self.palette_type
    }

    /// Mipmaps as stored.
    pub fn mipmaps(&self) -> &[PspMipmap] {
        &self.mipmaps
    }

    /// Unknown meta value.
    pub fn unknown(&self) -> u32 {
        self.unknown
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

    fn uses_gs_alpha(&self) -> bool {
        self.raster_format == RasterFormat::Raster8888 && self.palette_type == PaletteType::None
    }

    fn reset(&mut self) {
        self.mipmaps.clear();
        self.palette.clear();
        self.unknown = 0;
    }

    fn read_native(&mut self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        let format_info = BlockProvider::read_expected_child(block, CHUNK_STRUCT, |header| {
            let platform = header.read_u32()?;
            if platform != PLATFORMDESC_PSP {
                return Err(TxdError::structural(format!(
                    "platform {platform:#x} is not a PSP texture"
                )));
            }
            TexFormatInfo::read(header)
        })?;
        format_info.apply_to(engine, &mut self.info);
        self.auto_mipmaps = format_info.auto_mipmaps();
        self.raster_type = format_info.raster_flags.raster_type() as u8;
        self.info.name = read_string_chunk(block)?;
        self.info.mask_name = read_string_chunk(block)?;

        BlockProvider::read_expected_child(block, CHUNK_STRUCT, |native| {
            let meta = BlockProvider::read_expected_child(native, CHUNK_STRUCT, PspMeta::read)?;
            let (raster_format, palette_type) = raster_for_depth(meta.depth)?;
            let flags = format_info.raster_flags;
            if flags.raster_format() != Some(raster_format) || flags.palette_type() != Some(palette_type) {
                engine.push_warning(
                    2,
                    format!("PSP texture '{}': raster flags disagree with depth {}", self.info.name, meta.depth),
                );
            }
            if meta.width == 0 || meta.height == 0 || meta.mipmap_count == 0 {
                return Err(TxdError::structural("PSP texture without mipmaps"));
            }
            self.raster_format = raster_format;
            self.palette_type = palette_type;
            self.unknown = meta.unknown;
            BlockProvider::read_expected_child(native, CHUNK_STRUCT, |gpu| self.read_gpu_data(engine, gpu, &meta))
        })?;

        read_extensions(block, &mut self.info.extensions)
    }

    fn read_gpu_data(&mut self, engine: &Engine, gpu: &mut BlockProvider<'_>, meta: &PspMeta) -> TxdResult<()> {
        for level in 0..meta.mipmap_count {
            let (width, height) = mip_dimensions(meta.width, meta.height, level);
            let swizzled = is_swizzling_required(width, height);
            let size = stored_size(meta.depth, width, height, swizzled)?;
            self.mipmaps.push(PspMipmap {
                width,
                height,
                swizzled,
                texels: gpu.read_vec(size)?,
            });
        }
        if self.palette_type.is_palette() {
            self.palette = gpu.read_vec(self.palette_type.item_count() as usize * PALETTE_ENTRY_SIZE)?;
        }
        if gpu.remaining() > 0 {
            engine.push_warning(3, format!("{} unused bytes after the PSP GPU data", gpu.remaining()));
        }
        Ok(())
    }

    fn meta(&self) -> TxdResult<PspMeta> {
        let base = self
            .mipmaps
            .first()
            .ok_or_else(|| TxdError::structural("PSP texture has no mipmaps to write"))?;
        Ok(PspMeta {
            width: base.width,
            height: base.height,
            depth: self.depth(),
            mipmap_count: self.mipmaps.len() as u32,
            unknown: self.unknown,
        })
    }
}

impl NativeTexture for PspNativeTexture {
    fn type_name(&self) -> &'static str {
        PspNativeTextureType.name()
    }

    fn clone_box(&self) -> Box<dyn NativeTexture> {
        Box::new(self.clone())
    }

    fn serialize(&self, _engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        let meta = self.meta()?;
        BlockProvider::write_child(block, CHUNK_STRUCT, |header| {
            header.write_u32(PLATFORMDESC_PSP)?;
            TexFormatInfo::from_texture_info(&self.info, self.raster_flags(), self.mipmaps.len() > 1, self.auto_mipmaps)
                .write(header)
        })?;
        write_string_chunk(block, &self.info.name)?;
        write_string_chunk(block, &self.info.mask_name)?;
        BlockProvider::write_child(block, CHUNK_STRUCT, |native| {
            BlockProvider::write_child(native, CHUNK_STRUCT, |chunk| meta.write(chunk))?;
            BlockProvider::write_child(native, CHUNK_STRUCT, |gpu| {
                for mipmap in &self.mipmaps {
                    gpu.write(&mipmap.texels)?;
                }
                gpu.write(&self.palette)
            })
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
            return Err(TxdError::structural("PSP texture has no mipmaps"));
        }
        let depth = self.depth();
        let layout = portable_layout(self.raster_format, self.palette_type);
        let encoding = crate::swizzle::linear_encoding(depth);

        let mut pixels = PixelData::new(layout);
        for mipmap in &self.mipmaps {
            let mut linear = match mipmap.swizzled {
                true => unswizzle(depth, mipmap.width, mipmap.height, &mipmap.texels)?,
                false => mipmap.texels.clone(),
            };
            if depth == 4 && !mipmap.swizzled {
                swap_nibbles(&mut linear);
            }
            let mut texels = permute_texels(
                encoding,
                encoding,
                SurfaceShape::new(mipmap.width, mipmap.height, 1),
                &linear,
                SurfaceShape::new(mipmap.width, mipmap.height, layout.row_alignment),
            )?;
            if self.uses_gs_alpha() {
                convert_alpha_in_place(&mut texels, 3, ps2_alpha_to_pc);
            }
            pixels.mipmaps.push(MipmapLayer::new(mipmap.width, mipmap.height, texels));
        }
        if self.palette_type.is_palette() {
            let mut palette = self.palette.clone();
            convert_alpha_in_place(&mut palette, 3, ps2_alpha_to_pc);
            pixels.palette = palette;
            pixels.palette_size = self.palette_type.item_count();
        }
        pixels.auto_mipmaps = self.auto_mipmaps;
        pixels.raster_type = self.raster_type;
        pixels.has_alpha = pixels.detect_alpha()?;
        Ok(pixels)
    }

    fn set_pixel_data(&mut self, _engine: &Engine, pixels: PixelData) -> TxdResult<AcquireFeedback> {
        PSP_SIZE_RULES.verify_pixel_data(&pixels)?;
        let (raster_format, palette_type) = match pixels.layout.palette_type {
            PaletteType::None
                if pixels.layout.raster_format == RasterFormat::Raster1555 && !pixels.layout.compression.is_compressed() =>
            {
                (RasterFormat::Raster1555, PaletteType::None)
            }
            PaletteType::None => (RasterFormat::Raster8888, PaletteType::None),
            PaletteType::Pal8 => (RasterFormat::Raster8888, PaletteType::Pal8),
            PaletteType::Pal4 | PaletteType::Pal4Lsb => (RasterFormat::Raster8888, PaletteType::Pal4),
        };
        let target = portable_layout(raster_format, palette_type);
        let pixels = if pixels.layout == target {
            pixels
        } else {
            log::debug!(
                target: "rwtxd",
                "converting {} {} pixels for PSP",
                pixels.layout.palette_type.name(),
                pixels.layout.raster_format.name()
            );
            pixels.convert(target)?
        };
        pixels.verify()?;
        let Some((base_width, base_height)) = pixels.base_dimensions() else {
            return Err(TxdError::structural("pixel data without mipmaps"));
        };

        let depth = depth_for_raster(raster_format, palette_type);
        let encoding = crate::swizzle::linear_encoding(depth);
        let gs_alpha = raster_format == RasterFormat::Raster8888 && palette_type == PaletteType::None;
        let mut mipmaps = Vec::with_capacity(pixels.mipmaps.len());
        for (level, layer) in pixels.mipmaps.iter().enumerate() {
            let (width, height) = mip_dimensions(base_width, base_height, level as u32);
            if (layer.layer_width, layer.layer_height) != (width, height) {
                return Err(TxdError::structural(format!(
                    "mipmap {level} is {}x{}, expected {width}x{height}",
                    layer.layer_width, layer.layer_height
                )));
            }
            let mut linear = permute_texels(
                encoding,
                encoding,
                SurfaceShape::new(layer.width, layer.height, target.row_alignment),
                &layer.texels,
                SurfaceShape::new(width, height, 1),
            )?;
            if gs_alpha {
                convert_alpha_in_place(&mut linear, 3, pc_alpha_to_ps2);
            }
            let swizzled = is_swizzling_required(width, height);
            let texels = if swizzled {
                swizzle(depth, width, height, &linear)?
            } else {
                if depth == 4 {
                    swap_nibbles(&mut linear);
                }
                linear
            };
            debug_assert_eq!(texels.len(), stored_size(depth, width, height, swizzled)?);
            mipmaps.push(PspMipmap {
                width,
                height,
                swizzled,
                texels,
            });
        }

        let mut palette = Vec::new();
        if palette_type.is_palette() {
            palette = vec![0u8; palette_type.item_count() as usize * PALETTE_ENTRY_SIZE];
            let used = (pixels.palette_size as usize * PALETTE_ENTRY_SIZE)
                .min(pixels.palette.len())
                .min(palette.len());
            palette[..used].copy_from_slice(&pixels.palette[..used]);
            convert_alpha_in_place(&mut palette, 3, pc_alpha_to_ps2);
        }

        self.raster_format = raster_format;
        self.palette_type = palette_type;
        self.raster_type = pixels.raster_type;
        self.auto_mipmaps = pixels.auto_mipmaps;
        self.mipmaps = mipmaps;
        self.palette = palette;
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

    fn set_version(&mut self, _engine: &Engine, version: LibraryVersion) {
        self.version = version;
    }

    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut TextureInfo {
        &mut self.info
    }

    fn size_rules(&self) -> SizeRules {
        PSP_SIZE_RULES
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
