//! # Direct3D Native Texture
//!
//! Block layout:
//!
//! 1. Struct chunk: [`D3dHeader`], the palette (4 byte BGRA entries), then every
//!    mipmap as a 32-bit byte count followed by the texels.
//! 2. Extension block.
//!
//! Mipmaps whose byte count disagrees with their dimensions end the chain.

use crate::header::{D3dHeader, FLAG_AUTO_MIPMAPS, FLAG_CUBEMAP};
use crate::platform::D3dPlatform;
use core::any::Any;
use core::marker::PhantomData;
use rwtxd_api::chunks::{RasterFormatFlags, TexFormatInfo, CHUNK_STRUCT};
use rwtxd_api::extension::{read_extensions, write_extensions};
use rwtxd_api::pixel_data::RASTER_TYPE_TEXTURE;
use rwtxd_api::{
    AcquireFeedback, BlockProvider, Engine, LibraryVersion, MipmapLayer, NativeTexture, PixelData,
    RasterLayout, SizeRules, TextureInfo, TxdError, TxdResult,
};
use rwtxd_common::formats::mip_dimensions;
use rwtxd_common::{ColorOrdering, CompressionType, PaletteType, RasterFormat};

/// Row alignment of uncompressed mipmaps.
pub const D3D_ROW_ALIGNMENT: u32 = 4;

/// Most mipmaps the header can count.
pub const D3D_MAX_MIPMAPS: usize = u8::MAX as usize;

/// Layout of data stored with the given raster description.
pub fn stored_layout(
    raster_format: RasterFormat,
    palette_type: PaletteType,
    depth: u32,
    compression: CompressionType,
) -> TxdResult<RasterLayout> {
    if compression.is_compressed() {
        return Ok(RasterLayout::compressed(compression, raster_format, depth, ColorOrdering::Bgra));
    }
    if palette_type.is_palette() {
        if raster_format.natural_depth() != 32 || depth != palette_type.index_depth() {
            return Err(TxdError::structural(format!(
                "{} palette of {} entries at depth {depth}",
                palette_type.name(),
                raster_format.name()
            )));
        }
        return Ok(RasterLayout::palettized(raster_format, palette_type, D3D_ROW_ALIGNMENT, ColorOrdering::Bgra));
    }
    if !raster_format.supports_depth(depth) {
        return Err(TxdError::structural(format!(
            "raster {} cannot be stored at depth {depth}",
            raster_format.name()
        )));
    }
    Ok(RasterLayout::direct(raster_format, depth, D3D_ROW_ALIGNMENT, ColorOrdering::Bgra))
}

/// Layout `pixels` must be in to be stored.
pub fn target_layout(pixels: &PixelData) -> RasterLayout {
    let source = pixels.layout;
    if source.compression.is_dxt() {
        let raster_format = match source.compression {
            CompressionType::Dxt1 if pixels.has_alpha => RasterFormat::Raster1555,
            CompressionType::Dxt1 => RasterFormat::Raster565,
            _ => RasterFormat::Raster4444,
        };
        return RasterLayout::compressed(source.compression, raster_format, 16, ColorOrdering::Bgra);
    }
    if source.palette_type.is_palette() && !source.compression.is_compressed() {
        let palette_type = match source.palette_type {
            PaletteType::Pal4Lsb => PaletteType::Pal4,
            other => other,
        };
        return RasterLayout::palettized(RasterFormat::Raster8888, palette_type, D3D_ROW_ALIGNMENT, ColorOrdering::Bgra);
    }
    let (raster_format, depth) = match source.raster_format {
        format @ (RasterFormat::Raster1555 | RasterFormat::Raster565 | RasterFormat::Raster4444 | RasterFormat::Raster555)
            if !source.compression.is_compressed() =>
        {
            (format, 16)
        }
        RasterFormat::Raster888 if !source.compression.is_compressed() => (RasterFormat::Raster888, 32),
        RasterFormat::Lum if source.depth == 8 => (RasterFormat::Lum, 8),
        RasterFormat::LumAlpha if source.depth == 16 => (RasterFormat::LumAlpha, 16),
        _ => (RasterFormat::Raster8888, 32),
    };
    RasterLayout::direct(raster_format, depth, D3D_ROW_ALIGNMENT, ColorOrdering::Bgra)
}

/// A texture in the Direct3D layout of platform `P`.
#[derive(Debug, Clone)]
pub struct D3dNativeTexture<P: D3dPlatform> {
    version: LibraryVersion,
    info: TextureInfo,
    layout: RasterLayout,
    raster_type: u8,
    has_alpha: bool,
    cubemap: bool,
    auto_mipmaps: bool,
    mipmaps: Vec<MipmapLayer>,
    palette: Vec<u8>,
    platform: PhantomData<P>,
}

impl<P: D3dPlatform> D3dNativeTexture<P> {
    /// Empty texture for the engine's version.
    pub fn new(engine: &Engine) -> Self {
        Self {
            version: engine.version(),
            info: TextureInfo::default(),
            layout: RasterLayout::direct(RasterFormat::Raster8888, 32, D3D_ROW_ALIGNMENT, ColorOrdering::Bgra),
            raster_type: RASTER_TYPE_TEXTURE,
            has_alpha: false,
            cubemap: false,
            auto_mipmaps: false,
            mipmaps: Vec::new(),
            palette: Vec::new(),
            platform: PhantomData,
        }
    }

    /// Layout of the stored texels.
    pub fn layout(&self) -> RasterLayout {
        self.layout
    }

    /// Stored mipmaps.
    pub fn mipmaps(&self) -> &[MipmapLayer] {
        &self.mipmaps
    }

    /// Whether the texture is a cube map.
    pub fn is_cubemap(&self) -> bool {
        self.cubemap
    }

    /// Whether mipmaps are generated at runtime.
    pub fn auto_mipmaps(&self) -> bool {
        self.auto_mipmaps
    }

    /// Stored alpha flag.
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    fn reset(&mut self) {
        self.mipmaps.clear();
        self.palette.clear();
        self.has_alpha = false;
        self.cubemap = false;
        self.auto_mipmaps = false;
    }

    fn palette_data_size(&self) -> usize {
        self.layout.palette_data_size(self.layout.palette_type.item_count())
    }

    fn header(&self) -> TxdResult<D3dHeader> {
        let base = self
            .mipmaps
            .first()
            .ok_or_else(|| TxdError::structural("Direct3D texture has no mipmaps to write"))?;
        let dimension = |value: u32| {
            u16::try_from(value).map_err(|_| TxdError::structural(format!("dimension {value} does not fit the header")))
        };
        let raster_flags = RasterFormatFlags::new(
            self.layout.raster_format,
            self.layout.palette_type,
            self.mipmaps.len() > 1,
            self.auto_mipmaps,
            self.raster_type,
        );
        let mut flags = 0;
        if self.cubemap {
            flags |= FLAG_CUBEMAP;
        }
        if self.auto_mipmaps {
            flags |= FLAG_AUTO_MIPMAPS;
        }
        Ok(D3dHeader {
            platform: P::PLATFORM,
            format_info: TexFormatInfo::from_texture_info(&self.info, raster_flags, self.mipmaps.len() > 1, self.auto_mipmaps),
            name: self.info.name.clone(),
            mask_name: self.info.mask_name.clone(),
            has_alpha: self.has_alpha,
            width: dimension(base.layer_width)?,
            height: dimension(base.layer_height)?,
            depth: self.layout.depth as u8,
            mipmap_count: self.mipmaps.len() as u8,
            raster_type: self.raster_type,
            dxt_compression: self.layout.compression.dxt_index(),
            flags,
        })
    }

    fn read_native(&mut self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        BlockProvider::read_expected_child(block, CHUNK_STRUCT, |data| {
            let header = D3dHeader::read(data)?;
            if header.platform != P::PLATFORM {
                return Err(TxdError::structural(format!(
                    "platform {:#x} is not a {} texture",
                    header.platform,
                    P::TYPE_NAME
                )));
            }
            header.format_info.apply_to(engine, &mut self.info);
            self.info.name = header.name.clone();
            self.info.mask_name = header.mask_name.clone();

            let compression = CompressionType::from_dxt_index(header.dxt_compression).ok_or_else(|| {
                TxdError::structural(format!("invalid DXT compression {}", header.dxt_compression))
            })?;
            let flags = header.format_info.raster_flags;
            let raster_format = flags
                .raster_format()
                .ok_or_else(|| TxdError::structural(format!("unknown raster format in flags {:#x}", u32::from(flags))))?;
            let palette_type = flags
                .palette_type()
                .ok_or_else(|| TxdError::structural(format!("unknown palette type in flags {:#x}", u32::from(flags))))?;
            if header.width == 0 || header.height == 0 {
                return Err(TxdError::structural("Direct3D texture with empty dimensions"));
            }
            self.layout = stored_layout(raster_format, palette_type, header.depth as u32, compression)?;
            self.raster_type = header.raster_type;
            self.has_alpha = header.has_alpha;
            self.cubemap = header.is_cubemap();
            self.auto_mipmaps = header.auto_mipmaps();

            if palette_type.is_palette() {
                self.palette = data.read_vec(self.palette_data_size())?;
            }
            self.read_mipmaps(engine, data, &header)
        })?;

        if self.auto_mipmaps && self.mipmaps.len() > 1 {
            engine.push_warning(
                2,
                format!("texture '{}' has auto mipmaps and a mipmap chain; auto mipmaps cleared", self.info.name),
            );
            self.auto_mipmaps = false;
        }
        read_extensions(block, &mut self.info.extensions)
    }

    fn read_mipmaps(&mut self, engine: &Engine, data: &mut BlockProvider<'_>, header: &D3dHeader) -> TxdResult<()> {
        for level in 0..header.mipmap_count as u32 {
            let (width, height) = mip_dimensions(header.width as u32, header.height as u32, level);
            let expected = self.layout.surface_size(width, height);
            let stored = data.read_u32()? as usize;
            if stored != expected {
                if stored != 0 {
                    engine.push_warning(
                        1,
                        format!(
                            "texture '{}' has damaged mipmaps: level {level} stores {stored} bytes, expected {expected}",
                            self.info.name
                        ),
                    );
                    data.skip(stored as u64)?;
                }
                log::debug!(target: "rwtxd", "mipmap chain of '{}' ends at level {level}", self.info.name);
                break;
            }
            let texels = data.read_vec(stored)?;
            let layer = match self.layout.compression.is_compressed() {
                true => MipmapLayer::compressed(self.layout.compression, width, height, texels),
                false => MipmapLayer::new(width, height, texels),
            };
            self.mipmaps.push(layer);
        }
        Ok(())
    }
}

impl<P: D3dPlatform> NativeTexture for D3dNativeTexture<P> {
    fn type_name(&self) -> &'static str {
        P::TYPE_NAME
    }

    fn clone_box(&self) -> Box<dyn NativeTexture> {
        Box::new(self.clone())
    }

    fn serialize(&self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        let header = self.header()?;
        BlockProvider::write_child(block, CHUNK_STRUCT, |data| {
            header.write(engine, data)?;
            data.write(&self.palette)?;
            for mipmap in &self.mipmaps {
                data.write_u32(mipmap.texels.len() as u32)?;
                data.write(&mipmap.texels)?;
            }
            Ok(())
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
            return Err(TxdError::structural(format!("{} texture has no mipmaps", P::TYPE_NAME)));
        }
        let mut pixels = PixelData::new(self.layout);
        pixels.mipmaps = self.mipmaps.clone();
        if self.layout.palette_type.is_palette() {
            pixels.palette = self.palette.clone();
            pixels.palette_size = self.layout.palette_type.item_count();
        }
        pixels.has_alpha = self.has_alpha;
        pixels.auto_mipmaps = self.auto_mipmaps;
        pixels.cubemap = self.cubemap;
        pixels.raster_type = self.raster_type;
        Ok(pixels)
    }

    fn set_pixel_data(&mut self, engine: &Engine, pixels: PixelData) -> TxdResult<AcquireFeedback> {
        P::SIZE_RULES.verify_pixel_data(&pixels)?;
        if pixels.mipmaps.len() > D3D_MAX_MIPMAPS {
            return Err(TxdError::structural(format!("{} mipmaps exceed the header", pixels.mipmaps.len())));
        }
        let target = target_layout(&pixels);
        let relabel = target.compression.is_compressed() && pixels.layout.compression == target.compression;
        let directly_acquired = relabel || pixels.layout == target;
        let mut pixels = if directly_acquired {
            pixels
        } else if engine.config().fix_incompatible_rasters {
            log::debug!(
                target: "rwtxd",
                "converting {} {} pixels for {}",
                pixels.layout.palette_type.name(),
                pixels.layout.raster_format.name(),
                P::TYPE_NAME
            );
            pixels.convert(target)?
        } else {
            return Err(TxdError::unsupported(format!(
                "{} pixels with depth {} are not stored by {}",
                pixels.layout.raster_format.name(),
                pixels.layout.depth,
                P::TYPE_NAME
            )));
        };
        pixels.layout = target;
        pixels.verify()?;

        let Some((base_width, base_height)) = pixels.base_dimensions() else {
            return Err(TxdError::structural("pixel data without mipmaps"));
        };
        for (level, layer) in pixels.mipmaps.iter().enumerate() {
            let expected = mip_dimensions(base_width, base_height, level as u32);
            if (layer.layer_width, layer.layer_height) != expected {
                return Err(TxdError::structural(format!(
                    "mipmap {level} is {}x{}, expected {}x{}",
                    layer.layer_width, layer.layer_height, expected.0, expected.1
                )));
            }
        }

        let has_alpha = pixels.detect_alpha()?;
        let mut auto_mipmaps = pixels.auto_mipmaps;
        if auto_mipmaps && pixels.mipmaps.len() > 1 {
            engine.push_warning(2, format!("auto mipmaps cleared for a chain of {} mipmaps", pixels.mipmaps.len()));
            auto_mipmaps = false;
        }

        let mut palette = Vec::new();
        if target.palette_type.is_palette() {
            palette = vec![0u8; target.palette_data_size(target.palette_type.item_count())];
            let used = target.palette_data_size(pixels.palette_size).min(pixels.palette.len()).min(palette.len());
            palette[..used].copy_from_slice(&pixels.palette[..used]);
        }

        self.layout = target;
        self.raster_type = pixels.raster_type;
        self.has_alpha = has_alpha;
        self.cubemap = pixels.cubemap;
        self.auto_mipmaps = auto_mipmaps;
        self.palette = palette;
        self.mipmaps = pixels.mipmaps;
        Ok(AcquireFeedback { directly_acquired })
    }

    fn unset_pixel_data(&mut self, _engine: &Engine) {
        self.reset();
    }

    fn mipmap_count(&self) -> usize {
        self.mipmaps.len()
    }

    fn texture_format_string(&self) -> String {
        let layout = self.layout;
        if layout.compression.is_compressed() {
            return layout.compression.name().into();
        }
        match layout.palette_type {
            PaletteType::None => layout.raster_format.name().into(),
            palette => format!("{} {}", palette.name(), layout.raster_format.name()),
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
        P::SIZE_RULES
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
