//! # Mobile Native Texture
//!
//! Block layout:
//!
//! 1. Struct chunk: [`MobileHeader`], then every mipmap as a 32-bit byte count
//!    followed by the texels.
//! 2. Extension block.

use crate::format::MobileFormat;
use crate::header::MobileHeader;
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
use rwtxd_common::PaletteType;

/// A texture of mobile platform `F`.
#[derive(Debug, Clone)]
pub struct MobileNativeTexture<F: MobileFormat> {
    version: LibraryVersion,
    info: TextureInfo,
    layout: Option<RasterLayout>,
    internal_format: u32,
    raster_type: u8,
    has_alpha: bool,
    auto_mipmaps: bool,
    unknown1: u32,
    unknown2: u32,
    mipmaps: Vec<MipmapLayer>,
    format: PhantomData<F>,
}

impl<F: MobileFormat> MobileNativeTexture<F> {
    /// Empty texture for the engine's version.
    pub fn new(engine: &Engine) -> Self {
        Self {
            version: engine.version(),
            info: TextureInfo::default(),
            layout: None,
            internal_format: 0,
            raster_type: RASTER_TYPE_TEXTURE,
            has_alpha: false,
            auto_mipmaps: false,
            unknown1: 0,
            unknown2: 0,
            mipmaps: Vec::new(),
            format: PhantomData,
        }
    }

    /// OpenGL ES format enum of the texels.
    pub fn internal_format(&self) -> u32 {
        self.internal_format
    }

    /// The two unknown header words.
    pub fn unknowns(&self) -> (u32, u32) {
        (self.unknown1, self.unknown2)
    }

    /// Stored mipmaps.
    pub fn mipmaps(&self) -> &[MipmapLayer] {
        &self.mipmaps
    }

    /// Whether the texels carry alpha.
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    fn reset(&mut self) {
        self.layout = None;
        self.mipmaps.clear();
        self.internal_format = 0;
        self.has_alpha = false;
        self.auto_mipmaps = false;
        self.unknown1 = 0;
        self.unknown2 = 0;
    }

    fn stored(&self) -> TxdResult<RasterLayout> {
        match (self.layout, self.mipmaps.is_empty()) {
            (Some(layout), false) => Ok(layout),
            _ => Err(TxdError::structural(format!("{} texture has no mipmaps", F::TYPE_NAME))),
        }
    }

    fn header(&self) -> TxdResult<MobileHeader> {
        let layout = self.stored()?;
        let base = self
            .mipmaps
            .first()
            .ok_or_else(|| TxdError::structural("texture has no mipmaps to write"))?;
        let has_mipmaps = self.mipmaps.len() > 1;
        let raster_flags = RasterFormatFlags::new(
            layout.raster_format,
            PaletteType::None,
            has_mipmaps,
            self.auto_mipmaps,
            self.raster_type,
        );
        let section: usize = self.mipmaps.iter().map(|mipmap| 4 + mipmap.texels.len()).sum();
        Ok(MobileHeader {
            platform: F::PLATFORM,
            format_info: TexFormatInfo::from_texture_info(&self.info, raster_flags, has_mipmaps, self.auto_mipmaps),
            name: self.info.name.clone(),
            mask_name: self.info.mask_name.clone(),
            width: base.layer_width,
            height: base.layer_height,
            depth: layout.depth,
            mipmap_count: self.mipmaps.len() as u32,
            has_alpha: self.has_alpha,
            internal_format: self.internal_format,
            unknown1: self.unknown1,
            unknown2: self.unknown2,
            image_data_section_size: section as u32,
        })
    }

    fn read_native(&mut self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        BlockProvider::read_expected_child(block, CHUNK_STRUCT, |data| {
            let header = MobileHeader::read(data)?;
            if header.platform != F::PLATFORM {
                return Err(TxdError::structural(format!(
                    "platform {:#x} is not a {} texture",
                    header.platform,
                    F::TYPE_NAME
                )));
            }
            header.format_info.apply_to(engine, &mut self.info);
            self.info.name = header.name.clone();
            self.info.mask_name = header.mask_name.clone();
            if header.width == 0 || header.height == 0 {
                return Err(TxdError::structural(format!("{} texture with empty dimensions", F::TYPE_NAME)));
            }
            if header.unknown1 != 0 || header.unknown2 != 0 {
                engine.push_warning(
                    3,
                    format!(
                        "{} texture '{}' has unknown header values {:#x} and {:#x}",
                        F::TYPE_NAME,
                        self.info.name,
                        header.unknown1,
                        header.unknown2
                    ),
                );
            }

            let layout = F::stored_layout(header.internal_format, header.has_alpha)?;
            self.layout = Some(layout);
            self.internal_format = header.internal_format;
            self.has_alpha = header.has_alpha;
            self.auto_mipmaps = header.format_info.auto_mipmaps();
            self.raster_type = header.format_info.raster_flags.raster_type() as u8;
            self.unknown1 = header.unknown1;
            self.unknown2 = header.unknown2;
            self.read_mipmaps(engine, data, &header, layout)
        })?;
        read_extensions(block, &mut self.info.extensions)
    }

    fn read_mipmaps(
        &mut self,
        engine: &Engine,
        data: &mut BlockProvider<'_>,
        header: &MobileHeader,
        layout: RasterLayout,
    ) -> TxdResult<()> {
        let mut section = 0usize;
        for level in 0..header.mipmap_count {
            let (width, height) = mip_dimensions(header.width, header.height, level);
            let stored = data.read_u32()? as usize;
            if F::VERIFIES_MIPMAP_SIZES {
                let expected = layout.surface_size(width, height);
                if stored != expected {
                    engine.push_warning(
                        1,
                        format!(
                            "texture '{}' has damaged mipmaps: level {level} stores {stored} bytes, expected {expected}",
                            self.info.name
                        ),
                    );
                    data.skip(stored as u64)?;
                    return Ok(());
                }
            }
            let texels = data.read_vec(stored)?;
            section += 4 + stored;
            self.mipmaps.push(match layout.compression.is_compressed() {
                true => MipmapLayer::compressed(layout.compression, width, height, texels),
                false => MipmapLayer::new(width, height, texels),
            });
        }
        if section != header.image_data_section_size as usize {
            engine.push_warning(
                2,
                format!(
                    "texture '{}' declares {} bytes of image data, stores {section}",
                    self.info.name, header.image_data_section_size
                ),
            );
        }
        Ok(())
    }
}

impl<F: MobileFormat> NativeTexture for MobileNativeTexture<F> {
    fn type_name(&self) -> &'static str {
        F::TYPE_NAME
    }

    fn clone_box(&self) -> Box<dyn NativeTexture> {
        Box::new(self.clone())
    }

    fn serialize(&self, engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        let header = self.header()?;
        BlockProvider::write_child(block, CHUNK_STRUCT, |data| {
            header.write(engine, data)?;
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
        let mut pixels = PixelData::new(self.stored()?);
        pixels.mipmaps = self.mipmaps.clone();
        pixels.has_alpha = self.has_alpha;
        pixels.auto_mipmaps = self.auto_mipmaps;
        pixels.raster_type = self.raster_type;
        Ok(pixels)
    }

    fn set_pixel_data(&mut self, engine: &Engine, pixels: PixelData) -> TxdResult<AcquireFeedback> {
        F::SIZE_RULES.verify_pixel_data(&pixels)?;
        let has_alpha = pixels.detect_alpha()?;
        let (pixels, internal_format, directly_acquired) = match F::storage_for(&pixels.layout, has_alpha) {
            Some((layout, code)) => {
                let mut pixels = pixels;
                pixels.layout = layout;
                (pixels, code, true)
            }
            None => match F::conversion_target(has_alpha) {
                Some((layout, code)) if engine.config().fix_incompatible_rasters => {
                    log::debug!(
                        target: "rwtxd",
                        "converting {} pixels for {}",
                        pixels.layout.raster_format.name(),
                        F::TYPE_NAME
                    );
                    (pixels.convert(layout)?, code, false)
                }
                _ => {
                    let source = match pixels.layout.compression.is_compressed() {
                        true => pixels.layout.compression.name(),
                        false => pixels.layout.raster_format.name(),
                    };
                    return Err(TxdError::unsupported(format!("{} cannot store {source} pixels", F::TYPE_NAME)));
                }
            },
        };
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

        self.layout = Some(pixels.layout);
        self.internal_format = internal_format;
        self.has_alpha = has_alpha;
        self.auto_mipmaps = pixels.auto_mipmaps;
        self.raster_type = pixels.raster_type;
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
        match self.layout {
            Some(layout) if layout.compression.is_compressed() => layout.compression.name().into(),
            Some(layout) => layout.raster_format.name().into(),
            None => String::new(),
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
        F::SIZE_RULES
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
    use crate::format::*;
    use crate::test_prelude::*;
    use rwtxd_api::chunks::CHUNK_TEXTURENATIVE;
    use rwtxd_api::BlockMode;
    use rwtxd_common::{ColorOrdering, CompressionType, RasterFormat};
    use std::io::Cursor;

    // Root and struct chunk headers.
    const HEADER_OFFSET: usize = 24;
    const INTERNAL_FORMAT_OFFSET: usize = HEADER_OFFSET + 104;
    const UNKNOWN1_OFFSET: usize = HEADER_OFFSET + 108;
    const SECTION_SIZE_OFFSET: usize = HEADER_OFFSET + 116;

    fn write_texture<F: MobileFormat>(engine: &Engine, texture: &MobileNativeTexture<F>) -> Vec<u8> {
        let mut stream = Cursor::new(Vec::new());
        let mut root = BlockProvider::new(engine, &mut stream, BlockMode::Write);
        root.set_block_id(CHUNK_TEXTURENATIVE);
        root.set_block_version(texture.version());
        root.scoped(|block| texture.serialize(engine, block)).unwrap();
        stream.into_inner()
    }

    fn read_texture<F: MobileFormat>(engine: &Engine, bytes: Vec<u8>) -> TxdResult<MobileNativeTexture<F>> {
        let mut stream = Cursor::new(bytes);
        let mut root = BlockProvider::new(engine, &mut stream, BlockMode::Read);
        let mut texture = MobileNativeTexture::<F>::new(engine);
        root.scoped(|block| texture.deserialize(engine, block))?;
        Ok(texture)
    }

    fn compressed_chain(compression: CompressionType, size: u32) -> PixelData {
        let layout = RasterLayout::compressed(compression, RasterFormat::Raster565, 4, ColorOrdering::Rgba);
        let mut pixels = PixelData::new(layout);
        for level in 0..2 {
            let (width, height) = mip_dimensions(size, size, level);
            let bytes = compression.data_size(width, height).unwrap();
            pixels.mipmaps.push(MipmapLayer::compressed(compression, width, height, vec![0; bytes]));
        }
        pixels
    }

    fn s3tc_texture(engine: &Engine) -> MobileNativeTexture<S3tc> {
        let mut texture = MobileNativeTexture::<S3tc>::new(engine);
        let feedback = texture
            .set_pixel_data(engine, compressed_chain(CompressionType::Dxt1, 16))
            .unwrap();
        assert!(feedback.directly_acquired);
        texture
    }

    #[test]
    fn s3tc_round_trips() {
        let engine = Engine::new();
        let texture = s3tc_texture(&engine);
        assert_eq!(texture.internal_format(), GL_DXT1_RGB);

        let bytes = write_texture(&engine, &texture);
        assert_eq!(
            &bytes[SECTION_SIZE_OFFSET..SECTION_SIZE_OFFSET + 4],
            &(4 + 128 + 4 + 32u32).to_le_bytes()
        );
        let read = read_texture::<S3tc>(&engine, bytes.clone()).unwrap();
        assert_eq!(read.texture_format_string(), "DXT1");
        assert_eq!(read.mipmap_count(), 2);
        assert_eq!(write_texture(&engine, &read), bytes);
    }

    #[test]
    fn unknown_header_values_survive_with_a_warning() {
        let (engine, warnings) = recording_engine(EngineConfig::default());
        let mut bytes = write_texture(&engine, &s3tc_texture(&engine));
        bytes[UNKNOWN1_OFFSET] = 1;

        let read = read_texture::<S3tc>(&engine, bytes.clone()).unwrap();
        assert_eq!(read.unknowns(), (1, 0));
        assert_eq!(warnings.len(), 1);
        assert_eq!(write_texture(&engine, &read), bytes);
    }

    #[test]
    fn unsetting_pixels_clears_the_header_state() {
        let engine = Engine::new();
        let mut bytes = write_texture(&engine, &s3tc_texture(&engine));
        bytes[UNKNOWN1_OFFSET] = 1;
        let mut texture = read_texture::<S3tc>(&engine, bytes).unwrap();
        assert_eq!(texture.internal_format(), GL_DXT1_RGB);

        texture.unset_pixel_data(&engine);
        assert_eq!(texture.mipmap_count(), 0);
        assert_eq!(texture.internal_format(), 0);
        assert_eq!(texture.unknowns(), (0, 0));
        assert!(!texture.has_alpha());
        assert_eq!(texture.texture_format_string(), "");
    }

    #[test]
    fn section_size_mismatch_warns() {
        let (engine, warnings) = recording_engine(EngineConfig::default());
        let mut bytes = write_texture(&engine, &s3tc_texture(&engine));
        bytes[SECTION_SIZE_OFFSET] = 0;

        let read = read_texture::<S3tc>(&engine, bytes).unwrap();
        assert_eq!(read.mipmap_count(), 2);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn unknown_internal_format_is_fatal() {
        let engine = Engine::new();
        let mut bytes = write_texture(&engine, &s3tc_texture(&engine));
        bytes[INTERNAL_FORMAT_OFFSET..INTERNAL_FORMAT_OFFSET + 4].copy_from_slice(&0x1234u32.to_le_bytes());
        assert!(matches!(read_texture::<S3tc>(&engine, bytes), Err(TxdError::Structural(_))));
    }

    #[test]
    fn compressed_platforms_do_not_compress() {
        let engine = Engine::new();
        let mut texture = MobileNativeTexture::<S3tc>::new(&engine);
        let pixels = PixelData::from_surface(RasterLayout::RGBA8888, 4, 4, vec![0xFF; 64]);
        assert!(matches!(texture.set_pixel_data(&engine, pixels), Err(TxdError::UnsupportedFormat(_))));
    }

    #[rstest]
    #[case(CompressionType::Pvrtc4bppRgba, GL_PVRTC_4BPP_RGBA)]
    #[case(CompressionType::Pvrtc2bppRgb, GL_PVRTC_2BPP_RGB)]
    fn pvr_round_trips(#[case] compression: CompressionType, #[case] code: u32) {
        let engine = Engine::new();
        let mut texture = MobileNativeTexture::<PowerVr>::new(&engine);
        texture.set_pixel_data(&engine, compressed_chain(compression, 32)).unwrap();
        assert_eq!(texture.internal_format(), code);
        let read = read_texture::<PowerVr>(&engine, write_texture(&engine, &texture)).unwrap();
        assert_eq!(read.get_pixel_data(&engine).unwrap().mipmaps, texture.mipmaps());
    }

    #[test]
    fn pvr_requires_square_textures() {
        let engine = Engine::new();
        let mut texture = MobileNativeTexture::<PowerVr>::new(&engine);
        let layout = RasterLayout::compressed(CompressionType::Pvrtc4bppRgb, RasterFormat::Raster565, 4, ColorOrdering::Rgba);
        let mut pixels = PixelData::new(layout);
        pixels.mipmaps.push(MipmapLayer::compressed(CompressionType::Pvrtc4bppRgb, 16, 8, vec![0; 64]));
        assert!(texture.set_pixel_data(&engine, pixels).is_err());
    }

    #[test]
    fn atc_payloads_are_kept() {
        let engine = Engine::new();
        let mut texture = MobileNativeTexture::<Atc>::new(&engine);
        texture
            .set_pixel_data(&engine, compressed_chain(CompressionType::AtcRgbaExplicitAlpha, 8))
            .unwrap();
        assert_eq!(texture.internal_format(), GL_ATC_RGBA_EXPLICIT);
        let bytes = write_texture(&engine, &texture);
        let read = read_texture::<Atc>(&engine, bytes.clone()).unwrap();
        assert_eq!(read.texture_format_string(), "ATC_RGBA_EXPLICIT");
        assert_eq!(write_texture(&engine, &read), bytes);
    }

    #[rstest]
    #[case(0xFF, RasterFormat::Raster565, GL_UNSIGNED_SHORT_565)]
    #[case(0x80, RasterFormat::Raster4444, GL_UNSIGNED_SHORT_4444)]
    fn unc_picks_format_by_alpha(#[case] alpha: u8, #[case] raster_format: RasterFormat, #[case] code: u32) {
        let engine = Engine::new();
        let mut texture = MobileNativeTexture::<Unc>::new(&engine);
        let texels = [0xFF, 0x00, 0x00, alpha].repeat(4 * 4);
        let feedback = texture
            .set_pixel_data(&engine, PixelData::from_surface(RasterLayout::RGBA8888, 4, 4, texels))
            .unwrap();
        assert!(!feedback.directly_acquired);
        assert_eq!(texture.internal_format(), code);
        assert_eq!(texture.texture_format_string(), raster_format.name());

        let read = read_texture::<Unc>(&engine, write_texture(&engine, &texture)).unwrap();
        let pixels = read.get_pixel_data(&engine).unwrap();
        assert_eq!(pixels.layout.color_order, ColorOrdering::Abgr);
        assert_eq!(pixels.mipmaps[0].texels.len(), 4 * 4 * 2);
    }

    #[test]
    fn unc_without_fixing_is_rejected() {
        let engine = Engine::with_config(EngineConfig::default().with_fix_incompatible_rasters(false));
        let mut texture = MobileNativeTexture::<Unc>::new(&engine);
        let pixels = PixelData::from_surface(RasterLayout::RGBA8888, 4, 4, vec![0xFF; 64]);
        assert!(matches!(texture.set_pixel_data(&engine, pixels), Err(TxdError::UnsupportedFormat(_))));
    }
}
