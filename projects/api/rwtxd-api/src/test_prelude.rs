//! Common test imports and a minimal native texture for exercising the framework.

pub use crate::engine::{Engine, EngineConfig, RecordingWarningManager};
pub use rstest::rstest;
pub use std::sync::Arc;

use crate::block::BlockProvider;
use crate::chunks::{read_string_chunk, write_string_chunk, CHUNK_STRUCT};
use crate::error::{TxdError, TxdResult};
use crate::extension::{read_extensions, write_extensions};
use crate::native::{
    AcquireFeedback, NativeTexture, NativeTextureType, StorageCapabilities, TextureInfo,
};
use crate::pixel_data::{MipmapLayer, PixelData, RasterLayout};
use crate::size_rules::SizeRules;
use crate::version::LibraryVersion;
use core::any::Any;

/// Platform descriptor of [`DummyTexture`].
pub(crate) const DUMMY_PLATFORM: u32 = 0x0000_D0D0;

/// Creates an engine that records warnings.
pub(crate) fn recording_engine(config: EngineConfig) -> (Engine, Arc<RecordingWarningManager>) {
    let engine = Engine::with_config(config);
    let warnings = Arc::new(RecordingWarningManager::new());
    engine.set_warning_manager(warnings.clone());
    (engine, warnings)
}

/// Type object of [`DummyTexture`], registered under the given name.
pub(crate) struct DummyType(pub &'static str);

impl NativeTextureType for DummyType {
    fn name(&self) -> &'static str {
        self.0
    }

    fn platform_descriptor(&self) -> u32 {
        DUMMY_PLATFORM
    }

    fn construct(&self, engine: &Engine) -> Box<dyn NativeTexture> {
        Box::new(DummyTexture::new(engine, self.0))
    }

    fn capabilities(&self) -> StorageCapabilities {
        StorageCapabilities {
            supports_mipmaps: true,
            ..StorageCapabilities::default()
        }
    }

    fn size_rules(&self) -> SizeRules {
        SizeRules {
            power_of_two: true,
            ..SizeRules::UNRESTRICTED
        }
    }

    fn driver_identifier(&self) -> u32 {
        0
    }
}

/// Stores tightly packed RGBA 8888 mipmaps and writes them verbatim.
#[derive(Debug, Clone)]
pub(crate) struct DummyTexture {
    type_name: &'static str,
    version: LibraryVersion,
    info: TextureInfo,
    mipmaps: Vec<MipmapLayer>,
}

impl DummyTexture {
    pub(crate) fn new(engine: &Engine, type_name: &'static str) -> Self {
        Self {
            type_name,
            version: engine.version(),
            info: TextureInfo::default(),
            mipmaps: Vec::new(),
        }
    }
}

impl NativeTexture for DummyTexture {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn clone_box(&self) -> Box<dyn NativeTexture> {
        Box::new(self.clone())
    }

    fn serialize(&self, _engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        BlockProvider::write_child(block, CHUNK_STRUCT, |header| {
            header.write_u32(DUMMY_PLATFORM)?;
            header.write_u32(self.mipmaps.len() as u32)?;
            for mipmap in &self.mipmaps {
                header.write_u32(mipmap.width)?;
                header.write_u32(mipmap.height)?;
                header.write_u32(mipmap.texels.len() as u32)?;
                header.write(&mipmap.texels)?;
            }
            Ok(())
        })?;
        write_string_chunk(block, &self.info.name)?;
        write_extensions(block, &self.info.extensions)
    }

    fn deserialize(&mut self, _engine: &Engine, block: &mut BlockProvider<'_>) -> TxdResult<()> {
        self.version = block.block_version();
        self.mipmaps = BlockProvider::read_expected_child(block, CHUNK_STRUCT, |header| {
            if header.read_u32()? != DUMMY_PLATFORM {
                return Err(TxdError::structural("not a dummy texture"));
            }
            let count = header.read_u32()?;
            let mut mipmaps = Vec::new();
            for _ in 0..count {
                let width = header.read_u32()?;
                let height = header.read_u32()?;
                let length = header.read_u32()? as usize;
                mipmaps.push(MipmapLayer::new(width, height, header.read_vec(length)?));
            }
            Ok(mipmaps)
        })?;
        self.info.name = read_string_chunk(block)?;
        read_extensions(block, &mut self.info.extensions)
    }

    fn get_pixel_data(&self, _engine: &Engine) -> TxdResult<PixelData> {
        let mut pixels = PixelData::new(RasterLayout::RGBA8888);
        pixels.mipmaps = self.mipmaps.clone();
        Ok(pixels)
    }

    fn set_pixel_data(&mut self, engine: &Engine, pixels: PixelData) -> TxdResult<AcquireFeedback> {
        self.size_rules().verify_pixel_data(&pixels)?;
        let directly_acquired = pixels.layout == RasterLayout::RGBA8888;
        let pixels = if directly_acquired {
            pixels
        } else if engine.config().fix_incompatible_rasters {
            pixels.convert(RasterLayout::RGBA8888)?
        } else {
            return Err(TxdError::unsupported("dummy textures only store RGBA 8888"));
        };
        pixels.verify()?;
        self.mipmaps = pixels.mipmaps;
        Ok(AcquireFeedback { directly_acquired })
    }

    fn unset_pixel_data(&mut self, _engine: &Engine) {
        self.mipmaps.clear();
    }

    fn mipmap_count(&self) -> usize {
        self.mipmaps.len()
    }

    fn texture_format_string(&self) -> String {
        "8888".into()
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
        DummyType(self.type_name).size_rules()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
