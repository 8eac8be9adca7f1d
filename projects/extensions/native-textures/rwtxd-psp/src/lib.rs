#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![warn(missing_docs)]

pub mod swizzle;
pub mod texture;

#[cfg(test)]
pub(crate) mod test_prelude;

pub use texture::{PspMeta, PspMipmap, PspNativeTexture, PSP_SIZE_RULES};

use rwtxd_api::chunks::PLATFORMDESC_PSP;
use rwtxd_api::{Engine, NativeTexture, NativeTextureType, SizeRules, StorageCapabilities, TxdResult};
use std::sync::Arc;

/// Registry name of PSP textures.
pub const PSP_TYPE_NAME: &str = "PSP";

/// Driver family of PSP textures.
pub const PSP_DRIVER_ID: u32 = 5;

/// Type object of [`PspNativeTexture`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PspNativeTextureType;

impl NativeTextureType for PspNativeTextureType {
    fn name(&self) -> &'static str {
        PSP_TYPE_NAME
    }

    fn platform_descriptor(&self) -> u32 {
        PLATFORMDESC_PSP
    }

    fn construct(&self, engine: &Engine) -> Box<dyn NativeTexture> {
        Box::new(PspNativeTexture::new(engine))
    }

    fn capabilities(&self) -> StorageCapabilities {
        StorageCapabilities {
            supports_palette: true,
            supports_mipmaps: true,
            ..StorageCapabilities::default()
        }
    }

    fn size_rules(&self) -> SizeRules {
        PSP_SIZE_RULES
    }

    fn driver_identifier(&self) -> u32 {
        PSP_DRIVER_ID
    }
}

/// Registers [`PspNativeTextureType`] with `engine`.
pub fn register(engine: &Engine) -> TxdResult<()> {
    engine.register_native_texture_type(Arc::new(PspNativeTextureType))
}
