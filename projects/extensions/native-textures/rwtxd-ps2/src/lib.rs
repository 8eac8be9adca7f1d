#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![warn(missing_docs)]

pub mod clut;
pub mod gif;
pub mod memory;
pub mod registers;
pub mod texture;

#[cfg(test)]
pub(crate) mod test_prelude;

pub use memory::{GsAllocation, GsMemoryLayout, Placement};
pub use registers::GsRegisters;
pub use texture::{Ps2Mipmap, Ps2NativeTexture, TextureMeta, PS2_MAX_MIPMAPS, PS2_SIZE_RULES};

use rwtxd_api::chunks::PLATFORM_PS2;
use rwtxd_api::{Engine, NativeTexture, NativeTextureType, SizeRules, StorageCapabilities, TxdResult};
use std::sync::Arc;

/// Registry name of PS2 textures.
pub const PS2_TYPE_NAME: &str = "PlayStation2";

/// Driver family of PS2 textures.
pub const PS2_DRIVER_ID: u32 = 3;

/// Type object of [`Ps2NativeTexture`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Ps2NativeTextureType;

impl NativeTextureType for Ps2NativeTextureType {
    fn name(&self) -> &'static str {
        PS2_TYPE_NAME
    }

    fn platform_descriptor(&self) -> u32 {
        PLATFORM_PS2
    }

    fn construct(&self, engine: &Engine) -> Box<dyn NativeTexture> {
        Box::new(Ps2NativeTexture::new(engine))
    }

    fn capabilities(&self) -> StorageCapabilities {
        StorageCapabilities {
            supports_palette: true,
            supports_mipmaps: true,
            ..StorageCapabilities::default()
        }
    }

    fn size_rules(&self) -> SizeRules {
        PS2_SIZE_RULES
    }

    fn driver_identifier(&self) -> u32 {
        PS2_DRIVER_ID
    }
}

/// Registers [`Ps2NativeTextureType`] with `engine`.
pub fn register(engine: &Engine) -> TxdResult<()> {
    engine.register_native_texture_type(Arc::new(Ps2NativeTextureType))
}
