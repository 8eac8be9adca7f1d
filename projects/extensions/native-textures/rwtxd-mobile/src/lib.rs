#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![warn(missing_docs)]

pub mod format;
pub mod header;
pub mod texture;

#[cfg(test)]
pub(crate) mod test_prelude;

pub use format::{Atc, MobileFormat, PowerVr, S3tc, Unc};
pub use header::MobileHeader;
pub use texture::MobileNativeTexture;

use core::marker::PhantomData;
use rwtxd_api::{Engine, NativeTexture, NativeTextureType, SizeRules, StorageCapabilities, TxdResult};
use rwtxd_common::CompressionType;
use std::sync::Arc;

/// Driver family shared by the mobile platforms.
pub const MOBILE_DRIVER_ID: u32 = 6;

/// ATC texture.
pub type AtcNativeTexture = MobileNativeTexture<Atc>;
/// PowerVR texture.
pub type PowerVrNativeTexture = MobileNativeTexture<PowerVr>;
/// S3TC mobile texture.
pub type S3tcNativeTexture = MobileNativeTexture<S3tc>;
/// Uncompressed mobile texture.
pub type UncNativeTexture = MobileNativeTexture<Unc>;

/// Type object of [`MobileNativeTexture`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MobileNativeTextureType<F: MobileFormat>(PhantomData<F>);

impl<F: MobileFormat> MobileNativeTextureType<F> {
    /// Type object for format `F`.
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<F: MobileFormat> NativeTextureType for MobileNativeTextureType<F> {
    fn name(&self) -> &'static str {
        F::TYPE_NAME
    }

    fn platform_descriptor(&self) -> u32 {
        F::PLATFORM
    }

    fn construct(&self, engine: &Engine) -> Box<dyn NativeTexture> {
        Box::new(MobileNativeTexture::<F>::new(engine))
    }

    fn capabilities(&self) -> StorageCapabilities {
        let stores = |compression: CompressionType| {
            F::INTERNAL_FORMATS
                .iter()
                .any(|format| format.compression == compression)
        };
        StorageCapabilities {
            supports_dxt1: stores(CompressionType::Dxt1),
            supports_dxt3: stores(CompressionType::Dxt3),
            supports_dxt5: stores(CompressionType::Dxt5),
            is_compressed_format: !F::INTERNAL_FORMATS.is_empty(),
            supports_mipmaps: true,
            ..StorageCapabilities::default()
        }
    }

    fn size_rules(&self) -> SizeRules {
        F::SIZE_RULES
    }

    fn driver_identifier(&self) -> u32 {
        MOBILE_DRIVER_ID
    }
}

/// Registers the four mobile types with `engine`.
pub fn register(engine: &Engine) -> TxdResult<()> {
    engine.register_native_texture_type(Arc::new(MobileNativeTextureType::<Atc>::new()))?;
    engine.register_native_texture_type(Arc::new(MobileNativeTextureType::<PowerVr>::new()))?;
    engine.register_native_texture_type(Arc::new(MobileNativeTextureType::<S3tc>::new()))?;
    engine.register_native_texture_type(Arc::new(MobileNativeTextureType::<Unc>::new()))
}
