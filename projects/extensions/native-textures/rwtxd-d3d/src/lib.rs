#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![warn(missing_docs)]

pub mod header;
pub mod platform;
pub mod texture;

#[cfg(test)]
pub(crate) mod test_prelude;

pub use header::D3dHeader;
pub use platform::{D3dPlatform, Direct3D8, Xbox};
pub use texture::D3dNativeTexture;

use core::marker::PhantomData;
use rwtxd_api::{Engine, NativeTexture, NativeTextureType, SizeRules, StorageCapabilities, TxdResult};
use std::sync::Arc;

/// Direct3D 8 texture.
pub type Direct3D8NativeTexture = D3dNativeTexture<Direct3D8>;
/// XBOX texture.
pub type XboxNativeTexture = D3dNativeTexture<Xbox>;

/// Type object of [`D3dNativeTexture`].
#[derive(Debug, Clone, Copy, Default)]
pub struct D3dNativeTextureType<P: D3dPlatform>(PhantomData<P>);

impl<P: D3dPlatform> D3dNativeTextureType<P> {
    /// Type object for platform `P`.
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<P: D3dPlatform> NativeTextureType for D3dNativeTextureType<P> {
    fn name(&self) -> &'static str {
        P::TYPE_NAME
    }

    fn platform_descriptor(&self) -> u32 {
        P::PLATFORM
    }

    fn construct(&self, engine: &Engine) -> Box<dyn NativeTexture> {
        Box::new(D3dNativeTexture::<P>::new(engine))
    }

    fn capabilities(&self) -> StorageCapabilities {
        StorageCapabilities {
            supports_dxt1: true,
            supports_dxt2: true,
            supports_dxt3: true,
            supports_dxt4: true,
            supports_dxt5: true,
            supports_palette: true,
            supports_mipmaps: true,
            ..StorageCapabilities::default()
        }
    }

    fn size_rules(&self) -> SizeRules {
        P::SIZE_RULES
    }

    fn driver_identifier(&self) -> u32 {
        P::DRIVER_ID
    }
}

/// Registers the Direct3D 8 and XBOX types with `engine`.
pub fn register(engine: &Engine) -> TxdResult<()> {
    engine.register_native_texture_type(Arc::new(D3dNativeTextureType::<Direct3D8>::new()))?;
    engine.register_native_texture_type(Arc::new(D3dNativeTextureType::<Xbox>::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;
    use rwtxd_api::chunks::{PLATFORM_D3D8, PLATFORM_XBOX};

    #[test]
    fn registers_both_platforms() {
        let engine = Engine::new();
        register(&engine).unwrap();
        let d3d8 = engine.native_texture_type_for_platform(PLATFORM_D3D8).unwrap();
        let xbox = engine.native_texture_type_for_platform(PLATFORM_XBOX).unwrap();
        assert_eq!(d3d8.name(), "Direct3D8");
        assert_eq!(xbox.name(), "XBOX");
        assert_eq!(d3d8.driver_identifier(), 1);
        assert_eq!(xbox.driver_identifier(), 4);
        assert!(!xbox.size_rules().is_satisfied(24, 8));
    }
}
