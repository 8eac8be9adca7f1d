#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![warn(missing_docs)]

pub use rwtxd_api::*;
pub use rwtxd_common as common;

/// PlayStation 2 codec.
pub use rwtxd_ps2 as ps2;

/// PlayStation Portable codec.
pub use rwtxd_psp as psp;

/// Direct3D 8 and XBOX codecs.
pub use rwtxd_d3d as d3d;

/// Mobile codecs (ATC, PowerVR, S3TC and uncompressed).
pub use rwtxd_mobile as mobile;

/// Registers every native texture codec with `engine`.
///
/// Types are registered in a fixed order so that platform lookups and
/// [`Engine::native_texture_type_names`] are reproducible.
///
/// # Errors
///
/// - [`TxdError::TypeAlreadyRegistered`] if any of the codecs was registered before
/// - [`TxdError::RegistrySealed`] if the engine already serialized a texture
pub fn register_default_native_textures(engine: &Engine) -> TxdResult<()> {
    rwtxd_ps2::register(engine)?;
    rwtxd_psp::register(engine)?;
    rwtxd_d3d::register(engine)?;
    rwtxd_mobile::register(engine)?;
    log::debug!(
        target: "rwtxd",
        "registered native texture types: {}",
        engine.native_texture_type_names().join(", ")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rwtxd_api::chunks::{
        PLATFORMDESC_ATC, PLATFORMDESC_DXT_MOBILE, PLATFORMDESC_PSP, PLATFORMDESC_PVR,
        PLATFORMDESC_UNC_MOBILE, PLATFORM_D3D8, PLATFORM_PS2, PLATFORM_XBOX,
    };

    #[test]
    fn registration_order_is_fixed() {
        let engine = Engine::new();
        register_default_native_textures(&engine).unwrap();
        assert_eq!(
            engine.native_texture_type_names(),
            [
                "PlayStation2",
                "PSP",
                "Direct3D8",
                "XBOX",
                "ATC",
                "PowerVR",
                "s3tc_mobile",
                "uncompressed_mobile"
            ]
        );
    }

    #[rstest]
    #[case(PLATFORM_PS2, "PlayStation2")]
    #[case(PLATFORMDESC_PSP, "PSP")]
    #[case(PLATFORM_D3D8, "Direct3D8")]
    #[case(PLATFORM_XBOX, "XBOX")]
    #[case(PLATFORMDESC_ATC, "ATC")]
    #[case(PLATFORMDESC_PVR, "PowerVR")]
    #[case(PLATFORMDESC_DXT_MOBILE, "s3tc_mobile")]
    #[case(PLATFORMDESC_UNC_MOBILE, "uncompressed_mobile")]
    fn platform_lookup(#[case] platform: u32, #[case] name: &str) {
        let engine = Engine::new();
        register_default_native_textures(&engine).unwrap();
        let native_type = engine.native_texture_type_for_platform(platform).unwrap();
        assert_eq!(native_type.name(), name);
    }

    #[test]
    fn second_registration_is_rejected() {
        let engine = Engine::new();
        register_default_native_textures(&engine).unwrap();
        assert!(matches!(
            register_default_native_textures(&engine),
            Err(TxdError::TypeAlreadyRegistered(_))
        ));
    }
}
