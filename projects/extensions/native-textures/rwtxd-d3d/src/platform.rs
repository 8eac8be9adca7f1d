//! Platforms sharing the Direct3D texture layout.

use rwtxd_api::chunks::{PLATFORM_D3D8, PLATFORM_XBOX};
use rwtxd_api::SizeRules;

/// Constants that tell the Direct3D style platforms apart.
pub trait D3dPlatform: Copy + Default + core::fmt::Debug + Send + Sync + 'static {
    /// Platform descriptor leading the struct chunk.
    const PLATFORM: u32;
    /// Registry name.
    const TYPE_NAME: &'static str;
    /// Driver family.
    const DRIVER_ID: u32;
    /// Dimension limits.
    const SIZE_RULES: SizeRules;
}

/// PC Direct3D 8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Direct3D8;

impl D3dPlatform for Direct3D8 {
    const PLATFORM: u32 = PLATFORM_D3D8;
    const TYPE_NAME: &'static str = "Direct3D8";
    const DRIVER_ID: u32 = 1;
    const SIZE_RULES: SizeRules = SizeRules {
        power_of_two: false,
        square: false,
        max_width: Some(4096),
        max_height: Some(4096),
    };
}

/// Original XBOX.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Xbox;

impl D3dPlatform for Xbox {
    const PLATFORM: u32 = PLATFORM_XBOX;
    const TYPE_NAME: &'static str = "XBOX";
    const DRIVER_ID: u32 = 4;
    const SIZE_RULES: SizeRules = SizeRules::power_of_two_up_to(4096);
}
