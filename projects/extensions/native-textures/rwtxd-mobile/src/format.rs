//! Texel formats of the mobile platforms.
//!
//! The compressed platforms describe their data with a table of
//! [`InternalFormat`] entries; the uncompressed platform picks its layout from the
//! alpha flag and keeps the internal format as read.

use rwtxd_api::chunks::{
    PLATFORMDESC_ATC, PLATFORMDESC_DXT_MOBILE, PLATFORMDESC_PVR, PLATFORMDESC_UNC_MOBILE,
};
use rwtxd_api::{RasterLayout, SizeRules, TxdError, TxdResult};
use rwtxd_common::{ColorOrdering, CompressionType, RasterFormat};

/// Row alignment of uncompressed mobile mipmaps.
pub const MOBILE_ROW_ALIGNMENT: u32 = 4;

/// `GL_COMPRESSED_RGB_S3TC_DXT1_EXT`
pub const GL_DXT1_RGB: u32 = 0x83F0;
/// `GL_COMPRESSED_RGBA_S3TC_DXT1_EXT`
pub const GL_DXT1_RGBA: u32 = 0x83F1;
/// `GL_COMPRESSED_RGBA_S3TC_DXT3_EXT`
pub const GL_DXT3: u32 = 0x83F2;
/// `GL_COMPRESSED_RGBA_S3TC_DXT5_EXT`
pub const GL_DXT5: u32 = 0x83F3;
/// `GL_ATC_RGB_AMD`
pub const GL_ATC_RGB: u32 = 0x8C92;
/// `GL_ATC_RGBA_EXPLICIT_ALPHA_AMD`
pub const GL_ATC_RGBA_EXPLICIT: u32 = 0x8C93;
/// `GL_ATC_RGBA_INTERPOLATED_ALPHA_AMD`
pub const GL_ATC_RGBA_INTERPOLATED: u32 = 0x87EE;
/// `GL_COMPRESSED_RGB_PVRTC_4BPPV1_IMG`
pub const GL_PVRTC_4BPP_RGB: u32 = 0x8C00;
/// `GL_COMPRESSED_RGB_PVRTC_2BPPV1_IMG`
pub const GL_PVRTC_2BPP_RGB: u32 = 0x8C01;
/// `GL_COMPRESSED_RGBA_PVRTC_4BPPV1_IMG`
pub const GL_PVRTC_4BPP_RGBA: u32 = 0x8C02;
/// `GL_COMPRESSED_RGBA_PVRTC_2BPPV1_IMG`
pub const GL_PVRTC_2BPP_RGBA: u32 = 0x8C03;
/// `GL_UNSIGNED_SHORT_4_4_4_4`
pub const GL_UNSIGNED_SHORT_4444: u32 = 0x8033;
/// `GL_UNSIGNED_SHORT_5_6_5`
pub const GL_UNSIGNED_SHORT_565: u32 = 0x8363;

/// One internal format value and the data it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalFormat {
    /// Value stored in the header.
    pub code: u32,
    /// Compression of the texels.
    pub compression: CompressionType,
    /// Whether the format carries alpha.
    pub has_alpha: bool,
}

const fn entry(code: u32, compression: CompressionType, has_alpha: bool) -> InternalFormat {
    InternalFormat {
        code,
        compression,
        has_alpha,
    }
}

/// Bits per texel of compressed data.
pub fn compression_depth(compression: CompressionType) -> u32 {
    match compression {
        CompressionType::Pvrtc2bppRgb | CompressionType::Pvrtc2bppRgba => 2,
        CompressionType::Pvrtc4bppRgb | CompressionType::Pvrtc4bppRgba => 4,
        other => other.block_size().map_or(16, |size| size as u32 * 8 / 16),
    }
}

fn compressed_layout(format: &InternalFormat) -> RasterLayout {
    let raster_format = match (format.compression, format.has_alpha) {
        (_, false) => RasterFormat::Raster565,
        (CompressionType::Dxt1, true) => RasterFormat::Raster1555,
        (_, true) => RasterFormat::Raster4444,
    };
    RasterLayout::compressed(
        format.compression,
        raster_format,
        compression_depth(format.compression),
        ColorOrdering::Rgba,
    )
}

/// Constants and format mapping of one mobile platform.
pub trait MobileFormat: Copy + Default + core::fmt::Debug + Send + Sync + 'static {
    /// Platform descriptor leading the struct chunk.
    const PLATFORM: u32;
    /// Registry name.
    const TYPE_NAME: &'static str;
    /// Dimension limits.
    const SIZE_RULES: SizeRules;
    /// Internal formats of a compressed platform.
    const INTERNAL_FORMATS: &'static [InternalFormat] = &[];
    /// Whether mipmap byte counts are checked against their dimensions.
    const VERIFIES_MIPMAP_SIZES: bool = true;

    /// Layout of texels stored with `internal_format`.
    fn stored_layout(internal_format: u32, _has_alpha: bool) -> TxdResult<RasterLayout> {
        Self::INTERNAL_FORMATS
            .iter()
            .find(|format| format.code == internal_format)
            .map(compressed_layout)
            .ok_or_else(|| {
                TxdError::structural(format!(
                    "unknown {} internal format {internal_format:#x}",
                    Self::TYPE_NAME
                ))
            })
    }

    /// Stored layout and internal format for data already in `layout`, if storable as is.
    fn storage_for(layout: &RasterLayout, has_alpha: bool) -> Option<(RasterLayout, u32)> {
        let candidates = || {
            Self::INTERNAL_FORMATS
                .iter()
                .filter(|format| format.compression == layout.compression)
        };
        let format = candidates()
            .find(|format| format.has_alpha == has_alpha)
            .or_else(|| candidates().next())?;
        Some((compressed_layout(format), format.code))
    }

    /// Layout other data is converted into, if the platform can take converted data.
    fn conversion_target(_has_alpha: bool) -> Option<(RasterLayout, u32)> {
        None
    }
}

/// AMD ATC textures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Atc;

impl MobileFormat for Atc {
    const PLATFORM: u32 = PLATFORMDESC_ATC;
    const TYPE_NAME: &'static str = "ATC";
    const SIZE_RULES: SizeRules = SizeRules::power_of_two_up_to(4096);
    const INTERNAL_FORMATS: &'static [InternalFormat] = &[
        entry(GL_ATC_RGB, CompressionType::AtcRgb, false),
        entry(GL_ATC_RGBA_EXPLICIT, CompressionType::AtcRgbaExplicitAlpha, true),
        entry(GL_ATC_RGBA_INTERPOLATED, CompressionType::AtcRgbaInterpolatedAlpha, true),
    ];
    const VERIFIES_MIPMAP_SIZES: bool = false;
}

/// PowerVR PVRTC textures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerVr;

impl MobileFormat for PowerVr {
    const PLATFORM: u32 = PLATFORMDESC_PVR;
    const TYPE_NAME: &'static str = "PowerVR";
    const SIZE_RULES: SizeRules = SizeRules {
        power_of_two: true,
        square: true,
        max_width: Some(2048),
        max_height: Some(2048),
    };
    const INTERNAL_FORMATS: &'static [InternalFormat] = &[
        entry(GL_PVRTC_4BPP_RGB, CompressionType::Pvrtc4bppRgb, false),
        entry(GL_PVRTC_2BPP_RGB, CompressionType::Pvrtc2bppRgb, false),
        entry(GL_PVRTC_4BPP_RGBA, CompressionType::Pvrtc4bppRgba, true),
        entry(GL_PVRTC_2BPP_RGBA, CompressionType::Pvrtc2bppRgba, true),
    ];
}

/// S3TC (DXT) textures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct S3tc;

impl MobileFormat for S3tc {
    const PLATFORM: u32 = PLATFORMDESC_DXT_MOBILE;
    const TYPE_NAME: &'static str = "s3tc_mobile";
    const SIZE_RULES: SizeRules = SizeRules::power_of_two_up_to(4096);
    const INTERNAL_FORMATS: &'static [InternalFormat] = &[
        entry(GL_DXT1_RGB, CompressionType::Dxt1, false),
        entry(GL_DXT1_RGBA, CompressionType::Dxt1, true),
        entry(GL_DXT3, CompressionType::Dxt3, true),
        entry(GL_DXT5, CompressionType::Dxt5, true),
    ];
}

/// Uncompressed 16-bit textures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unc;

impl Unc {
    fn layout(has_alpha: bool) -> (RasterLayout, u32) {
        let (raster_format, code) = match has_alpha {
            true => (RasterFormat::Raster4444, GL_UNSIGNED_SHORT_4444),
            false => (RasterFormat::Raster565, GL_UNSIGNED_SHORT_565),
        };
        let layout = RasterLayout::direct(raster_format, 16, MOBILE_ROW_ALIGNMENT, ColorOrdering::Abgr);
        (layout, code)
    }
}

impl MobileFormat for Unc {
    const PLATFORM: u32 = PLATFORMDESC_UNC_MOBILE;
    const TYPE_NAME: &'static str = "uncompressed_mobile";
    const SIZE_RULES: SizeRules = SizeRules::power_of_two_up_to(4096);

    fn stored_layout(_internal_format: u32, has_alpha: bool) -> TxdResult<RasterLayout> {
        Ok(Self::layout(has_alpha).0)
    }

    fn storage_for(layout: &RasterLayout, has_alpha: bool) -> Option<(RasterLayout, u32)> {
        let storage = Self::layout(has_alpha);
        (storage.0 == *layout).then_some(storage)
    }

    fn conversion_target(has_alpha: bool) -> Option<(RasterLayout, u32)> {
        Some(Self::layout(has_alpha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(GL_DXT1_RGB, CompressionType::Dxt1, RasterFormat::Raster565, 4)]
    #[case(GL_DXT1_RGBA, CompressionType::Dxt1, RasterFormat::Raster1555, 4)]
    #[case(GL_DXT3, CompressionType::Dxt3, RasterFormat::Raster4444, 8)]
    #[case(GL_DXT5, CompressionType::Dxt5, RasterFormat::Raster4444, 8)]
    fn s3tc_internal_formats(
        #[case] code: u32,
        #[case] compression: CompressionType,
        #[case] raster_format: RasterFormat,
        #[case] depth: u32,
    ) {
        let layout = S3tc::stored_layout(code, false).unwrap();
        assert_eq!(layout.compression, compression);
        assert_eq!(layout.raster_format, raster_format);
        assert_eq!(layout.depth, depth);
    }

    #[rstest]
    #[case(GL_PVRTC_4BPP_RGB, 4)]
    #[case(GL_PVRTC_2BPP_RGBA, 2)]
    fn pvr_depths(#[case] code: u32, #[case] depth: u32) {
        assert_eq!(PowerVr::stored_layout(code, false).unwrap().depth, depth);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert!(matches!(S3tc::stored_layout(0x1234, true), Err(TxdError::Structural(_))));
        assert!(Unc::stored_layout(0x1234, true).is_ok());
    }

    #[rstest]
    #[case(false, GL_DXT1_RGB)]
    #[case(true, GL_DXT1_RGBA)]
    fn dxt1_code_follows_alpha(#[case] has_alpha: bool, #[case] code: u32) {
        let layout = S3tc::stored_layout(GL_DXT1_RGB, false).unwrap();
        assert_eq!(S3tc::storage_for(&layout, has_alpha).unwrap().1, code);
    }

    #[test]
    fn unc_takes_exact_layouts_only() {
        let (layout, code) = Unc::conversion_target(true).unwrap();
        assert_eq!(code, GL_UNSIGNED_SHORT_4444);
        assert!(Unc::storage_for(&layout, true).is_some());
        assert!(Unc::storage_for(&layout, false).is_none());
        assert!(Atc::conversion_target(true).is_none());
    }
}
