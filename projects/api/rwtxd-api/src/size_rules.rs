//! Dimension constraints a native texture places on its mipmaps.

use crate::error::{TxdError, TxdResult};
use crate::pixel_data::PixelData;

/// Dimension limits of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SizeRules {
    /// Both dimensions must be powers of two.
    pub power_of_two: bool,
    /// Width and height must match.
    pub square: bool,
    /// Largest base width, if limited.
    pub max_width: Option<u32>,
    /// Largest base height, if limited.
    pub max_height: Option<u32>,
}

impl SizeRules {
    /// No restrictions beyond non-zero dimensions.
    pub const UNRESTRICTED: Self = Self {
        power_of_two: false,
        square: false,
        max_width: None,
        max_height: None,
    };

    /// Power of two dimensions up to `max` in both directions.
    pub const fn power_of_two_up_to(max: u32) -> Self {
        Self {
            power_of_two: true,
            square: false,
            max_width: Some(max),
            max_height: Some(max),
        }
    }

    /// Whether a base surface of `width` x `height` is accepted.
    pub fn is_satisfied(&self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        if self.power_of_two && !(width.is_power_of_two() && height.is_power_of_two()) {
            return false;
        }
        if self.square && width != height {
            return false;
        }
        self.max_width.is_none_or(|max| width <= max) && self.max_height.is_none_or(|max| height <= max)
    }

    /// Like [`SizeRules::is_satisfied`], reporting a [`TxdError::Structural`] on failure.
    pub fn verify(&self, width: u32, height: u32) -> TxdResult<()> {
        if self.is_satisfied(width, height) {
            return Ok(());
        }
        Err(TxdError::structural(format!(
            "{width}x{height} violates the size rules ({self})"
        )))
    }

    /// Checks the base layer of `pixels`.
    pub fn verify_pixel_data(&self, pixels: &PixelData) -> TxdResult<()> {
        let base = pixels
            .mipmaps
            .first()
            .ok_or_else(|| TxdError::structural("pixel data without mipmaps"))?;
        self.verify(base.layer_width, base.layer_height)
    }
}

impl core::fmt::Display for SizeRules {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut parts = Vec::new();
        if self.power_of_two {
            parts.push("power of two".to_string());
        }
        if self.square {
            parts.push("square".to_string());
        }
        if let Some(max) = self.max_width {
            parts.push(format!("width <= {max}"));
        }
        if let Some(max) = self.max_height {
            parts.push(format!("height <= {max}"));
        }
        if parts.is_empty() {
            return f.write_str("non-zero");
        }
        f.write_str(&parts.join(", "))
    }
}
