//! Intermediate color representations used while moving texels between formats.

/// Represents a 32-bit RGBA color (8 bits per component).
///
/// This is the exchange format every raster sample is decoded into before it is
/// stored in another layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Color8888 {
    /// Red component (0-255)
    pub r: u8,
    /// Green component (0-255)
    pub g: u8,
    /// Blue component (0-255)
    pub b: u8,
    /// Alpha component (0-255)
    pub a: u8,
}

impl Color8888 {
    /// Fully transparent black, returned for palette indices outside the palette.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Creates a new [`Color8888`] from its components.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque grey from a luminance value.
    #[inline]
    pub const fn from_luminance(lum: u8, alpha: u8) -> Self {
        Self::new(lum, lum, lum, alpha)
    }

    /// Luminance of this color (rounded mean of the color channels).
    #[inline]
    pub fn luminance(&self) -> u8 {
        ((self.r as u32 + self.g as u32 + self.b as u32 + 1) / 3) as u8
    }

    /// Channel value by [`Channel`](crate::formats::Channel).
    #[inline]
    pub fn channel(&self, channel: crate::formats::Channel) -> u8 {
        use crate::formats::Channel::*;
        match channel {
            Red => self.r,
            Green => self.g,
            Blue => self.b,
            Alpha => self.a,
        }
    }

    /// Sets a channel by [`Channel`](crate::formats::Channel).
    #[inline]
    pub fn set_channel(&mut self, channel: crate::formats::Channel, value: u8) {
        use crate::formats::Channel::*;
        match channel {
            Red => self.r = value,
            Green => self.g = value,
            Blue => self.b = value,
            Alpha => self.a = value,
        }
    }
}

/// A color in normalized floating point, either RGBA or luminance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AbstractColor {
    /// Red, green, blue, alpha in `0.0..=1.0`.
    Rgba {
        /// Red.
        r: f32,
        /// Green.
        g: f32,
        /// Blue.
        b: f32,
        /// Alpha.
        a: f32,
    },
    /// Luminance and alpha in `0.0..=1.0`.
    Luminance {
        /// Luminance.
        lum: f32,
        /// Alpha.
        alpha: f32,
    },
}

impl AbstractColor {
    /// Converts an 8-bit color into normalized form.
    pub fn from_color8888(color: Color8888) -> Self {
        Self::Rgba {
            r: unorm8_to_f32(color.r),
            g: unorm8_to_f32(color.g),
            b: unorm8_to_f32(color.b),
            a: unorm8_to_f32(color.a),
        }
    }

    /// Quantizes back to 8 bits per channel.
    pub fn to_color8888(&self) -> Color8888 {
        match *self {
            Self::Rgba { r, g, b, a } => Color8888::new(
                f32_to_unorm8(r),
                f32_to_unorm8(g),
                f32_to_unorm8(b),
                f32_to_unorm8(a),
            ),
            Self::Luminance { lum, alpha } => {
                Color8888::from_luminance(f32_to_unorm8(lum), f32_to_unorm8(alpha))
            }
        }
    }
}

#[inline]
fn unorm8_to_f32(value: u8) -> f32 {
    value as f32 / 255.0
}

#[inline]
fn f32_to_unorm8(value: f32) -> u8 {
    let clamped = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    // Round half up; `f32::round` is not available without std.
    (clamped * 255.0 + 0.5) as u8
}

/// Rescales a channel value between bit widths.
///
/// `round(value / (2^from - 1) * (2^to - 1))`. A source width of zero means the
/// channel is absent and yields the maximum; a destination width of one maps any
/// non-zero value to one.
#[inline]
pub fn scale_channel(value: u32, from_bits: u32, to_bits: u32) -> u32 {
    if to_bits == 0 {
        return 0;
    }
    let to_max = (1u32 << to_bits) - 1;
    if from_bits == 0 {
        return to_max;
    }
    if from_bits == to_bits {
        return value & to_max;
    }
    if to_bits == 1 {
        return (value != 0) as u32;
    }
    let from_max = (1u32 << from_bits) - 1;
    let value = value.min(from_max);
    (value * to_max * 2 + from_max) / (from_max * 2)
}
