use crate::color::Color8888;

/// Represents a 16-bit RGB565 color (5 bits red, 6 bits green, 5 bits blue)
/// As encountered in the endpoints of DXTn blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color565 {
    /// The underlying 16-bit RGB565 value
    value: u16,
}

impl Color565 {
    /// Creates a new [`Color565`] from the raw 16-bit value
    #[inline]
    pub fn from_raw(value: u16) -> Self {
        Self { value }
    }

    /// Creates a new [`Color565`] from separate RGB components
    ///
    /// # Parameters
    ///
    /// - `r`: The red component (0-255)
    /// - `g`: The green component (0-255)
    /// - `b`: The blue component (0-255)
    #[inline]
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            value: ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3),
        }
    }

    /// Returns the raw 16-bit value
    #[inline]
    pub fn raw_value(&self) -> u16 {
        self.value
    }

    // Endpoints are expanded to 8 bits by replicating the top bits.

    /// Extracts the expanded 8-bit red component
    #[inline]
    pub fn red(&self) -> u8 {
        let r = (self.value & 0b11111000_00000000) >> 11;
        ((r << 3) | (r >> 2)) as u8
    }

    /// Extracts the expanded 8-bit green component
    #[inline]
    pub fn green(&self) -> u8 {
        let g = (self.value & 0b00000111_11100000) >> 5;
        ((g << 2) | (g >> 4)) as u8
    }

    /// Extracts the expanded 8-bit blue component
    #[inline]
    pub fn blue(&self) -> u8 {
        let b = self.value & 0b00000000_00011111;
        ((b << 3) | (b >> 2)) as u8
    }

    /// Compares two [`Color565`] values
    #[inline]
    pub fn greater_than(&self, other: &Self) -> bool {
        self.value > other.value
    }

    /// Converts this [`Color565`] to a [`Color8888`] with the specified alpha value
    ///
    /// # Examples
    ///
    /// ```
    /// use rwtxd_common::color_565::Color565;
    ///
    /// let rgb565 = Color565::from_rgb(255, 0, 0);
    /// let rgba8888 = rgb565.to_color_8888_with_alpha(128);
    /// assert_eq!(rgba8888.r, 255);
    /// assert_eq!(rgba8888.g, 0);
    /// assert_eq!(rgba8888.b, 0);
    /// assert_eq!(rgba8888.a, 128);
    /// ```
    #[inline]
    pub fn to_color_8888_with_alpha(&self, alpha: u8) -> Color8888 {
        Color8888::new(self.red(), self.green(), self.blue(), alpha)
    }

    /// Blends two endpoints as `(a * weight_a + b * weight_b) / divisor`, per channel.
    #[inline]
    pub(crate) fn blend(
        a: &Self,
        weight_a: u32,
        b: &Self,
        weight_b: u32,
        divisor: u32,
    ) -> Color8888 {
        let mix = |x: u8, y: u8| ((x as u32 * weight_a + y as u32 * weight_b) / divisor) as u8;
        Color8888::new(
            mix(a.red(), b.red()),
            mix(a.green(), b.green()),
            mix(a.blue(), b.blue()),
            255,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(0xF800, 255, 0, 0)]
    #[case(0x07E0, 0, 255, 0)]
    #[case(0x001F, 0, 0, 255)]
    #[case(0x8410, 132, 130, 132)]
    fn endpoint_expansion(#[case] raw: u16, #[case] r: u8, #[case] g: u8, #[case] b: u8) {
        let color = Color565::from_raw(raw);
        assert_eq!((color.red(), color.green(), color.blue()), (r, g, b));
    }

    #[test]
    fn from_rgb_truncates_low_bits() {
        assert_eq!(Color565::from_rgb(255, 255, 255).raw_value(), 0xFFFF);
        assert_eq!(Color565::from_rgb(7, 3, 7).raw_value(), 0);
        assert!(Color565::from_raw(2).greater_than(&Color565::from_raw(1)));
    }
}
