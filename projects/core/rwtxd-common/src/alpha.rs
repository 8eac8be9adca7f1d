//! PlayStation alpha range conversion.
//!
//! The Graphics Synthesizer treats an alpha of `0x80` as fully opaque. Texels and
//! palettes are moved between that range and the regular `0..=255` range when
//! crossing the console boundary.

use crate::color::Color8888;

/// Converts a GS alpha (`0..=0x80`, values above are clamped) to the `0..=255` range.
#[inline]
pub fn ps2_alpha_to_pc(alpha: u8) -> u8 {
    ((alpha as u32 * 255 + 64) / 128).min(255) as u8
}

/// Converts a `0..=255` alpha to the GS range `0..=0x80`.
#[inline]
pub fn pc_alpha_to_ps2(alpha: u8) -> u8 {
    ((alpha as u32 * 128 + 127) / 255) as u8
}

/// Rewrites the alpha of tightly packed 32-bit samples in place.
///
/// `alpha_offset` is the byte position of the alpha channel inside every sample.
/// Trailing bytes that do not form a whole sample are left untouched.
pub fn convert_alpha_in_place(samples: &mut [u8], alpha_offset: usize, convert: fn(u8) -> u8) {
    for sample in samples.chunks_exact_mut(4) {
        sample[alpha_offset] = convert(sample[alpha_offset]);
    }
}

/// Applies `convert` to the alpha of a single color.
#[inline]
pub fn convert_color_alpha(color: Color8888, convert: fn(u8) -> u8) -> Color8888 {
    Color8888 {
        a: convert(color.a),
        ..color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(0x00, 0x00)]
    #[case(0x40, 0x80)]
    #[case(0x80, 0xFF)]
    #[case(0xFF, 0xFF)]
    fn gs_alpha_to_pc(#[case] ps2: u8, #[case] pc: u8) {
        assert_eq!(ps2_alpha_to_pc(ps2), pc);
    }

    #[test]
    fn pc_alpha_survives_console_round_trip_at_gs_precision() {
        for ps2 in 0..=0x80u8 {
            assert_eq!(pc_alpha_to_ps2(ps2_alpha_to_pc(ps2)), ps2);
        }
        assert_eq!(pc_alpha_to_ps2(0xFF), 0x80);
        assert_eq!(pc_alpha_to_ps2(0x00), 0x00);
    }

    #[test]
    fn rewrites_only_alpha_bytes() {
        let mut samples = vec![1, 2, 3, 0x80, 4, 5, 6, 0x40, 9];
        convert_alpha_in_place(&mut samples, 3, ps2_alpha_to_pc);
        assert_eq!(samples, vec![1, 2, 3, 0xFF, 4, 5, 6, 0x80, 9]);
        let color = convert_color_alpha(Color8888::new(1, 2, 3, 0xFF), pc_alpha_to_ps2);
        assert_eq!(color, Color8888::new(1, 2, 3, 0x80));
    }
}
