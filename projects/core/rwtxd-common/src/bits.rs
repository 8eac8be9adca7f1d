//! Depth indexed sample access.
//!
//! Texel rows are treated as arrays of `depth` bit wide items. Items of 8 bits or
//! more are stored little endian; 4 bit items share a byte, and the caller picks
//! which nibble comes first.

use likely_stable::unlikely;

/// Reads item `index` of a row made of `depth` bit items.
///
/// `lsb_first` selects the low nibble for even indices when `depth == 4`.
/// Returns [`None`] if the item lies outside `row` or the depth is unsupported.
#[inline]
pub fn fetch_sample(row: &[u8], index: u32, depth: u32, lsb_first: bool) -> Option<u32> {
    let index = index as usize;
    match depth {
        4 => {
            let byte = *row.get(index / 2)? as u32;
            let low = (index & 1 == 0) == lsb_first;
            Some(if low { byte & 0x0F } else { byte >> 4 })
        }
        8 | 16 | 24 | 32 => {
            let width = depth as usize / 8;
            let start = index * width;
            let bytes = row.get(start..start + width)?;
            Some(
                bytes
                    .iter()
                    .rev()
                    .fold(0u32, |acc, byte| (acc << 8) | *byte as u32),
            )
        }
        _ => None,
    }
}

/// Writes item `index` of a row made of `depth` bit items.
///
/// Bits of `value` above `depth` are discarded. Returns `false` if the item lies
/// outside `row` or the depth is unsupported.
#[inline]
pub fn store_sample(row: &mut [u8], index: u32, depth: u32, lsb_first: bool, value: u32) -> bool {
    let index = index as usize;
    match depth {
        4 => {
            let Some(byte) = row.get_mut(index / 2) else {
                return false;
            };
            let low = (index & 1 == 0) == lsb_first;
            let nibble = (value & 0x0F) as u8;
            *byte = if low {
                (*byte & 0xF0) | nibble
            } else {
                (*byte & 0x0F) | (nibble << 4)
            };
            true
        }
        8 | 16 | 24 | 32 => {
            let width = depth as usize / 8;
            let start = index * width;
            let Some(bytes) = row.get_mut(start..start + width) else {
                return false;
            };
            for (shift, byte) in bytes.iter_mut().enumerate() {
                *byte = (value >> (shift * 8)) as u8;
            }
            true
        }
        _ => false,
    }
}

/// Moves one `depth` bit item between two rows.
///
/// Both sides may use different nibble orders.
#[inline]
pub fn move_sample(
    src_row: &[u8],
    src_index: u32,
    src_lsb_first: bool,
    dst_row: &mut [u8],
    dst_index: u32,
    dst_lsb_first: bool,
    depth: u32,
) -> bool {
    let Some(value) = fetch_sample(src_row, src_index, depth, src_lsb_first) else {
        return false;
    };
    store_sample(dst_row, dst_index, depth, dst_lsb_first, value)
}

/// Returns the row starting at `row_index` of a buffer with rows of `row_size` bytes.
#[inline]
pub fn row_slice(buffer: &[u8], row_size: usize, row_index: u32) -> Option<&[u8]> {
    let start = row_size.checked_mul(row_index as usize)?;
    if unlikely(start.checked_add(row_size)? > buffer.len()) {
        return None;
    }
    Some(&buffer[start..start + row_size])
}

/// Mutable variant of [`row_slice`].
#[inline]
pub fn row_slice_mut(buffer: &mut [u8], row_size: usize, row_index: u32) -> Option<&mut [u8]> {
    let start = row_size.checked_mul(row_index as usize)?;
    if unlikely(start.checked_add(row_size)? > buffer.len()) {
        return None;
    }
    Some(&mut buffer[start..start + row_size])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(false, 0, 0xA)]
    #[case(false, 1, 0xB)]
    #[case(true, 0, 0xB)]
    #[case(true, 1, 0xA)]
    fn nibble_order(#[case] lsb_first: bool, #[case] index: u32, #[case] expected: u32) {
        let row = [0xABu8];
        assert_eq!(fetch_sample(&row, index, 4, lsb_first), Some(expected));
    }

    #[rstest]
    #[case(8, 0x7F)]
    #[case(16, 0x1234)]
    #[case(24, 0x12_3456)]
    #[case(32, 0x1234_5678)]
    fn store_then_fetch(#[case] depth: u32, #[case] value: u32) {
        let mut row = vec![0u8; 16];
        assert!(store_sample(&mut row, 2, depth, false, value));
        assert_eq!(fetch_sample(&row, 2, depth, false), Some(value));
        assert_eq!(fetch_sample(&row, 0, depth, false), Some(0));
    }

    #[test]
    fn nibble_store_preserves_neighbour() {
        let mut row = [0u8; 1];
        assert!(store_sample(&mut row, 0, 4, false, 0xC));
        assert!(store_sample(&mut row, 1, 4, false, 0x3));
        assert_eq!(row[0], 0xC3);
        assert!(store_sample(&mut row, 0, 4, true, 0x5));
        assert_eq!(row[0], 0xC5);
    }

    #[test]
    fn move_sample_switches_nibble_order() {
        let src = [0xABu8];
        let mut dst = [0u8; 1];
        assert!(move_sample(&src, 0, false, &mut dst, 0, true, 4));
        assert_eq!(dst[0], 0x0A);
        assert!(move_sample(&src, 1, false, &mut dst, 1, true, 4));
        assert_eq!(dst[0], 0xBA);
        assert!(!move_sample(&src, 2, false, &mut dst, 0, true, 4));
    }

    #[test]
    fn out_of_range_access_fails() {
        let mut row = [0u8; 3];
        assert_eq!(fetch_sample(&row, 1, 16, false), None);
        assert!(!store_sample(&mut row, 1, 32, false, 1));
        assert_eq!(fetch_sample(&row, 0, 12, false), None);
    }

    #[test]
    fn rows_are_bounds_checked() {
        let buffer = [0u8; 10];
        assert_eq!(row_slice(&buffer, 4, 1).map(<[u8]>::len), Some(4));
        assert!(row_slice(&buffer, 4, 2).is_none());
    }
}
