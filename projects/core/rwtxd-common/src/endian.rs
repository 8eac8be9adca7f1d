//! # Little Endian Field Access
//!
//! Every RenderWare structure is stored little endian. This module wraps
//! [`endian_writer`]'s raw pointer readers/writers behind bounds checked helpers,
//! so the codecs can parse fixed headers out of byte slices without `unsafe`.
//!
//! - [`ByteReader`] walks a borrowed slice front to back.
//! - [`ByteWriter`] appends fields to an owned buffer.

use alloc::vec::Vec;
use endian_writer::{EndianReader, EndianWriter, LittleEndianReader, LittleEndianWriter};

/// Reads a little endian [`u16`] at `offset`, or [`None`] if out of bounds.
#[inline]
pub fn read_u16_le(bytes: &[u8], offset: usize) -> Option<u16> {
    let slot = bytes.get(offset..offset.checked_add(2)?)?;
    // SAFETY: `slot` holds exactly 2 readable bytes.
    let mut reader = unsafe { LittleEndianReader::new(slot.as_ptr()) };
    Some(unsafe { reader.read_u16_at(0) })
}

/// Reads a little endian [`u32`] at `offset`, or [`None`] if out of bounds.
#[inline]
pub fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let slot = bytes.get(offset..offset.checked_add(4)?)?;
    // SAFETY: `slot` holds exactly 4 readable bytes.
    let mut reader = unsafe { LittleEndianReader::new(slot.as_ptr()) };
    Some(unsafe { reader.read_u32_at(0) })
}

/// Reads a little endian [`u64`] at `offset`, or [`None`] if out of bounds.
#[inline]
pub fn read_u64_le(bytes: &[u8], offset: usize) -> Option<u64> {
    let slot = bytes.get(offset..offset.checked_add(8)?)?;
    // SAFETY: `slot` holds exactly 8 readable bytes.
    let mut reader = unsafe { LittleEndianReader::new(slot.as_ptr()) };
    Some(unsafe { reader.read_u64_at(0) })
}

/// Writes a little endian [`u16`] at `offset`. Returns `false` if out of bounds.
#[inline]
pub fn write_u16_le(bytes: &mut [u8], offset: usize, value: u16) -> bool {
    let Some(slot) = offset
        .checked_add(2)
        .and_then(|end| bytes.get_mut(offset..end))
    else {
        return false;
    };
    // SAFETY: `slot` holds exactly 2 writable bytes.
    unsafe {
        let mut writer = LittleEndianWriter::new(slot.as_mut_ptr());
        writer.write_u16_at(value, 0);
    }
    true
}

/// Writes a little endian [`u32`] at `offset`. Returns `false` if out of bounds.
#[inline]
pub fn write_u32_le(bytes: &mut [u8], offset: usize, value: u32) -> bool {
    let Some(slot) = offset
        .checked_add(4)
        .and_then(|end| bytes.get_mut(offset..end))
    else {
        return false;
    };
    // SAFETY: `slot` holds exactly 4 writable bytes.
    unsafe {
        let mut writer = LittleEndianWriter::new(slot.as_mut_ptr());
        writer.write_u32_at(value, 0);
    }
    true
}

/// Writes a little endian [`u64`] at `offset`. Returns `false` if out of bounds.
#[inline]
pub fn write_u64_le(bytes: &mut [u8], offset: usize, value: u64) -> bool {
    let Some(slot) = offset
        .checked_add(8)
        .and_then(|end| bytes.get_mut(offset..end))
    else {
        return false;
    };
    // SAFETY: `slot` holds exactly 8 writable bytes.
    unsafe {
        let mut writer = LittleEndianWriter::new(slot.as_mut_ptr());
        writer.write_u64_at(value, 0);
    }
    true
}

/// Sequential little endian reader over a borrowed byte slice.
///
/// Every accessor returns [`None`] once the slice is exhausted; the cursor is
/// only advanced on success.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current offset from the start of the slice.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Option<u8> {
        let value = *self.data.get(self.offset)?;
        self.offset += 1;
        Some(value)
    }

    /// Reads a little endian [`u16`].
    pub fn read_u16(&mut self) -> Option<u16> {
        let value = read_u16_le(self.data, self.offset)?;
        self.offset += 2;
        Some(value)
    }

    /// Reads a little endian [`u32`].
    pub fn read_u32(&mut self) -> Option<u32> {
        let value = read_u32_le(self.data, self.offset)?;
        self.offset += 4;
        Some(value)
    }

    /// Reads a little endian [`u64`].
    pub fn read_u64(&mut self) -> Option<u64> {
        let value = read_u64_le(self.data, self.offset)?;
        self.offset += 8;
        Some(value)
    }

    /// Borrows the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.data.get(self.offset..self.offset.checked_add(len)?)?;
        self.offset += len;
        Some(bytes)
    }

    /// Reads a fixed size array.
    pub fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Some(out)
    }

    /// Skips `len` bytes.
    pub fn skip(&mut self, len: usize) -> Option<()> {
        self.read_bytes(len).map(|_| ())
    }
}

/// Little endian writer appending to an owned buffer.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    data: Vec<u8>,
}

impl ByteWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with space reserved for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends a single byte.
    pub fn put_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Appends a little endian [`u16`].
    pub fn put_u16(&mut self, value: u16) {
        let start = self.data.len();
        self.data.resize(start + 2, 0);
        write_u16_le(&mut self.data, start, value);
    }

    /// Appends a little endian [`u32`].
    pub fn put_u32(&mut self, value: u32) {
        let start = self.data.len();
        self.data.resize(start + 4, 0);
        write_u32_le(&mut self.data, start, value);
    }

    /// Appends a little endian [`u64`].
    pub fn put_u64(&mut self, value: u64) {
        let start = self.data.len();
        self.data.resize(start + 8, 0);
        write_u64_le(&mut self.data, start, value);
    }

    /// Appends raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Appends `count` zero bytes.
    pub fn put_zeros(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }

    /// Consumes the writer, returning the written bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(0, Some(0x0403_0201))]
    #[case(4, Some(0x0807_0605))]
    #[case(5, None)]
    #[case(usize::MAX, None)]
    fn read_u32_respects_bounds(#[case] offset: usize, #[case] expected: Option<u32>) {
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(read_u32_le(&bytes, offset), expected);
    }

    #[test]
    fn writer_output_is_readable_by_reader() {
        let mut writer = ByteWriter::new();
        writer.put_u8(0xAB);
        writer.put_u16(0x1234);
        writer.put_u32(0xDEAD_BEEF);
        writer.put_u64(0x0102_0304_0506_0708);
        writer.put_zeros(3);
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 1 + 2 + 4 + 8 + 3);
        assert_eq!(&bytes[1..3], &[0x34, 0x12]);

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u8(), Some(0xAB));
        assert_eq!(reader.read_u16(), Some(0x1234));
        assert_eq!(reader.read_u32(), Some(0xDEAD_BEEF));
        assert_eq!(reader.read_u64(), Some(0x0102_0304_0506_0708));
        assert_eq!(reader.remaining(), 3);
        assert_eq!(reader.read_u32(), None);
        assert_eq!(reader.offset(), 15);
    }

    #[test]
    fn out_of_bounds_write_is_rejected() {
        let mut bytes = [0u8; 6];
        assert!(write_u32_le(&mut bytes, 2, 0xFFFF_FFFF));
        assert!(!write_u32_le(&mut bytes, 3, 1));
        assert!(!write_u64_le(&mut bytes, 0, 1));
        assert_eq!(bytes, [0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
    }
}
