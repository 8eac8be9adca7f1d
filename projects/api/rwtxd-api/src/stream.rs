//! Byte stream contract consumed by the block layer.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Random access byte stream.
///
/// Any `Read + Write + Seek` type qualifies, e.g. [`std::io::Cursor<Vec<u8>>`] or a
/// [`std::fs::File`]. Short reads are reported by the block layer as
/// [`TxdError::StreamUnderrun`](crate::TxdError::StreamUnderrun).
pub trait Stream: Read + Write + Seek {
    /// Total size of the stream in bytes, if it can be determined.
    fn size(&mut self) -> io::Result<u64> {
        let position = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if end != position {
            self.seek(SeekFrom::Start(position))?;
        }
        Ok(end)
    }

    /// Advances the stream position by `count` bytes.
    fn skip(&mut self, count: u64) -> io::Result<()> {
        let offset = i64::try_from(count)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "skip distance too large"))?;
        self.seek(SeekFrom::Current(offset)).map(|_| ())
    }
}

impl<T: Read + Write + Seek + ?Sized> Stream for T {}
