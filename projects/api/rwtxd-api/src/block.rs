//! # Block Provider
//!
//! RenderWare chunk framing. Every chunk starts with a 12-byte header:
//!
//! | Offset | Size | Field                                      |
//! |--------|------|--------------------------------------------|
//! | 0      | 4    | Chunk type id                              |
//! | 4      | 4    | Payload length in bytes                    |
//! | 8      | 4    | Packed [`LibraryVersion`]                  |
//!
//! A [`BlockProvider`] represents one nesting level. The root provider sits on a
//! [`Stream`]; child providers are created on an entered parent and do all of their
//! I/O through the parent, so every level enforces its own bounds.
//!
//! Positions reported by [`BlockProvider::tell`] are relative to the start of the
//! current payload.

use crate::engine::Engine;
use crate::error::{TxdError, TxdResult};
use crate::stream::Stream;
use crate::version::LibraryVersion;
use std::io::{self, SeekFrom};

/// Size of a chunk header in bytes.
pub const BLOCK_HEADER_SIZE: u32 = 12;

/// Whether a provider reads or writes blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockMode {
    /// Blocks are parsed from the stream.
    Read,
    /// Blocks are emitted into the stream.
    Write,
}

/// Origin of a [`BlockProvider::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekMode {
    /// From the start of the payload.
    Begin,
    /// From the current position.
    Current,
    /// From the end of the payload.
    End,
}

/// Decoded chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHeader {
    /// Chunk type id.
    pub id: u32,
    /// Payload length in bytes.
    pub length: u32,
    /// Library version of the chunk.
    pub version: LibraryVersion,
}

impl BlockHeader {
    fn to_bytes(self) -> [u8; 12] {
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&self.id.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.length.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.version.pack().to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: [u8; 12]) -> Self {
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Self {
            id: word(0),
            length: word(4),
            version: LibraryVersion::unpack(word(8)),
        }
    }
}

/// Positioned byte I/O a child provider performs through its parent.
///
/// Positions are in the coordinate space of the implementor: the payload of the
/// entered block for a [`BlockProvider`], or the raw stream for the root.
pub trait BlockIo {
    /// Reads exactly `buffer.len()` bytes at the current position.
    fn io_read(&mut self, buffer: &mut [u8]) -> TxdResult<()>;
    /// Writes all of `buffer` at the current position.
    fn io_write(&mut self, buffer: &[u8]) -> TxdResult<()>;
    /// Moves to an absolute position.
    fn io_seek(&mut self, position: i64) -> TxdResult<()>;
    /// Current position.
    fn io_tell(&mut self) -> TxdResult<i64>;
    /// Number of addressable bytes, if known.
    fn io_size(&mut self) -> Option<i64>;
    /// Maps a position to an absolute offset in the root stream.
    fn io_absolute(&mut self, position: i64) -> i64;
}

enum Backend<'a> {
    Stream(&'a mut dyn Stream),
    Parent(&'a mut dyn BlockIo),
}

fn map_stream_error(error: io::Error, needed: usize) -> TxdError {
    if error.kind() == io::ErrorKind::UnexpectedEof {
        TxdError::StreamUnderrun { needed }
    } else {
        TxdError::Io(error)
    }
}

impl Backend<'_> {
    fn read(&mut self, buffer: &mut [u8]) -> TxdResult<()> {
        match self {
            Backend::Stream(stream) => stream
                .read_exact(buffer)
                .map_err(|error| map_stream_error(error, buffer.len())),
            Backend::Parent(parent) => parent.io_read(buffer),
        }
    }

    fn write(&mut self, buffer: &[u8]) -> TxdResult<()> {
        match self {
            Backend::Stream(stream) => Ok(stream.write_all(buffer)?),
            Backend::Parent(parent) => parent.io_write(buffer),
        }
    }

    fn seek(&mut self, position: i64) -> TxdResult<()> {
        match self {
            Backend::Stream(stream) => {
                let position = u64::try_from(position).map_err(|_| {
                    TxdError::access_violation(format!("seek to negative stream offset {position}"))
                })?;
                stream.seek(SeekFrom::Start(position))?;
                Ok(())
            }
            Backend::Parent(parent) => parent.io_seek(position),
        }
    }

    fn tell(&mut self) -> TxdResult<i64> {
        match self {
            Backend::Stream(stream) => Ok(stream.stream_position()? as i64),
            Backend::Parent(parent) => parent.io_tell(),
        }
    }

    fn size(&mut self) -> Option<i64> {
        match self {
            Backend::Stream(stream) => stream.size().ok().map(|size| size as i64),
            Backend::Parent(parent) => parent.io_size(),
        }
    }

    fn absolute(&mut self, position: i64) -> i64 {
        match self {
            Backend::Stream(_) => position,
            Backend::Parent(parent) => parent.io_absolute(position),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BlockContext {
    header: BlockHeader,
    /// Start of the payload in backend coordinates.
    offset: i64,
    /// Position inside the payload.
    cursor: i64,
}

/// One level of nested chunk framing.
pub struct BlockProvider<'a> {
    engine: &'a Engine,
    backend: Backend<'a>,
    mode: BlockMode,
    context: Option<BlockContext>,
    pending_id: u32,
    pending_version: LibraryVersion,
    lenient: bool,
    ignore_block_regions: bool,
    is_root: bool,
}

impl<'a> BlockProvider<'a> {
    /// Creates the root provider on a stream.
    ///
    /// Lenient truncation and region checks are taken from the engine configuration.
    pub fn new(engine: &'a Engine, stream: &'a mut dyn Stream, mode: BlockMode) -> Self {
        let config = engine.config();
        Self {
            engine,
            backend: Backend::Stream(stream),
            mode,
            context: None,
            pending_id: 0,
            pending_version: config.version,
            lenient: config.lenient_block_acquisition,
            ignore_block_regions: config.ignore_block_regions,
            is_root: true,
        }
    }

    /// Creates a provider for a block nested in `parent`'s current block.
    ///
    /// The child inherits mode, lenient mode and region checking, and writes with
    /// the parent's version unless [`BlockProvider::set_block_version`] is called.
    pub fn new_child(parent: &'a mut BlockProvider<'_>) -> Self {
        let engine = parent.engine;
        let mode = parent.mode;
        let lenient = parent.lenient;
        let ignore_block_regions = parent.ignore_block_regions;
        let pending_version = parent.block_version();
        Self {
            engine,
            backend: Backend::Parent(parent),
            mode,
            context: None,
            pending_id: 0,
            pending_version,
            lenient,
            ignore_block_regions,
            is_root: false,
        }
    }

    /// Engine this provider reports warnings to.
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Read or write mode.
    pub fn mode(&self) -> BlockMode {
        self.mode
    }

    /// Whether this provider sits directly on the stream.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Whether a block is currently entered.
    pub fn in_context(&self) -> bool {
        self.context.is_some()
    }

    /// Overrides lenient truncation for this provider and children created later.
    pub fn set_lenient(&mut self, lenient: bool) {
        self.lenient = lenient;
    }

    /// Whether lenient truncation is active.
    pub fn is_lenient(&self) -> bool {
        self.lenient
    }

    /// Disables read bounds checks for this provider and children created later.
    pub fn set_ignore_block_regions(&mut self, ignore: bool) {
        self.ignore_block_regions = ignore;
    }

    /// Whether read bounds checks are disabled.
    pub fn ignores_block_regions(&self) -> bool {
        self.ignore_block_regions
    }

    /// Chunk id used by the next [`BlockProvider::enter_context`] in write mode.
    pub fn set_block_id(&mut self, id: u32) {
        self.pending_id = id;
    }

    /// Version used by the next [`BlockProvider::enter_context`] in write mode.
    pub fn set_block_version(&mut self, version: LibraryVersion) {
        self.pending_version = version;
    }

    /// Id of the entered block, or the pending id.
    pub fn block_id(&self) -> u32 {
        self.context
            .map(|context| context.header.id)
            .unwrap_or(self.pending_id)
    }

    /// Version of the entered block, or the pending version.
    pub fn block_version(&self) -> LibraryVersion {
        self.context
            .map(|context| context.header.version)
            .unwrap_or(self.pending_version)
    }

    /// Payload length of the entered block (bytes written so far in write mode).
    pub fn block_length(&self) -> u32 {
        self.context
            .map(|context| context.header.length)
            .unwrap_or(0)
    }

    /// Header of the entered block.
    pub fn header(&self) -> Option<BlockHeader> {
        self.context.map(|context| context.header)
    }

    fn context(&self) -> TxdResult<&BlockContext> {
        self.context
            .as_ref()
            .ok_or_else(|| TxdError::structural("no block context entered"))
    }

    fn context_mut(&mut self) -> TxdResult<&mut BlockContext> {
        self.context
            .as_mut()
            .ok_or_else(|| TxdError::structural("no block context entered"))
    }

    /// Enters a block.
    ///
    /// Reading parses the header at the current position. Writing reserves the
    /// header, which is emitted by [`BlockProvider::leave_context`].
    ///
    /// # Errors
    ///
    /// - [`TxdError::Structural`] if a block is already entered
    /// - [`TxdError::BlockTruncation`] if the declared length exceeds the remaining
    ///   bytes, unless lenient mode is on and this is the root provider
    pub fn enter_context(&mut self) -> TxdResult<BlockHeader> {
        if self.context.is_some() {
            return Err(TxdError::structural(
                "block context entered twice without leaving",
            ));
        }

        match self.mode {
            BlockMode::Read => self.enter_read(),
            BlockMode::Write => {
                let start = self.backend.tell()?;
                self.backend.write(&[0u8; BLOCK_HEADER_SIZE as usize])?;
                let header = BlockHeader {
                    id: self.pending_id,
                    length: 0,
                    version: self.pending_version,
                };
                self.context = Some(BlockContext {
                    header,
                    offset: start + BLOCK_HEADER_SIZE as i64,
                    cursor: 0,
                });
                Ok(header)
            }
        }
    }

    fn enter_read(&mut self) -> TxdResult<BlockHeader> {
        let mut raw = [0u8; BLOCK_HEADER_SIZE as usize];
        self.backend.read(&mut raw)?;
        let mut header = BlockHeader::from_bytes(raw);
        let offset = self.backend.tell()?;

        if let Some(size) = self.backend.size() {
            let available = (size - offset).max(0) as u64;
            if header.length as u64 > available {
                // Only the outermost block may be shorter than it claims.
                if !(self.lenient && self.is_root) {
                    return Err(TxdError::BlockTruncation {
                        declared: header.length as u64,
                        available,
                    });
                }
                self.engine.push_warning(
                    1,
                    format!(
                        "block {:#x} declares {} bytes but only {} are available; truncated",
                        header.id, header.length, available
                    ),
                );
                header.length = available as u32;
            }
        }

        log::trace!(
            target: "rwtxd",
            "entered block {:#x} ({} bytes, version {})",
            header.id,
            header.length,
            header.version
        );
        self.context = Some(BlockContext {
            header,
            offset,
            cursor: 0,
        });
        Ok(header)
    }

    /// Enters a block and fails unless it has the expected id.
    pub fn enter_expected(&mut self, id: u32) -> TxdResult<BlockHeader> {
        let header = self.enter_context()?;
        if header.id != id {
            if let Err(error) = self.leave_context() {
                log::debug!(target: "rwtxd", "leaving mismatched block {:#x} failed: {error}", header.id);
            }
            return Err(TxdError::structural(format!(
                "expected block {id:#x}, found {:#x}",
                header.id
            )));
        }
        Ok(header)
    }

    /// Leaves the entered block and positions the parent behind it.
    ///
    /// In write mode the header is emitted with the final payload length.
    pub fn leave_context(&mut self) -> TxdResult<()> {
        let context = self
            .context
            .take()
            .ok_or_else(|| TxdError::structural("leaving a block that was never entered"))?;
        let end = context.offset + context.header.length as i64;

        if self.mode == BlockMode::Write {
            self.backend.seek(context.offset - BLOCK_HEADER_SIZE as i64)?;
            self.backend.write(&context.header.to_bytes())?;
        }
        self.backend.seek(end)
    }

    /// Reads the header at the current position without entering the block.
    pub fn peek_header(&mut self) -> TxdResult<BlockHeader> {
        let start = self.backend.tell()?;
        let mut raw = [0u8; BLOCK_HEADER_SIZE as usize];
        let result = self.backend.read(&mut raw);
        self.backend.seek(start)?;
        result.map(|_| BlockHeader::from_bytes(raw))
    }

    /// Runs `body` inside the block, leaving it even when `body` fails.
    pub fn scoped<R>(&mut self, body: impl FnOnce(&mut Self) -> TxdResult<R>) -> TxdResult<R> {
        self.enter_context()?;
        let result = body(self);
        let left = self.leave_context();
        let value = result?;
        left?;
        Ok(value)
    }

    /// Reads the next child block of `parent`.
    pub fn read_child<R>(
        parent: &mut BlockProvider<'_>,
        body: impl FnOnce(&mut BlockProvider<'_>) -> TxdResult<R>,
    ) -> TxdResult<R> {
        let mut child = BlockProvider::new_child(parent);
        child.scoped(|block| body(block))
    }

    /// Reads the next child block of `parent`, which must have the given id.
    pub fn read_expected_child<R>(
        parent: &mut BlockProvider<'_>,
        id: u32,
        body: impl FnOnce(&mut BlockProvider<'_>) -> TxdResult<R>,
    ) -> TxdResult<R> {
        let mut child = BlockProvider::new_child(parent);
        child.enter_expected(id)?;
        let result = body(&mut child);
        let left = child.leave_context();
        let value = result?;
        left?;
        Ok(value)
    }

    /// Writes a child block with the given id and the parent's version.
    pub fn write_child<R>(
        parent: &mut BlockProvider<'_>,
        id: u32,
        body: impl FnOnce(&mut BlockProvider<'_>) -> TxdResult<R>,
    ) -> TxdResult<R> {
        let version = parent.block_version();
        Self::write_child_versioned(parent, id, version, body)
    }

    /// Writes a child block with the given id and version.
    pub fn write_child_versioned<R>(
        parent: &mut BlockProvider<'_>,
        id: u32,
        version: LibraryVersion,
        body: impl FnOnce(&mut BlockProvider<'_>) -> TxdResult<R>,
    ) -> TxdResult<R> {
        let mut child = BlockProvider::new_child(parent);
        child.set_block_id(id);
        child.set_block_version(version);
        child.scoped(|block| body(block))
    }

    fn check_range(&self, context: &BlockContext, count: usize) -> TxdResult<()> {
        if self.ignore_block_regions {
            return Ok(());
        }
        let end = context.cursor + count as i64;
        if context.cursor < 0 || end > context.header.length as i64 {
            return Err(TxdError::access_violation(format!(
                "access of {count} bytes at {} exceeds block {:#x} of {} bytes",
                context.cursor, context.header.id, context.header.length
            )));
        }
        Ok(())
    }

    /// Reads exactly `buffer.len()` bytes.
    ///
    /// # Errors
    ///
    /// - [`TxdError::BlockAccessViolation`] when leaving the block bounds
    /// - [`TxdError::StreamUnderrun`] when the stream ends early
    pub fn read(&mut self, buffer: &mut [u8]) -> TxdResult<()> {
        let context = *self.context()?;
        if self.mode != BlockMode::Read {
            return Err(TxdError::access_violation("read from a block in write mode"));
        }
        self.check_range(&context, buffer.len())?;
        self.backend.seek(context.offset + context.cursor)?;
        self.backend.read(buffer)?;
        self.context_mut()?.cursor += buffer.len() as i64;
        Ok(())
    }

    /// Writes all of `buffer`, extending the block length when writing past its end.
    pub fn write(&mut self, buffer: &[u8]) -> TxdResult<()> {
        let context = *self.context()?;
        if self.mode != BlockMode::Write {
            return Err(TxdError::access_violation("write to a block in read mode"));
        }
        if context.cursor < 0 {
            return Err(TxdError::access_violation("write before the start of the block"));
        }
        self.backend.seek(context.offset + context.cursor)?;
        self.backend.write(buffer)?;

        let context = self.context_mut()?;
        context.cursor += buffer.len() as i64;
        let end = u32::try_from(context.cursor)
            .map_err(|_| TxdError::access_violation("block length exceeds 4 GiB"))?;
        context.header.length = context.header.length.max(end);
        Ok(())
    }

    /// Moves the cursor.
    pub fn seek(&mut self, offset: i64, mode: SeekMode) -> TxdResult<()> {
        let context = *self.context()?;
        let target = match mode {
            SeekMode::Begin => offset,
            SeekMode::Current => context.cursor + offset,
            SeekMode::End => context.header.length as i64 + offset,
        };
        if target < 0 {
            return Err(TxdError::access_violation(format!(
                "seek to {target} before the start of block {:#x}",
                context.header.id
            )));
        }
        self.backend.seek(context.offset + target)?;
        self.context_mut()?.cursor = target;
        Ok(())
    }

    /// Skips `count` bytes, which must lie inside the block when reading.
    pub fn skip(&mut self, count: u64) -> TxdResult<()> {
        if self.mode == BlockMode::Read {
            self.check_read_ahead(count)?;
        }
        self.seek(count as i64, SeekMode::Current)
    }

    /// Cursor position relative to the start of the payload.
    pub fn tell(&self) -> i64 {
        self.context.map(|context| context.cursor).unwrap_or(0)
    }

    /// Cursor position as an absolute offset in the root stream.
    pub fn tell_absolute(&mut self) -> TxdResult<i64> {
        let context = *self.context()?;
        Ok(self.backend.absolute(context.offset + context.cursor))
    }

    /// Bytes between the cursor and the end of the payload.
    pub fn remaining(&self) -> u64 {
        self.context
            .map(|context| (context.header.length as i64 - context.cursor).max(0) as u64)
            .unwrap_or(0)
    }

    /// Fails unless `count` more bytes can be read.
    ///
    /// Used before allocating buffers for length fields read from the stream.
    pub fn check_read_ahead(&mut self, count: u64) -> TxdResult<()> {
        let context = *self.context()?;
        let count = usize::try_from(count)
            .map_err(|_| TxdError::access_violation("read ahead does not fit in memory"))?;
        self.check_range(&context, count)?;

        if let Some(size) = self.backend.size() {
            let end = context.offset + context.cursor + count as i64;
            if end > size {
                return Err(TxdError::StreamUnderrun { needed: count });
            }
        }
        Ok(())
    }

    /// Reads `count` bytes into a new buffer after checking that they exist.
    pub fn read_vec(&mut self, count: usize) -> TxdResult<Vec<u8>> {
        self.check_read_ahead(count as u64)?;
        let mut buffer = self.engine.allocate_pixels(count)?;
        self.read(&mut buffer)?;
        Ok(buffer)
    }

    /// Reads a fixed size array.
    pub fn read_array<const N: usize>(&mut self) -> TxdResult<[u8; N]> {
        let mut buffer = [0u8; N];
        self.read(&mut buffer)?;
        Ok(buffer)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> TxdResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16(&mut self) -> TxdResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> TxdResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&mut self) -> TxdResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Writes one byte.
    pub fn write_u8(&mut self, value: u8) -> TxdResult<()> {
        self.write(&[value])
    }

    /// Writes a little-endian `u16`.
    pub fn write_u16(&mut self, value: u16) -> TxdResult<()> {
        self.write(&value.to_le_bytes())
    }

    /// Writes a little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) -> TxdResult<()> {
        self.write(&value.to_le_bytes())
    }

    /// Writes a little-endian `u64`.
    pub fn write_u64(&mut self, value: u64) -> TxdResult<()> {
        self.write(&value.to_le_bytes())
    }

    /// Writes `count` zero bytes.
    pub fn write_zeros(&mut self, count: usize) -> TxdResult<()> {
        const ZEROS: [u8; 64] = [0; 64];
        let mut left = count;
        while left > 0 {
            let chunk = left.min(ZEROS.len());
            self.write(&ZEROS[..chunk])?;
            left -= chunk;
        }
        Ok(())
    }
}

impl BlockIo for BlockProvider<'_> {
    fn io_read(&mut self, buffer: &mut [u8]) -> TxdResult<()> {
        self.read(buffer)
    }

    fn io_write(&mut self, buffer: &[u8]) -> TxdResult<()> {
        self.write(buffer)
    }

    fn io_seek(&mut self, position: i64) -> TxdResult<()> {
        self.seek(position, SeekMode::Begin)
    }

    fn io_tell(&mut self) -> TxdResult<i64> {
        Ok(self.tell())
    }

    fn io_size(&mut self) -> Option<i64> {
        match (self.mode, self.context) {
            (BlockMode::Read, Some(context)) if !self.ignore_block_regions => {
                Some(context.header.length as i64)
            }
            _ => None,
        }
    }

    fn io_absolute(&mut self, position: i64) -> i64 {
        match self.context {
            Some(context) => self.backend.absolute(context.offset + position),
            None => self.backend.absolute(position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;
    use std::io::Cursor;

    const CHUNK_A: u32 = 0x0A;
    const CHUNK_B: u32 = 0x0B;

    fn write_nested(engine: &Engine, version: LibraryVersion) -> Vec<u8> {
        let mut stream = Cursor::new(Vec::new());
        let mut root = BlockProvider::new(engine, &mut stream, BlockMode::Write);
        root.set_block_id(CHUNK_A);
        root.set_block_version(version);
        root.scoped(|outer| {
            outer.write_u32(0x1122_3344)?;
            BlockProvider::write_child(outer, CHUNK_B, |inner| inner.write(&[1, 2, 3]))?;
            outer.write_u8(0xFF)
        })
        .unwrap();
        stream.into_inner()
    }

    #[test]
    fn nested_blocks_back_patch_lengths() {
        let engine = Engine::new();
        let version = LibraryVersion::new(3, 6, 0, 3);
        let bytes = write_nested(&engine, version);

        let packed = version.pack().to_le_bytes();
        let mut expected = vec![];
        expected.extend_from_slice(&CHUNK_A.to_le_bytes());
        expected.extend_from_slice(&(4u32 + 12 + 3 + 1).to_le_bytes());
        expected.extend_from_slice(&packed);
        expected.extend_from_slice(&0x1122_3344u32.to_le_bytes());
        expected.extend_from_slice(&CHUNK_B.to_le_bytes());
        expected.extend_from_slice(&3u32.to_le_bytes());
        expected.extend_from_slice(&packed);
        expected.extend_from_slice(&[1, 2, 3, 0xFF]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn nested_blocks_read_back() {
        let engine = Engine::new();
        let version = LibraryVersion::new(3, 4, 0, 3);
        let mut stream = Cursor::new(write_nested(&engine, version));

        let mut root = BlockProvider::new(&engine, &mut stream, BlockMode::Read);
        let header = root.enter_context().unwrap();
        assert_eq!((header.id, header.length, header.version), (CHUNK_A, 20, version));
        assert_eq!(root.read_u32().unwrap(), 0x1122_3344);
        let inner = BlockProvider::read_expected_child(&mut root, CHUNK_B, |inner| {
            assert_eq!(inner.block_version(), version);
            assert_eq!(inner.tell_absolute().unwrap(), 28);
            inner.read_vec(3)
        })
        .unwrap();
        assert_eq!(inner, vec![1, 2, 3]);
        assert_eq!(root.tell(), 19);
        assert_eq!(root.read_u8().unwrap(), 0xFF);
        root.leave_context().unwrap();
    }

    #[test]
    fn reads_outside_the_block_are_rejected() {
        let engine = Engine::new();
        let mut stream = Cursor::new(write_nested(&engine, LibraryVersion::default()));
        let mut root = BlockProvider::new(&engine, &mut stream, BlockMode::Read);
        root.enter_context().unwrap();
        root.seek(18, SeekMode::Begin).unwrap();
        assert!(matches!(
            root.read_u32(),
            Err(TxdError::BlockAccessViolation(_))
        ));
        assert!(root.check_read_ahead(21).is_err());
        assert!(root.skip(2).is_ok());
        assert!(root.skip(1).is_err());

        root.set_ignore_block_regions(true);
        root.seek(0, SeekMode::End).unwrap();
        // Only the stream bounds apply now.
        assert!(matches!(
            root.read_u8(),
            Err(TxdError::StreamUnderrun { .. })
        ));
    }

    #[test]
    fn entering_twice_is_rejected() {
        let engine = Engine::new();
        let mut stream = Cursor::new(write_nested(&engine, LibraryVersion::default()));
        let mut root = BlockProvider::new(&engine, &mut stream, BlockMode::Read);
        root.enter_context().unwrap();
        assert!(matches!(root.enter_context(), Err(TxdError::Structural(_))));
        root.leave_context().unwrap();
        assert!(root.leave_context().is_err());
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn truncated_root_block(#[case] lenient: bool) {
        let (engine, warnings) =
            recording_engine(EngineConfig::default().with_lenient_block_acquisition(lenient));
        let mut bytes = vec![];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&LibraryVersion::new(3, 7, 0, 2).with_build(0).pack().to_le_bytes());
        bytes.extend(0..40u8);
        assert_eq!(bytes.len(), 52);

        let mut stream = Cursor::new(bytes);
        let mut root = BlockProvider::new(&engine, &mut stream, BlockMode::Read);
        let result = root.enter_context();
        if lenient {
            assert_eq!(result.unwrap().length, 40);
            assert_eq!(warnings.len(), 1);
            assert_eq!(root.read_vec(40).unwrap(), (0..40u8).collect::<Vec<_>>());
            assert!(root.read_u8().is_err());
        } else {
            assert!(matches!(
                result,
                Err(TxdError::BlockTruncation {
                    declared: 100,
                    available: 40
                })
            ));
            assert!(warnings.is_empty());
        }
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn child_exceeding_parent_always_fails(#[case] lenient: bool) {
        let (engine, warnings) =
            recording_engine(EngineConfig::default().with_lenient_block_acquisition(lenient));
        let mut stream = Cursor::new(Vec::new());
        {
            let mut root = BlockProvider::new(&engine, &mut stream, BlockMode::Write);
            root.set_block_id(CHUNK_A);
            root.scoped(|outer| {
                outer.write_u32(CHUNK_B)?;
                outer.write_u32(64)?; // child claims more than the parent holds
                outer.write_u32(LibraryVersion::default().pack())?;
                outer.write_u32(7)
            })
            .unwrap();
        }

        let bytes = stream.into_inner();
        let mut stream = Cursor::new(bytes);
        let mut root = BlockProvider::new(&engine, &mut stream, BlockMode::Read);
        assert_eq!(root.is_lenient(), lenient);
        root.enter_context().unwrap();
        let mut child = BlockProvider::new_child(&mut root);
        assert!(child.is_lenient() == lenient && !child.is_root());
        assert!(matches!(
            child.enter_context(),
            Err(TxdError::BlockTruncation { declared: 64, available: 4 })
        ));
        assert!(warnings.is_empty());
    }

    #[test]
    fn peek_does_not_move() {
        let engine = Engine::new();
        let mut stream = Cursor::new(write_nested(&engine, LibraryVersion::default()));
        let mut root = BlockProvider::new(&engine, &mut stream, BlockMode::Read);
        assert_eq!(root.peek_header().unwrap().id, CHUNK_A);
        assert_eq!(root.enter_context().unwrap().id, CHUNK_A);
        assert!(matches!(
            BlockProvider::read_expected_child(&mut root, CHUNK_A, |_| Ok(())),
            Err(TxdError::Structural(_))
        ));
    }
}
