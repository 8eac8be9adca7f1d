//! # Extension Store
//!
//! Plugin data attached to a texture is kept as opaque chunks and written back
//! unchanged. Each chunk inside the extension block becomes one [`ExtensionEntry`].

use crate::block::BlockProvider;
use crate::chunks::CHUNK_EXTENSION;
use crate::error::{TxdError, TxdResult};
use crate::version::LibraryVersion;

/// One opaque plugin chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionEntry {
    /// Chunk id of the plugin.
    pub id: u32,
    /// Version the chunk was written with.
    pub version: LibraryVersion,
    /// Chunk payload.
    pub data: Vec<u8>,
}

/// Ordered list of plugin chunks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionStore {
    entries: Vec<ExtensionEntry>,
}

impl ExtensionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: ExtensionEntry) {
        self.entries.push(entry);
    }

    /// All entries in file order.
    pub fn entries(&self) -> &[ExtensionEntry] {
        &self.entries
    }

    /// Iterates over the entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtensionEntry> {
        self.entries.iter()
    }

    /// First entry with the given id.
    pub fn find(&self, id: u32) -> Option<&ExtensionEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Removes every entry with the given id, returning how many were removed.
    pub fn remove(&mut self, id: u32) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        before - self.entries.len()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Reads the extension block that follows in `parent` into `store`.
///
/// Once the extension block itself was entered, damaged plugin chunks fail the
/// texture only when `parent` is nested and region checks are off. Otherwise a
/// level 1 warning is emitted and the entries read so far are kept.
///
/// # Errors
///
/// [`TxdError::ExtensionParseFailure`] if the extension block is missing, or is
/// damaged inside a nested block read without region checks.
pub fn read_extensions(parent: &mut BlockProvider<'_>, store: &mut ExtensionStore) -> TxdResult<()> {
    let engine = parent.engine();
    let demote = parent.is_root() || !parent.ignores_block_regions();
    let mut block = BlockProvider::new_child(parent);
    block
        .enter_expected(CHUNK_EXTENSION)
        .map_err(|error| TxdError::ExtensionParseFailure(error.to_string()))?;

    let result = read_entries(&mut block, store);
    let left = block.leave_context();
    match result {
        Ok(()) => {}
        Err(error) if demote => {
            engine.push_warning(1, format!("damaged extension block: {error}"));
        }
        Err(error) => {
            if let Err(leave_error) = left {
                log::debug!(target: "rwtxd", "leaving damaged extension block failed: {leave_error}");
            }
            return Err(TxdError::ExtensionParseFailure(error.to_string()));
        }
    }
    left
}

fn read_entries(block: &mut BlockProvider<'_>, store: &mut ExtensionStore) -> TxdResult<()> {
    while block.remaining() > 0 {
        let entry = BlockProvider::read_child(block, |child| {
            let length = child.block_length() as usize;
            Ok(ExtensionEntry {
                id: child.block_id(),
                version: child.block_version(),
                data: child.read_vec(length)?,
            })
        })?;
        log::trace!(target: "rwtxd", "read extension {:#x} ({} bytes)", entry.id, entry.data.len());
        store.push(entry);
    }
    Ok(())
}

/// Writes `store` as an extension block child of `parent`.
pub fn write_extensions(parent: &mut BlockProvider<'_>, store: &ExtensionStore) -> TxdResult<()> {
    BlockProvider::write_child(parent, CHUNK_EXTENSION, |block| {
        for entry in store.iter() {
            BlockProvider::write_child_versioned(block, entry.id, entry.version, |child| {
                child.write(&entry.data)
            })?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockMode;
    use crate::chunks::CHUNK_STRUCT;
    use crate::test_prelude::*;
    use std::io::Cursor;

    fn write_store(engine: &Engine, store: &ExtensionStore) -> Vec<u8> {
        let mut stream = Cursor::new(Vec::new());
        let mut root = BlockProvider::new(engine, &mut stream, BlockMode::Write);
        root.set_block_id(CHUNK_STRUCT);
        root.scoped(|block| write_extensions(block, store)).unwrap();
        stream.into_inner()
    }

    fn read_store(engine: &Engine, bytes: Vec<u8>) -> TxdResult<ExtensionStore> {
        let mut stream = Cursor::new(bytes);
        let mut root = BlockProvider::new(engine, &mut stream, BlockMode::Read);
        let mut store = ExtensionStore::new();
        root.scoped(|block| read_extensions(block, &mut store))?;
        Ok(store)
    }

    #[test]
    fn unknown_extensions_round_trip() {
        let engine = Engine::new();
        let mut store = ExtensionStore::new();
        store.push(ExtensionEntry {
            id: 0xAAAA,
            version: LibraryVersion::default(),
            data: vec![1, 2, 3, 4],
        });
        store.push(ExtensionEntry {
            id: 0x0253_F2F3,
            version: LibraryVersion::new(3, 4, 0, 3),
            data: vec![],
        });

        let bytes = write_store(&engine, &store);
        assert_eq!(bytes.len(), 12 + 12 + 12 + 4 + 12);
        let read = read_store(&engine, bytes.clone()).unwrap();
        assert_eq!(read, store);
        assert_eq!(write_store(&engine, &read), bytes);
        assert_eq!(read.find(0xAAAA).map(|entry| entry.data.len()), Some(4));
    }

    /// Extension block holding one valid entry followed by 5 bytes of garbage.
    fn damaged_extension_block(engine: &Engine) -> Vec<u8> {
        let mut store = ExtensionStore::new();
        store.push(ExtensionEntry {
            id: 0xAAAA,
            version: LibraryVersion::default(),
            data: vec![9; 4],
        });
        let mut bytes = write_store(engine, &store);
        bytes.extend_from_slice(&[1, 2, 3, 4, 5]);
        let outer = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) + 5;
        bytes[4..8].copy_from_slice(&outer.to_le_bytes());
        let inner = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]) + 5;
        bytes[16..20].copy_from_slice(&inner.to_le_bytes());
        bytes
    }

    /// Wraps `bytes` in one more struct block so the extension owner is nested.
    fn nest(engine: &Engine, bytes: &[u8]) -> Vec<u8> {
        let mut stream = Cursor::new(Vec::new());
        let mut root = BlockProvider::new(engine, &mut stream, BlockMode::Write);
        root.set_block_id(CHUNK_STRUCT);
        root.scoped(|block| block.write(bytes)).unwrap();
        stream.into_inner()
    }

    fn read_nested_store(engine: &Engine, bytes: Vec<u8>) -> TxdResult<ExtensionStore> {
        let mut stream = Cursor::new(bytes);
        let mut root = BlockProvider::new(engine, &mut stream, BlockMode::Read);
        let mut store = ExtensionStore::new();
        root.scoped(|outer| {
            BlockProvider::read_child(outer, |owner| read_extensions(owner, &mut store))
        })?;
        Ok(store)
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn damaged_entries_under_the_root_are_demoted_to_a_warning(#[case] ignore_regions: bool) {
        let (engine, warnings) =
            recording_engine(EngineConfig::default().with_ignore_block_regions(ignore_regions));
        let bytes = damaged_extension_block(&engine);

        let read = read_store(&engine, bytes).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn damaged_entries_in_bounded_nested_blocks_are_demoted() {
        let (engine, warnings) = recording_engine(EngineConfig::default());
        let bytes = nest(&engine, &damaged_extension_block(&engine));

        let read = read_nested_store(&engine, bytes).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn damaged_entries_in_unbounded_nested_blocks_fail() {
        let (engine, warnings) =
            recording_engine(EngineConfig::default().with_ignore_block_regions(true));
        let bytes = nest(&engine, &damaged_extension_block(&engine));

        assert!(matches!(
            read_nested_store(&engine, bytes),
            Err(TxdError::ExtensionParseFailure(_))
        ));
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_extension_block_fails() {
        let engine = Engine::new();
        let mut stream = Cursor::new(Vec::new());
        {
            let mut root = BlockProvider::new(&engine, &mut stream, BlockMode::Write);
            root.set_block_id(CHUNK_STRUCT);
            root.scoped(|block| BlockProvider::write_child(block, CHUNK_STRUCT, |_| Ok(())))
                .unwrap();
        }
        assert!(matches!(
            read_store(&engine, stream.into_inner()),
            Err(TxdError::ExtensionParseFailure(_))
        ));
    }

    #[test]
    fn store_editing() {
        let mut store = ExtensionStore::new();
        for id in [1, 2, 1] {
            store.push(ExtensionEntry {
                id,
                version: LibraryVersion::default(),
                data: vec![],
            });
        }
        assert_eq!(store.remove(1), 2);
        assert_eq!(store.entries()[0].id, 2);
        store.clear();
        assert!(store.is_empty());
    }
}
