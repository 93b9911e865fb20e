//! Block store engine
//!
//! A store is a bounded, zero-indexed ring of [`BLOCK_LEN`]-byte slots, held
//! either in a memory arena or in a random-access file. Writes stamp block
//! identity, magic and checksum; appends advance a monotonically increasing
//! write cursor whose modulo over the capacity picks the slot, so writing past
//! capacity silently overwrites the oldest data. There is no retention
//! guarantee beyond the ring size.
//!
//! Stores are shared as [`StoreHandle`]s: the registry holds one handle and
//! every attached reader stream clones it. The core is single-threaded, so the
//! handle is an `Rc<RefCell<..>>` rather than a lock.

mod errors;
pub mod persist;

pub use errors::{StoreError, StoreResult};
pub use persist::{load_store_list, save_store_list, FilePersister, StorePersister};

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::block::{Block, BLOCK_LEN, BLOCK_MAGIC};

/// Shared-ownership handle to a store.
///
/// A store counts as "in use" while anything besides its registry entry holds
/// a handle; deletion is refused in that state.
pub type StoreHandle = Rc<RefCell<Store>>;

/// Backing kind of a store, matching the persisted integer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum StoreKind {
    Memory = 0,
    File = 1,
}

impl StoreKind {
    /// Maps the persisted integer tag to a kind.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(StoreKind::Memory),
            1 => Some(StoreKind::File),
            _ => None,
        }
    }
}

/// Target of a block write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOffset {
    /// Write at the current write cursor and advance it on success.
    Append,
    /// Overwrite in place at the given offset; the cursor does not move.
    At(u32),
}

enum Backing {
    Memory(Vec<u8>),
    File { file: File, path: PathBuf },
}

/// A bounded ring of fixed-size blocks.
pub struct Store {
    block_count: u32,
    write_offset: u32,
    backing: Backing,
}

impl Store {
    /// Creates a memory-backed store of `block_count` zeroed slots.
    pub fn memory(block_count: u32) -> StoreResult<Store> {
        if block_count == 0 {
            return Err(StoreError::ZeroCapacity);
        }
        let len = block_count as usize * BLOCK_LEN;
        let mut arena = Vec::new();
        arena
            .try_reserve_exact(len)
            .map_err(|_| StoreError::OutOfMemory {
                blocks: block_count,
            })?;
        arena.resize(len, 0);

        Ok(Store {
            block_count,
            write_offset: 0,
            backing: Backing::Memory(arena),
        })
    }

    /// Opens a file-backed store.
    ///
    /// With `initialize` the file is created or truncated; otherwise an
    /// existing file is opened for read/write without truncation.
    pub fn file(path: &Path, block_count: u32, initialize: bool) -> StoreResult<Store> {
        if block_count == 0 {
            return Err(StoreError::ZeroCapacity);
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(initialize)
            .truncate(initialize)
            .open(path)
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Store {
            block_count,
            write_offset: 0,
            backing: Backing::File {
                file,
                path: path.to_path_buf(),
            },
        })
    }

    /// Number of slots in the ring. Immutable after creation.
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Current append cursor. Monotonic; the slot is its modulo over capacity.
    pub fn write_offset(&self) -> u32 {
        self.write_offset
    }

    /// Restores a persisted append cursor.
    pub fn set_write_offset(&mut self, offset: u32) {
        self.write_offset = offset;
    }

    /// Backing kind of this store.
    pub fn kind(&self) -> StoreKind {
        match self.backing {
            Backing::Memory(_) => StoreKind::Memory,
            Backing::File { .. } => StoreKind::File,
        }
    }

    /// Backing file path, for file stores.
    pub fn file_path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Memory(_) => None,
            Backing::File { path, .. } => Some(path),
        }
    }

    /// Reads the block at `offset % block_count`.
    ///
    /// Never-written memory slots read back as zero-filled blocks; a
    /// file-backed store whose slot was never written fails with a read error.
    pub fn read_block(&mut self, offset: u32) -> StoreResult<Block> {
        let slot = offset % self.block_count;

        match &mut self.backing {
            Backing::Memory(arena) => {
                let at = slot as usize * BLOCK_LEN;
                Ok(Block::from_bytes(&arena[at..at + BLOCK_LEN])?)
            }
            Backing::File { file, .. } => {
                file.seek(SeekFrom::Start(u64::from(slot) * BLOCK_LEN as u64))
                    .map_err(|source| StoreError::Seek {
                        offset: slot,
                        source,
                    })?;
                let mut bytes = vec![0u8; BLOCK_LEN];
                file.read_exact(&mut bytes)
                    .map_err(|source| StoreError::Read {
                        offset: slot,
                        source,
                    })?;
                Ok(Block::from_bytes(&bytes)?)
            }
        }
    }

    /// Writes a block and returns the resolved (unwrapped) offset.
    ///
    /// The block is stamped before writing: its id becomes the resolved
    /// offset, the magic is set, and the checksum is recomputed over
    /// `block_length` bytes. Appends advance the write cursor only after a
    /// successful write.
    pub fn write_block(&mut self, block: &mut Block, target: WriteOffset) -> StoreResult<u32> {
        let resolved = match target {
            WriteOffset::Append => self.write_offset,
            WriteOffset::At(offset) => offset,
        };

        block.header.block_id = resolved;
        block.header.magic = BLOCK_MAGIC;
        block.header.crc32 = 0;
        block.header.crc32 = block.compute_checksum();

        let slot = resolved % self.block_count;
        let bytes = block.to_bytes();

        match &mut self.backing {
            Backing::Memory(arena) => {
                let at = slot as usize * BLOCK_LEN;
                arena[at..at + BLOCK_LEN].copy_from_slice(&bytes);
            }
            Backing::File { file, .. } => {
                file.seek(SeekFrom::Start(u64::from(slot) * BLOCK_LEN as u64))
                    .map_err(|source| StoreError::Seek {
                        offset: slot,
                        source,
                    })?;
                file.write_all(&bytes).map_err(|source| StoreError::Write {
                    offset: slot,
                    source,
                })?;
            }
        }

        if matches!(target, WriteOffset::Append) {
            self.write_offset = self.write_offset.wrapping_add(1);
        }

        Ok(resolved)
    }

    /// Wraps the store in a shared handle.
    pub fn into_handle(self) -> StoreHandle {
        Rc::new(RefCell::new(self))
    }
}
