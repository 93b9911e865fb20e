//! Store engine error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::block::BlockError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store engine errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not open store file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("seek failed at block {offset}: {source}")]
    Seek {
        offset: u32,
        #[source]
        source: io::Error,
    },

    #[error("read failed at block {offset}: {source}")]
    Read {
        offset: u32,
        #[source]
        source: io::Error,
    },

    #[error("write failed at block {offset}: {source}")]
    Write {
        offset: u32,
        #[source]
        source: io::Error,
    },

    #[error("out of memory allocating a {blocks}-block store")]
    OutOfMemory { blocks: u32 },

    #[error("store must have at least one block")]
    ZeroCapacity,

    #[error("store list file not found: {path}")]
    ListNotFound { path: PathBuf },

    #[error("could not write store list {path}: {source}")]
    ListWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Block(#[from] BlockError),
}
