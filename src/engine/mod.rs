//! Engine API
//!
//! The [`Engine`] is the single entry point a transport layer drives: it owns
//! the store and stream registries and exposes one method per request kind.
//! All state is explicit; there are no process-global registries, so multiple
//! engines can coexist in one process (and in tests).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::Block;
use crate::observability::Logger;
use crate::registry::{RegistryError, StoreRegistry, StreamRegistry};
use crate::store::{
    load_store_list, Store, StoreError, StoreKind, StorePersister, WriteOffset,
};
use crate::stream::{build_pipeline, read_samples, LayerSpec, StreamError};

/// Most entries a single list request returns before truncation is flagged.
pub const LIST_CAP: usize = 64;
/// Largest chunk a stream read hands back at once, in samples.
pub const READ_CHUNK_SAMPLES: usize = 4096;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors: each layer's failures, plus request validation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Snapshot of a registered store's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    pub name: String,
    pub path: String,
    pub kind: StoreKind,
    pub block_count: u32,
    pub write_offset: u32,
    pub file_path: Option<String>,
}

/// Snapshot of a registered stream's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    pub path: String,
}

/// One chunk of a stream read.
///
/// Chunks are always full-length for the request; samples the stream could not
/// produce are zero. `eos` marks the last chunk the stream will ever produce
/// until its next seek.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub samples: Vec<f32>,
    pub eos: bool,
}

/// The engine context: a store directory and a stream directory.
#[derive(Default)]
pub struct Engine {
    stores: StoreRegistry,
    streams: StreamRegistry,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the store directory, for persistence snapshots.
    pub fn stores(&self) -> &StoreRegistry {
        &self.stores
    }

    /// Restores the store directory from a persisted list file.
    pub fn load_stores(&mut self, list_path: &Path) -> EngineResult<()> {
        load_store_list(list_path, &mut self.stores)?;
        Logger::info(
            "STORE_LIST_LOADED",
            &[
                ("file", &list_path.display().to_string()),
                ("stores", &self.stores.len().to_string()),
            ],
        );
        Ok(())
    }

    /// Creates and registers a store.
    ///
    /// File-backed stores require `file_path` and initialize (truncate) the
    /// backing file. The duplicate check runs before any resource is created.
    pub fn create_store(
        &mut self,
        name: &str,
        path: &str,
        kind: StoreKind,
        block_count: u32,
        file_path: Option<&Path>,
    ) -> EngineResult<StoreDescriptor> {
        if self.stores.find(name, path).is_some() {
            return Err(RegistryError::AlreadyExists {
                name: name.to_string(),
                path: path.to_string(),
            }
            .into());
        }

        let store = match kind {
            StoreKind::Memory => Store::memory(block_count)?,
            StoreKind::File => {
                let file_path = file_path.ok_or_else(|| {
                    EngineError::InvalidRequest("file store requires a file path".into())
                })?;
                Store::file(file_path, block_count, true)?
            }
        };

        let descriptor = describe_store(name, path, &store);
        self.stores.add(name, path, store.into_handle())?;
        Logger::info(
            "STORE_CREATED",
            &[
                ("name", name),
                ("path", path),
                ("blocks", &block_count.to_string()),
            ],
        );
        Ok(descriptor)
    }

    /// Lists stores under a path prefix, up to [`LIST_CAP`] entries.
    pub fn list_stores(&self, prefix: &str) -> (Vec<StoreDescriptor>, bool) {
        let (entries, truncated) = self.stores.list(prefix, LIST_CAP);
        let descriptors = entries
            .into_iter()
            .map(|(name, path, handle)| describe_store(name, path, &handle.borrow()))
            .collect();
        (descriptors, truncated)
    }

    /// Deletes a store; refused while any stream still reads from it.
    pub fn delete_store(&mut self, name: &str, path: &str) -> EngineResult<()> {
        self.stores.remove_store(name, path)?;
        Logger::info("STORE_DELETED", &[("name", name), ("path", path)]);
        Ok(())
    }

    /// Writes one block into a store, returning the resolved offset.
    pub fn write_block(
        &mut self,
        name: &str,
        path: &str,
        block: &mut Block,
        target: WriteOffset,
    ) -> EngineResult<u32> {
        let handle = self.stores.find(name, path).ok_or_else(|| {
            RegistryError::NotFound {
                name: name.to_string(),
                path: path.to_string(),
            }
        })?;
        Ok(handle.borrow_mut().write_block(block, target)?)
    }

    /// Reads `count` consecutive blocks starting at `start`.
    ///
    /// Stops at the first failing block and reports it; blocks read before the
    /// failure are discarded.
    pub fn read_blocks(
        &mut self,
        name: &str,
        path: &str,
        start: u32,
        count: u32,
    ) -> EngineResult<Vec<Block>> {
        if count == 0 {
            return Err(EngineError::InvalidRequest(
                "block read count must be positive".into(),
            ));
        }
        let handle = self.stores.find(name, path).ok_or_else(|| {
            RegistryError::NotFound {
                name: name.to_string(),
                path: path.to_string(),
            }
        })?;

        let mut store = handle.borrow_mut();
        let mut blocks = Vec::with_capacity(count as usize);
        for i in 0..count {
            blocks.push(store.read_block(start.wrapping_add(i))?);
        }
        Ok(blocks)
    }

    /// Persists the store directory through the given collaborator.
    pub fn flush_stores(&self, persister: &mut dyn StorePersister) -> EngineResult<()> {
        persister.persist(&self.stores)?;
        Logger::info(
            "STORE_LIST_FLUSHED",
            &[("stores", &self.stores.len().to_string())],
        );
        Ok(())
    }

    /// Builds a pipeline from `layers` and registers it under (name, path).
    ///
    /// The duplicate check runs first so a name clash never constructs (and
    /// immediately releases) a pipeline. The built pipeline starts at
    /// offset 0.
    pub fn create_stream(
        &mut self,
        name: &str,
        path: &str,
        layers: &[LayerSpec],
    ) -> EngineResult<StreamDescriptor> {
        if self.streams.find(name, path).is_some() {
            return Err(RegistryError::AlreadyExists {
                name: name.to_string(),
                path: path.to_string(),
            }
            .into());
        }

        let stream = build_pipeline(layers, &self.stores)?;
        self.streams.add(name, path, stream)?;
        Logger::info(
            "STREAM_CREATED",
            &[
                ("layers", &layers.len().to_string()),
                ("name", name),
                ("path", path),
            ],
        );
        Ok(StreamDescriptor {
            name: name.to_string(),
            path: path.to_string(),
        })
    }

    /// Pulls `sample_count` samples from a stream as zero-padded chunks of at
    /// most [`READ_CHUNK_SAMPLES`], stopping early once the stream ends.
    pub fn read_stream(
        &mut self,
        name: &str,
        path: &str,
        sample_count: usize,
    ) -> EngineResult<Vec<StreamChunk>> {
        let stream = self.streams.find_mut(name, path).ok_or_else(|| {
            RegistryError::NotFound {
                name: name.to_string(),
                path: path.to_string(),
            }
        })?;

        let mut chunks = Vec::new();
        let mut remaining = sample_count;
        while remaining > 0 {
            let len = remaining.min(READ_CHUNK_SAMPLES);
            let mut samples = vec![0.0f32; len];
            read_samples(stream, &mut samples);
            let eos = stream.is_eos();
            chunks.push(StreamChunk { samples, eos });
            if eos {
                break;
            }
            remaining -= len;
        }
        Ok(chunks)
    }

    /// Repositions a stream to a block offset relative to its start.
    pub fn seek_stream(&mut self, name: &str, path: &str, offset: u32) -> EngineResult<()> {
        let stream = self.streams.find_mut(name, path).ok_or_else(|| {
            RegistryError::NotFound {
                name: name.to_string(),
                path: path.to_string(),
            }
        })?;
        stream.seek(offset);
        Ok(())
    }

    /// Closes a stream, releasing its pipeline and any store handles it held.
    pub fn close_stream(&mut self, name: &str, path: &str) -> EngineResult<()> {
        self.streams.remove(name, path)?;
        Logger::info("STREAM_CLOSED", &[("name", name), ("path", path)]);
        Ok(())
    }

    /// Lists streams under a path prefix, up to [`LIST_CAP`] entries.
    pub fn list_streams(&self, prefix: &str) -> (Vec<StreamDescriptor>, bool) {
        let (entries, truncated) = self.streams.list(prefix, LIST_CAP);
        let descriptors = entries
            .into_iter()
            .map(|(name, path, _)| StreamDescriptor {
                name: name.to_string(),
                path: path.to_string(),
            })
            .collect();
        (descriptors, truncated)
    }
}

fn describe_store(name: &str, path: &str, store: &Store) -> StoreDescriptor {
    StoreDescriptor {
        name: name.to_string(),
        path: path.to_string(),
        kind: store.kind(),
        block_count: store.block_count(),
        write_offset: store.write_offset(),
        file_path: store.file_path().map(|p| p.display().to_string()),
    }
}
