//! iqstore - ring-buffered sample block storage with composable stream pipelines
//!
//! The crate stores fixed-size blocks of RF/IQ or generic numeric telemetry in
//! bounded ring "stores" (in memory or file-backed) and serves derived sample
//! streams built from a small set of pull-based layers: store reader, complex
//! oscillator, array source, complex multiplier and FIR filter.
//!
//! The core is single-threaded and synchronous; wire transport and the
//! interactive shell are external collaborators that call into [`engine::Engine`].

pub mod block;
pub mod engine;
pub mod observability;
pub mod registry;
pub mod store;
pub mod stream;

pub use block::{Block, BlockHeader, BlockType, BLOCK_LEN, HEADER_LEN, PAYLOAD_LEN};
pub use engine::{Engine, EngineError, EngineResult};
pub use store::{Store, StoreHandle, StoreKind, WriteOffset};
pub use stream::{LayerSpec, Stream};
