//! Stream engine error types

use thiserror::Error;

/// Result type for stream composition.
pub type StreamResult<T> = Result<T, StreamError>;

/// Stream composition errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("cannot create a stream without any layers")]
    EmptyPipeline,

    #[error("first layer must be a source: store reader, oscillator or array")]
    FirstLayerNotSource,

    #[error("source layers may only appear as the first layer")]
    MisplacedSource,

    #[error("store '{path}/{name}' does not exist")]
    StoreNotFound { name: String, path: String },

    #[error("invalid FIR taps: {0}")]
    InvalidTaps(String),
}
