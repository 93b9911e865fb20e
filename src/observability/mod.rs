//! Structured logging
//!
//! One event per line, JSON-encoded, written synchronously. Keys are emitted
//! in a fixed order (`event`, `severity`, `ts`, then fields sorted by key) so
//! log output is grep- and diff-friendly.

mod logger;

pub use logger::{Logger, Severity};
