//! Pull-based sample stream engine
//!
//! A stream is a lazy, possibly infinite sequence of `f32` samples, mono or
//! complex-interleaved. The variant set is closed: two sources that generate
//! or replay samples ([`SineStream`], [`ArrayStream`]), one source that
//! decodes blocks out of a store ([`StoreReaderStream`]), and two combinators
//! that own and transform parent streams ([`MultiplyStream`], [`FirStream`]).
//!
//! The shared contract:
//! - `read(out) -> produced` may return fewer samples than requested;
//! - `seek(offset)` repositions and refills internal state;
//! - `is_eos()` is sticky once a producer is permanently exhausted and stays
//!   set until the next seek.
//!
//! Combinators own their parents, so dropping the top of a pipeline releases
//! the whole chain, including any store handles held by readers.

mod array;
mod errors;
mod fir;
mod multiply;
mod osc;
mod pipeline;
mod reader;

pub use array::ArrayStream;
pub use errors::{StreamError, StreamResult};
pub use fir::FirStream;
pub use multiply::MultiplyStream;
pub use osc::SineStream;
pub use pipeline::{build_pipeline, LayerSpec};
pub use reader::StoreReaderStream;

/// Working buffer length of the combinator streams, in floats.
pub const STREAM_BUFFER_LEN: usize = 2048;

/// A stream of `f32` samples; one variant per stream kind.
pub enum Stream {
    StoreReader(StoreReaderStream),
    Sine(SineStream),
    Array(ArrayStream),
    Multiply(Box<MultiplyStream>),
    Fir(Box<FirStream>),
}

impl Stream {
    /// Pulls up to `out.len()` samples, returning how many were produced.
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        match self {
            Stream::StoreReader(s) => s.read(out),
            Stream::Sine(s) => s.read(out),
            Stream::Array(s) => s.read(out),
            Stream::Multiply(s) => s.read(out),
            Stream::Fir(s) => s.read(out),
        }
    }

    /// Repositions the stream and refills internal buffers.
    ///
    /// For store readers the offset is relative to their start block; sources
    /// treat it as a sample-pair counter; combinators forward it.
    pub fn seek(&mut self, offset: u32) {
        match self {
            Stream::StoreReader(s) => s.seek(offset),
            Stream::Sine(s) => s.seek(offset),
            Stream::Array(s) => s.seek(offset),
            Stream::Multiply(s) => s.seek(offset),
            Stream::Fir(s) => s.seek(offset),
        }
    }

    /// True once the stream is permanently exhausted; cleared by `seek`.
    pub fn is_eos(&self) -> bool {
        match self {
            Stream::StoreReader(s) => s.is_eos(),
            Stream::Sine(_) | Stream::Array(_) => false,
            Stream::Multiply(s) => s.is_eos(),
            Stream::Fir(s) => s.is_eos(),
        }
    }

    /// Logical sample offset of this stream.
    pub fn position(&self) -> i64 {
        match self {
            Stream::StoreReader(s) => s.position(),
            Stream::Sine(s) => s.position(),
            Stream::Array(s) => s.position(),
            Stream::Multiply(s) => s.position(),
            Stream::Fir(s) => s.position(),
        }
    }
}

/// Drains `stream` until `out` is full or the stream hits end-of-stream,
/// zero-filling whatever could not be produced.
pub fn read_samples(stream: &mut Stream, out: &mut [f32]) {
    if stream.is_eos() {
        out.fill(0.0);
        return;
    }

    let mut filled = 0;
    while filled < out.len() {
        let r = stream.read(&mut out[filled..]);
        if r == 0 {
            break;
        }
        filled += r;
    }
    out[filled..].fill(0.0);
}
