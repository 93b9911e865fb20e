//! Fixed in-memory array source

/// Replays a fixed `f32` sequence, zero-padding past its end.
///
/// Reads always report the full requested count and the stream never reaches
/// end-of-stream: running off the end is padding, not exhaustion. Mostly used
/// for testing and for injecting precomputed sample sequences.
pub struct ArrayStream {
    data: Vec<f32>,
    offset: i64,
}

impl ArrayStream {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data, offset: 0 }
    }

    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let remaining = (self.data.len() as i64 - self.offset).max(0) as usize;
        let within = remaining.min(out.len());

        // A seek may have landed past the end; the copy range must stay in
        // bounds even when nothing remains.
        let at = (self.offset as usize).min(self.data.len());
        out[..within].copy_from_slice(&self.data[at..at + within]);
        out[within..].fill(0.0);
        self.offset += within as i64;

        out.len()
    }

    pub fn seek(&mut self, offset: u32) {
        self.offset = i64::from(offset);
    }

    pub fn position(&self) -> i64 {
        self.offset
    }
}
