//! Complex element-wise multiplier

use super::{read_samples, Stream, STREAM_BUFFER_LEN};

/// Multiplies two parent streams element-wise as interleaved complex samples.
///
/// Owns both parents exclusively; dropping the multiplier drops the parents.
/// End-of-stream is reached once either parent is exhausted. Frequency
/// translation is this combinator with a unit-amplitude oscillator as the
/// second parent.
pub struct MultiplyStream {
    parent1: Stream,
    parent2: Stream,
    eos: bool,
    position: i64,
}

impl MultiplyStream {
    pub fn new(parent1: Stream, parent2: Stream) -> Self {
        let eos = parent1.is_eos() || parent2.is_eos();
        Self {
            parent1,
            parent2,
            eos,
            position: 0,
        }
    }

    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let mut a = [0.0f32; STREAM_BUFFER_LEN];
        let mut b = [0.0f32; STREAM_BUFFER_LEN];

        let mut produced = 0;
        while !self.eos && produced < out.len() {
            let to_read = (out.len() - produced).min(STREAM_BUFFER_LEN);
            read_samples(&mut self.parent1, &mut a[..to_read]);
            read_samples(&mut self.parent2, &mut b[..to_read]);

            for i in 0..to_read / 2 {
                let (ar, ai) = (a[2 * i], a[2 * i + 1]);
                let (br, bi) = (b[2 * i], b[2 * i + 1]);
                out[produced + 2 * i] = ar * br - ai * bi;
                out[produced + 2 * i + 1] = ar * bi + ai * br;
            }

            produced += to_read;
            self.eos = self.parent1.is_eos() || self.parent2.is_eos();
        }

        self.position += produced as i64;
        produced
    }

    /// Forwards the seek to both parents and recomputes end-of-stream.
    pub fn seek(&mut self, offset: u32) {
        self.parent1.seek(offset);
        self.parent2.seek(offset);
        self.eos = self.parent1.is_eos() || self.parent2.is_eos();
        self.position = 0;
    }

    pub fn is_eos(&self) -> bool {
        self.eos
    }

    pub fn position(&self) -> i64 {
        self.position
    }
}
