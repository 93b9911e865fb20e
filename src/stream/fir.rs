//! FIR filter with overlap-save buffering

use super::{Stream, STREAM_BUFFER_LEN};

/// Applies a real or complex finite-impulse-response filter over its parent.
///
/// Uses overlap-save buffering: a fixed window of [`STREAM_BUFFER_LEN`]
/// floats is filled from the parent; when the filter cursor would run past
/// the tap window, the trailing overlap (`taps − 1` floats for real filters,
/// `taps − 2` for complex ones, i.e. one fewer complex sample than complex
/// taps) is copied to the head and the remainder refilled. Each output sample
/// is the dot product of the current window with the taps in reverse order
/// (true convolution, not correlation).
///
/// Parent exhaustion and output exhaustion are tracked separately: once the
/// parent stops producing, the filter keeps draining the valid part of its
/// window before reporting end-of-stream itself.
///
/// Complex taps are given as interleaved real/imaginary pairs.
pub struct FirStream {
    parent: Stream,
    taps: Vec<f32>,
    is_complex: bool,
    overlap: usize,

    buffer: Vec<f32>,
    /// Filter cursor into `buffer`, in floats.
    cursor: usize,
    /// Number of valid floats in `buffer`.
    data_offset: usize,

    /// The parent produced its last sample; the window may still hold data.
    parent_done: bool,
    /// This filter produced its last sample.
    eos: bool,
    position: i64,
}

impl FirStream {
    /// Wraps `parent` with a FIR filter. Tap validity (non-empty, within the
    /// window, even length for complex filters) is checked at pipeline
    /// construction.
    pub fn new(parent: Stream, taps: Vec<f32>, is_complex: bool) -> Self {
        let overlap = if is_complex {
            taps.len().saturating_sub(2)
        } else {
            taps.len().saturating_sub(1)
        };

        Self {
            parent,
            taps,
            is_complex,
            overlap,
            buffer: vec![0.0; STREAM_BUFFER_LEN],
            // Forces a fill before the first output.
            cursor: STREAM_BUFFER_LEN,
            data_offset: 0,
            parent_done: false,
            eos: false,
            position: 0,
        }
    }

    fn fill(&mut self) {
        while !self.parent_done && self.data_offset < STREAM_BUFFER_LEN {
            let r = self.parent.read(&mut self.buffer[self.data_offset..]);
            if r == 0 {
                self.parent_done = true;
                break;
            }
            self.data_offset += r;
        }
        // Stale floats past the valid region must not leak into the taps.
        self.buffer[self.data_offset..].fill(0.0);
    }

    /// Copies the trailing overlap to the head of the window and refills the
    /// rest from the parent.
    fn shift_and_read(&mut self) {
        self.buffer.copy_within(STREAM_BUFFER_LEN - self.overlap.., 0);
        self.data_offset = self.overlap;
        self.fill();
        self.cursor = 0;
    }

    /// True once the tap window has run past the last valid sample.
    fn drained(&self) -> bool {
        self.parent_done && self.cursor + self.taps.len() > self.data_offset
    }

    fn filter_real(&mut self) -> Option<f32> {
        if self.cursor + self.taps.len() > STREAM_BUFFER_LEN {
            self.shift_and_read();
        }
        if self.drained() {
            self.eos = true;
            return None;
        }

        let n = self.taps.len();
        let window = &self.buffer[self.cursor..self.cursor + n];
        let mut acc = 0.0;
        for (i, &x) in window.iter().enumerate() {
            acc += x * self.taps[n - 1 - i];
        }
        self.cursor += 1;
        Some(acc)
    }

    fn filter_complex(&mut self) -> Option<(f32, f32)> {
        if self.cursor + self.taps.len() > STREAM_BUFFER_LEN {
            self.shift_and_read();
        }
        if self.drained() {
            self.eos = true;
            return None;
        }

        let pairs = self.taps.len() / 2;
        let last = pairs - 1;
        let mut acc = (0.0f32, 0.0f32);
        for i in 0..pairs {
            let dr = self.buffer[self.cursor + 2 * i];
            let di = self.buffer[self.cursor + 2 * i + 1];
            let tr = self.taps[2 * (last - i)];
            let ti = self.taps[2 * (last - i) + 1];
            acc.0 += dr * tr - di * ti;
            acc.1 += dr * ti + di * tr;
        }
        self.cursor += 2;
        Some(acc)
    }

    pub fn read(&mut self, out: &mut [f32]) -> usize {
        if self.eos {
            return 0;
        }

        let mut produced = 0;
        if self.is_complex {
            while produced + 1 < out.len() {
                match self.filter_complex() {
                    Some((re, im)) => {
                        out[produced] = re;
                        out[produced + 1] = im;
                        produced += 2;
                    }
                    None => break,
                }
            }
        } else {
            while produced < out.len() {
                match self.filter_real() {
                    Some(sample) => {
                        out[produced] = sample;
                        produced += 1;
                    }
                    None => break,
                }
            }
        }

        self.position += produced as i64;
        produced
    }

    /// Forwards the seek to the parent and rebuilds the window from scratch:
    /// zeroed history, overlap-long prefix, fresh fill. A previous
    /// end-of-stream does not survive the seek.
    pub fn seek(&mut self, offset: u32) {
        self.parent.seek(offset);
        self.parent_done = self.parent.is_eos();
        self.eos = false;
        self.position = self.parent.position() - self.overlap as i64;

        self.buffer.fill(0.0);
        self.data_offset = self.overlap;
        self.shift_and_read();
    }

    pub fn is_eos(&self) -> bool {
        self.eos
    }

    pub fn position(&self) -> i64 {
        self.position
    }
}
