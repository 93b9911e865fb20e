//! Complex oscillator source

use std::f32::consts::TAU;

/// Generates an interleaved complex sine wave.
///
/// Phase is derived from an integer sample counter,
/// `phase_n = frac(frequency * n) * 2π + phase0`, so seeking is a pure
/// counter reset with no buffered state. Frequency is normalized
/// (cycles per complex sample); negative frequencies rotate the other way.
pub struct SineStream {
    phase: f32,
    frequency: f32,
    scale: f32,
    counter: i64,
}

impl SineStream {
    pub fn new(phase: f32, frequency: f32, scale: f32) -> Self {
        Self {
            phase,
            frequency,
            scale,
            counter: 0,
        }
    }

    /// Fills `out` with interleaved I/Q samples; always produces the full
    /// request (the oscillator never ends).
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        for pair in out.chunks_exact_mut(2) {
            let phase = (self.frequency * self.counter as f32).fract() * TAU + self.phase;
            pair[0] = phase.cos() * self.scale;
            pair[1] = phase.sin() * self.scale;
            self.counter += 1;
        }
        out.len()
    }

    pub fn seek(&mut self, offset: u32) {
        self.counter = i64::from(offset);
    }

    pub fn position(&self) -> i64 {
        self.counter
    }
}
