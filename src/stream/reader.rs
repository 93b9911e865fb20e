//! Store-backed block reader source

use crate::block::HEADER_LEN;
use crate::observability::Logger;
use crate::store::StoreHandle;

/// Decodes a window of blocks `[start_block, end_block)` out of a store into
/// a stream of `f32` samples.
///
/// Keeps one block's worth of decoded floats buffered. On buffer exhaustion
/// it advances to the next block; leaving the window, a failing store read,
/// a block whose stored id does not match the expected position, a missing
/// magic, or a `block_length` smaller than the header all clear the buffer
/// and set sticky end-of-stream.
pub struct StoreReaderStream {
    store: StoreHandle,
    start_block: u32,
    end_block: u32,
    current_block: u32,

    buffer: Vec<f32>,
    buffer_offset: usize,
    eos: bool,
    position: i64,
}

impl StoreReaderStream {
    /// Creates a reader over `[start_block, end_block)` and eagerly fills the
    /// first block. The reader holds a store handle for its whole lifetime,
    /// protecting the store from deletion.
    pub fn new(store: StoreHandle, start_block: u32, end_block: u32) -> Self {
        let mut reader = Self {
            store,
            start_block,
            end_block,
            current_block: start_block,
            buffer: Vec::new(),
            buffer_offset: 0,
            eos: false,
            position: 0,
        };
        reader.seek(0);
        reader
    }

    fn clear_buffer(&mut self) {
        self.eos = true;
        self.buffer.clear();
        self.buffer_offset = 0;
    }

    /// Decodes the next block of the window into the sample buffer, or sets
    /// end-of-stream when the window is exhausted or the block is unusable.
    fn fill_block(&mut self) {
        if self.current_block < self.start_block || self.current_block >= self.end_block {
            self.clear_buffer();
            return;
        }

        // Bind the result so the store borrow ends before the arms run.
        let result = self.store.borrow_mut().read_block(self.current_block);
        let block = match result {
            Ok(block) => block,
            Err(e) => {
                Logger::warn(
                    "STORE_READ_FAILED",
                    &[
                        ("block", &self.current_block.to_string()),
                        ("error", &e.to_string()),
                    ],
                );
                self.clear_buffer();
                return;
            }
        };

        let header = &block.header;
        if header.validate_magic().is_err()
            || header.block_id != self.current_block
            || usize::from(header.block_length) < HEADER_LEN
        {
            self.clear_buffer();
            return;
        }

        match block.decode_samples() {
            Ok(samples) => {
                self.buffer = samples;
                self.buffer_offset = 0;
                self.current_block += 1;
            }
            Err(_) => self.clear_buffer(),
        }
    }

    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let mut produced = 0;

        while !self.eos && produced < out.len() {
            let available = self.buffer.len() - self.buffer_offset;
            let to_copy = available.min(out.len() - produced);
            if to_copy > 0 {
                out[produced..produced + to_copy]
                    .copy_from_slice(&self.buffer[self.buffer_offset..self.buffer_offset + to_copy]);
                produced += to_copy;
                self.buffer_offset += to_copy;
            }

            if self.buffer_offset == self.buffer.len() {
                self.fill_block();
            }
        }

        self.position += produced as i64;
        produced
    }

    /// Repositions to `start_block + offset`, clears end-of-stream and
    /// eagerly refills.
    pub fn seek(&mut self, offset: u32) {
        self.current_block = self.start_block.saturating_add(offset);
        self.eos = false;
        self.position = 0;
        self.fill_block();
    }

    pub fn is_eos(&self) -> bool {
        self.eos
    }

    pub fn position(&self) -> i64 {
        self.position
    }
}
