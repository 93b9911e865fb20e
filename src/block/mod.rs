//! Fixed-size sample block codec
//!
//! Every record in a store is exactly [`BLOCK_LEN`] bytes: a 128-byte packed
//! little-endian header followed by a typed sample payload.
//!
//! ```text
//! offset  size  field
//! 0       4     magic ("EyeQ" little-endian, 0x51657945)
//! 4       4     block id (position in the owning store)
//! 8       2     block type (sample encoding)
//! 10      2     block length in bytes (header + used payload, <= 16384)
//! 12      4     crc32 (computed with this field zeroed)
//! 16      4     timestamp seconds (first sample in the block)
//! 20      4     timestamp nanoseconds
//! 24      2     source id
//! 26      4     sample rate
//! 30      1     channel count (1 = real, 2 = interleaved I/Q)
//! 31      4     scale factor (f32, 0 means unscaled)
//! 35      4     center frequency (f32, Hz)
//! 39..128       reserved, zero
//! 128..16384    payload, reinterpreted per block type
//! ```
//!
//! The codec performs no sample conversion itself; decoding payload bytes to
//! `f32` is provided for the stream engine via [`Block::decode_samples`].

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Total size of one block record in bytes.
pub const BLOCK_LEN: usize = 16384;
/// Size of the packed block header in bytes.
pub const HEADER_LEN: usize = 128;
/// Payload capacity of one block in bytes.
pub const PAYLOAD_LEN: usize = BLOCK_LEN - HEADER_LEN;

/// Block magic: `struct.pack("<I", 0x51657945) == b"EyeQ"`.
pub const BLOCK_MAGIC: u32 = 0x5165_7945;

/// Result type for block codec operations.
pub type BlockResult<T> = Result<T, BlockError>;

/// Block codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("buffer too short for a block: {0} bytes")]
    ShortBuffer(usize),

    #[error("block length {0} exceeds record size")]
    LengthOutOfRange(u16),

    #[error("bad block magic: {0:#010x}")]
    BadMagic(u32),

    #[error("unknown block type: {0}")]
    UnknownBlockType(u16),

    #[error("checksum mismatch: computed {computed:#010x}, stored {stored:#010x}")]
    ChecksumMismatch { computed: u32, stored: u32 },
}

/// Sample encoding of a block payload.
///
/// Complex encodings use the same tags with samples interleaved as I/Q pairs;
/// the channel count in the header tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u16)]
pub enum BlockType {
    Bytes = 0,
    I8 = 1,
    I16 = 2,
    I32 = 3,
    F32 = 4,
    F64 = 5,
}

impl BlockType {
    /// Maps the on-disk tag to a block type.
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            0 => Some(BlockType::Bytes),
            1 => Some(BlockType::I8),
            2 => Some(BlockType::I16),
            3 => Some(BlockType::I32),
            4 => Some(BlockType::F32),
            5 => Some(BlockType::F64),
            _ => None,
        }
    }

    /// Size of one sample of this encoding, in bytes.
    pub fn sample_size(self) -> usize {
        match self {
            BlockType::Bytes | BlockType::I8 => 1,
            BlockType::I16 => 2,
            BlockType::I32 | BlockType::F32 => 4,
            BlockType::F64 => 8,
        }
    }
}

/// Packed block header, decoded form.
///
/// `block_type` is kept as the raw on-disk tag so that records written by
/// newer producers can still be read back byte-for-byte; [`BlockHeader::sample_type`]
/// resolves it to a known encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockHeader {
    pub magic: u32,
    pub block_id: u32,
    pub block_type: u16,
    pub block_length: u16,
    pub crc32: u32,
    pub timestamp_sec: u32,
    pub timestamp_nsec: u32,
    pub source_id: u16,
    pub sample_rate: u32,
    pub num_channels: u8,
    pub scale: f32,
    pub center_frequency: f32,
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            magic: BLOCK_MAGIC,
            block_id: 0,
            block_type: BlockType::Bytes as u16,
            block_length: HEADER_LEN as u16,
            crc32: 0,
            timestamp_sec: 0,
            timestamp_nsec: 0,
            source_id: 0,
            sample_rate: 0,
            num_channels: 1,
            scale: 0.0,
            center_frequency: 0.0,
        }
    }
}

impl BlockHeader {
    /// Resolves the raw block type tag to a known sample encoding.
    pub fn sample_type(&self) -> Option<BlockType> {
        BlockType::from_tag(self.block_type)
    }

    /// Scale factor to apply when converting samples; a stored scale of zero
    /// means unscaled.
    pub fn effective_scale(&self) -> f32 {
        if self.scale == 0.0 {
            1.0
        } else {
            self.scale
        }
    }

    /// Timestamp of the first sample in the block.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.timestamp_sec), self.timestamp_nsec)
    }

    /// Serializes the header into the first [`HEADER_LEN`] bytes of `out`.
    pub fn encode_into(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= HEADER_LEN);
        out[..HEADER_LEN].fill(0);
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.block_id.to_le_bytes());
        out[8..10].copy_from_slice(&self.block_type.to_le_bytes());
        out[10..12].copy_from_slice(&self.block_length.to_le_bytes());
        out[12..16].copy_from_slice(&self.crc32.to_le_bytes());
        out[16..20].copy_from_slice(&self.timestamp_sec.to_le_bytes());
        out[20..24].copy_from_slice(&self.timestamp_nsec.to_le_bytes());
        out[24..26].copy_from_slice(&self.source_id.to_le_bytes());
        out[26..30].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[30] = self.num_channels;
        out[31..35].copy_from_slice(&self.scale.to_le_bytes());
        out[35..39].copy_from_slice(&self.center_frequency.to_le_bytes());
    }

    /// Decodes a header from the first [`HEADER_LEN`] bytes of `data`.
    ///
    /// Magic is not checked here: zero-filled slots of a memory store are
    /// legitimately read back as blocks that never carried a magic. Callers
    /// that require a valid block use [`BlockHeader::validate_magic`].
    pub fn decode(data: &[u8]) -> BlockResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(BlockError::ShortBuffer(data.len()));
        }

        let block_length = u16::from_le_bytes([data[10], data[11]]);
        if usize::from(block_length) > BLOCK_LEN {
            return Err(BlockError::LengthOutOfRange(block_length));
        }

        Ok(Self {
            magic: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            block_id: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            block_type: u16::from_le_bytes([data[8], data[9]]),
            block_length,
            crc32: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            timestamp_sec: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
            timestamp_nsec: u32::from_le_bytes([data[20], data[21], data[22], data[23]]),
            source_id: u16::from_le_bytes([data[24], data[25]]),
            sample_rate: u32::from_le_bytes([data[26], data[27], data[28], data[29]]),
            num_channels: data[30],
            scale: f32::from_le_bytes([data[31], data[32], data[33], data[34]]),
            center_frequency: f32::from_le_bytes([data[35], data[36], data[37], data[38]]),
        })
    }

    /// Rejects a header whose magic does not match [`BLOCK_MAGIC`].
    pub fn validate_magic(&self) -> BlockResult<()> {
        if self.magic != BLOCK_MAGIC {
            return Err(BlockError::BadMagic(self.magic));
        }
        Ok(())
    }
}

/// One complete block record: header plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub header: BlockHeader,
    pub payload: [u8; PAYLOAD_LEN],
}

impl Default for Block {
    fn default() -> Self {
        Self {
            header: BlockHeader::default(),
            payload: [0u8; PAYLOAD_LEN],
        }
    }
}

impl Block {
    /// Creates an empty block of the given sample encoding with a full-length
    /// payload region.
    pub fn with_type(block_type: BlockType) -> Self {
        let mut block = Self::default();
        block.header.block_type = block_type as u16;
        block.header.block_length = BLOCK_LEN as u16;
        block
    }

    /// Replaces the payload with raw bytes of the given encoding and adjusts
    /// `block_length` to cover exactly the written bytes.
    pub fn set_payload(&mut self, block_type: BlockType, bytes: &[u8]) {
        let len = bytes.len().min(PAYLOAD_LEN);
        self.payload[..len].copy_from_slice(&bytes[..len]);
        self.payload[len..].fill(0);
        self.header.block_type = block_type as u16;
        self.header.block_length = (HEADER_LEN + len) as u16;
    }

    /// Writes interleaved or real i16 samples into the payload.
    pub fn set_i16_samples(&mut self, samples: &[i16]) {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        self.set_payload(BlockType::I16, &bytes);
    }

    /// Writes interleaved or real f32 samples into the payload.
    pub fn set_f32_samples(&mut self, samples: &[f32]) {
        let mut bytes = Vec::with_capacity(samples.len() * 4);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        self.set_payload(BlockType::F32, &bytes);
    }

    /// Serializes the full record to [`BLOCK_LEN`] bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; BLOCK_LEN];
        self.header.encode_into(&mut out);
        out[HEADER_LEN..].copy_from_slice(&self.payload);
        out
    }

    /// Deserializes a record from exactly [`BLOCK_LEN`] bytes.
    pub fn from_bytes(data: &[u8]) -> BlockResult<Self> {
        if data.len() < BLOCK_LEN {
            return Err(BlockError::ShortBuffer(data.len()));
        }
        let header = BlockHeader::decode(data)?;
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&data[HEADER_LEN..BLOCK_LEN]);
        Ok(Self { header, payload })
    }

    /// Computes the checksum of this block: CRC32 (IEEE polynomial) over
    /// `block_length` bytes of the serialized record with the checksum field
    /// zeroed.
    pub fn compute_checksum(&self) -> u32 {
        let mut bytes = self.to_bytes();
        bytes[12..16].fill(0);
        let len = usize::from(self.header.block_length).min(BLOCK_LEN);
        crc32fast::hash(&bytes[..len])
    }

    /// Verifies the stored checksum against a recomputation.
    ///
    /// The store engine stamps checksums on write but does not enforce them on
    /// read; this is the validation hook for callers that want it.
    pub fn verify_integrity(&self) -> BlockResult<()> {
        let computed = self.compute_checksum();
        if computed != self.header.crc32 {
            return Err(BlockError::ChecksumMismatch {
                computed,
                stored: self.header.crc32,
            });
        }
        Ok(())
    }

    /// Number of payload bytes covered by `block_length`.
    pub fn payload_len(&self) -> usize {
        usize::from(self.header.block_length).saturating_sub(HEADER_LEN)
    }

    /// Decodes the used payload into `f32` samples according to the declared
    /// sample type, applying the per-block scale factor.
    pub fn decode_samples(&self) -> BlockResult<Vec<f32>> {
        let block_type = self
            .header
            .sample_type()
            .ok_or(BlockError::UnknownBlockType(self.header.block_type))?;
        let scale = self.header.effective_scale();
        let data = &self.payload[..self.payload_len()];
        let count = data.len() / block_type.sample_size();

        let mut samples = Vec::with_capacity(count);
        match block_type {
            BlockType::Bytes => {
                samples.extend(data.iter().map(|&b| f32::from(b) * scale));
            }
            BlockType::I8 => {
                samples.extend(data.iter().map(|&b| f32::from(b as i8) * scale));
            }
            BlockType::I16 => {
                for c in data.chunks_exact(2) {
                    samples.push(f32::from(i16::from_le_bytes([c[0], c[1]])) * scale);
                }
            }
            BlockType::I32 => {
                for c in data.chunks_exact(4) {
                    samples.push(i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32 * scale);
                }
            }
            BlockType::F32 => {
                for c in data.chunks_exact(4) {
                    samples.push(f32::from_le_bytes([c[0], c[1], c[2], c[3]]) * scale);
                }
            }
            BlockType::F64 => {
                for c in data.chunks_exact(8) {
                    let v = f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]);
                    samples.push(v as f32 * scale);
                }
            }
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_payload_sizes() {
        assert_eq!(BLOCK_LEN, 16384);
        assert_eq!(PAYLOAD_LEN, 16256);
        let block = Block::default();
        assert_eq!(block.to_bytes().len(), BLOCK_LEN);
    }

    #[test]
    fn test_magic_bytes_spell_eyeq() {
        assert_eq!(&BLOCK_MAGIC.to_le_bytes(), b"EyeQ");
    }

    #[test]
    fn test_header_roundtrip() {
        let header = BlockHeader {
            magic: BLOCK_MAGIC,
            block_id: 42,
            block_type: BlockType::I16 as u16,
            block_length: 4096,
            crc32: 0xdeadbeef,
            timestamp_sec: 1_700_000_000,
            timestamp_nsec: 123_456_789,
            source_id: 7,
            sample_rate: 2_400_000,
            num_channels: 2,
            scale: 0.25,
            center_frequency: 868_300_000.0,
        };

        let mut bytes = [0u8; HEADER_LEN];
        header.encode_into(&mut bytes);
        let decoded = BlockHeader::decode(&bytes).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_decode_rejects_out_of_range_length() {
        let mut bytes = [0u8; HEADER_LEN];
        BlockHeader::default().encode_into(&mut bytes);
        bytes[10..12].copy_from_slice(&17000u16.to_le_bytes());
        assert_eq!(
            BlockHeader::decode(&bytes),
            Err(BlockError::LengthOutOfRange(17000))
        );
    }

    #[test]
    fn test_magic_validation() {
        let mut header = BlockHeader::default();
        assert!(header.validate_magic().is_ok());
        header.magic = 0x1234_5678;
        assert_eq!(
            header.validate_magic(),
            Err(BlockError::BadMagic(0x1234_5678))
        );
    }

    #[test]
    fn test_block_roundtrip() {
        let mut block = Block::with_type(BlockType::I16);
        block.set_i16_samples(&[-3, -2, -1, 0, 1, 2, 3]);
        block.header.crc32 = block.compute_checksum();

        let decoded = Block::from_bytes(&block.to_bytes()).unwrap();
        assert_eq!(block, decoded);
        assert!(decoded.verify_integrity().is_ok());
    }

    #[test]
    fn test_checksum_convention_known_vector() {
        // zlib.crc32(bytes(range(11))) == 0xad2d8ee1
        let data: Vec<u8> = (0u8..=10).collect();
        assert_eq!(crc32fast::hash(&data), 0xad2d8ee1);
    }

    #[test]
    fn test_checksum_covers_block_length_only() {
        let mut block = Block::with_type(BlockType::I8);
        block.set_payload(BlockType::I8, &[1, 2, 3, 4]);
        let checksum = block.compute_checksum();

        // Bytes past block_length do not contribute.
        block.payload[100] = 0xff;
        assert_eq!(checksum, block.compute_checksum());

        // Bytes within it do.
        block.payload[0] = 0xff;
        assert_ne!(checksum, block.compute_checksum());
    }

    #[test]
    fn test_integrity_detects_corruption() {
        let mut block = Block::with_type(BlockType::F32);
        block.set_f32_samples(&[1.0, -1.0, 0.5]);
        block.header.crc32 = block.compute_checksum();
        block.payload[4] ^= 0x80;

        match block.verify_integrity() {
            Err(BlockError::ChecksumMismatch { .. }) => {}
            other => panic!("expected checksum mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_samples_i16_with_scale() {
        let mut block = Block::default();
        block.set_i16_samples(&[100, -200, 300]);
        block.header.scale = 0.5;

        let samples = block.decode_samples().unwrap();
        assert_eq!(samples, vec![50.0, -100.0, 150.0]);
    }

    #[test]
    fn test_decode_samples_default_scale() {
        let mut block = Block::default();
        block.set_f32_samples(&[1.5, -2.5]);
        assert_eq!(block.header.scale, 0.0);

        // Scale 0 decodes as 1.0.
        assert_eq!(block.decode_samples().unwrap(), vec![1.5, -2.5]);
    }

    #[test]
    fn test_decode_samples_bytes_and_f64() {
        let mut block = Block::default();
        block.set_payload(BlockType::Bytes, &[0, 128, 255]);
        assert_eq!(block.decode_samples().unwrap(), vec![0.0, 128.0, 255.0]);

        let mut bytes = Vec::new();
        for v in [0.5f64, -0.25f64] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        block.set_payload(BlockType::F64, &bytes);
        assert_eq!(block.decode_samples().unwrap(), vec![0.5, -0.25]);
    }

    #[test]
    fn test_decode_samples_unknown_type() {
        let mut block = Block::default();
        block.header.block_type = 99;
        assert_eq!(
            block.decode_samples(),
            Err(BlockError::UnknownBlockType(99))
        );
    }

    #[test]
    fn test_zero_filled_block_decodes_empty() {
        // A never-written memory store slot: all zeros, block_length 0.
        let block = Block::from_bytes(&[0u8; BLOCK_LEN]).unwrap();
        assert_eq!(block.header.block_length, 0);
        assert_eq!(block.decode_samples().unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn test_timestamp_accessor() {
        let mut block = Block::default();
        block.header.timestamp_sec = 1_700_000_000;
        block.header.timestamp_nsec = 500_000_000;
        let ts = block.header.timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_nanos(), 500_000_000);
    }
}
