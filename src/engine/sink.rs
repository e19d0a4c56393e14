// src/engine/sink.rs
//
// Growable output buffer for libwebp output and rebuilt containers.
//
// Encoder output size is unknown up front, so the buffer doubles as it
// grows. Every RIFF size field is a u32, so the buffer must stay strictly
// below 4 GiB.

use crate::error::{Result, WebpSaveError};
use tracing::trace;

/// Hard ceiling for any sink. A container at or above this size could not
/// describe itself in its 4-byte RIFF size field.
pub const SINK_LIMIT: u64 = u32::MAX as u64;

/// Smallest allocation the sink ever makes.
pub const MIN_GROWTH: u64 = 8192;

/// Append-only byte buffer with amortized-doubling growth and a hard limit.
///
/// Invariant: `len() <= capacity() <= limit()`, and `len() < limit()`.
#[derive(Debug)]
pub struct ByteSink {
    buf: Vec<u8>,
    capacity: u64,
    limit: u64,
}

impl Default for ByteSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSink {
    /// Empty sink. Nothing is allocated until the first append.
    pub fn new() -> Self {
        Self::with_limit(SINK_LIMIT)
    }

    /// Empty sink with a tighter ceiling. Limits above [`SINK_LIMIT`] are
    /// lowered to it.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            buf: Vec::new(),
            capacity: 0,
            limit: limit.min(SINK_LIMIT),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes allocated so far (as requested by the growth policy).
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Hand the written bytes to the caller.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    /// Make room for `additional` more bytes.
    ///
    /// Fails with a memory error before allocating anything if the sink
    /// would reach its limit, or if the allocator refuses.
    pub fn reserve(&mut self, additional: u64) -> Result<()> {
        let len = self.buf.len() as u64;
        let next_size = len
            .checked_add(additional)
            .ok_or_else(|| WebpSaveError::size_limit_exceeded(u64::MAX, self.limit))?;

        if next_size >= self.limit {
            return Err(WebpSaveError::size_limit_exceeded(next_size, self.limit));
        }
        if next_size <= self.capacity {
            return Ok(());
        }

        let next_capacity = MIN_GROWTH
            .max(next_size)
            .max(self.capacity.saturating_mul(2))
            .min(self.limit);
        let extra = usize::try_from(next_capacity - len)
            .map_err(|_| WebpSaveError::allocation_failed(next_capacity))?;
        self.buf
            .try_reserve_exact(extra)
            .map_err(|_| WebpSaveError::allocation_failed(next_capacity))?;

        trace!(from = self.capacity, to = next_capacity, "grew output buffer");
        self.capacity = next_capacity;
        Ok(())
    }

    /// Append raw bytes. Zero-length input always succeeds.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.reserve(data.len() as u64)?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Append the low `width` bytes of `value`, little-endian.
    ///
    /// # Panics
    /// If `width` is larger than 4.
    pub fn append_le(&mut self, value: u32, width: usize) -> Result<()> {
        assert!(width <= 4, "little-endian field width {width} exceeds 4 bytes");
        self.append(&value.to_le_bytes()[..width])
    }

    pub fn append_u32_le(&mut self, value: u32) -> Result<()> {
        self.append_le(value, 4)
    }

    /// 24-bit fields hold VP8X canvas dimensions. Bits above 24 are dropped.
    pub fn append_u24_le(&mut self, value: u32) -> Result<()> {
        self.append_le(value, 3)
    }

    pub fn append_tag(&mut self, tag: &[u8; 4]) -> Result<()> {
        self.append(tag)
    }

    /// Emit one RIFF chunk: tag, u32 payload length, payload, and a zero
    /// pad byte when the payload length is odd.
    pub fn append_chunk(&mut self, tag: &[u8; 4], data: &[u8]) -> Result<()> {
        let length = u32::try_from(data.len())
            .map_err(|_| WebpSaveError::size_limit_exceeded(data.len() as u64, self.limit))?;
        let padded = chunk_size(data.len());
        // All or nothing: the chunk never lands half-written.
        self.reserve(padded)?;

        self.append_tag(tag)?;
        self.append_u32_le(length)?;
        self.append(data)?;
        if data.len() & 1 == 1 {
            self.append(&[0])?;
        }
        trace!(
            tag = %String::from_utf8_lossy(tag),
            length,
            "appended chunk"
        );
        Ok(())
    }

    /// Read back a byte already written.
    ///
    /// # Panics
    /// If `offset` is not below `len()`.
    pub fn read_byte(&self, offset: usize) -> u8 {
        assert!(
            offset < self.buf.len(),
            "read at {offset} past end of {} byte sink",
            self.buf.len()
        );
        self.buf[offset]
    }

    /// Overwrite a byte already written.
    ///
    /// # Panics
    /// If `offset` is not below `len()`.
    pub fn patch_byte(&mut self, offset: usize, value: u8) {
        assert!(
            offset < self.buf.len(),
            "patch at {offset} past end of {} byte sink",
            self.buf.len()
        );
        self.buf[offset] = value;
    }
}

/// Bytes a chunk with a `payload_len` byte payload occupies on disk:
/// 8 header bytes plus the payload rounded up to even.
pub fn chunk_size(payload_len: usize) -> u64 {
    let payload_len = payload_len as u64;
    8 + payload_len + (payload_len & 1)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Chunks always occupy an even number of bytes.
        #[test]
        fn prop_chunks_are_even(payload in prop::collection::vec(any::<u8>(), 0..200)) {
            let mut sink = ByteSink::new();
            sink.append_chunk(b"EXIF", &payload).unwrap();
            prop_assert_eq!(sink.len() % 2, 0);
            prop_assert_eq!(sink.len() as u64, chunk_size(payload.len()));
        }

        /// Doubling keeps reallocations logarithmic in the bytes written.
        #[test]
        fn prop_growth_is_logarithmic(
            sizes in prop::collection::vec(1usize..4096, 1..400),
        ) {
            let mut sink = ByteSink::new();
            let mut reallocations = 0u32;
            let mut last_capacity = sink.capacity();
            for size in &sizes {
                sink.append(&vec![0xAB; *size]).unwrap();
                if sink.capacity() != last_capacity {
                    reallocations += 1;
                    last_capacity = sink.capacity();
                }
            }
            let total = sink.len() as u64;
            let bound = 2 + (total / MIN_GROWTH + 1).ilog2();
            prop_assert!(
                reallocations <= bound,
                "{} reallocations for {} bytes (bound {})",
                reallocations,
                total,
                bound
            );
            prop_assert!(sink.len() as u64 <= sink.capacity());
            prop_assert!(sink.capacity() <= sink.limit());
        }

        /// Hitting the ceiling never changes what was already written.
        #[test]
        fn prop_ceiling_preserves_contents(
            limit in 8u64..256,
            first in prop::collection::vec(any::<u8>(), 0..128),
            second in prop::collection::vec(any::<u8>(), 1..256),
        ) {
            let mut sink = ByteSink::with_limit(limit);
            prop_assume!(sink.append(&first).is_ok());
            let before = sink.as_bytes().to_vec();
            let result = sink.append(&second);
            if (before.len() + second.len()) as u64 >= limit {
                prop_assert!(result.is_err());
                prop_assert_eq!(sink.as_bytes(), &before[..]);
            } else {
                prop_assert!(result.is_ok());
            }
        }
    }
}
