//! Logical byte pool holding length-prefixed records.
//!
//! The pool is a byte array of configurable size layered over the buffer
//! cache; the backing file mirrors it byte for byte. The only structure
//! the pool knows about is the record convention: a big-endian 16-bit
//! length followed by that many payload bytes. Erasing a record zeroes
//! the length prefix and deliberately leaves the payload bytes in place
//! until something overwrites them.

use bytes::{Buf, BufMut};
use snafu::{ensure, ResultExt, Snafu};

use crate::cache::{BufferCache, CacheError, CacheStats};

/// Bytes occupied by the length prefix of every record.
pub const RECORD_PREFIX_LEN: u32 = 2;

/// Largest payload a single record can carry.
pub const MAX_RECORD_PAYLOAD: usize = u16::MAX as usize;

#[derive(Debug, Snafu)]
pub enum PoolError {
    #[snafu(display("record payload of {len} bytes exceeds the {MAX_RECORD_PAYLOAD}-byte limit"))]
    RecordTooLarge { len: usize },

    #[snafu(display("{source}"))]
    Cache { source: CacheError },
}

pub struct MemoryPool {
    cache: BufferCache,
    size: u32,
}

impl MemoryPool {
    pub fn new(cache: BufferCache, size: u32) -> Self {
        Self { cache, size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Extends the pool by `by` bytes and returns the new size. The pool
    /// is file-backed, so existing bytes carry over as-is and the new
    /// region reads as zeros until written.
    pub fn grow(&mut self, by: u32) -> u32 {
        self.size += by;
        self.size
    }

    /// Writes `payload` as a record at `addr`: length prefix first, then
    /// the payload bytes.
    pub fn write_record(&mut self, addr: u32, payload: &[u8]) -> Result<(), PoolError> {
        ensure!(payload.len() <= MAX_RECORD_PAYLOAD, RecordTooLargeSnafu { len: payload.len() });
        debug_assert!(addr + RECORD_PREFIX_LEN + payload.len() as u32 <= self.size);
        let mut image = Vec::with_capacity(RECORD_PREFIX_LEN as usize + payload.len());
        image.put_u16(payload.len() as u16);
        image.put_slice(payload);
        self.cache.write(&image, u64::from(addr)).context(CacheSnafu)
    }

    /// Reads the record at `addr`. A zero length prefix (an erased
    /// record) yields an empty payload.
    pub fn read_record(&mut self, addr: u32) -> Result<Vec<u8>, PoolError> {
        let prefix = self.cache.read(u64::from(addr), RECORD_PREFIX_LEN as usize).context(CacheSnafu)?;
        let len = (&prefix[..]).get_u16();
        if len == 0 {
            return Ok(Vec::new());
        }
        self.cache
            .read(u64::from(addr) + u64::from(RECORD_PREFIX_LEN), usize::from(len))
            .context(CacheSnafu)
    }

    /// Returns the record length at `addr` and zeroes the prefix. The
    /// payload bytes stay behind.
    pub fn erase_length(&mut self, addr: u32) -> Result<u16, PoolError> {
        let prefix = self.cache.read(u64::from(addr), RECORD_PREFIX_LEN as usize).context(CacheSnafu)?;
        let len = (&prefix[..]).get_u16();
        self.cache.write(&[0, 0], u64::from(addr)).context(CacheSnafu)?;
        Ok(len)
    }

    pub fn flush(&mut self) -> Result<(), PoolError> {
        self.cache.flush().context(CacheSnafu)
    }

    pub fn close(self) -> Result<(), PoolError> {
        self.cache.close().context(CacheSnafu)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn resident_blocks(&self) -> Vec<u64> {
        self.cache.resident_blocks()
    }
}
