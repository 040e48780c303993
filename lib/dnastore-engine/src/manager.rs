//! Record allocator binding the memory pool to the free-block list.
//!
//! `MemManager` is the only mutator of both: every allocation claims an
//! extent and writes a record through the pool, every removal erases the
//! record's length prefix and returns its extent. When no extent fits,
//! the pool grows by a fixed step, the new tail region is released (where
//! it coalesces with any trailing free space), and the allocation
//! retries. Each growth step strictly increases capacity, so the retry
//! loop terminates.

use std::{fmt, path::PathBuf};

use snafu::{ensure, ResultExt, Snafu};

use crate::{
    cache::{BufferCache, CacheError, CacheStats},
    freelist::{Extent, FreeList},
    pool::{MemoryPool, PoolError, MAX_RECORD_PAYLOAD, RECORD_PREFIX_LEN},
};

/// Byte offset of a length-prefixed record in the pool. Stable only until
/// the record is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    pub const fn addr(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store construction parameters.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backing file for the memory pool.
    pub data_path: PathBuf,
    /// Number of buffers held by the block cache.
    pub num_buffers: usize,
    /// Size in bytes of one cache block.
    pub block_size: usize,
    /// Pool size for a freshly created store.
    pub initial_pool_size: u32,
    /// Bytes added per growth step; zero disables growth and makes the
    /// pool a hard capacity limit.
    pub growth_step: u32,
}

impl StoreConfig {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            num_buffers: 4,
            block_size: 64,
            initial_pool_size: 256,
            growth_step: 100,
        }
    }
}

#[derive(Debug, Snafu)]
pub enum AllocError {
    #[snafu(display("record payload of {len} bytes exceeds the {MAX_RECORD_PAYLOAD}-byte limit"))]
    RecordTooLarge { len: usize },

    /// Only reachable when growth is disabled; a growing pool always
    /// accumulates a large-enough extent eventually.
    #[snafu(display("pool exhausted and growth is disabled"))]
    OutOfSpace,

    #[snafu(display("{source}"))]
    Pool { source: PoolError },

    #[snafu(display("{source}"))]
    Cache { source: CacheError },
}

pub struct MemManager {
    pool: MemoryPool,
    free: FreeList,
    growth_step: u32,
}

impl MemManager {
    /// Opens the backing file for a brand-new store: the whole initial
    /// pool is one free extent.
    pub fn create(config: &StoreConfig) -> Result<Self, AllocError> {
        let cache = BufferCache::open(&config.data_path, config.num_buffers, config.block_size)
            .context(CacheSnafu)?;
        Ok(Self {
            pool: MemoryPool::new(cache, config.initial_pool_size),
            free: FreeList::with_region(0, config.initial_pool_size),
            growth_step: config.growth_step,
        })
    }

    /// Reopens an existing store from its persisted pool size and free
    /// list.
    pub fn resume(
        config: &StoreConfig,
        pool_size: u32,
        extents: Vec<Extent>,
        cursor: usize,
    ) -> Result<Self, AllocError> {
        let cache = BufferCache::open(&config.data_path, config.num_buffers, config.block_size)
            .context(CacheSnafu)?;
        Ok(Self {
            pool: MemoryPool::new(cache, pool_size),
            free: FreeList::from_parts(extents, cursor),
            growth_step: config.growth_step,
        })
    }

    /// Stores `payload` as a new record and returns its handle, growing
    /// the pool as often as needed to find room.
    pub fn insert(&mut self, payload: &[u8]) -> Result<Handle, AllocError> {
        ensure!(payload.len() <= MAX_RECORD_PAYLOAD, RecordTooLargeSnafu { len: payload.len() });
        let need = payload.len() as u32 + RECORD_PREFIX_LEN;
        loop {
            if let Some(addr) = self.free.acquire(need) {
                self.pool.write_record(addr, payload).context(PoolSnafu)?;
                trace!(addr, bytes = need, "record stored");
                return Ok(Handle::new(addr));
            }
            self.grow()?;
        }
    }

    /// Reads back the record at `handle`. An erased record yields an
    /// empty payload.
    pub fn get(&mut self, handle: Handle) -> Result<Vec<u8>, AllocError> {
        self.pool.read_record(handle.addr()).context(PoolSnafu)
    }

    /// Frees the record at `handle` and returns its payload length. The
    /// freed extent coalesces with any free neighbors.
    pub fn remove(&mut self, handle: Handle) -> Result<u16, AllocError> {
        let len = self.pool.erase_length(handle.addr()).context(PoolSnafu)?;
        self.free.release(handle.addr(), u32::from(len) + RECORD_PREFIX_LEN);
        trace!(addr = handle.addr(), bytes = len, "record freed");
        Ok(len)
    }

    fn grow(&mut self) -> Result<(), AllocError> {
        ensure!(self.growth_step > 0, OutOfSpaceSnafu);
        let old_size = self.pool.size();
        let new_size = self.pool.grow(self.growth_step);
        self.free.release(old_size, self.growth_step);
        debug!(old_size, new_size, "pool grown");
        Ok(())
    }

    pub fn pool_size(&self) -> u32 {
        self.pool.size()
    }

    pub fn free_list(&self) -> &FreeList {
        &self.free
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.pool.cache_stats()
    }

    pub fn resident_blocks(&self) -> Vec<u64> {
        self.pool.resident_blocks()
    }

    pub fn flush(&mut self) -> Result<(), AllocError> {
        self.pool.flush().context(PoolSnafu)
    }

    pub fn close(self) -> Result<(), AllocError> {
        self.pool.close().context(PoolSnafu)
    }
}
