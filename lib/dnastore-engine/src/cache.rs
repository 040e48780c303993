//! LRU buffer cache over a block-aligned backing file.
//!
//! The cache holds up to a fixed number of block-sized buffers in
//! most-recently-used-first order. Every pool read and write funnels
//! through here; a miss either claims a fresh buffer or evicts the
//! least-recently-used one, writing it back first when dirty. Buffer byte
//! arrays are reused across evictions rather than reallocated.

use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

use snafu::{ensure, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum CacheError {
    /// Any failure in backing file access. Fatal to the caller; the cache
    /// does not attempt recovery.
    #[snafu(display("backing file I/O failed: {source}"))]
    Io { source: io::Error },

    #[snafu(display("buffer count must be at least 1"))]
    NoBuffers,

    #[snafu(display("block size must be at least 1"))]
    ZeroBlockSize,
}

/// Monotonic cache and disk counters, exposed read-only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
}

#[derive(Debug)]
struct Buffer {
    block: u64,
    data: Vec<u8>,
    dirty: bool,
}

pub struct BufferCache {
    file: File,
    block_size: usize,
    capacity: usize,
    /// Resident buffers, most recently used first.
    buffers: VecDeque<Buffer>,
    stats: CacheStats,
}

impl BufferCache {
    /// Opens (creating if absent) the backing file and an empty cache of
    /// `capacity` buffers of `block_size` bytes each.
    pub fn open(path: &Path, capacity: usize, block_size: usize) -> Result<Self, CacheError> {
        ensure!(capacity > 0, NoBuffersSnafu);
        ensure!(block_size > 0, ZeroBlockSizeSnafu);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .context(IoSnafu)?;
        Ok(Self {
            file,
            block_size,
            capacity,
            buffers: VecDeque::with_capacity(capacity),
            stats: CacheStats::default(),
        })
    }

    /// Reads `len` bytes starting at `offset`, touching every block the
    /// range overlaps.
    pub fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, CacheError> {
        let mut out = vec![0u8; len];
        let mut done = 0;
        while done < len {
            let pos = offset + done as u64;
            let block = pos / self.block_size as u64;
            let in_block = (pos % self.block_size as u64) as usize;
            let run = (len - done).min(self.block_size - in_block);
            self.touch(block)?;
            out[done..done + run].copy_from_slice(&self.buffers[0].data[in_block..in_block + run]);
            done += run;
        }
        Ok(out)
    }

    /// Overwrites the cached image of every block the range overlaps and
    /// marks those buffers dirty. Nothing reaches the file until the
    /// buffer is evicted or flushed.
    pub fn write(&mut self, bytes: &[u8], offset: u64) -> Result<(), CacheError> {
        let mut done = 0;
        while done < bytes.len() {
            let pos = offset + done as u64;
            let block = pos / self.block_size as u64;
            let in_block = (pos % self.block_size as u64) as usize;
            let run = (bytes.len() - done).min(self.block_size - in_block);
            self.touch(block)?;
            let buffer = &mut self.buffers[0];
            buffer.data[in_block..in_block + run].copy_from_slice(&bytes[done..done + run]);
            buffer.dirty = true;
            done += run;
        }
        Ok(())
    }

    /// Writes every dirty buffer back to its block's file offset and
    /// clears the dirty flags.
    pub fn flush(&mut self) -> Result<(), CacheError> {
        let block_size = self.block_size;
        for buffer in &mut self.buffers {
            if buffer.dirty {
                write_block(&mut self.file, block_size, &mut self.stats, buffer.block, &buffer.data)?;
                buffer.dirty = false;
            }
        }
        Ok(())
    }

    /// Flushes and syncs the backing file.
    pub fn close(mut self) -> Result<(), CacheError> {
        self.flush()?;
        self.file.sync_all().context(IoSnafu)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Block numbers of the resident buffers, most recently used first.
    pub fn resident_blocks(&self) -> Vec<u64> {
        self.buffers.iter().map(|b| b.block).collect()
    }

    /// Makes `block` resident at the front of the MRU list.
    fn touch(&mut self, block: u64) -> Result<(), CacheError> {
        if let Some(pos) = self.buffers.iter().position(|b| b.block == block) {
            self.stats.hits += 1;
            if pos != 0 {
                let buffer = self.buffers.remove(pos).expect("position was just found");
                self.buffers.push_front(buffer);
            }
            return Ok(());
        }

        self.stats.misses += 1;
        let mut data = if self.buffers.len() < self.capacity {
            vec![0u8; self.block_size]
        } else {
            let victim = self.buffers.pop_back().expect("cache is at capacity");
            if victim.dirty {
                write_block(&mut self.file, self.block_size, &mut self.stats, victim.block, &victim.data)?;
            }
            trace!(evicted = victim.block, loaded = block, "buffer replaced");
            victim.data
        };
        self.read_block(block, &mut data)?;
        self.buffers.push_front(Buffer { block, data, dirty: false });
        Ok(())
    }

    /// Fills `buf` with the block's file contents, zero-padding past the
    /// end of the file.
    fn read_block(&mut self, block: u64, buf: &mut [u8]) -> Result<(), CacheError> {
        buf.fill(0);
        self.file
            .seek(SeekFrom::Start(block * self.block_size as u64))
            .context(IoSnafu)?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]).context(IoSnafu)? {
                0 => break,
                n => filled += n,
            }
        }
        self.stats.disk_reads += 1;
        Ok(())
    }
}

fn write_block(
    file: &mut File,
    block_size: usize,
    stats: &mut CacheStats,
    block: u64,
    data: &[u8],
) -> Result<(), CacheError> {
    file.seek(SeekFrom::Start(block * block_size as u64))
        .context(IoSnafu)?;
    file.write_all(data).context(IoSnafu)?;
    stats.disk_writes += 1;
    Ok(())
}

/// Dirty buffers must not outlive the process even on early-return paths.
impl Drop for BufferCache {
    fn drop(&mut self) {
        if let Err(error) = self.flush() {
            error!(%error, "failed to flush buffer cache");
        }
    }
}
