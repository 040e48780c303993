//! Ordered free-extent list with circular first-fit placement.
//!
//! The list partitions the unallocated portion of the memory pool into
//! disjoint extents kept in strictly ascending address order. Extents are
//! merged with their neighbors on release, so no two extents ever touch.
//! Allocation scans circularly from a cursor that persists across calls,
//! which spreads placement across the arena instead of clustering records
//! at low addresses.

use std::fmt;

/// A contiguous unallocated region of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub addr: u32,
    pub size: u32,
}

impl Extent {
    pub const fn new(addr: u32, size: u32) -> Self {
        Self { addr, size }
    }

    fn end(&self) -> u32 {
        self.addr + self.size
    }
}

/// Address-ordered free list with a circular first-fit cursor.
///
/// The cursor always indexes a valid extent while the list is nonempty.
/// When the extent under the cursor is consumed exactly, the cursor moves
/// to its successor (wrapping to the front); when a fit splits an extent,
/// the cursor stays on the remainder.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FreeList {
    extents: Vec<Extent>,
    cursor: usize,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list holding a single extent covering `size` bytes from `addr`.
    pub fn with_region(addr: u32, size: u32) -> Self {
        let mut list = Self::new();
        if size > 0 {
            list.extents.push(Extent::new(addr, size));
        }
        list
    }

    /// Rebuilds a list from persisted parts. `extents` must already be
    /// strictly address-ordered and non-touching.
    pub fn from_parts(extents: Vec<Extent>, cursor: usize) -> Self {
        let cursor = if extents.is_empty() { 0 } else { cursor % extents.len() };
        let list = Self { extents, cursor };
        list.assert_consistent();
        list
    }

    /// Claims `size` bytes using circular first-fit: starting at the
    /// cursor and wrapping at most one full lap, the first extent of
    /// sufficient size wins. Returns the claimed address, or `None` when
    /// no extent fits.
    pub fn acquire(&mut self, size: u32) -> Option<u32> {
        debug_assert!(size > 0, "zero-sized acquisition");
        let count = self.extents.len();
        for step in 0..count {
            let idx = (self.cursor + step) % count;
            if self.extents[idx].size < size {
                continue;
            }
            let addr = self.extents[idx].addr;
            if self.extents[idx].size == size {
                self.extents.remove(idx);
                self.cursor = if self.extents.is_empty() || idx >= self.extents.len() {
                    0
                } else {
                    idx
                };
            } else {
                self.extents[idx].addr += size;
                self.extents[idx].size -= size;
                self.cursor = idx;
            }
            self.assert_consistent();
            return Some(addr);
        }
        None
    }

    /// Returns `(addr, size)` to the list, merging with the extent ending
    /// at `addr` and/or the extent starting at `addr + size` so that no
    /// two extents touch afterwards.
    pub fn release(&mut self, addr: u32, size: u32) {
        debug_assert!(size > 0, "zero-sized release");
        let pos = self.extents.partition_point(|e| e.addr < addr);
        let merge_left = pos > 0 && self.extents[pos - 1].end() == addr;
        let merge_right = pos < self.extents.len() && addr + size == self.extents[pos].addr;
        match (merge_left, merge_right) {
            (false, false) => {
                self.extents.insert(pos, Extent::new(addr, size));
                if pos <= self.cursor && self.extents.len() > 1 {
                    self.cursor += 1;
                }
            }
            (true, false) => {
                self.extents[pos - 1].size += size;
            }
            (false, true) => {
                self.extents[pos].addr = addr;
                self.extents[pos].size += size;
            }
            (true, true) => {
                let right = self.extents.remove(pos);
                self.extents[pos - 1].size += size + right.size;
                if self.cursor >= pos {
                    self.cursor -= 1;
                }
            }
        }
        self.assert_consistent();
    }

    pub fn total_free(&self) -> u64 {
        self.extents.iter().map(|e| u64::from(e.size)).sum()
    }

    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn assert_consistent(&self) {
        debug_assert!(self.extents.is_empty() || self.cursor < self.extents.len());
        debug_assert!(
            self.extents.windows(2).all(|w| w[0].end() < w[1].addr),
            "free extents out of order or touching: {:?}",
            self.extents
        );
    }
}

impl fmt::Display for FreeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, extent) in self.extents.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            if idx == self.cursor {
                f.write_str("*")?;
            }
            write!(f, "{}:{}", extent.addr, extent.size)?;
        }
        Ok(())
    }
}
