//! The DNAStore storage engine.
//!
//! A single-process embedded store for variable-length DNA sequences: a
//! five-way radix trie whose nodes and payloads are length-prefixed
//! records in a byte pool, allocated by circular first-fit over a
//! coalescing free list, and served through an LRU buffer cache over one
//! backing file. Strictly single-threaded; callers drive it one
//! operation at a time.

#[macro_use]
extern crate tracing;

pub mod cache;
pub mod dna;
pub mod freelist;
pub mod ledger;
pub mod manager;
pub mod node;
pub mod pool;
pub mod trie;

pub use cache::CacheStats;
pub use manager::{Handle, StoreConfig};
pub use trie::{DnaTrie, PrintMode, RecordOutcome, SearchOutcome, TrieError};
