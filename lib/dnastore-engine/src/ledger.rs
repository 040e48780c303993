//! Versioned metadata sidecar for the backing file.
//!
//! The backing file alone is not enough to reopen a store: the root
//! handle, flyweight handle, and free list live in memory during a run.
//! This module persists that state as a small JSON document next to the
//! data file, rewritten on every flush. The state is written to a
//! temporary sibling and renamed over the stable name so a torn write
//! never replaces a good ledger. Any incompatible change to the layout
//! requires a new variant here.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::freelist::Extent;

const LEDGER_EXTENSION: &str = "meta";
const TMP_EXTENSION: &str = "meta.new";

#[derive(Debug, Snafu)]
pub enum LedgerError {
    #[snafu(display("ledger I/O error: {source}"))]
    Io { source: io::Error },

    /// The ledger file exists but cannot be understood. Repair is out of
    /// scope; this is fatal at startup.
    #[snafu(display("failed to decode ledger state: {source}"))]
    Malformed { source: serde_json::Error },

    #[snafu(display("failed to encode ledger state: {source}"))]
    Encode { source: serde_json::Error },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "version")]
enum State {
    #[serde(rename = "1")]
    V1 {
        pool_size: u32,
        root: u32,
        empty: u32,
        sequences: u64,
        extents: Vec<(u32, u32)>,
        cursor: usize,
    },
}

/// Everything needed to reopen a store over its backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerState {
    pub pool_size: u32,
    pub root: u32,
    pub empty: u32,
    pub sequences: u64,
    pub extents: Vec<Extent>,
    pub cursor: usize,
}

pub fn ledger_path(data_path: &Path) -> PathBuf {
    data_path.with_extension(LEDGER_EXTENSION)
}

/// Loads the ledger next to `data_path`. A missing file means a fresh
/// store and is not an error.
pub fn load(data_path: &Path) -> Result<Option<LedgerState>, LedgerError> {
    let text = match fs::read_to_string(ledger_path(data_path)) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context(IoSnafu),
    };
    let State::V1 { pool_size, root, empty, sequences, extents, cursor } =
        serde_json::from_str(&text).context(MalformedSnafu)?;
    Ok(Some(LedgerState {
        pool_size,
        root,
        empty,
        sequences,
        extents: extents.into_iter().map(|(addr, size)| Extent::new(addr, size)).collect(),
        cursor,
    }))
}

/// Writes the ledger atomically: temporary sibling first, then rename.
pub fn store(data_path: &Path, state: &LedgerState) -> Result<(), LedgerError> {
    let stable = ledger_path(data_path);
    let tmp = data_path.with_extension(TMP_EXTENSION);
    let document = State::V1 {
        pool_size: state.pool_size,
        root: state.root,
        empty: state.empty,
        sequences: state.sequences,
        extents: state.extents.iter().map(|e| (e.addr, e.size)).collect(),
        cursor: state.cursor,
    };
    let text = serde_json::to_string(&document).context(EncodeSnafu)?;
    fs::write(&tmp, text).context(IoSnafu)?;
    fs::rename(&tmp, &stable).context(IoSnafu)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{ledger_path, load, store, LedgerError, LedgerState};
    use crate::freelist::Extent;

    fn sample() -> LedgerState {
        LedgerState {
            pool_size: 356,
            root: 15,
            empty: 0,
            sequences: 2,
            extents: vec![Extent::new(24, 32), Extent::new(100, 256)],
            cursor: 1,
        }
    }

    #[test]
    fn missing_ledger_reads_as_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load(&dir.path().join("store.dat")).unwrap(), None);
    }

    #[test]
    fn state_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let data_path = dir.path().join("store.dat");
        store(&data_path, &sample()).unwrap();
        assert_eq!(load(&data_path).unwrap(), Some(sample()));
        // The temporary sibling does not linger.
        assert!(!data_path.with_extension("meta.new").exists());
    }

    #[test]
    fn rewrite_replaces_previous_state() {
        let dir = TempDir::new().unwrap();
        let data_path = dir.path().join("store.dat");
        store(&data_path, &sample()).unwrap();
        let mut updated = sample();
        updated.sequences = 3;
        updated.root = 42;
        store(&data_path, &updated).unwrap();
        assert_eq!(load(&data_path).unwrap(), Some(updated));
    }

    #[test]
    fn malformed_ledger_is_a_fatal_decode_error() {
        let dir = TempDir::new().unwrap();
        let data_path = dir.path().join("store.dat");
        std::fs::write(ledger_path(&data_path), "not json").unwrap();
        assert!(matches!(load(&data_path), Err(LedgerError::Malformed { .. })));
    }
}
