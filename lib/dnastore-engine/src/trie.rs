//! Persisted five-way radix trie over the record allocator.
//!
//! Every node lives as a byte record in the pool and is reached by
//! handle, so "descending into a child" means reading the child handle
//! out of the parent image, fetching that record, and decoding it; and
//! "rewriting a child" means storing a new image, freeing the old one,
//! and patching the parent as the recursion unwinds. Nodes are only
//! rewritten when a child handle actually changed, so read-only descents
//! never touch the allocator.
//!
//! Sequences are logically suffixed with a `$` terminator during
//! navigation, which keeps the trie prefix-free; the terminator is never
//! encoded into stored payloads.

use std::{fmt::Write as _, path::PathBuf};

use snafu::{ensure, ResultExt, Snafu};

use crate::{
    cache::CacheStats,
    dna::{self, Base},
    freelist::FreeList,
    ledger::{self, LedgerError, LedgerState},
    manager::{AllocError, Handle, MemManager, StoreConfig},
    node::{DecodeError, InternalNode, LeafNode, Node, TERMINATOR_SLOT},
    pool::RECORD_PREFIX_LEN,
};

#[derive(Debug, Snafu)]
pub enum TrieError {
    #[snafu(display("sequence is already stored"))]
    Duplicate,

    #[snafu(display("sequence not found"))]
    NotFound,

    #[snafu(display("sequence has no encodable bases"))]
    InvalidSequence,

    #[snafu(display("{source}"))]
    Alloc { source: AllocError },

    #[snafu(display("corrupt node record at {handle}: {source}"))]
    Corrupt { handle: Handle, source: DecodeError },

    #[snafu(display("{source}"))]
    Ledger { source: LedgerError },
}

impl TrieError {
    /// User errors are reported and skipped; everything else terminates
    /// the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TrieError::Duplicate | TrieError::NotFound | TrieError::InvalidSequence)
    }
}

/// Outcome of a successful insert or remove, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Bytes the payload record occupies, length prefix included.
    pub stored_bytes: u32,
    /// Base count of the sequence.
    pub bases: usize,
    /// Pool address of the payload record.
    pub address: u32,
}

#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub matches: Vec<Vec<Base>>,
    /// Node materializations performed, flyweight visits included.
    pub visits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMode {
    Plain,
    Lengths,
    Stats,
}

pub struct DnaTrie {
    mem: MemManager,
    root: Handle,
    /// The canonical empty-node record every empty child slot references.
    empty: Handle,
    sequences: u64,
    data_path: PathBuf,
}

impl DnaTrie {
    /// Opens a store: resumes from the metadata ledger when one exists,
    /// otherwise initializes a fresh pool and writes the flyweight
    /// empty-node record, which doubles as the initial root.
    pub fn open(config: StoreConfig) -> Result<Self, TrieError> {
        let data_path = config.data_path.clone();
        match ledger::load(&data_path).context(LedgerSnafu)? {
            Some(state) => {
                let mem = MemManager::resume(&config, state.pool_size, state.extents, state.cursor)
                    .context(AllocSnafu)?;
                debug!(sequences = state.sequences, pool_size = state.pool_size, "store resumed");
                Ok(Self {
                    mem,
                    root: Handle::new(state.root),
                    empty: Handle::new(state.empty),
                    sequences: state.sequences,
                    data_path,
                })
            }
            None => {
                let mut mem = MemManager::create(&config).context(AllocSnafu)?;
                let empty = mem.insert(&Node::Empty.encode()).context(AllocSnafu)?;
                debug!(pool_size = config.initial_pool_size, "store created");
                Ok(Self { mem, root: empty, empty, sequences: 0, data_path })
            }
        }
    }

    /// Stored sequence count.
    pub fn len(&self) -> u64 {
        self.sequences
    }

    pub fn is_empty(&self) -> bool {
        self.sequences == 0
    }

    /// Inserts a sequence. Duplicates and sequences with no encodable
    /// base are rejected without changing any state.
    pub fn insert(&mut self, bases: &[Base]) -> Result<RecordOutcome, TrieError> {
        let payload = dna::pack(bases);
        ensure!(!payload.is_empty(), InvalidSequenceSnafu);
        ensure!(!self.contains(bases)?, DuplicateSnafu);

        let payload_handle = self.mem.insert(&payload).context(AllocSnafu)?;
        let leaf = LeafNode { payload: payload_handle, bases: bases.len() as u16 };
        self.root = self.insert_at(self.root, bases, 0, leaf)?;
        self.sequences += 1;
        debug!(sequence = %dna::format(bases), address = payload_handle.addr(), "sequence inserted");
        Ok(RecordOutcome {
            stored_bytes: payload.len() as u32 + RECORD_PREFIX_LEN,
            bases: bases.len(),
            address: payload_handle.addr(),
        })
    }

    /// Removes an exact-match sequence, freeing its payload and leaf
    /// records and collapsing internal nodes left with a single leaf.
    pub fn remove(&mut self, bases: &[Base]) -> Result<RecordOutcome, TrieError> {
        ensure!(!bases.is_empty(), InvalidSequenceSnafu);
        match self.remove_at(self.root, bases, 0)? {
            Some((new_root, outcome)) => {
                self.root = new_root;
                self.sequences -= 1;
                debug!(sequence = %dna::format(bases), "sequence removed");
                Ok(outcome)
            }
            None => NotFoundSnafu.fail(),
        }
    }

    /// True iff the exact sequence is stored.
    pub fn contains(&mut self, bases: &[Base]) -> Result<bool, TrieError> {
        let mut handle = self.root;
        let mut depth = 0;
        loop {
            match self.load(handle)? {
                Node::Empty => return Ok(false),
                Node::Leaf(leaf) => return Ok(self.materialize(&leaf)? == bases),
                Node::Internal(node) => {
                    debug_assert!(depth <= bases.len(), "descent ran past the terminator");
                    handle = node.children[slot_of(bases, depth)];
                    depth += 1;
                }
            }
        }
    }

    /// Searches for `bases`: exact match when `exact`, otherwise every
    /// stored sequence the query is a prefix of. Returns the matches and
    /// the number of node materializations.
    pub fn search(&mut self, bases: &[Base], exact: bool) -> Result<SearchOutcome, TrieError> {
        ensure!(!bases.is_empty(), InvalidSequenceSnafu);
        let mut outcome = SearchOutcome::default();
        self.search_at(self.root, bases, 0, exact, &mut outcome)?;
        Ok(outcome)
    }

    /// Renders the node structure: DFS in child order A, C, G, T,
    /// terminator, two spaces of indentation per level, `E` for empty
    /// slots, `I` for internal nodes, and one line per leaf in the
    /// requested mode.
    pub fn render(&mut self, mode: PrintMode) -> Result<String, TrieError> {
        let mut out = String::new();
        self.render_at(self.root, 0, mode, &mut out)?;
        Ok(out)
    }

    /// Writes dirty buffers back and rewrites the metadata ledger.
    pub fn flush(&mut self) -> Result<(), TrieError> {
        self.mem.flush().context(AllocSnafu)?;
        let state = LedgerState {
            pool_size: self.mem.pool_size(),
            root: self.root.addr(),
            empty: self.empty.addr(),
            sequences: self.sequences,
            extents: self.mem.free_list().extents().to_vec(),
            cursor: self.mem.free_list().cursor(),
        };
        ledger::store(&self.data_path, &state).context(LedgerSnafu)
    }

    /// Flushes, then syncs and releases the backing file.
    pub fn close(mut self) -> Result<(), TrieError> {
        self.flush()?;
        self.mem.close().context(AllocSnafu)
    }

    pub fn free_list(&self) -> &FreeList {
        self.mem.free_list()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.mem.cache_stats()
    }

    pub fn resident_blocks(&self) -> Vec<u64> {
        self.mem.resident_blocks()
    }

    pub fn pool_size(&self) -> u32 {
        self.mem.pool_size()
    }

    fn insert_at(
        &mut self,
        handle: Handle,
        bases: &[Base],
        depth: usize,
        leaf: LeafNode,
    ) -> Result<Handle, TrieError> {
        match self.load(handle)? {
            // An empty slot takes the new leaf directly; the flyweight it
            // displaces is shared and stays allocated.
            Node::Empty => self.store_node(&Node::Leaf(leaf)),
            Node::Leaf(displaced) => {
                // Collision: push the resident leaf one level down behind
                // a fresh internal node, then retry at the same depth.
                // Shared prefixes split again on the recursive descent.
                let displaced_bases = self.materialize(&displaced)?;
                let mut split = InternalNode::with_empty_children(self.empty);
                split.children[slot_of(&displaced_bases, depth)] = handle;
                let split_handle = self.store_node(&Node::Internal(split))?;
                trace!(depth, "leaf displaced into new internal node");
                self.insert_at(split_handle, bases, depth, leaf)
            }
            Node::Internal(mut node) => {
                let slot = slot_of(bases, depth);
                let child = node.children[slot];
                let new_child = self.insert_at(child, bases, depth + 1, leaf)?;
                if new_child == child {
                    return Ok(handle);
                }
                node.children[slot] = new_child;
                let new_handle = self.store_node(&Node::Internal(node))?;
                self.mem.remove(handle).context(AllocSnafu)?;
                Ok(new_handle)
            }
        }
    }

    fn remove_at(
        &mut self,
        handle: Handle,
        bases: &[Base],
        depth: usize,
    ) -> Result<Option<(Handle, RecordOutcome)>, TrieError> {
        match self.load(handle)? {
            Node::Empty => Ok(None),
            Node::Leaf(leaf) => {
                if self.materialize(&leaf)? != bases {
                    return Ok(None);
                }
                let freed = self.mem.remove(leaf.payload).context(AllocSnafu)?;
                self.mem.remove(handle).context(AllocSnafu)?;
                let outcome = RecordOutcome {
                    stored_bytes: u32::from(freed) + RECORD_PREFIX_LEN,
                    bases: usize::from(leaf.bases),
                    address: leaf.payload.addr(),
                };
                Ok(Some((self.empty, outcome)))
            }
            Node::Internal(mut node) => {
                let slot = slot_of(bases, depth);
                let child = node.children[slot];
                let Some((new_child, outcome)) = self.remove_at(child, bases, depth + 1)? else {
                    return Ok(None);
                };
                node.children[slot] = new_child;
                // Collapse when a single leaf is all that remains; a lone
                // internal child must stay, since its branching depth is
                // fixed by its distance from the root.
                if let Some(solo) = node.solo_child(self.empty) {
                    if matches!(self.load(solo)?, Node::Leaf(_)) {
                        self.mem.remove(handle).context(AllocSnafu)?;
                        trace!(depth, "internal node collapsed into its last leaf");
                        return Ok(Some((solo, outcome)));
                    }
                }
                let new_handle = self.store_node(&Node::Internal(node))?;
                self.mem.remove(handle).context(AllocSnafu)?;
                Ok(Some((new_handle, outcome)))
            }
        }
    }

    fn search_at(
        &mut self,
        handle: Handle,
        bases: &[Base],
        depth: usize,
        exact: bool,
        out: &mut SearchOutcome,
    ) -> Result<(), TrieError> {
        out.visits += 1;
        match self.load(handle)? {
            Node::Empty => Ok(()),
            Node::Leaf(leaf) => {
                let stored = self.materialize(&leaf)?;
                let matched = if exact { stored == bases } else { stored.starts_with(bases) };
                if matched {
                    out.matches.push(stored);
                }
                Ok(())
            }
            Node::Internal(node) => {
                if depth < bases.len() {
                    self.search_at(node.children[bases[depth].slot()], bases, depth + 1, exact, out)
                } else if exact {
                    // The terminator branch holds the exact-match leaf.
                    self.search_at(node.children[TERMINATOR_SLOT], bases, depth + 1, exact, out)
                } else {
                    // Query exhausted at an internal node: every leaf in
                    // this subtree extends the prefix.
                    for child in node.children {
                        self.collect_at(child, out)?;
                    }
                    Ok(())
                }
            }
        }
    }

    fn collect_at(&mut self, handle: Handle, out: &mut SearchOutcome) -> Result<(), TrieError> {
        out.visits += 1;
        match self.load(handle)? {
            Node::Empty => Ok(()),
            Node::Leaf(leaf) => {
                let stored = self.materialize(&leaf)?;
                out.matches.push(stored);
                Ok(())
            }
            Node::Internal(node) => {
                for child in node.children {
                    self.collect_at(child, out)?;
                }
                Ok(())
            }
        }
    }

    fn render_at(
        &mut self,
        handle: Handle,
        depth: usize,
        mode: PrintMode,
        out: &mut String,
    ) -> Result<(), TrieError> {
        for _ in 0..depth {
            out.push_str("  ");
        }
        match self.load(handle)? {
            Node::Empty => out.push_str("E\n"),
            Node::Leaf(leaf) => {
                let stored = self.materialize(&leaf)?;
                let text = dna::format(&stored);
                match mode {
                    PrintMode::Plain => {
                        let _ = writeln!(out, "{text}");
                    }
                    PrintMode::Lengths => {
                        let _ = writeln!(out, "{text}: length {}", stored.len());
                    }
                    PrintMode::Stats => {
                        let _ = writeln!(out, "{text}: {}", frequency_summary(&stored));
                    }
                }
            }
            Node::Internal(node) => {
                out.push_str("I\n");
                for child in node.children {
                    self.render_at(child, depth + 1, mode, out)?;
                }
            }
        }
        Ok(())
    }

    fn load(&mut self, handle: Handle) -> Result<Node, TrieError> {
        let image = self.mem.get(handle).context(AllocSnafu)?;
        Node::decode(&image).context(CorruptSnafu { handle })
    }

    fn store_node(&mut self, node: &Node) -> Result<Handle, TrieError> {
        self.mem.insert(&node.encode()).context(AllocSnafu)
    }

    fn materialize(&mut self, leaf: &LeafNode) -> Result<Vec<Base>, TrieError> {
        let payload = self.mem.get(leaf.payload).context(AllocSnafu)?;
        Ok(dna::unpack(&payload, usize::from(leaf.bases)))
    }
}

/// Child slot for `bases` at `depth`; the position one past the last base
/// is the logical `$` terminator.
fn slot_of(bases: &[Base], depth: usize) -> usize {
    if depth == bases.len() {
        TERMINATOR_SLOT
    } else {
        bases[depth].slot()
    }
}

fn frequency_summary(bases: &[Base]) -> String {
    let counts = dna::base_counts(bases);
    let total = bases.len() as f64;
    let pct = |n: usize| 100.0 * n as f64 / total;
    format!(
        "A({:.2}), C({:.2}), G({:.2}), T({:.2})",
        pct(counts[0]),
        pct(counts[1]),
        pct(counts[2]),
        pct(counts[3])
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::{DnaTrie, PrintMode, TrieError};
    use crate::{
        dna::{self, Base},
        manager::{Handle, StoreConfig},
        node::Node,
        pool::RECORD_PREFIX_LEN,
    };

    fn config(dir: &TempDir) -> StoreConfig {
        // Matches the end-to-end sizing used throughout: 64-byte blocks,
        // four buffers, a 256-byte initial pool.
        StoreConfig::new(dir.path().join("store.dat"))
    }

    fn open(dir: &TempDir) -> DnaTrie {
        DnaTrie::open(config(dir)).expect("open should not fail")
    }

    fn seq(text: &str) -> Vec<Base> {
        dna::parse(text).expect("test sequence should parse")
    }

    fn matches_as_text(outcome: &super::SearchOutcome) -> Vec<String> {
        outcome.matches.iter().map(|m| dna::format(m)).collect()
    }

    /// Sums the bytes of every live record reachable from the root (the
    /// flyweight included), prefixes counted.
    fn live_bytes(trie: &mut DnaTrie) -> u64 {
        let mut seen = HashSet::new();
        let mut total = 0;
        let mut stack = vec![trie.root, trie.empty];
        while let Some(handle) = stack.pop() {
            if !seen.insert(handle.addr()) {
                continue;
            }
            let image = trie.mem.get(handle).unwrap();
            total += image.len() as u64 + u64::from(RECORD_PREFIX_LEN);
            match Node::decode(&image).unwrap() {
                Node::Empty => {}
                Node::Leaf(leaf) => {
                    let payload = trie.mem.get(leaf.payload).unwrap();
                    total += payload.len() as u64 + u64::from(RECORD_PREFIX_LEN);
                }
                Node::Internal(node) => stack.extend(node.children),
            }
        }
        total
    }

    /// Asserts that no reachable internal node could still be collapsed,
    /// i.e. none holds a single non-flyweight child that is a leaf.
    fn assert_fully_collapsed(trie: &mut DnaTrie) {
        let mut stack = vec![trie.root];
        while let Some(handle) = stack.pop() {
            if let Node::Internal(node) = trie.load(handle).unwrap() {
                if let Some(solo) = node.solo_child(trie.empty) {
                    assert!(
                        matches!(trie.load(solo).unwrap(), Node::Internal(_)),
                        "internal node at {handle} holds a single leaf child"
                    );
                }
                stack.extend(node.children.iter().filter(|&&c| c != trie.empty).copied());
            }
        }
    }

    fn assert_accounting_balances(trie: &mut DnaTrie) {
        let live = live_bytes(trie);
        assert_eq!(
            live + trie.free_list().total_free(),
            u64::from(trie.pool_size()),
            "live record bytes and free bytes must partition the pool"
        );
    }

    #[test]
    fn fresh_store_renders_a_single_empty_node() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        assert_eq!(trie.render(PrintMode::Plain).unwrap(), "E\n");
        assert!(trie.is_empty());
    }

    #[test]
    fn first_insert_lands_right_after_the_flyweight() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        let outcome = trie.insert(&seq("AAAA")).unwrap();
        // AAAA packs to one byte, so the record is three bytes, placed
        // directly after the three-byte flyweight record at address 0.
        assert_eq!(outcome.stored_bytes, 3);
        assert_eq!(outcome.bases, 4);
        assert_eq!(outcome.address, 3);
        assert_eq!(trie.render(PrintMode::Plain).unwrap(), "AAAA\n");
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn duplicate_insert_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("AAAA")).unwrap();

        let extents = trie.free_list().extents().to_vec();
        let cursor = trie.free_list().cursor();
        let rendering = trie.render(PrintMode::Plain).unwrap();
        let pool_size = trie.pool_size();

        assert!(matches!(trie.insert(&seq("AAAA")), Err(TrieError::Duplicate)));

        assert_eq!(trie.free_list().extents(), extents);
        assert_eq!(trie.free_list().cursor(), cursor);
        assert_eq!(trie.render(PrintMode::Plain).unwrap(), rendering);
        assert_eq!(trie.pool_size(), pool_size);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn empty_sequence_is_invalid() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        assert!(matches!(trie.insert(&[]), Err(TrieError::InvalidSequence)));
        assert!(matches!(trie.search(&[], false), Err(TrieError::InvalidSequence)));
    }

    #[test]
    fn shared_prefix_split_builds_an_internal_chain() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("AAAA")).unwrap();
        trie.insert(&seq("AACG")).unwrap();

        // AAAA and AACG share the prefix AA, so the split runs two levels
        // deep before the sequences diverge on A vs C.
        let expected = "\
I
  I
    I
      AAAA
      AACG
      E
      E
      E
    E
    E
    E
    E
  E
  E
  E
  E
";
        assert_eq!(trie.render(PrintMode::Plain).unwrap(), expected);
        assert_accounting_balances(&mut trie);
    }

    #[test]
    fn sequences_that_are_prefixes_of_each_other_coexist() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("AC")).unwrap();
        trie.insert(&seq("ACGT")).unwrap();
        // The terminator branch keeps AC distinct below the shared path.
        let expected = "\
I
  I
    E
    I
      E
      E
      ACGT
      E
      AC
    E
    E
    E
  E
  E
  E
  E
";
        assert_eq!(trie.render(PrintMode::Plain).unwrap(), expected);
        assert!(trie.contains(&seq("AC")).unwrap());
        assert!(trie.contains(&seq("ACGT")).unwrap());
        assert!(!trie.contains(&seq("ACG")).unwrap());
    }

    #[test]
    fn remove_collapses_the_chain_back_to_a_root_leaf() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("AAAA")).unwrap();
        trie.insert(&seq("AACG")).unwrap();

        let outcome = trie.remove(&seq("AAAA")).unwrap();
        assert_eq!(outcome.stored_bytes, 3);
        assert_eq!(outcome.bases, 4);

        assert_eq!(trie.render(PrintMode::Plain).unwrap(), "AACG\n");
        assert_eq!(trie.len(), 1);
        assert_fully_collapsed(&mut trie);
        assert_accounting_balances(&mut trie);
    }

    #[test]
    fn insert_then_remove_restores_the_free_extents() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("AACG")).unwrap();

        let before = trie.free_list().extents().to_vec();
        trie.insert(&seq("TTGA")).unwrap();
        trie.remove(&seq("TTGA")).unwrap();
        assert_eq!(trie.free_list().extents(), before);
    }

    #[test]
    fn remove_of_missing_sequence_reports_not_found() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("AACG")).unwrap();
        let rendering = trie.render(PrintMode::Plain).unwrap();

        assert!(matches!(trie.remove(&seq("AAAA")), Err(TrieError::NotFound)));
        assert!(matches!(trie.remove(&seq("AACGT")), Err(TrieError::NotFound)));
        assert_eq!(trie.render(PrintMode::Plain).unwrap(), rendering);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn exact_search_counts_one_visit_per_materialization() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("AAAA")).unwrap();
        trie.insert(&seq("AACG")).unwrap();

        // Root internal, two more internals along AA, then the leaf.
        let outcome = trie.search(&seq("AACG"), true).unwrap();
        assert_eq!(matches_as_text(&outcome), vec!["AACG"]);
        assert_eq!(outcome.visits, 4);

        let missing = trie.search(&seq("AAGG"), true).unwrap();
        assert!(missing.matches.is_empty());
    }

    #[test]
    fn prefix_search_collects_the_whole_subtree() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("AAAA")).unwrap();
        trie.insert(&seq("AACG")).unwrap();

        let outcome = trie.search(&seq("AA"), false).unwrap();
        assert_eq!(matches_as_text(&outcome), vec!["AAAA", "AACG"]);
        assert!(outcome.visits >= 3);
    }

    #[test]
    fn prefix_search_matches_a_leaf_reached_before_exhaustion() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("AAAA")).unwrap();
        trie.insert(&seq("AACG")).unwrap();
        trie.remove(&seq("AAAA")).unwrap();

        // The trie collapsed to a single root leaf holding AACG; the
        // prefix query must still find it there.
        let outcome = trie.search(&seq("AA"), false).unwrap();
        assert_eq!(matches_as_text(&outcome), vec!["AACG"]);

        // A non-prefix query reaching the same leaf matches nothing.
        let miss = trie.search(&seq("AG"), false).unwrap();
        assert!(miss.matches.is_empty());
    }

    #[test]
    fn exact_search_does_not_match_proper_prefixes() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("AACG")).unwrap();
        let outcome = trie.search(&seq("AA"), true).unwrap();
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn every_inserted_sequence_is_found_exactly_once() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        let texts = ["A", "ACGT", "ACGG", "AC", "TTTT", "GATTACA", "G"];
        for text in texts {
            trie.insert(&seq(text)).unwrap();
        }
        for text in texts {
            let outcome = trie.search(&seq(text), true).unwrap();
            assert_eq!(matches_as_text(&outcome), vec![text], "query {text}");
        }
    }

    #[test]
    fn accounting_balances_through_mixed_operations() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        let texts = ["ACGT", "ACGG", "TTAA", "T", "GGGGGGGGGG", "GATTACA"];
        for text in texts {
            trie.insert(&seq(text)).unwrap();
            assert_accounting_balances(&mut trie);
        }
        for text in ["ACGG", "T", "GATTACA"] {
            trie.remove(&seq(text)).unwrap();
            assert_accounting_balances(&mut trie);
            assert_fully_collapsed(&mut trie);
        }
        for text in ["ACGT", "TTAA", "GGGGGGGGGG"] {
            trie.remove(&seq(text)).unwrap();
            assert_accounting_balances(&mut trie);
            assert_fully_collapsed(&mut trie);
        }
        assert!(trie.is_empty());
        // Everything freed: the pool is one flyweight record plus free
        // space again.
        assert_eq!(
            trie.free_list().total_free(),
            u64::from(trie.pool_size()) - 3
        );
    }

    #[test]
    fn growth_accommodates_sequences_larger_than_the_initial_pool() {
        let dir = TempDir::new().unwrap();
        let mut small = config(&dir);
        small.initial_pool_size = 8;
        let mut trie = DnaTrie::open(small).unwrap();
        let long = "ACGT".repeat(32); // 128 bases, 32 payload bytes
        trie.insert(&seq(&long)).unwrap();
        assert!(trie.pool_size() > 8);
        assert!(trie.contains(&seq(&long)).unwrap());
        assert_accounting_balances(&mut trie);
    }

    #[test]
    fn print_modes_annotate_leaves() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("GATTACA")).unwrap();
        assert_eq!(trie.render(PrintMode::Plain).unwrap(), "GATTACA\n");
        assert_eq!(trie.render(PrintMode::Lengths).unwrap(), "GATTACA: length 7\n");
        assert_eq!(
            trie.render(PrintMode::Stats).unwrap(),
            "GATTACA: A(42.86), C(14.29), G(14.29), T(28.57)\n"
        );
    }

    #[test]
    fn render_is_idempotent_across_read_only_operations() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        for text in ["ACGT", "AC", "TT"] {
            trie.insert(&seq(text)).unwrap();
        }
        let first = trie.render(PrintMode::Stats).unwrap();
        trie.search(&seq("AC"), false).unwrap();
        trie.contains(&seq("TT")).unwrap();
        assert_eq!(trie.render(PrintMode::Stats).unwrap(), first);
    }

    #[test]
    fn store_reopens_from_its_ledger() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("CGCG")).unwrap();
        trie.insert(&seq("CGAA")).unwrap();
        trie.flush().unwrap();
        trie.close().unwrap();

        let mut reopened = open(&dir);
        assert_eq!(reopened.len(), 2);
        let outcome = reopened.search(&seq("CGCG"), true).unwrap();
        assert_eq!(matches_as_text(&outcome), vec!["CGCG"]);

        // The resumed free list keeps working: new inserts and removes
        // still balance.
        reopened.insert(&seq("TTTT")).unwrap();
        assert_accounting_balances(&mut reopened);
        reopened.remove(&seq("CGAA")).unwrap();
        assert_accounting_balances(&mut reopened);
    }

    #[test]
    fn reopened_store_preserves_handles_across_further_mutations() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        for text in ["AAAA", "AACG", "TG"] {
            trie.insert(&seq(text)).unwrap();
        }
        trie.close().unwrap();

        let mut reopened = open(&dir);
        reopened.remove(&seq("AAAA")).unwrap();
        assert_fully_collapsed(&mut reopened);
        let outcome = reopened.search(&seq("AA"), false).unwrap();
        assert_eq!(matches_as_text(&outcome), vec!["AACG"]);
        assert_accounting_balances(&mut reopened);
    }

    #[test]
    fn flyweight_is_never_freed() {
        let dir = TempDir::new().unwrap();
        let mut trie = open(&dir);
        trie.insert(&seq("ACGT")).unwrap();
        trie.remove(&seq("ACGT")).unwrap();
        // Root is back to the flyweight and its record is intact.
        assert_eq!(trie.root, trie.empty);
        assert!(matches!(trie.load(Handle::new(trie.empty.addr())).unwrap(), Node::Empty));
    }
}
