//! Dispatches commands to the trie and prints outcomes.
//!
//! User errors (bad sequences, duplicates, misses, malformed lines) are
//! reported on stdout and the run continues; engine errors are fatal and
//! abort the run.

use std::io::{BufRead, Write};

use anyhow::Context as _;
use dnastore_engine::{
    dna,
    manager::AllocError,
    trie::SearchOutcome,
    CacheStats, DnaTrie, PrintMode, TrieError,
};

use crate::commands::{self, Command};

pub struct Controller {
    trie: DnaTrie,
}

impl Controller {
    pub fn new(trie: DnaTrie) -> Self {
        Self { trie }
    }

    /// Runs every line of the command file, in arrival order, to
    /// completion or the first fatal error.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> anyhow::Result<()> {
        for line in input.lines() {
            let line = line.context("failed to read command file")?;
            self.execute(&line, out)?;
        }
        Ok(())
    }

    /// Executes one command line. Returns an error only for fatal engine
    /// failures.
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> anyhow::Result<()> {
        let Some(parsed) = commands::parse(line) else {
            return Ok(());
        };
        match parsed {
            Err(reason) => writeln!(out, "{reason}")?,
            Ok(Command::Insert(text)) => self.insert(&text, out)?,
            Ok(Command::Remove(text)) => self.remove(&text, out)?,
            Ok(Command::Search(text)) => self.search(&text, out)?,
            Ok(Command::Print(mode)) => self.print(mode, out)?,
        }
        Ok(())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.trie.cache_stats()
    }

    pub fn sequences(&self) -> u64 {
        self.trie.len()
    }

    /// Flushes and closes the underlying store.
    pub fn close(self) -> Result<(), TrieError> {
        self.trie.close()
    }

    fn insert<W: Write>(&mut self, text: &str, out: &mut W) -> anyhow::Result<()> {
        let Ok(bases) = dna::parse(text) else {
            writeln!(out, "invalid sequence \"{text}\"")?;
            return Ok(());
        };
        match self.trie.insert(&bases) {
            Ok(outcome) => writeln!(
                out,
                "stored {} bytes ({} characters) starting at position {}",
                outcome.stored_bytes, outcome.bases, outcome.address
            )?,
            Err(TrieError::Duplicate) => writeln!(out, "sequence \"{text}\" is a duplicate")?,
            Err(TrieError::InvalidSequence) => writeln!(out, "invalid sequence \"{text}\"")?,
            Err(TrieError::Alloc { source: AllocError::OutOfSpace }) => {
                writeln!(out, "insufficient space for sequence \"{text}\"")?;
            }
            Err(fatal) => return Err(fatal).context("insert failed"),
        }
        Ok(())
    }

    fn remove<W: Write>(&mut self, text: &str, out: &mut W) -> anyhow::Result<()> {
        let Ok(bases) = dna::parse(text) else {
            writeln!(out, "invalid sequence \"{text}\"")?;
            return Ok(());
        };
        match self.trie.remove(&bases) {
            Ok(outcome) => writeln!(
                out,
                "freed {} bytes ({} characters) starting at position {}",
                outcome.stored_bytes, outcome.bases, outcome.address
            )?,
            Err(TrieError::NotFound) => writeln!(out, "sequence \"{text}\" not found")?,
            Err(TrieError::InvalidSequence) => writeln!(out, "invalid sequence \"{text}\"")?,
            Err(fatal) => return Err(fatal).context("remove failed"),
        }
        Ok(())
    }

    fn search<W: Write>(&mut self, text: &str, out: &mut W) -> anyhow::Result<()> {
        // A trailing terminator turns the query into an exact match.
        let (body, exact) = match text.strip_suffix('$') {
            Some(body) => (body, true),
            None => (text, false),
        };
        let Ok(bases) = dna::parse(body) else {
            writeln!(out, "invalid sequence \"{text}\"")?;
            return Ok(());
        };
        let outcome: SearchOutcome = match self.trie.search(&bases, exact) {
            Ok(outcome) => outcome,
            Err(TrieError::InvalidSequence) => {
                writeln!(out, "invalid sequence \"{text}\"")?;
                return Ok(());
            }
            Err(fatal) => return Err(fatal).context("search failed"),
        };
        writeln!(out, "Nodes visited: {}", outcome.visits)?;
        if outcome.matches.is_empty() {
            writeln!(out, "sequence \"{text}\" not found")?;
        } else {
            for matched in &outcome.matches {
                writeln!(out, "sequence: {}", dna::format(matched))?;
            }
        }
        Ok(())
    }

    fn print<W: Write>(&mut self, mode: PrintMode, out: &mut W) -> anyhow::Result<()> {
        let rendering = self.trie.render(mode).context("print failed")?;
        out.write_all(rendering.as_bytes())?;
        if self.trie.free_list().is_empty() {
            writeln!(out, "Free blocks: none")?;
        } else {
            writeln!(out, "Free blocks: {}", self.trie.free_list())?;
        }
        let resident = self.trie.resident_blocks();
        if resident.is_empty() {
            writeln!(out, "Buffers: none")?;
        } else {
            let ids: Vec<String> = resident.iter().map(u64::to_string).collect();
            writeln!(out, "Buffers: {}", ids.join(", "))?;
        }
        Ok(())
    }
}
