//! The DNA alphabet and the packed payload codec.
//!
//! Sequences are stored as a big-endian 2-bit-per-base packing (A=00,
//! C=01, G=10, T=11) with leading zero bytes elided, so a run of leading
//! `A`s vanishes from the stored form. Decoding therefore needs the base
//! count, which the trie keeps in the leaf; the count restores the elided
//! leading bases. The `$` terminator used during trie navigation is never
//! encoded.

use std::fmt;

use snafu::{ensure, Snafu};

/// Longest sequence a leaf can describe with its 16-bit base count.
pub const MAX_SEQUENCE_BASES: usize = u16::MAX as usize;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum SequenceError {
    #[snafu(display("sequence is empty"))]
    Empty,

    #[snafu(display("invalid character {ch:?} at position {position}"))]
    InvalidCharacter { ch: char, position: usize },

    #[snafu(display("sequence of {len} bases exceeds the {MAX_SEQUENCE_BASES}-base limit"))]
    TooLong { len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Base {
    A,
    C,
    G,
    T,
}

impl Base {
    pub fn code(self) -> u8 {
        match self {
            Base::A => 0b00,
            Base::C => 0b01,
            Base::G => 0b10,
            Base::T => 0b11,
        }
    }

    fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0b00 => Base::A,
            0b01 => Base::C,
            0b10 => Base::G,
            _ => Base::T,
        }
    }

    pub fn from_char(ch: char) -> Option<Self> {
        match ch {
            'A' => Some(Base::A),
            'C' => Some(Base::C),
            'G' => Some(Base::G),
            'T' => Some(Base::T),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Base::A => 'A',
            Base::C => 'C',
            Base::G => 'G',
            Base::T => 'T',
        }
    }

    /// Child slot of this base in an internal trie node.
    pub fn slot(self) -> usize {
        usize::from(self.code())
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Parses a sequence of `A`/`C`/`G`/`T` characters (case-sensitive). Any
/// other character, an empty input, or a sequence past the base-count
/// limit is rejected.
pub fn parse(text: &str) -> Result<Vec<Base>, SequenceError> {
    ensure!(!text.is_empty(), EmptySnafu);
    let len = text.chars().count();
    ensure!(len <= MAX_SEQUENCE_BASES, TooLongSnafu { len });
    text.chars()
        .enumerate()
        .map(|(position, ch)| Base::from_char(ch).ok_or(SequenceError::InvalidCharacter { ch, position }))
        .collect()
}

pub fn format(bases: &[Base]) -> String {
    bases.iter().map(|b| b.as_char()).collect()
}

/// Packs a sequence into its stored form: the bases as one big-endian
/// 2-bit-per-base integer, minimal-width with leading zero bytes trimmed
/// (at least one byte remains, so an all-`A` sequence packs to `[0x00]`).
/// An empty sequence packs to nothing.
pub fn pack(bases: &[Base]) -> Vec<u8> {
    if bases.is_empty() {
        return Vec::new();
    }
    let count = bases.len();
    let width = (2 * count + 7) / 8;
    let mut packed = vec![0u8; width];
    for (idx, base) in bases.iter().enumerate() {
        let shift = 2 * (count - 1 - idx);
        packed[width - 1 - shift / 8] |= base.code() << (shift % 8);
    }
    let lead = packed.iter().take_while(|&&byte| byte == 0).count().min(width - 1);
    packed.drain(..lead);
    packed
}

/// Restores `count` bases from a packed payload, reintroducing the
/// leading bases the packing elided.
pub fn unpack(packed: &[u8], count: usize) -> Vec<Base> {
    let mut bases = Vec::with_capacity(count);
    for idx in 0..count {
        let shift = 2 * (count - 1 - idx);
        let code = if shift / 8 < packed.len() {
            packed[packed.len() - 1 - shift / 8] >> (shift % 8)
        } else {
            0
        };
        bases.push(Base::from_code(code));
    }
    bases
}

/// Occurrences of A, C, G, T, in that order.
pub fn base_counts(bases: &[Base]) -> [usize; 4] {
    let mut counts = [0; 4];
    for base in bases {
        counts[base.slot()] += 1;
    }
    counts
}
