//! Fixed nucleotide alphabet and packed reference storage.
//!
//! Every sequence that enters the crate (reference, haplotypes, queries) is
//! converted to [`Symbol`] values at the boundary; everything downstream can
//! then assume a valid alphabet.

mod packed;

pub use packed::{PackedSequence, PackedSequenceIter};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of symbols in the alphabet (A, C, G, T, N).
pub const ALPHABET_SIZE: usize = 5;

/// Bits needed to pack one symbol rank into a k-mer code.
pub const BITS_PER_SYMBOL: u32 = 3;

/// Nucleotide symbol with ambiguity code `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Symbol {
    /// Adenine.
    A = 0,
    /// Cytosine.
    C = 1,
    /// Guanine.
    G = 2,
    /// Thymine/Uracil.
    T = 3,
    /// Ambiguous base.
    N = 4,
}

impl Symbol {
    /// All symbols in rank order.
    pub const ALL: [Symbol; ALPHABET_SIZE] = [Symbol::A, Symbol::C, Symbol::G, Symbol::T, Symbol::N];

    /// Attempt to parse an ASCII base into a [`Symbol`].
    pub fn from_ascii(base: u8) -> Option<Self> {
        match base {
            b'A' | b'a' => Some(Symbol::A),
            b'C' | b'c' => Some(Symbol::C),
            b'G' | b'g' => Some(Symbol::G),
            b'T' | b't' | b'U' | b'u' => Some(Symbol::T),
            b'N' | b'n' => Some(Symbol::N),
            _ => None,
        }
    }

    /// Uppercase ASCII representation.
    pub fn to_ascii(self) -> u8 {
        match self {
            Symbol::A => b'A',
            Symbol::C => b'C',
            Symbol::G => b'G',
            Symbol::T => b'T',
            Symbol::N => b'N',
        }
    }

    /// Rank of the symbol, usable as a table index.
    #[inline]
    pub fn rank(self) -> usize {
        self as usize
    }

    /// Inverse of [`Symbol::rank`].
    pub fn from_rank(rank: usize) -> Option<Self> {
        Self::ALL.get(rank).copied()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ascii() as char)
    }
}

/// A byte outside the supported alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported symbol '{symbol}' at offset {offset}")]
pub struct AlphabetError {
    /// Character that could not be encoded.
    pub symbol: char,
    /// Offset of the character within its sequence.
    pub offset: usize,
}

/// Encode an ASCII sequence into symbols.
pub fn encode(sequence: &[u8]) -> Result<Vec<Symbol>, AlphabetError> {
    sequence
        .iter()
        .enumerate()
        .map(|(offset, &byte)| {
            Symbol::from_ascii(byte).ok_or(AlphabetError {
                symbol: byte as char,
                offset,
            })
        })
        .collect()
}

/// Decode symbols back into uppercase ASCII.
pub fn decode(symbols: &[Symbol]) -> Vec<u8> {
    symbols.iter().map(|symbol| symbol.to_ascii()).collect()
}
