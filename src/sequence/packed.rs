use std::fmt;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use super::Symbol;

/// Number of symbols encoded per `u64` chunk.
const SYMBOLS_PER_WORD: usize = 32;
/// Bits used to encode a single canonical base (A/C/G/T).
const BITS_PER_BASE: usize = 2;

/// Reference sequence stored with 2 bits per base.
///
/// Only A, C, G and T are stored in the packed words; `N` positions are
/// tracked in a separate ambiguity mask so that decoding restores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedSequence {
    data: Vec<u64>,
    len: usize,
    ambiguity: BitVec,
}

impl PackedSequence {
    /// Pack a symbol slice.
    pub fn from_symbols(symbols: &[Symbol]) -> Self {
        let mut data = vec![0u64; words_for_len(symbols.len())];
        let mut ambiguity = bitvec![0; symbols.len()];

        for (idx, &symbol) in symbols.iter().enumerate() {
            if symbol == Symbol::N {
                ambiguity.set(idx, true);
                continue;
            }
            let (word_idx, bit_shift) = word_position(idx);
            data[word_idx] |= (symbol.rank() as u64) << bit_shift;
        }

        Self {
            data,
            len: symbols.len(),
            ambiguity,
        }
    }

    /// Number of symbols in the sequence.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Symbol at `idx`, or `None` past the end.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<Symbol> {
        if idx >= self.len {
            return None;
        }
        if self.ambiguity[idx] {
            return Some(Symbol::N);
        }
        let (word_idx, bit_shift) = word_position(idx);
        let code = ((self.data[word_idx] >> bit_shift) & 0b11) as usize;
        Symbol::from_rank(code)
    }

    /// Decode into a newly allocated vector.
    pub fn to_vec(&self) -> Vec<Symbol> {
        self.iter().collect()
    }

    /// Iterate over the symbols of `range`, clamped to the sequence.
    pub fn range(&self, start: usize, end: usize) -> PackedSequenceIter<'_> {
        PackedSequenceIter {
            sequence: self,
            index: start.min(self.len),
            end: end.min(self.len),
        }
    }

    /// Iterate over all symbols.
    pub fn iter(&self) -> PackedSequenceIter<'_> {
        self.range(0, self.len)
    }

    /// Packed words (little-endian symbol order), useful for hashing.
    pub fn words(&self) -> &[u64] {
        &self.data
    }

    /// Ambiguity mask (one bit per symbol, set for `N`).
    pub fn ambiguity(&self) -> &BitSlice {
        &self.ambiguity
    }

    /// Whether the packed words and the ambiguity mask agree with `len`.
    pub(crate) fn is_well_formed(&self) -> bool {
        self.data.len() == words_for_len(self.len) && self.ambiguity.len() == self.len
    }
}

impl fmt::Display for PackedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decoded: String = self.iter().map(|symbol| symbol.to_ascii() as char).collect();
        write!(f, "{decoded}")
    }
}

/// Iterator over a range of a [`PackedSequence`].
#[derive(Debug, Clone)]
pub struct PackedSequenceIter<'a> {
    sequence: &'a PackedSequence,
    index: usize,
    end: usize,
}

impl Iterator for PackedSequenceIter<'_> {
    type Item = Symbol;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.end {
            return None;
        }
        let symbol = self.sequence.get(self.index);
        self.index += 1;
        symbol
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PackedSequenceIter<'_> {}

fn words_for_len(len: usize) -> usize {
    (len + SYMBOLS_PER_WORD - 1) / SYMBOLS_PER_WORD
}

fn word_position(idx: usize) -> (usize, usize) {
    let word_idx = idx / SYMBOLS_PER_WORD;
    let bit_shift = (idx % SYMBOLS_PER_WORD) * BITS_PER_BASE;
    (word_idx, bit_shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::encode;

    #[test]
    fn pack_and_decode_roundtrip() {
        let symbols = encode(b"ACGTACGTNNACGTTTTTGGGGCCCCAAAANACGT").unwrap();
        let packed = PackedSequence::from_symbols(&symbols);
        assert_eq!(packed.len(), symbols.len());
        assert_eq!(packed.to_vec(), symbols);
        assert_eq!(packed.to_string(), "ACGTACGTNNACGTTTTTGGGGCCCCAAAANACGT");
    }

    #[test]
    fn range_is_clamped() {
        let packed = PackedSequence::from_symbols(&encode(b"ACGT").unwrap());
        let tail: Vec<Symbol> = packed.range(2, 10).collect();
        assert_eq!(tail, vec![Symbol::G, Symbol::T]);
        assert_eq!(packed.range(5, 7).count(), 0);
        assert_eq!(packed.get(4), None);
        assert!(packed.is_well_formed());
    }
}
