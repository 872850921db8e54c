use crate::sequence::{Symbol, ALPHABET_SIZE};

use super::{phase_after, MatcherError, Phase, ResumableMatcher};

/// Shift-And state: bit `i` set when `pattern[..=i]` ends at the current offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactState {
    active: Vec<u64>,
    offset: usize,
    phase: Phase,
}

/// Exact matcher over patterns of any length (one word per 64 symbols).
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    masks: [Vec<u64>; ALPHABET_SIZE],
    len: usize,
}

impl ExactMatcher {
    /// Precompute symbol masks for `pattern`.
    pub fn new(pattern: &[Symbol]) -> Result<Self, MatcherError> {
        if pattern.is_empty() {
            return Err(MatcherError::EmptyPattern);
        }
        let words = (pattern.len() + 63) / 64;
        let mut masks: [Vec<u64>; ALPHABET_SIZE] = Default::default();
        for mask in masks.iter_mut() {
            *mask = vec![0; words];
        }
        for (i, symbol) in pattern.iter().enumerate() {
            masks[symbol.rank()][i / 64] |= 1 << (i % 64);
        }
        Ok(Self {
            masks,
            len: pattern.len(),
        })
    }

    fn last_bit(&self) -> (usize, u64) {
        let last = self.len - 1;
        (last / 64, 1 << (last % 64))
    }
}

impl ResumableMatcher for ExactMatcher {
    type State = ExactState;

    fn pattern_len(&self) -> usize {
        self.len
    }

    fn error_budget(&self) -> usize {
        0
    }

    fn start(&self) -> ExactState {
        ExactState {
            active: vec![0; self.masks[0].len()],
            offset: 0,
            phase: Phase::Initialized,
        }
    }

    fn step(&self, state: &mut ExactState, symbol: Symbol) -> Result<(), MatcherError> {
        if state.phase == Phase::Exhausted {
            return Err(MatcherError::Exhausted);
        }
        let mask = &self.masks[symbol.rank()];
        let mut carry = 1;
        for (word, &m) in state.active.iter_mut().zip(mask) {
            let shifted = (*word << 1) | carry;
            carry = *word >> 63;
            *word = shifted & m;
        }
        state.offset += 1;
        let (word, bit) = self.last_bit();
        state.phase = phase_after(state.active[word] & bit != 0);
        Ok(())
    }

    fn offset(&self, state: &ExactState) -> usize {
        state.offset
    }

    fn distance(&self, state: &ExactState) -> Option<usize> {
        let (word, bit) = self.last_bit();
        (state.active[word] & bit != 0).then_some(0)
    }

    fn phase(&self, state: &ExactState) -> Phase {
        state.phase
    }

    fn finish(&self, state: &mut ExactState) {
        state.phase = Phase::Exhausted;
    }
}
