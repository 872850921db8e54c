//! Myers/Hyyrö bit-vector edit distance, semi-global (free start in the
//! haystack), split into 64-row blocks.
//!
//! Column `j` of the DP matrix is stored as vertical deltas: bit `i` of `pv`
//! (`mv`) is set when `D[i + 1][j] - D[i][j]` is `+1` (`-1`). The score of the
//! last pattern row is tracked explicitly.

use crate::sequence::{Symbol, ALPHABET_SIZE};

use super::{phase_after, MatcherError, Phase, ResumableMatcher};

const HIGH_BIT: u64 = 1 << 63;

/// Scanning state of an [`EditDistanceMatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDistanceState {
    pv: Vec<u64>,
    mv: Vec<u64>,
    score: usize,
    offset: usize,
    phase: Phase,
}

/// Approximate matcher reporting end positions within an error budget.
#[derive(Debug, Clone)]
pub struct EditDistanceMatcher {
    peq: [Vec<u64>; ALPHABET_SIZE],
    len: usize,
    budget: usize,
    /// Bit of the last pattern row inside the last block.
    last_row: u64,
}

/// Advance one block by one column given the horizontal delta `hin` entering
/// its top row. Returns the horizontal delta leaving the row selected by
/// `out_bit`.
#[inline]
fn advance_block(pv: &mut u64, mv: &mut u64, eq: u64, hin: i8, out_bit: u64) -> i8 {
    let p = *pv;
    let m = *mv;
    let xv = eq | m;
    let eq = if hin < 0 { eq | 1 } else { eq };
    let xh = ((eq & p).wrapping_add(p) ^ p) | eq;

    let mut ph = m | !(xh | p);
    let mut mh = p & xh;

    let hout = if ph & out_bit != 0 {
        1
    } else if mh & out_bit != 0 {
        -1
    } else {
        0
    };

    ph <<= 1;
    mh <<= 1;
    if hin < 0 {
        mh |= 1;
    } else if hin > 0 {
        ph |= 1;
    }

    *pv = mh | !(xv | ph);
    *mv = ph & xv;
    hout
}

impl EditDistanceMatcher {
    /// Precompute equality masks; budgets above the pattern length are clamped.
    pub fn new(pattern: &[Symbol], error_budget: usize) -> Result<Self, MatcherError> {
        if pattern.is_empty() {
            return Err(MatcherError::EmptyPattern);
        }
        let blocks = (pattern.len() + 63) / 64;
        let mut peq: [Vec<u64>; ALPHABET_SIZE] = Default::default();
        for mask in peq.iter_mut() {
            *mask = vec![0; blocks];
        }
        for (i, symbol) in pattern.iter().enumerate() {
            peq[symbol.rank()][i / 64] |= 1 << (i % 64);
        }
        Ok(Self {
            peq,
            len: pattern.len(),
            budget: error_budget.min(pattern.len()),
            last_row: 1 << ((pattern.len() - 1) % 64),
        })
    }
}

impl ResumableMatcher for EditDistanceMatcher {
    type State = EditDistanceState;

    fn pattern_len(&self) -> usize {
        self.len
    }

    fn error_budget(&self) -> usize {
        self.budget
    }

    fn start(&self) -> EditDistanceState {
        let blocks = self.peq[0].len();
        EditDistanceState {
            pv: vec![u64::MAX; blocks],
            mv: vec![0; blocks],
            score: self.len,
            offset: 0,
            phase: Phase::Initialized,
        }
    }

    fn step(&self, state: &mut EditDistanceState, symbol: Symbol) -> Result<(), MatcherError> {
        if state.phase == Phase::Exhausted {
            return Err(MatcherError::Exhausted);
        }
        let eq = &self.peq[symbol.rank()];
        let last = eq.len() - 1;
        // Row 0 is all zeros: a match may start anywhere.
        let mut hin = 0;
        for block in 0..=last {
            let out_bit = if block == last { self.last_row } else { HIGH_BIT };
            hin = advance_block(
                &mut state.pv[block],
                &mut state.mv[block],
                eq[block],
                hin,
                out_bit,
            );
        }
        // The score never leaves [0, len].
        state.score = match hin {
            1 => state.score + 1,
            -1 => state.score.saturating_sub(1),
            _ => state.score,
        };
        state.offset += 1;
        state.phase = phase_after(state.score <= self.budget);
        Ok(())
    }

    fn offset(&self, state: &EditDistanceState) -> usize {
        state.offset
    }

    fn distance(&self, state: &EditDistanceState) -> Option<usize> {
        (state.offset > 0 && state.score <= self.budget).then_some(state.score)
    }

    fn phase(&self, state: &EditDistanceState) -> Phase {
        state.phase
    }

    fn finish(&self, state: &mut EditDistanceState) {
        state.phase = Phase::Exhausted;
    }
}
