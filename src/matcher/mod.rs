//! Resumable bit-parallel pattern matchers.
//!
//! A matcher holds only the immutable pattern tables; everything that changes
//! while scanning a haystack lives in a separate `State` value. States are
//! plain data: cloning one at a branch point and advancing the copies
//! independently is all a forking traversal needs.

mod exact;
mod myers;

pub use exact::{ExactMatcher, ExactState};
pub use myers::{EditDistanceMatcher, EditDistanceState};

use thiserror::Error;

use crate::sequence::{AlphabetError, Symbol};

/// Lifecycle of one matcher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing consumed yet.
    Initialized,
    /// Consuming, no match at the current position.
    Consuming,
    /// The pattern matches ending at the current position.
    Matched,
    /// The haystack ended; no further input is accepted.
    Exhausted,
}

/// Errors raised by matchers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatcherError {
    /// Zero-length pattern.
    #[error("pattern is empty")]
    EmptyPattern,

    /// Pattern or haystack byte outside the alphabet.
    #[error(transparent)]
    Alphabet(#[from] AlphabetError),

    /// Input after [`ResumableMatcher::finish`].
    #[error("matcher state is exhausted")]
    Exhausted,
}

/// Common contract of exact and bounded-edit-distance matchers.
pub trait ResumableMatcher {
    /// Snapshot-able scanning state.
    type State: Clone + std::fmt::Debug;

    /// Length of the pattern.
    fn pattern_len(&self) -> usize;

    /// Largest distance still reported as a match.
    fn error_budget(&self) -> usize;

    /// Fresh state positioned before the first haystack symbol.
    fn start(&self) -> Self::State;

    /// Advance `state` by one haystack symbol in place.
    fn step(&self, state: &mut Self::State, symbol: Symbol) -> Result<(), MatcherError>;

    /// Haystack symbols consumed by `state`.
    fn offset(&self, state: &Self::State) -> usize;

    /// Distance of the best match ending at the current position, if within budget.
    fn distance(&self, state: &Self::State) -> Option<usize>;

    /// Current lifecycle phase.
    fn phase(&self, state: &Self::State) -> Phase;

    /// Mark the haystack as ended.
    fn finish(&self, state: &mut Self::State);

    /// Advance a copy of `state` by one symbol.
    fn consume(&self, state: &Self::State, symbol: Symbol) -> Result<Self::State, MatcherError> {
        let mut next = state.clone();
        self.step(&mut next, symbol)?;
        Ok(next)
    }

    /// Advance a copy of `state` by one ASCII haystack byte.
    fn consume_ascii(&self, state: &Self::State, byte: u8) -> Result<Self::State, MatcherError> {
        let symbol = Symbol::from_ascii(byte).ok_or(AlphabetError {
            symbol: byte as char,
            offset: self.offset(state),
        })?;
        self.consume(state, symbol)
    }

    /// Capture `state` for later resumption.
    fn snapshot(&self, state: &Self::State) -> Self::State {
        state.clone()
    }

    /// Resume from a snapshot.
    fn restore(&self, snapshot: Self::State) -> Self::State {
        snapshot
    }

    /// Whether the pattern matches ending at the current position.
    fn is_match(&self, state: &Self::State) -> bool {
        self.distance(state).is_some()
    }
}

/// Phase after a symbol was consumed.
pub(crate) fn phase_after(matched: bool) -> Phase {
    if matched {
        Phase::Matched
    } else {
        Phase::Consuming
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::encode;

    fn syms(s: &str) -> Vec<Symbol> {
        encode(s.as_bytes()).unwrap()
    }

    fn match_ends<M: ResumableMatcher>(matcher: &M, haystack: &[Symbol]) -> Vec<(usize, usize)> {
        let mut state = matcher.start();
        let mut ends = Vec::new();
        for &symbol in haystack {
            matcher.step(&mut state, symbol).unwrap();
            if let Some(distance) = matcher.distance(&state) {
                ends.push((matcher.offset(&state), distance));
            }
        }
        ends
    }

    #[test]
    fn exact_and_edit_distance_agree_at_zero_budget() {
        let pattern = syms("TACG");
        let haystack = syms("ACGTACGTTACGA");
        let exact = ExactMatcher::new(&pattern).unwrap();
        let approx = EditDistanceMatcher::new(&pattern, 0).unwrap();
        assert_eq!(match_ends(&exact, &haystack), vec![(7, 0), (12, 0)]);
        assert_eq!(match_ends(&exact, &haystack), match_ends(&approx, &haystack));
    }

    #[test]
    fn ascii_input_is_checked() {
        let matcher = ExactMatcher::new(&syms("AC")).unwrap();
        let state = matcher.consume_ascii(&matcher.start(), b'a').unwrap();
        let err = matcher.consume_ascii(&state, b'#').unwrap_err();
        assert_eq!(
            err,
            MatcherError::Alphabet(AlphabetError { symbol: '#', offset: 1 })
        );
        let state = matcher.consume_ascii(&state, b'c').unwrap();
        assert!(matcher.is_match(&state));
    }

    #[test]
    fn lifecycle_follows_phases() {
        let matcher = EditDistanceMatcher::new(&syms("GG"), 0).unwrap();
        let mut state = matcher.start();
        assert_eq!(matcher.phase(&state), Phase::Initialized);
        state = matcher.consume(&state, Symbol::G).unwrap();
        assert_eq!(matcher.phase(&state), Phase::Consuming);
        state = matcher.consume(&state, Symbol::G).unwrap();
        assert_eq!(matcher.phase(&state), Phase::Matched);
        state = matcher.consume(&state, Symbol::G).unwrap();
        assert_eq!(matcher.phase(&state), Phase::Matched);
        matcher.finish(&mut state);
        assert_eq!(matcher.phase(&state), Phase::Exhausted);
        assert_eq!(matcher.consume(&state, Symbol::A).unwrap_err(), MatcherError::Exhausted);
    }

    #[test]
    fn snapshot_resumes_identically() {
        let matcher = EditDistanceMatcher::new(&syms("ACGTTGCA"), 2).unwrap();
        let haystack = syms("TTACGATTGCATTTACGTTGGCA");
        let full = match_ends(&matcher, &haystack);

        let mut state = matcher.start();
        for &symbol in &haystack[..9] {
            matcher.step(&mut state, symbol).unwrap();
        }
        let mut resumed = matcher.restore(matcher.snapshot(&state));
        let mut tail = Vec::new();
        for &symbol in &haystack[9..] {
            matcher.step(&mut resumed, symbol).unwrap();
            if let Some(distance) = matcher.distance(&resumed) {
                tail.push((matcher.offset(&resumed), distance));
            }
        }
        let expected: Vec<_> = full.into_iter().filter(|&(end, _)| end > 9).collect();
        assert_eq!(tail, expected);
    }
}
