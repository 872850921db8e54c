//! Counting-bound bin filter.
//!
//! A match with at most `e` edits leaves at least `(L - k + 1) - e * k` of the
//! query's `k`-windows untouched, since one edit destroys at most `k` of them.
//! A bin hit by fewer windows cannot hold such a match.

use tracing::warn;

use crate::index::InterleavedIndex;
use crate::partition::BinId;
use crate::sequence::Symbol;

/// Minimum number of query windows a bin must hold.
pub fn required_windows(query_len: usize, window_length: usize, errors: usize) -> usize {
    let windows = (query_len + 1).saturating_sub(window_length);
    windows.saturating_sub(errors * window_length)
}

/// Bins left for verification after filtering one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    /// Surviving bins, ascending.
    pub bins: Vec<BinId>,
    /// Window threshold that was applied.
    pub required: usize,
    /// `false` when the index could not be trusted and every bin was kept.
    pub filtered: bool,
}

/// Filter the bins of `index` for a query of `pattern` allowing `errors` edits.
///
/// The index only holds windows of paths up to its context length; a longer
/// match may combine alleles the index never saw together, so every bin is
/// kept instead.
pub fn candidate_bins(index: &InterleavedIndex, pattern: &[Symbol], errors: usize) -> Candidates {
    let span = pattern.len() + errors;
    if span > index.context_length() {
        warn!(
            span,
            context = index.context_length(),
            "query longer than index context, verifying every bin"
        );
        return Candidates {
            bins: (0..index.bin_count()).collect(),
            required: 0,
            filtered: false,
        };
    }
    let required = required_windows(pattern.len(), index.window_length(), errors);
    let windows = index.windows(pattern);
    Candidates {
        bins: index.candidate_bins(&windows, required),
        required,
        filtered: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::sequence::encode;
    use crate::store::RcsStore;

    fn syms(s: &str) -> Vec<Symbol> {
        encode(s.as_bytes()).unwrap()
    }

    #[test]
    fn counting_bound() {
        assert_eq!(required_windows(4, 3, 0), 2);
        assert_eq!(required_windows(4, 3, 1), 0);
        assert_eq!(required_windows(2, 3, 0), 0);
        assert_eq!(required_windows(20, 5, 2), 6);
    }

    fn two_region_index(context_length: usize) -> InterleavedIndex {
        let reference = syms("AAAAAAAAAAAAAAAAAAAACCCCCCCCCCCCCCCCCCCC");
        let store = RcsStore::new(&reference).unwrap();
        let config = IndexConfig::default()
            .with_window_length(4)
            .with_slots(4096)
            .with_bin_count(2)
            .with_context_length(context_length);
        InterleavedIndex::build(&store, &config).unwrap()
    }

    #[test]
    fn discards_bins_without_enough_windows() {
        let index = two_region_index(8);
        let candidates = candidate_bins(&index, &syms("CCCCCC"), 0);
        assert!(candidates.filtered);
        assert_eq!(candidates.required, 3);
        assert_eq!(candidates.bins, vec![1]);
    }

    #[test]
    fn zero_requirement_keeps_every_bin() {
        let index = two_region_index(8);
        let candidates = candidate_bins(&index, &syms("CCCCCC"), 1);
        assert_eq!(candidates.required, 0);
        assert_eq!(candidates.bins, vec![0, 1]);
    }

    #[test]
    fn long_queries_skip_filtering() {
        let index = two_region_index(4);
        let candidates = candidate_bins(&index, &syms("CCCCCC"), 0);
        assert!(!candidates.filtered);
        assert_eq!(candidates.bins, vec![0, 1]);
    }
}
