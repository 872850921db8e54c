//! Query pipeline: filter bins on the index, then verify the survivors by
//! walking their tree paths with a resumable matcher.
//!
//! Each query is walked with a context of `L + e` symbols, the longest text a
//! match within budget can span. Every haplotype position is then reported
//! from exactly the paths whose trailing window equals the haplotype's, so a
//! distance seen on a path is the haplotype's distance.

mod filter;

pub use filter::{candidate_bins, required_windows, Candidates};

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SearchConfig};
use crate::framework::{thread_pool, FrameworkError};
use crate::index::{IndexError, InterleavedIndex};
use crate::matcher::{EditDistanceMatcher, ExactMatcher, MatcherError, ResumableMatcher};
use crate::partition::BinId;
use crate::sequence::{encode, Symbol};
use crate::store::{HaplotypeId, RcsStore};
use crate::tree::{PathVisitor, SequenceTree, Step, TreeError};

/// Errors of a search call.
///
/// [`SearchError::Matcher`] only ever concerns a single query and ends up in
/// [`SearchReport::failures`]; every other variant aborts the call.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Invalid search parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Index does not belong to the store.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Tree walk failed.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Worker pool could not be created.
    #[error(transparent)]
    Framework(#[from] FrameworkError),

    /// Query rejected by the matcher.
    #[error(transparent)]
    Matcher(#[from] MatcherError),
}

/// One query sequence, kept as raw bytes until it is searched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Caller-chosen identifier echoed in results.
    pub id: usize,
    /// ASCII nucleotides.
    pub sequence: Vec<u8>,
}

impl Query {
    /// Wrap `sequence` under `id`.
    pub fn new(id: usize, sequence: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            sequence: sequence.into(),
        }
    }
}

/// A query occurrence in one haplotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Match {
    /// Query identifier.
    pub query_id: usize,
    /// Haplotype carrying the occurrence.
    pub haplotype_id: HaplotypeId,
    /// Haplotype coordinate one past the last matched symbol: the exclusive
    /// end of the match, not its start. An exact hit of a query of length `L`
    /// covers `position - L..position`, so `TACG` in `ACGTACGT` reports 7.
    pub position: usize,
    /// Edit distance of the best alignment ending there.
    pub distance: usize,
    /// Bin whose walk found the occurrence.
    pub bin_id: BinId,
    /// Reference coordinate of the last matched symbol; payload symbols
    /// report their edit position.
    pub reference_position: usize,
}

/// A query that could not be searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    /// Query identifier.
    pub query_id: usize,
    /// Reason.
    pub error: MatcherError,
}

/// Outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchReport {
    /// Matches sorted by query, haplotype and position.
    pub matches: Vec<Match>,
    /// Rejected queries, in input order.
    pub failures: Vec<QueryFailure>,
}

impl SearchReport {
    /// Matches of query `query_id`.
    pub fn matches_for(&self, query_id: usize) -> impl Iterator<Item = &Match> + '_ {
        self.matches.iter().filter(move |m| m.query_id == query_id)
    }
}

/// Runs one matcher along every path of a bin.
struct MatchCollector<'m, M> {
    matcher: &'m M,
    query_id: usize,
    bin_id: BinId,
    found: Vec<Match>,
    paths: usize,
    error: Option<MatcherError>,
}

impl<M: ResumableMatcher> PathVisitor for MatchCollector<'_, M> {
    type State = M::State;

    fn step(&mut self, state: &mut M::State, symbol: Symbol, step: &Step<'_>) {
        if self.error.is_some() {
            return;
        }
        if let Err(error) = self.matcher.step(state, symbol) {
            self.error = Some(error);
            return;
        }
        if !step.is_reported() {
            return;
        }
        let Some(distance) = self.matcher.distance(state) else {
            return;
        };
        let reference_position = step.origin().reference_position();
        for haplotype_id in step.window_coverage().iter() {
            if let Some(position) = step.haplotype_position(haplotype_id) {
                self.found.push(Match {
                    query_id: self.query_id,
                    haplotype_id,
                    position: position + 1,
                    distance,
                    bin_id: self.bin_id,
                    reference_position,
                });
            }
        }
    }

    fn end_path(&mut self, mut state: M::State) {
        self.matcher.finish(&mut state);
        self.paths += 1;
    }
}

/// Walk every bin in `bins` and keep the best match per haplotype position.
fn verify<M: ResumableMatcher>(
    matcher: &M,
    tree: &SequenceTree<'_>,
    index: &InterleavedIndex,
    bins: &[BinId],
    query_id: usize,
) -> Result<Vec<Match>, SearchError> {
    let mut best: BTreeMap<(HaplotypeId, usize), Match> = BTreeMap::new();
    for &bin_id in bins {
        let Some(range) = index.bin_ranges().get(bin_id) else {
            continue;
        };
        let mut collector = MatchCollector {
            matcher,
            query_id,
            bin_id,
            found: Vec::new(),
            paths: 0,
            error: None,
        };
        tree.walk(range.clone(), &mut collector, matcher.start())?;
        if let Some(error) = collector.error {
            return Err(error.into());
        }
        debug!(
            query = query_id,
            bin = bin_id,
            paths = collector.paths,
            hits = collector.found.len(),
            "bin verified"
        );
        for hit in collector.found {
            best.entry((hit.haplotype_id, hit.position))
                .and_modify(|kept| {
                    if hit.distance < kept.distance {
                        *kept = hit;
                    }
                })
                .or_insert(hit);
        }
    }
    Ok(best.into_values().collect())
}

fn search_query(
    query: &Query,
    layout: &SequenceTree<'_>,
    index: &InterleavedIndex,
    config: &SearchConfig,
) -> Result<Vec<Match>, SearchError> {
    let pattern = encode(&query.sequence).map_err(MatcherError::from)?;
    if pattern.is_empty() {
        return Err(MatcherError::EmptyPattern.into());
    }
    let errors = config.error_budget(pattern.len());
    let candidates = candidate_bins(index, &pattern, errors);
    let tree = layout.with_context(pattern.len() + errors)?;

    let matches = if errors == 0 {
        verify(&ExactMatcher::new(&pattern)?, &tree, index, &candidates.bins, query.id)?
    } else {
        let matcher = EditDistanceMatcher::new(&pattern, errors)?;
        verify(&matcher, &tree, index, &candidates.bins, query.id)?
    };
    debug!(
        query = query.id,
        len = pattern.len(),
        errors,
        required = candidates.required,
        candidates = candidates.bins.len(),
        matches = matches.len(),
        "query searched"
    );
    Ok(matches)
}

/// Search every query against every haplotype of `store`.
///
/// Queries run in parallel. A query that cannot be matched (empty, or holding
/// bytes outside the alphabet) is reported in [`SearchReport::failures`]
/// without affecting the others. An index built from another store revision
/// fails the whole call.
pub fn search(
    queries: &[Query],
    store: &RcsStore,
    index: &InterleavedIndex,
    config: &SearchConfig,
) -> Result<SearchReport, SearchError> {
    config.validate()?;
    index.check_store(store)?;
    let layout = SequenceTree::new(store, 1)?;
    let pool = thread_pool(config.thread_count)?;

    let outcomes: Vec<(usize, Result<Vec<Match>, SearchError>)> = pool.install(|| {
        queries
            .par_iter()
            .map(|query| (query.id, search_query(query, &layout, index, config)))
            .collect()
    });

    let mut report = SearchReport::default();
    for (query_id, outcome) in outcomes {
        match outcome {
            Ok(matches) => report.matches.extend(matches),
            Err(SearchError::Matcher(error)) => {
                warn!(query = query_id, %error, "query rejected");
                report.failures.push(QueryFailure { query_id, error });
            }
            Err(other) => return Err(other),
        }
    }
    report.matches.sort_unstable();
    info!(
        queries = queries.len(),
        matches = report.matches.len(),
        failed = report.failures.len(),
        error_rate = config.error_rate,
        "search finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::journal::Edit;
    use crate::sequence::AlphabetError;

    fn syms(s: &str) -> Vec<Symbol> {
        encode(s.as_bytes()).unwrap()
    }

    /// Reference `ACGTACGT` as haplotype 0 and `ACGTGCGT` as haplotype 1.
    fn scenario() -> (RcsStore, InterleavedIndex) {
        let mut store = RcsStore::new(&syms("ACGTACGT")).unwrap();
        store.add_journal(Vec::new()).unwrap();
        store.add_journal(vec![Edit::substitution(4, syms("G"))]).unwrap();
        let config = IndexConfig::default()
            .with_window_length(3)
            .with_slots(1024)
            .with_context_length(16)
            .with_bin_count(2);
        let index = InterleavedIndex::build(&store, &config).unwrap();
        (store, index)
    }

    #[test]
    fn exact_query_hits_reference_haplotype_only() {
        let (store, index) = scenario();
        let report = search(
            &[Query::new(0, "TACG")],
            &store,
            &index,
            &SearchConfig::default(),
        )
        .unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.matches.len(), 1);
        let hit = report.matches[0];
        assert_eq!(hit.haplotype_id, 0);
        assert_eq!(hit.position, 7);
        assert_eq!(hit.reference_position, 6);
        assert_eq!(hit.distance, 0);
    }

    #[test]
    fn one_edit_reaches_the_variant() {
        let (store, index) = scenario();
        let config = SearchConfig::default().with_error_rate(0.25);
        let report = search(&[Query::new(3, "TACG")], &store, &index, &config).unwrap();
        let variant: Vec<_> = report.matches.iter().filter(|m| m.haplotype_id == 1).collect();
        assert!(!variant.is_empty());
        assert!(variant.iter().all(|m| m.distance == 1));
        assert!(report
            .matches
            .iter()
            .any(|m| m.haplotype_id == 0 && m.position == 7 && m.distance == 0));
        assert!(report.matches.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn bad_queries_do_not_abort_the_batch() {
        let (store, index) = scenario();
        let queries = [
            Query::new(0, "TACG"),
            Query::new(1, ""),
            Query::new(2, "TAXG"),
        ];
        let report = search(&queries, &store, &index, &SearchConfig::default()).unwrap();
        assert_eq!(report.matches_for(0).count(), 1);
        assert_eq!(
            report.failures,
            vec![
                QueryFailure {
                    query_id: 1,
                    error: MatcherError::EmptyPattern,
                },
                QueryFailure {
                    query_id: 2,
                    error: MatcherError::Alphabet(AlphabetError {
                        symbol: 'X',
                        offset: 2,
                    }),
                },
            ]
        );
    }

    #[test]
    fn foreign_index_is_fatal() {
        let (mut store, index) = scenario();
        store.add_journal(vec![Edit::deletion(1, 2)]).unwrap();
        let err = search(
            &[Query::new(0, "TACG")],
            &store,
            &index,
            &SearchConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SearchError::Index(IndexError::IndexConsistency { .. })
        ));
    }

    #[test]
    fn matches_inside_payloads_and_across_deletions() {
        let mut store = RcsStore::new(&syms("ACGTACGTTGCAACGT")).unwrap();
        store
            .add_journal(vec![Edit::insertion(4, syms("GGAA")), Edit::deletion(10, 2)])
            .unwrap();
        let config = IndexConfig::default()
            .with_window_length(3)
            .with_slots(2048)
            .with_context_length(12)
            .with_bin_count(3);
        let index = InterleavedIndex::build(&store, &config).unwrap();

        // Haplotype 0 is ACGTGGAAACGTTGACGT.
        let report = search(
            &[Query::new(0, "TGGAA"), Query::new(1, "TTGACG")],
            &store,
            &index,
            &SearchConfig::default().with_thread_count(2),
        )
        .unwrap();
        let ends: Vec<_> = report
            .matches
            .iter()
            .map(|m| (m.query_id, m.haplotype_id, m.position))
            .collect();
        assert_eq!(ends, vec![(0, 0, 8), (1, 0, 17)]);
        assert_eq!(report.matches[0].reference_position, 4);
    }

    #[test]
    fn long_queries_fall_back_to_every_bin() {
        let mut store = RcsStore::new(&syms("ACGTTGCAACGGTACCATGA")).unwrap();
        store.add_journal(vec![Edit::substitution(9, syms("T"))]).unwrap();
        let config = IndexConfig::default()
            .with_window_length(3)
            .with_slots(1024)
            .with_context_length(4)
            .with_bin_count(2);
        let index = InterleavedIndex::build(&store, &config).unwrap();
        let report = search(
            &[Query::new(0, "GCAATGGTACC")],
            &store,
            &index,
            &SearchConfig::default(),
        )
        .unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].position, 16);
    }
}
