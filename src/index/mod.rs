//! Interleaved bit-vector index over bins.
//!
//! Every bin owns `slots` bits. The bits of all bins are interleaved slot
//! major (`slot * bin_count + bin`), so one hashed window selects a
//! contiguous row holding that slot for every bin; ANDing the rows of all
//! hash functions yields the bins that may contain the window.
//!
//! Each bin is filled by walking its part of the sequence tree with a context
//! of `max(k, context_length)` symbols and inserting every window seen,
//! warm-up included. A match spanning at most `context_length` symbols and
//! ending in a bin therefore has all of its windows in that bin.

mod kmer;

pub use kmer::{KmerHasher, RollingKmer, MAX_HASH_COUNT, MAX_WINDOW_LENGTH, MIN_SLOTS};

use std::ops::Range;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, IndexConfig};
use crate::framework::{BinContext, BinExecutor, BinProcessor, FrameworkError};
use crate::partition::{partition, BinId, PartitionError};
use crate::sequence::Symbol;
use crate::store::{RcsStore, StoreFingerprint};
use crate::tree::{PathVisitor, SequenceTree, Step, TreeError};

/// Errors raised while building or querying the index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index was built from a different store revision.
    #[error("index built for store {expected}, queried with store {found}")]
    IndexConsistency {
        /// Fingerprint recorded at build time.
        expected: StoreFingerprint,
        /// Fingerprint of the store supplied now.
        found: StoreFingerprint,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Tree view could not be created or walked.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Reference could not be partitioned.
    #[error(transparent)]
    Partition(#[from] PartitionError),

    /// Parallel build failed.
    #[error(transparent)]
    Framework(#[from] FrameworkError),
}

/// Inserts every window of every path into one bin's bit vector.
struct WindowInserter<'a> {
    hasher: &'a KmerHasher,
    bits: BitVec<u64, Lsb0>,
}

impl PathVisitor for WindowInserter<'_> {
    type State = RollingKmer;

    fn step(&mut self, state: &mut RollingKmer, symbol: Symbol, _step: &Step<'_>) {
        if let Some(code) = state.push(symbol, self.hasher.window_length()) {
            for slot in self.hasher.slots_of(code) {
                self.bits.set(slot, true);
            }
        }
    }
}

/// Builds one bit vector per bin and interleaves them.
struct BinBuilder<'t, 's> {
    tree: &'t SequenceTree<'s>,
    hasher: KmerHasher,
}

impl BinProcessor for BinBuilder<'_, '_> {
    type BinSummary = BitVec<u64, Lsb0>;
    type Output = BitVec<u64, Lsb0>;

    fn process_bin(&self, context: &BinContext) -> Result<Self::BinSummary, FrameworkError> {
        let mut inserter = WindowInserter {
            hasher: &self.hasher,
            bits: bitvec![u64, Lsb0; 0; self.hasher.slots()],
        };
        self.tree
            .walk(context.range.clone(), &mut inserter, RollingKmer::default())
            .map_err(|err| FrameworkError::processor_failure(context.bin_id, err.to_string()))?;
        debug!(
            bin = context.bin_id,
            set = inserter.bits.count_ones(),
            "filled bin"
        );
        Ok(inserter.bits)
    }

    fn finalize(&self, summaries: Vec<Self::BinSummary>) -> Result<Self::Output, FrameworkError> {
        let bin_count = summaries.len();
        let slots = self.hasher.slots();
        let mut interleaved = bitvec![u64, Lsb0; 0; slots * bin_count];
        for (bin, bits) in summaries.iter().enumerate() {
            for slot in bits.iter_ones() {
                interleaved.set(slot * bin_count + bin, true);
            }
        }
        Ok(interleaved)
    }
}

/// Membership filter telling which bins may contain a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterleavedIndex {
    hasher: KmerHasher,
    bin_ranges: Vec<Range<usize>>,
    context_length: usize,
    bits: BitVec<u64, Lsb0>,
    fingerprint: StoreFingerprint,
}

impl InterleavedIndex {
    /// Partition `store` and fill one bit vector per bin.
    pub fn build(store: &RcsStore, config: &IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        let hasher = KmerHasher::new(config.window_length, config.hash_count, config.slots)?;
        let context = config.effective_context();
        let tree = SequenceTree::new(store, context)?;
        let bins = partition(&tree, config.bin_count)?;
        let contexts: Vec<BinContext> = bins.iter().map(BinContext::from).collect();

        let executor = BinExecutor::new(BinBuilder { tree: &tree, hasher }, config.thread_count);
        let result = executor.evaluate(&contexts)?;

        let index = Self {
            hasher,
            bin_ranges: contexts.into_iter().map(|c| c.range).collect(),
            context_length: context,
            bits: result.output,
            fingerprint: store.fingerprint(),
        };
        info!(
            bins = index.bin_count(),
            slots = hasher.slots(),
            k = hasher.window_length(),
            fill = index.fill_ratio(),
            "index built"
        );
        Ok(index)
    }

    /// Window hasher used at build time.
    pub fn hasher(&self) -> &KmerHasher {
        &self.hasher
    }

    /// Window length `k`.
    pub fn window_length(&self) -> usize {
        self.hasher.window_length()
    }

    /// Number of bins.
    pub fn bin_count(&self) -> usize {
        self.bin_ranges.len()
    }

    /// Reference interval of every bin.
    pub fn bin_ranges(&self) -> &[Range<usize>] {
        &self.bin_ranges
    }

    /// Context the bins were walked with.
    pub fn context_length(&self) -> usize {
        self.context_length
    }

    /// Fingerprint of the store the index was built from.
    pub fn fingerprint(&self) -> StoreFingerprint {
        self.fingerprint
    }

    /// Fraction of set bits.
    pub fn fill_ratio(&self) -> f64 {
        if self.bits.is_empty() {
            return 0.0;
        }
        self.bits.count_ones() as f64 / self.bits.len() as f64
    }

    /// Fail unless `store` is the revision this index was built from.
    pub fn check_store(&self, store: &RcsStore) -> Result<(), IndexError> {
        let found = store.fingerprint();
        if found != self.fingerprint {
            return Err(IndexError::IndexConsistency {
                expected: self.fingerprint,
                found,
            });
        }
        Ok(())
    }

    /// Re-check what `build` guarantees about the layout. Used on decoded
    /// indexes.
    pub(crate) fn check_layout(&self) -> Result<(), String> {
        let hasher = &self.hasher;
        KmerHasher::new(hasher.window_length(), hasher.hash_count(), hasher.slots())
            .map_err(|err| err.to_string())?;
        if self.bin_ranges.is_empty() {
            return Err(String::from("no bins"));
        }
        if hasher.slots().checked_mul(self.bin_count()) != Some(self.bits.len()) {
            return Err(format!(
                "{} bits for {} bins of {} slots",
                self.bits.len(),
                self.bin_count(),
                hasher.slots()
            ));
        }
        let mut end = 0;
        for range in &self.bin_ranges {
            if range.start != end || range.end <= range.start {
                return Err(format!("bins do not tile the reference at {}", range.start));
            }
            end = range.end;
        }
        if self.context_length < hasher.window_length() {
            return Err(format!(
                "context {} shorter than window length {}",
                self.context_length,
                hasher.window_length()
            ));
        }
        Ok(())
    }

    /// Packed codes of every window of `sequence`.
    pub fn windows(&self, sequence: &[Symbol]) -> Vec<u64> {
        self.hasher.windows(sequence)
    }

    /// Bins whose vector holds every hash of `code`, as one bit per bin.
    fn row_hits(&self, code: u64) -> BitVec<u64, Lsb0> {
        let bin_count = self.bin_count();
        let mut hits = bitvec![u64, Lsb0; 1; bin_count];
        for slot in self.hasher.slots_of(code) {
            let row = &self.bits[slot * bin_count..(slot + 1) * bin_count];
            hits &= row;
        }
        hits
    }

    /// Whether bin `bin` may contain the window `code`.
    pub fn contains(&self, bin: BinId, code: u64) -> bool {
        bin < self.bin_count() && self.row_hits(code)[bin]
    }

    /// Number of `windows` hitting each bin.
    pub fn count_hits(&self, windows: &[u64]) -> Vec<usize> {
        let mut counts = vec![0; self.bin_count()];
        for &code in windows {
            for bin in self.row_hits(code).iter_ones() {
                counts[bin] += 1;
            }
        }
        counts
    }

    /// Bins hit by at least `required` of `windows`.
    pub fn candidate_bins(&self, windows: &[u64], required: usize) -> Vec<BinId> {
        if required == 0 {
            return (0..self.bin_count()).collect();
        }
        self.count_hits(windows)
            .into_iter()
            .enumerate()
            .filter(|&(_, hits)| hits >= required)
            .map(|(bin, _)| bin)
            .collect()
    }
}
