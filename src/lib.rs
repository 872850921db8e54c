//! # Journaled haplotype store with branch-aware approximate search
//!
//! Many haplotypes of one genomic region are stored as a single reference
//! plus a journal of edits per haplotype. Searching them never materializes
//! the haplotypes: a lazy tree view walks the reference once and forks only
//! where alleles differ, carrying matcher state into every fork.
//!
//! ## Pipeline
//!
//! 1. **Store**: align each haplotype to the reference, keep only the edits
//! 2. **Tree view**: reference runs shared by all haplotypes, short branches
//!    for alternative alleles, limited to the window length of interest
//! 3. **Bins**: the reference is cut into intervals processed independently
//! 4. **Index**: one bit vector per bin holding every k-mer of its paths,
//!    interleaved so one lookup answers for all bins
//! 5. **Search**: bins failing the k-mer counting bound are skipped, the rest
//!    are verified with an exact or edit-distance matcher
//!
//! ## Usage Example
//!
//! ```ignore
//! use jstmap::{build, search, IndexConfig, Query, SearchConfig};
//!
//! let built = build(b"ACGTACGT", &[b"ACGTACGT", b"ACGTGCGT"], &IndexConfig::default())?;
//! let report = search(
//!     &[Query::new(0, "TACG")],
//!     &built.store,
//!     &built.index,
//!     &SearchConfig::default().with_error_rate(0.25),
//! )?;
//! for m in &report.matches {
//!     println!("{}\t{}\t{}\t{}", m.query_id, m.haplotype_id, m.position, m.distance);
//! }
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod sequence;   // Alphabet and packed reference storage
pub mod journal;    // Per-haplotype edit journals
pub mod store;      // Reference-compressed haplotype store
pub mod tree;       // Lazy branching view over the store
pub mod partition;  // Reference chunking into bins
pub mod framework;  // Parallel per-bin execution
pub mod index;      // Interleaved k-mer bit vectors
pub mod matcher;    // Resumable exact and edit-distance matchers
pub mod search;     // Filter and verification pipeline
pub mod config;     // Index and search parameters
pub mod persist;    // Binary serialization

// Re-exports for convenience
pub use config::{ConfigError, IndexConfig, SearchConfig};
pub use index::{IndexError, InterleavedIndex};
pub use journal::{Edit, EditKind, Journal, JournalError};
pub use matcher::{EditDistanceMatcher, ExactMatcher, MatcherError, Phase, ResumableMatcher};
pub use persist::PersistError;
pub use search::{search, Match, Query, QueryFailure, SearchError, SearchReport};
pub use sequence::{AlphabetError, Symbol};
pub use framework::FrameworkError;
pub use store::{AlignError, BandedAligner, EditAligner, HaplotypeId, RcsStore, StoreError, StoreFingerprint};
pub use tree::{SequenceTree, TreeError};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

/// Any error the library can raise.
#[derive(Error, Debug)]
pub enum Error {
    /// Sequence byte outside the alphabet.
    #[error(transparent)]
    Alphabet(#[from] AlphabetError),

    /// Malformed edits.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// Edits could not be derived for a haplotype.
    #[error(transparent)]
    Align(#[from] AlignError),

    /// Store construction or access failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Tree view failure.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Index construction or consistency failure.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Matcher rejected its input.
    #[error(transparent)]
    Matcher(#[from] MatcherError),

    /// Search call failed.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Invalid parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Worker pool could not be set up.
    #[error(transparent)]
    Framework(#[from] FrameworkError),

    /// Saving or loading failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// A haplotype that could not be added to the store.
#[derive(Debug)]
pub struct HaplotypeFailure {
    /// Position of the haplotype in the input.
    pub input: usize,
    /// Reason.
    pub error: Error,
}

/// Store and index built from raw sequences.
#[derive(Debug)]
pub struct BuildOutput {
    /// Reference plus the accepted haplotypes, in input order.
    pub store: RcsStore,
    /// Index over `store`.
    pub index: InterleavedIndex,
    /// Haplotypes left out of the store.
    pub failures: Vec<HaplotypeFailure>,
}

/// Build a store from an ASCII reference and ASCII haplotypes.
///
/// Haplotypes are aligned in parallel on the current rayon pool and appended
/// in input order. A haplotype that fails (bad byte, alignment too large,
/// rejected edits) is reported and skipped;
/// the others still receive consecutive ids. A bad reference fails the call.
pub fn build_store<H: AsRef<[u8]> + Sync>(
    reference: &[u8],
    haplotypes: &[H],
) -> Result<(RcsStore, Vec<HaplotypeFailure>), Error> {
    build_store_with(reference, haplotypes, &BandedAligner::default())
}

/// [`build_store`] with a caller-supplied aligner.
pub fn build_store_with<H, A>(
    reference: &[u8],
    haplotypes: &[H],
    aligner: &A,
) -> Result<(RcsStore, Vec<HaplotypeFailure>), Error>
where
    H: AsRef<[u8]> + Sync,
    A: EditAligner + Sync + ?Sized,
{
    let reference = sequence::encode(reference)?;
    let mut store = RcsStore::new(&reference)?;

    let aligned: Vec<Result<Vec<Edit>, Error>> = haplotypes
        .par_iter()
        .map(|haplotype| {
            let symbols = sequence::encode(haplotype.as_ref())?;
            aligner.align(&reference, &symbols).map_err(Error::from)
        })
        .collect();

    let mut failures = Vec::new();
    for (input, edits) in aligned.into_iter().enumerate() {
        let outcome = edits.and_then(|edits| store.add_journal(edits).map_err(Error::from));
        if let Err(error) = outcome {
            warn!(input, %error, "haplotype skipped");
            failures.push(HaplotypeFailure { input, error });
        }
    }
    info!(
        reference = store.reference_len(),
        haplotypes = store.haplotype_count(),
        skipped = failures.len(),
        "store built"
    );
    Ok((store, failures))
}

/// Build a store and its index in one go.
///
/// Alignment and index construction both run on `config.thread_count`
/// workers.
pub fn build<H: AsRef<[u8]> + Sync>(
    reference: &[u8],
    haplotypes: &[H],
    config: &IndexConfig,
) -> Result<BuildOutput, Error> {
    build_with(reference, haplotypes, &BandedAligner::default(), config)
}

/// [`build`] with a caller-supplied aligner.
pub fn build_with<H, A>(
    reference: &[u8],
    haplotypes: &[H],
    aligner: &A,
    config: &IndexConfig,
) -> Result<BuildOutput, Error>
where
    H: AsRef<[u8]> + Sync,
    A: EditAligner + Sync + ?Sized,
{
    config.validate()?;
    let pool = framework::thread_pool(config.thread_count)?;
    let (store, failures) = pool.install(|| build_store_with(reference, haplotypes, aligner))?;
    let index = InterleavedIndex::build(&store, config)?;
    Ok(BuildOutput {
        store,
        index,
        failures,
    })
}
