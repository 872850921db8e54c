use std::ops::Range;

use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::partition::{Bin, BinId};

/// Errors that can occur while running work over bins.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// Configuration invalid (e.g., zero threads).
    #[error("invalid executor configuration: {0}")]
    InvalidConfiguration(String),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    /// User-supplied processor reported an error.
    #[error("processor error in bin {bin_id}: {message}")]
    Processor {
        /// Bin that failed.
        bin_id: BinId,
        /// What went wrong.
        message: String,
    },
}

impl FrameworkError {
    /// Helper for constructing processor-originated errors.
    pub fn processor_failure(bin_id: BinId, msg: impl Into<String>) -> Self {
        FrameworkError::Processor {
            bin_id,
            message: msg.into(),
        }
    }
}

/// Build a rayon pool with exactly `threads` workers.
pub fn thread_pool(threads: usize) -> Result<rayon::ThreadPool, FrameworkError> {
    if threads == 0 {
        return Err(FrameworkError::InvalidConfiguration(
            "thread count must be > 0".to_string(),
        ));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| FrameworkError::ThreadPool(err.to_string()))
}

/// Per-bin metadata supplied to processors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinContext {
    /// Bin identifier.
    pub bin_id: BinId,
    /// Reference interval covered by the bin.
    pub range: Range<usize>,
}

impl BinContext {
    /// Number of reference symbols covered by this bin.
    pub fn len(&self) -> usize {
        self.range.end.saturating_sub(self.range.start)
    }

    /// Whether the bin is empty (does not happen for partitioned bins).
    pub fn is_empty(&self) -> bool {
        self.range.end <= self.range.start
    }
}

impl From<&Bin> for BinContext {
    fn from(bin: &Bin) -> Self {
        Self {
            bin_id: bin.id,
            range: bin.range.clone(),
        }
    }
}

/// Work that runs independently per bin and is combined once at the end.
pub trait BinProcessor: Sync {
    /// Summary emitted per bin.
    type BinSummary: Send;
    /// Final output type produced after all bins finished.
    type Output;

    /// Process a single bin. Must not touch state shared with other bins.
    fn process_bin(&self, context: &BinContext) -> Result<Self::BinSummary, FrameworkError>;

    /// Combine the summaries, given in bin order.
    fn finalize(&self, summaries: Vec<Self::BinSummary>) -> Result<Self::Output, FrameworkError>;
}

/// Result returned by the executor.
#[derive(Debug)]
pub struct EvaluationResult<O> {
    /// Output of [`BinProcessor::finalize`].
    pub output: O,
    /// Number of bins processed.
    pub bins_processed: usize,
}

/// Runs a [`BinProcessor`] over every bin on a dedicated worker pool.
#[derive(Debug)]
pub struct BinExecutor<P: BinProcessor> {
    processor: P,
    threads: usize,
}

impl<P: BinProcessor> BinExecutor<P> {
    /// Create a new executor with the provided processor and worker count.
    pub fn new(processor: P, threads: usize) -> Self {
        Self { processor, threads }
    }

    /// Access the processor.
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Process every bin in parallel, then finalize in bin order.
    pub fn evaluate(&self, bins: &[BinContext]) -> Result<EvaluationResult<P::Output>, FrameworkError> {
        if bins.is_empty() {
            return Err(FrameworkError::InvalidConfiguration(
                "number of bins must be > 0".to_string(),
            ));
        }
        let pool = thread_pool(self.threads)?;
        debug!(bins = bins.len(), threads = self.threads, "processing bins");

        let summaries = pool.install(|| {
            bins.par_iter()
                .map(|context| self.processor.process_bin(context))
                .collect::<Result<Vec<_>, FrameworkError>>()
        })?;

        let output = self.processor.finalize(summaries)?;
        Ok(EvaluationResult {
            output,
            bins_processed: bins.len(),
        })
    }
}
