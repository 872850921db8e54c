//! Splits the reference path into bins for parallel index build and search.
//!
//! Cuts prefer the midpoint of the base run they fall into, so that forks sit
//! well inside a bin; runs longer than the target width are cut where the
//! even split lands.

use std::ops::Range;

use thiserror::Error;
use tracing::debug;

use crate::tree::{Node, SequenceTree};

/// Dense 0-based bin identifier.
pub type BinId = usize;

/// Errors raised while partitioning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// A bin count of zero.
    #[error("bin count must be at least 1")]
    ZeroBins,

    /// A bin width of zero.
    #[error("bin width must be at least 1")]
    ZeroWidth,

    /// More bins than reference symbols.
    #[error("cannot cut {bin_count} bins from a reference of length {reference_len}")]
    TooManyBins {
        /// Requested bin count.
        bin_count: usize,
        /// Reference length.
        reference_len: usize,
    },
}

/// One partition element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    /// Position in the partition.
    pub id: BinId,
    /// Reference interval `[start, end)`.
    pub range: Range<usize>,
    /// Tree node whose extent starts at `range.start`.
    pub root: Node,
}

impl Bin {
    /// Number of reference symbols in the bin.
    pub fn width(&self) -> usize {
        self.range.len()
    }
}

/// Cut the reference into `bin_count` bins tiling `[0, reference_len)`.
pub fn partition(tree: &SequenceTree<'_>, bin_count: usize) -> Result<Vec<Bin>, PartitionError> {
    let cuts = cut_points(tree, bin_count)?;
    let bins: Vec<Bin> = cuts
        .windows(2)
        .enumerate()
        .map(|(id, bounds)| Bin {
            id,
            range: bounds[0]..bounds[1],
            root: tree.node_at(bounds[0]),
        })
        .collect();
    debug!(bins = bins.len(), "partitioned reference");
    Ok(bins)
}

/// Cut the reference into bins of roughly `width` symbols.
pub fn partition_by_width(tree: &SequenceTree<'_>, width: usize) -> Result<Vec<Bin>, PartitionError> {
    if width == 0 {
        return Err(PartitionError::ZeroWidth);
    }
    let n = tree.reference_len();
    partition(tree, ((n + width - 1) / width).max(1))
}

/// Bin boundaries `0 = c_0 < c_1 < ... < c_bin_count = n`.
pub(crate) fn cut_points(tree: &SequenceTree<'_>, bin_count: usize) -> Result<Vec<usize>, PartitionError> {
    let n = tree.reference_len();
    if bin_count == 0 {
        return Err(PartitionError::ZeroBins);
    }
    if bin_count > n {
        return Err(PartitionError::TooManyBins {
            bin_count,
            reference_len: n,
        });
    }

    let target = n / bin_count;
    let breakpoints = tree.breakpoints();
    let mut cuts = Vec::with_capacity(bin_count + 1);
    cuts.push(0);

    for i in 1..bin_count {
        let prev = cuts[cuts.len() - 1];
        // Leave at least one symbol for every remaining bin.
        let limit = n - (bin_count - i);
        let ideal = i * n / bin_count;

        let idx = breakpoints.partition_point(|&b| b <= ideal);
        let run_start = breakpoints[idx.saturating_sub(1)];
        let run_end = tree.next_breakpoint(ideal);
        let midpoint = run_start + (run_end - run_start) / 2;

        let cut = if run_end - run_start <= target && midpoint > prev && midpoint <= limit {
            midpoint
        } else if ideal > prev {
            ideal
        } else {
            prev + 1
        };
        cuts.push(cut);
    }
    cuts.push(n);
    Ok(cuts)
}
