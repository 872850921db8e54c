//! Bin-parallel execution shared by index construction and search.
//!
//! Bins are independent units of work: a processor handles one bin with no
//! access to any other bin's output, and the executor combines the summaries
//! in bin order after the parallel phase has joined.

mod executor;

pub use executor::{
    thread_pool, BinContext, BinExecutor, BinProcessor, EvaluationResult, FrameworkError,
};
