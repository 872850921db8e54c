//! Configuration surface for index construction and search.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::{KmerHasher, MAX_HASH_COUNT, MAX_WINDOW_LENGTH, MIN_SLOTS};

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `bin_count` must be at least 1.
    #[error("bin count must be >= 1")]
    ZeroBinCount,

    /// `window_length` outside `1..=21`.
    #[error("window length {0} outside 1..={max}", max = MAX_WINDOW_LENGTH)]
    WindowLength(usize),

    /// `hash_count` outside `1..=5`.
    #[error("hash count {0} outside 1..={max}", max = MAX_HASH_COUNT)]
    HashCount(usize),

    /// Fewer than 64 slots per bin.
    #[error("slot count {0} below minimum {min}", min = MIN_SLOTS)]
    Slots(usize),

    /// `context_length` must be at least 1.
    #[error("context length must be >= 1")]
    ZeroContextLength,

    /// `error_rate` outside `[0, 1)`.
    #[error("error rate {0} outside [0, 1)")]
    ErrorRate(f64),

    /// `thread_count` must be at least 1.
    #[error("thread count must be >= 1")]
    ZeroThreads,
}

/// Parameters of index construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Number of bins (1 means no partitioning).
    pub bin_count: usize,
    /// Window length `k`.
    pub window_length: usize,
    /// Hash functions per window.
    pub hash_count: usize,
    /// Bit slots per bin.
    pub slots: usize,
    /// Longest `query length + error budget` the filter is sound for.
    pub context_length: usize,
    /// Worker threads for the build.
    pub thread_count: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            bin_count: 1,
            window_length: 19,
            hash_count: 2,
            slots: 1 << 16,
            context_length: 128,
            thread_count: 1,
        }
    }
}

impl IndexConfig {
    /// Set the number of bins.
    pub fn with_bin_count(mut self, bin_count: usize) -> Self {
        self.bin_count = bin_count;
        self
    }

    /// Set the window length.
    pub fn with_window_length(mut self, window_length: usize) -> Self {
        self.window_length = window_length;
        self
    }

    /// Set the number of hash functions.
    pub fn with_hash_count(mut self, hash_count: usize) -> Self {
        self.hash_count = hash_count;
        self
    }

    /// Set the number of slots per bin.
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    /// Set the context length.
    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.context_length = context_length;
        self
    }

    /// Set the worker count.
    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Context used while walking bins: never shorter than a window.
    pub fn effective_context(&self) -> usize {
        self.context_length.max(self.window_length)
    }

    /// Check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bin_count == 0 {
            return Err(ConfigError::ZeroBinCount);
        }
        KmerHasher::new(self.window_length, self.hash_count, self.slots)?;
        if self.context_length == 0 {
            return Err(ConfigError::ZeroContextLength);
        }
        if self.thread_count == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        Ok(())
    }
}

/// Parameters of a search run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Allowed errors per query symbol, in `[0, 1)`.
    pub error_rate: f64,
    /// Worker threads for the search.
    pub thread_count: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            error_rate: 0.0,
            thread_count: 1,
        }
    }
}

impl SearchConfig {
    /// Set the error rate.
    pub fn with_error_rate(mut self, error_rate: f64) -> Self {
        self.error_rate = error_rate;
        self
    }

    /// Set the worker count.
    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Error budget `floor(error_rate * query_len)`.
    pub fn error_budget(&self, query_len: usize) -> usize {
        (self.error_rate * query_len as f64).floor() as usize
    }

    /// Check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.error_rate) {
            return Err(ConfigError::ErrorRate(self.error_rate));
        }
        if self.thread_count == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(IndexConfig::default().validate().is_ok());
        assert!(SearchConfig::default().validate().is_ok());
        assert_eq!(IndexConfig::default().bin_count, 1);
    }

    #[test]
    fn builders_and_validation() {
        let config = IndexConfig::default()
            .with_bin_count(0)
            .with_window_length(4);
        assert_eq!(config.validate(), Err(ConfigError::ZeroBinCount));
        assert_eq!(
            config.with_bin_count(2).with_hash_count(9).validate(),
            Err(ConfigError::HashCount(9))
        );
        assert_eq!(
            config.with_bin_count(2).with_slots(8).validate(),
            Err(ConfigError::Slots(8))
        );
        assert_eq!(
            config.with_bin_count(2).with_window_length(22).validate(),
            Err(ConfigError::WindowLength(22))
        );
        // Same verdict as the hasher the index builds from it.
        assert_eq!(
            KmerHasher::new(22, 2, 64).unwrap_err(),
            ConfigError::WindowLength(22)
        );
        assert_eq!(config.with_context_length(2).effective_context(), 4);

        assert_eq!(
            SearchConfig::default().with_error_rate(1.0).validate(),
            Err(ConfigError::ErrorRate(1.0))
        );
        assert!(SearchConfig::default().with_error_rate(f64::NAN).validate().is_err());
        assert_eq!(
            SearchConfig::default().with_thread_count(0).validate(),
            Err(ConfigError::ZeroThreads)
        );
    }

    #[test]
    fn error_budget_floors() {
        let config = SearchConfig::default().with_error_rate(0.25);
        assert_eq!(config.error_budget(4), 1);
        assert_eq!(config.error_budget(7), 1);
        assert_eq!(config.error_budget(8), 2);
        assert_eq!(SearchConfig::default().error_budget(100), 0);
    }
}
