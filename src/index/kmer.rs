use serde::{Deserialize, Serialize};

use crate::sequence::{Symbol, BITS_PER_SYMBOL};

use crate::config::ConfigError;

/// Longest window that fits a 64-bit code at 3 bits per symbol.
pub const MAX_WINDOW_LENGTH: usize = 21;

/// Number of independent hash functions available.
pub const MAX_HASH_COUNT: usize = 5;

/// Smallest number of slots per bin.
pub const MIN_SLOTS: usize = 64;

/// Seeds of the hash functions. Fixed for the life of the process so that
/// indexes built anywhere agree on slot positions.
const HASH_SEEDS: [u64; MAX_HASH_COUNT] = [
    0x9e37_79b9_7f4a_7c15,
    0xbf58_476d_1ce4_e5b9,
    0x94d0_49bb_1331_11eb,
    0x2545_f491_4f6c_dd1d,
    0xd6e8_feb8_6659_fd93,
];

/// MurmurHash3 64-bit finalizer.
#[inline]
fn mix(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

/// Maps packed windows to slots, one slot per hash function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmerHasher {
    window_length: usize,
    hash_count: usize,
    slots: usize,
}

impl KmerHasher {
    /// Hasher for windows of `window_length` symbols.
    ///
    /// This is the one place the window, hash and slot limits are checked;
    /// [`IndexConfig::validate`](crate::config::IndexConfig::validate) defers
    /// to it.
    pub fn new(window_length: usize, hash_count: usize, slots: usize) -> Result<Self, ConfigError> {
        if window_length == 0 || window_length > MAX_WINDOW_LENGTH {
            return Err(ConfigError::WindowLength(window_length));
        }
        if hash_count == 0 || hash_count > MAX_HASH_COUNT {
            return Err(ConfigError::HashCount(hash_count));
        }
        if slots < MIN_SLOTS {
            return Err(ConfigError::Slots(slots));
        }
        Ok(Self {
            window_length,
            hash_count,
            slots,
        })
    }

    /// Window length `k`.
    pub fn window_length(&self) -> usize {
        self.window_length
    }

    /// Number of hash functions.
    pub fn hash_count(&self) -> usize {
        self.hash_count
    }

    /// Slots per bin.
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Slot chosen by hash function `i` for a packed window.
    #[inline]
    pub fn slot(&self, code: u64, i: usize) -> usize {
        (mix(code ^ HASH_SEEDS[i]) % self.slots as u64) as usize
    }

    /// Slots of every hash function for a packed window.
    pub fn slots_of(&self, code: u64) -> impl Iterator<Item = usize> + '_ {
        (0..self.hash_count).map(move |i| self.slot(code, i))
    }

    /// Packed codes of every window of `sequence`, in order.
    pub fn windows(&self, sequence: &[Symbol]) -> Vec<u64> {
        let mut rolling = RollingKmer::default();
        sequence
            .iter()
            .filter_map(|&symbol| rolling.push(symbol, self.window_length))
            .collect()
    }
}

/// Rolling packed code of the last `k` symbols of a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollingKmer {
    code: u64,
    filled: usize,
}

impl RollingKmer {
    /// Append `symbol`; returns the window code once `k` symbols were seen.
    #[inline]
    pub fn push(&mut self, symbol: Symbol, k: usize) -> Option<u64> {
        let bits = BITS_PER_SYMBOL as usize * k;
        let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.code = ((self.code << BITS_PER_SYMBOL) | symbol.rank() as u64) & mask;
        self.filled = (self.filled + 1).min(k);
        (self.filled == k).then_some(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::encode;

    #[test]
    fn rejects_out_of_range_parameters() {
        assert!(matches!(
            KmerHasher::new(22, 2, 64),
            Err(ConfigError::WindowLength(22))
        ));
        assert!(matches!(
            KmerHasher::new(4, 6, 64),
            Err(ConfigError::HashCount(6))
        ));
        assert!(matches!(
            KmerHasher::new(4, 2, 63),
            Err(ConfigError::Slots(63))
        ));
    }

    #[test]
    fn equal_windows_share_codes() {
        let hasher = KmerHasher::new(3, 2, 1024).unwrap();
        let codes = hasher.windows(&encode(b"ACGACGT").unwrap());
        assert_eq!(codes.len(), 5);
        assert_eq!(codes[0], codes[3]);
        assert_ne!(codes[0], codes[1]);
        assert!(hasher.slots_of(codes[0]).all(|slot| slot < 1024));
        assert!(hasher.windows(&encode(b"AC").unwrap()).is_empty());
    }

    #[test]
    fn max_window_length_fits_code() {
        let hasher = KmerHasher::new(MAX_WINDOW_LENGTH, 1, 64).unwrap();
        let all_n = vec![Symbol::N; MAX_WINDOW_LENGTH + 1];
        let codes = hasher.windows(&all_n);
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0], codes[1]);
    }
}
