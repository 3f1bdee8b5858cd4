//! Slot-placement policy: probe-start computation, probe stepping and the
//! grow/shrink decisions, all over a power-of-two (or empty) table.
//!
//! A log size of `0` denotes the empty table with no slots at all; every
//! other log size `s` denotes `1 << s` slots, so the smallest non-empty table
//! has two slots.

use crate::config::{HashStrategy, TableConfig};

/// Multiplier for Fibonacci hashing at 64-bit hash width, i.e.
/// `2^64 / golden_ratio` rounded to the nearest odd integer.
const FIBONACCI_FACTOR: u64 = 0x9e37_79b9_7f4a_7c15;

/// Small odd prime for the multiply-and-mask strategy.
const PRIME_FACTOR: u64 = 29;

/// Placement policy plus the key-count bookkeeping that drives resizing.
#[derive(Clone, Debug)]
pub(crate) struct Placement {
    config: TableConfig,
    log_size: u32,
    num_keys: usize,
}

impl Placement {
    pub(crate) fn new(config: TableConfig) -> Self {
        Self {
            config,
            log_size: 0,
            num_keys: 0,
        }
    }

    /// Policy sized so that `capacity` keys fit without growing.
    pub(crate) fn for_capacity(config: TableConfig, capacity: usize) -> Self {
        let log_size = Self::log_size_for_capacity(capacity, config.max_fill_percent);
        Self {
            config,
            log_size,
            num_keys: 0,
        }
    }

    pub(crate) fn capacity_of(log_size: u32) -> usize {
        if log_size == 0 {
            0
        } else {
            1 << log_size
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        Self::capacity_of(self.log_size)
    }

    pub(crate) fn set_log_size(&mut self, log_size: u32) {
        self.log_size = log_size;
    }

    pub(crate) fn len(&self) -> usize {
        self.num_keys
    }

    pub(crate) fn added(&mut self) {
        self.num_keys += 1;
    }

    pub(crate) fn removed(&mut self) {
        self.num_keys -= 1;
    }

    fn mask(&self) -> usize {
        self.capacity().wrapping_sub(1)
    }

    /// Initial probe position for a hash value. Requires a non-empty table.
    pub(crate) fn initial_place(&self, hash: u64) -> usize {
        debug_assert!(self.log_size != 0);
        match self.config.hash_strategy {
            HashStrategy::FibonacciMultiply => {
                (hash.wrapping_mul(FIBONACCI_FACTOR) >> (u64::BITS - self.log_size)) as usize
            }
            HashStrategy::PrimeMultiply => hash.wrapping_mul(PRIME_FACTOR) as usize & self.mask(),
        }
    }

    pub(crate) fn next_place(&self, place: usize) -> usize {
        place.wrapping_add(1) & self.mask()
    }

    #[allow(dead_code)] // probing only steps forward, kept for symmetry
    pub(crate) fn prev_place(&self, place: usize) -> usize {
        place.wrapping_sub(1) & self.mask()
    }

    /// Key count at which a table of the given log size must grow.
    fn max_keys(&self, log_size: u32) -> usize {
        Self::scaled_floor(Self::capacity_of(log_size), self.config.max_fill_percent)
    }

    /// Key count below which a table of the given log size should shrink.
    fn min_keys(&self, log_size: u32) -> usize {
        Self::scaled_ceil(Self::capacity_of(log_size), self.config.min_fill_percent)
    }

    fn scaled_floor(capacity: usize, percent: u32) -> usize {
        (capacity as u128 * percent as u128 / 100) as usize
    }

    fn scaled_ceil(capacity: usize, percent: u32) -> usize {
        ((capacity as u128 * percent as u128).div_ceil(100)) as usize
    }

    /// Called before an insert; returns the log size to grow to, if any.
    ///
    /// Growth triggers exactly when the key count has reached the max-fill
    /// count, so the insert that would exceed it always lands in the larger
    /// table.
    pub(crate) fn about_to_insert(&self) -> Option<u32> {
        debug_assert!(self.num_keys <= self.max_keys(self.log_size));
        if self.log_size == 0 {
            return Some(1);
        }
        if self.num_keys == self.max_keys(self.log_size) {
            Some(self.log_size + 1)
        } else {
            None
        }
    }

    /// Called after a removal; returns the log size to shrink to, if any.
    ///
    /// Halves repeatedly while occupancy is below the min-fill count and
    /// bottoms out at log size 0 (no table) when the last key is gone.
    pub(crate) fn trim(&self) -> Option<u32> {
        let mut log_size = self.log_size;
        while log_size != 0 && self.num_keys < self.min_keys(log_size) {
            log_size -= 1;
        }
        (log_size != self.log_size).then_some(log_size)
    }

    /// Smallest log size whose max-fill count holds `capacity` keys.
    pub(crate) fn log_size_for_capacity(capacity: usize, fill_percent: u32) -> u32 {
        let mut log_size = 0;
        while Self::scaled_floor(1usize << log_size, fill_percent) < capacity {
            log_size += 1;
        }
        log_size
    }
}
