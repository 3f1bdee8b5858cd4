//! Construction-time tunables for [`WeightTable`][crate::WeightTable].
//!
//! All policy choices that were fixed per-type in earlier designs (fill
//! thresholds, tree branching, the probe-start computation) are resolved once
//! when a table is constructed, by passing a [`TableConfig`].

/// Strategy used to map a key's hash value to its initial probe position.
///
/// Both strategies target a power-of-two table and avoid division entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashStrategy {
    /// Multiply by a constant derived from the golden ratio and keep the top
    /// `log_size` bits. Good bit dispersion even for weak hashes.
    FibonacciMultiply,
    /// Multiply by a small odd prime and mask the low `log_size` bits.
    PrimeMultiply,
}

/// Tunables for a [`WeightTable`][crate::WeightTable], fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableConfig {
    /// Upper fill bound in percent. The table grows when the key count
    /// reaches `floor(capacity * max_fill_percent / 100)`.
    pub max_fill_percent: u32,
    /// Lower fill bound in percent. After a removal the table is halved while
    /// the key count is below `ceil(capacity * min_fill_percent / 100)`.
    pub min_fill_percent: u32,
    /// Log2 of the branching factor of the embedded sum tree. `1` gives a
    /// binary tree.
    pub tree_log_base: u32,
    /// Probe-start computation, see [`HashStrategy`].
    pub hash_strategy: HashStrategy,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_fill_percent: 80,
            min_fill_percent: 30,
            tree_log_base: 1,
            hash_strategy: HashStrategy::FibonacciMultiply,
        }
    }
}

impl TableConfig {
    /// Panics unless the configuration is usable.
    ///
    /// Shrinking halves the table, so the shrink threshold must stay at or
    /// below half the grow threshold or a shrink could immediately overshoot
    /// the occupancy bound that inserts rely on.
    pub(crate) fn assert_valid(&self) {
        assert!(self.min_fill_percent > 0, "min fill ratio must be positive");
        assert!(
            self.max_fill_percent < 100,
            "max fill ratio must leave vacant slots for probing"
        );
        assert!(
            self.min_fill_percent * 2 <= self.max_fill_percent,
            "min fill ratio must be at most half the max fill ratio"
        );
        assert!(
            (1..usize::BITS).contains(&self.tree_log_base),
            "tree branching must be a positive power of two"
        );
    }
}
