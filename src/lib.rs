//! An associative container that is simultaneously an open-addressed hash
//! table and an implicit sum tree, both living in one flat slot array.
//!
//! Keyed access (insert, lookup, remove) behaves like any linear-probing
//! hash table with expected-constant cost. In addition, every slot carries
//! the accumulated weight of its implicit subtree, so
//! [`weighted_random_slot`][table::WeightTable::weighted_random_slot] can
//! turn a uniform draw into a weight-proportional selection in logarithmic
//! time, and every mutation keeps the accumulated weights exact by
//! propagating deltas along ancestor paths instead of recomputing anything.
//!
//! The moving parts are deliberately separate: [`config`] holds the
//! construction-time tunables, [`tree`] the index arithmetic of the implicit
//! tree, [`weight`] the weight extraction policies, [`table`] the container
//! itself and [`guard`] the scoped proxies for in-place value mutation with
//! deferred weight reconciliation.

mod placement;
mod slots;

pub mod config;
pub mod guard;
pub mod table;
pub mod tree;
pub mod weight;

#[cfg(test)]
mod test_table;

pub use config::{HashStrategy, TableConfig};
pub use guard::{ValueGuard, ValueRef, ValueStub};
pub use table::{DefaultHashBuilder, TableError, WeightTable};
pub use weight::{FirstWeight, SelfWeight, Weight, WeightPolicy};
