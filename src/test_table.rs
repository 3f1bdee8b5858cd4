#![allow(missing_docs)]
//! Randomized differential tests driving a [`WeightTable`] and an
//! [`IndexMap`] reference model in lockstep, plus deterministic placement
//! scenarios using an identity hasher.

use std::hash::{BuildHasher, BuildHasherDefault, Hasher};

use indexmap::IndexMap;
use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::{DefaultHashBuilder, HashStrategy, SelfWeight, TableConfig, TableError, WeightTable};

/// Hashes integers to themselves so slot placement is predictable.
#[derive(Default)]
struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = (self.0 << 8) | byte as u64;
        }
    }

    fn write_u64(&mut self, value: u64) {
        self.0 = value;
    }
}

type IdentityBuilder = BuildHasherDefault<IdentityHasher>;

type DutTable<S> = WeightTable<u64, u64, SelfWeight, S>;

/// Independent selection reference: a preorder walk over the implicit tree
/// accumulating own weights only, never consulting the cached sums.
fn reference_slot<S: BuildHasher>(dut: &DutTable<S>, log_base: u32, draw: u64) -> usize {
    fn walk<S: BuildHasher>(
        dut: &DutTable<S>,
        log_base: u32,
        node: usize,
        remaining: &mut u64,
    ) -> Option<usize> {
        if node >= dut.capacity() {
            return None;
        }
        let own = dut.value_at(node).copied().unwrap_or(0);
        if *remaining < own {
            return Some(node);
        }
        *remaining -= own;
        let first = (node << log_base) + 1;
        for child in first..(first + (1 << log_base)).min(dut.capacity()) {
            if let Some(found) = walk(dut, log_base, child, remaining) {
                return Some(found);
            }
        }
        None
    }

    let mut remaining = draw;
    walk(dut, log_base, 0, &mut remaining).expect("draw must lie below the total weight")
}

struct CheckedTable<S: BuildHasher> {
    dut: DutTable<S>,
    ref_map: IndexMap<u64, u64>,
    config: TableConfig,
}

impl<S: BuildHasher> CheckedTable<S> {
    fn new(config: TableConfig, build_hasher: S) -> Self {
        CheckedTable {
            dut: WeightTable::with_parts(config, SelfWeight, build_hasher),
            ref_map: IndexMap::new(),
            config,
        }
    }

    fn insert(&mut self, key: u64, value: u64) {
        let ref_result = if self.ref_map.contains_key(&key) {
            Err(TableError::DuplicateKey)
        } else {
            self.ref_map.insert(key, value);
            Ok(())
        };
        let dut_result = self.dut.insert(key, value).map(|_| ());
        assert_eq!(ref_result, dut_result);
    }

    fn remove(&mut self, key: u64) {
        let ref_result = self.ref_map.swap_remove(&key).ok_or(TableError::NotFound);
        let dut_result = self.dut.remove(&key);
        assert_eq!(ref_result, dut_result);
    }

    fn get(&self, key: u64) {
        assert_eq!(self.ref_map.get(&key), self.dut.get(&key));
    }

    fn set_value(&mut self, key: u64, value: u64) {
        let Some(slot) = self.dut.find_slot(&key) else {
            assert!(!self.ref_map.contains_key(&key));
            return;
        };
        let dut_old = self.dut.set_value(slot, value);
        let ref_old = self.ref_map.insert(key, value).unwrap();
        assert_eq!(dut_old, ref_old);
    }

    fn guard_add(&mut self, key: u64, delta: u64, deferred: bool) {
        let slot = self.dut.find_slot(&key).unwrap();
        if deferred {
            let mut guard = self.dut.deferred_guard(slot);
            guard += delta;
            guard.release();
        } else {
            let mut guard = self.dut.auto_guard(slot);
            guard += delta;
        }
        *self.ref_map.get_mut(&key).unwrap() += delta;
    }

    fn draw(&mut self, rng: &mut impl Rng) {
        let total = self.dut.weight();
        assert_eq!(total, self.ref_map.values().sum::<u64>());
        if total == 0 {
            return;
        }
        let value = rng.gen_range(0..total);
        let slot = self.dut.weighted_random_slot(value);
        assert!(self.dut.is_occupied(slot));
        assert_eq!(
            slot,
            reference_slot(&self.dut, self.config.tree_log_base, value)
        );
    }

    fn check(&self) {
        self.dut.check();
        assert_eq!(self.dut.len(), self.ref_map.len());
        assert_eq!(self.dut.weight(), self.ref_map.values().sum::<u64>());
        for (key, value) in &self.ref_map {
            assert_eq!(self.dut.get(key), Some(value));
        }
        if self.dut.capacity() != 0 {
            // growth happens on reach, so occupancy never exceeds the bound
            let max_keys =
                (self.dut.capacity() as u128 * self.config.max_fill_percent as u128 / 100) as usize;
            assert!(self.dut.len() <= max_keys);
        } else {
            assert!(self.dut.is_empty());
        }
    }
}

macro_rules! weighted_choose {
    ($rng:expr, $($name:ident: $weight:expr => $body:expr),+ $(,)?) => {
        {
            enum Branches { $( $name,  )* }
            let weights = [$((Branches::$name, $weight)),+];
            match weights.choose_weighted($rng, |x| x.1).unwrap().0 {
                $(Branches::$name => $body),*
            }
        }
    }
}

fn test_suite<S: BuildHasher>(config: TableConfig, build_hasher: S, seed: u64) {
    let mut checked = CheckedTable::new(config, build_hasher);
    let mut rng = Pcg64::seed_from_u64(seed);
    for _ in 0..3000 {
        weighted_choose! {&mut rng,
            Insert: 1.0 => {
                let key = rng.gen_range(0..60);
                let value = rng.gen_range(0..100);
                checked.insert(key, value);
            },
            RemovePresent: 0.4 => {
                if let Some(key) = checked.ref_map.keys().choose(&mut rng).copied() {
                    checked.remove(key);
                }
            },
            RemoveRandom: 0.3 => {
                checked.remove(rng.gen_range(0..60));
            },
            Get: 0.4 => {
                checked.get(rng.gen_range(0..60));
            },
            SetValue: 0.4 => {
                let key = rng.gen_range(0..60);
                let value = rng.gen_range(0..100);
                checked.set_value(key, value);
            },
            GuardAuto: 0.2 => {
                if let Some(key) = checked.ref_map.keys().choose(&mut rng).copied() {
                    checked.guard_add(key, rng.gen_range(0..50), false);
                }
            },
            GuardDeferred: 0.2 => {
                if let Some(key) = checked.ref_map.keys().choose(&mut rng).copied() {
                    checked.guard_add(key, rng.gen_range(0..50), true);
                }
            },
            Draw: 0.8 => {
                checked.draw(&mut rng);
            },
            Check: 0.1 => {
                checked.check();
            },
        }
    }
    checked.check();
}

#[test]
fn randomized_default_config() {
    test_suite(TableConfig::default(), DefaultHashBuilder::default(), 7);
}

#[test]
fn randomized_prime_hashing() {
    let config = TableConfig {
        hash_strategy: HashStrategy::PrimeMultiply,
        ..Default::default()
    };
    test_suite(config, DefaultHashBuilder::default(), 21);
}

#[test]
fn randomized_quad_tree() {
    let config = TableConfig {
        tree_log_base: 2,
        ..Default::default()
    };
    test_suite(config, DefaultHashBuilder::default(), 42);
}

#[test]
fn randomized_identity_hash() {
    // a weak hasher leans entirely on the placement dispersion
    test_suite(TableConfig::default(), IdentityBuilder::default(), 99);
}

#[test]
fn boundary_draws_with_deterministic_placement() {
    let config = TableConfig {
        hash_strategy: HashStrategy::PrimeMultiply,
        ..Default::default()
    };
    let mut table: DutTable<IdentityBuilder> =
        WeightTable::with_parts(config, SelfWeight, IdentityBuilder::default());
    table.insert(4, 5).unwrap();
    table.insert(1, 3).unwrap();
    table.insert(2, 2).unwrap();
    table.check();

    // prime placement of an identity hash puts key k at slot (29 * k) mod 4
    assert_eq!(table.capacity(), 4);
    assert_eq!(table.find_slot(&4), Some(0));
    assert_eq!(table.find_slot(&1), Some(1));
    assert_eq!(table.find_slot(&2), Some(2));
    assert_eq!(table.weight(), 10);

    // cumulative ranges in preorder: key 4 owns [0, 5), key 1 owns [5, 8),
    // key 2 owns [8, 10)
    for (draw, key) in [(0, 4), (4, 4), (5, 1), (7, 1), (8, 2), (9, 2)] {
        assert_eq!(table.key_at(table.weighted_random_slot(draw)), Some(&key));
    }
    for draw in 0..10 {
        assert_eq!(
            table.weighted_random_slot(draw),
            reference_slot(&table, 1, draw)
        );
    }

    table.remove(&1).unwrap();
    table.check();
    assert_eq!(table.weight(), 7);
    assert_eq!(table.key_at(table.weighted_random_slot(5)), Some(&2));
}

#[test]
fn probe_chain_closes_around_removals() {
    // identity hashing with prime placement in a capacity-8 table: keys
    // 8, 16, 24 all start probing at slot (29 * 8k) mod 8 = 0
    let config = TableConfig {
        hash_strategy: HashStrategy::PrimeMultiply,
        ..Default::default()
    };
    let mut table: DutTable<IdentityBuilder> =
        WeightTable::with_parts(config, SelfWeight, IdentityBuilder::default());
    for key in [8, 16, 24, 1] {
        table.insert(key, key).unwrap();
    }
    assert_eq!(table.capacity(), 8);
    assert_eq!(table.find_slot(&8), Some(0));
    assert_eq!(table.find_slot(&16), Some(1));
    assert_eq!(table.find_slot(&24), Some(2));

    // removing the head of the chain must shift the colliders down
    table.remove(&8).unwrap();
    table.check();
    assert_eq!(table.find_slot(&16), Some(0));
    assert_eq!(table.find_slot(&24), Some(1));
    assert_eq!(table.get(&24), Some(&24));
    assert_eq!(table.weight(), 41);
}
