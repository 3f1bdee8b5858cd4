//! The weighted sum-tree hash table.

use std::{
    fmt,
    hash::{BuildHasher, BuildHasherDefault, Hash},
    mem,
};

use zwohash::ZwoHasher;

use crate::{
    config::TableConfig,
    guard::{ValueGuard, ValueRef, ValueStub},
    placement::Placement,
    slots::SlotArray,
    tree::TreeShape,
    weight::{SelfWeight, WeightPolicy},
};

/// Default [`BuildHasher`] used by [`WeightTable`].
pub type DefaultHashBuilder = BuildHasherDefault<ZwoHasher>;

/// Errors surfaced by the keyed table operations.
///
/// Both variants are recoverable and leave the table unchanged. Internal
/// consistency is maintained incrementally and exactly, so there is no
/// runtime invariant-violation error; consistency is checked by debug
/// assertions and the [`is_legal`][WeightTable::is_legal] diagnostic only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableError {
    /// Insert of a key that is already present.
    DuplicateKey,
    /// Removal or keyed update of an absent key.
    NotFound,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::DuplicateKey => write!(f, "key is already present"),
            TableError::NotFound => write!(f, "key not found"),
        }
    }
}

impl std::error::Error for TableError {}

/// An open-addressed hash table whose slot array doubles as an implicit
/// sum tree, giving O(log n) weighted random selection on top of
/// expected-O(1) keyed access.
///
/// Every slot caches the annotated weight of its subtree. Mutations keep the
/// annotations exact by propagating deltas along ancestor paths; nothing is
/// ever recomputed from scratch outside of resizes, which rebuild the
/// annotation in one backward sweep.
///
/// `P` extracts a sampling weight from each stored value (by default the
/// value is its own weight) and `S` supplies key hashes, defaulting to the
/// same hasher the rest of the codebase uses.
///
/// # Examples
///
/// ```
/// use weight_table::WeightTable;
///
/// let mut table: WeightTable<&str, u64> = WeightTable::new();
/// table.insert("a", 5).unwrap();
/// table.insert("b", 3).unwrap();
/// assert_eq!(table.weight(), 8);
///
/// // draws in [0, 5) select "a", draws in [5, 8) select "b" (or vice
/// // versa, depending on slot placement)
/// let slot = table.weighted_random_slot(6);
/// assert!(table.entry_at(slot).is_some());
///
/// assert_eq!(table.remove(&"a"), Ok(5));
/// assert_eq!(table.weight(), 3);
/// ```
#[derive(Clone)]
pub struct WeightTable<K, V, P = SelfWeight, S = DefaultHashBuilder>
where
    P: WeightPolicy<V>,
{
    slots: SlotArray<K, V, P::Weight>,
    placement: Placement,
    tree: TreeShape,
    policy: P,
    build_hasher: S,
}

impl<K, V, P, S> WeightTable<K, V, P, S>
where
    P: WeightPolicy<V> + Default,
    S: Default,
{
    /// Returns an empty table with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TableConfig::default())
    }

    /// Returns an empty table with the given configuration.
    pub fn with_config(config: TableConfig) -> Self {
        Self::with_parts(config, P::default(), S::default())
    }

    /// Returns an empty table pre-sized so that `capacity` keys fit within
    /// the configured fill ratio without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        let config = TableConfig::default();
        config.assert_valid();
        let placement = Placement::for_capacity(config, capacity);
        Self {
            slots: SlotArray::with_len(placement.capacity()),
            placement,
            tree: TreeShape::new(config.tree_log_base),
            policy: P::default(),
            build_hasher: S::default(),
        }
    }
}

impl<K, V, P, S> Default for WeightTable<K, V, P, S>
where
    P: WeightPolicy<V> + Default,
    S: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, P, S> WeightTable<K, V, P, S>
where
    P: WeightPolicy<V>,
{
    /// Returns an empty table from explicit configuration, weight policy and
    /// hash builder.
    pub fn with_parts(config: TableConfig, policy: P, build_hasher: S) -> Self {
        config.assert_valid();
        Self {
            slots: SlotArray::with_len(0),
            placement: Placement::new(config),
            tree: TreeShape::new(config.tree_log_base),
            policy,
            build_hasher,
        }
    }

    /// Returns the number of keys in the table.
    pub fn len(&self) -> usize {
        self.placement.len()
    }

    /// Returns `true` when the table holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current slot-array capacity, zero for the empty state.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the total weight of all stored values, the zero weight when
    /// the table is empty. `O(1)`: this is the root's annotation.
    pub fn weight(&self) -> P::Weight {
        if self.slots.is_empty() {
            P::Weight::default()
        } else {
            self.slots.sum(0)
        }
    }

    /// Returns the key stored at `slot`, if the slot is occupied.
    pub fn key_at(&self, slot: usize) -> Option<&K> {
        self.slots.key(slot)
    }

    /// Returns the value stored at `slot`, if the slot is occupied.
    pub fn value_at(&self, slot: usize) -> Option<&V> {
        self.slots.value(slot)
    }

    /// Returns the entry stored at `slot`, if the slot is occupied.
    pub fn entry_at(&self, slot: usize) -> Option<(&K, &V)> {
        self.slots.entry(slot).map(|(key, value)| (key, value))
    }

    /// Returns `true` when `slot` holds an entry.
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.slots.is_occupied(slot)
    }

    /// Iterates over all entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.slots.iter_entries()
    }

    /// Replaces the value at an occupied slot, propagating the weight
    /// difference, and returns the previous value.
    ///
    /// Panics when `slot` is vacant or out of bounds.
    pub fn set_value(&mut self, slot: usize, value: V) -> V {
        let old_weight = self.own_weight(slot);
        let dest = self
            .slots
            .value_mut(slot)
            .expect("set_value requires an occupied slot");
        let old = mem::replace(dest, value);
        let new_weight = self.own_weight(slot);
        if new_weight != old_weight {
            self.update_at(slot, new_weight, old_weight);
        }
        old
    }

    /// Selects the slot whose cumulative weight range contains `draw`.
    ///
    /// `draw` must be taken uniformly from `[0, self.weight())`; the caller
    /// must not call this on a table with zero total weight. Runs in
    /// O(depth × branching) and always lands on an occupied slot, since
    /// vacant slots contribute zero own weight.
    pub fn weighted_random_slot(&self, mut draw: P::Weight) -> usize {
        debug_assert!(!self.slots.is_empty());
        debug_assert!(self.weight() != P::Weight::default());
        debug_assert!(draw < self.weight());
        let mut index = 0;
        loop {
            let own = self.own_weight(index);
            if draw < own {
                return index;
            }
            if draw < self.slots.sum(index) {
                // the draw falls inside a descendant subtree
                draw -= own;
                index = self.tree.child_start(index);
            } else {
                // the draw falls past this whole subtree
                draw -= self.slots.sum(index);
                index += 1;
            }
            debug_assert!(index < self.slots.len());
        }
    }

    /// Returns a guard for in-place mutation of the value at `slot` that
    /// reconciles the weight annotation after every forwarded operation.
    ///
    /// Panics when `slot` is vacant or out of bounds.
    pub fn auto_guard(&mut self, slot: usize) -> ValueRef<'_, K, V, P, S> {
        ValueGuard::new(self, slot)
    }

    /// Returns a guard for in-place mutation of the value at `slot` that
    /// defers weight reconciliation until it is released (or dropped).
    ///
    /// Panics when `slot` is vacant or out of bounds.
    pub fn deferred_guard(&mut self, slot: usize) -> ValueStub<'_, K, V, P, S> {
        ValueGuard::new(self, slot)
    }

    /// Own weight of the entry at `slot`, the zero weight for vacant slots.
    pub(crate) fn own_weight(&self, slot: usize) -> P::Weight {
        match self.slots.value(slot) {
            Some(value) => self.policy.weight_of(value),
            None => P::Weight::default(),
        }
    }

    pub(crate) fn raw_value(&self, slot: usize) -> &V {
        self.slots.value(slot).expect("slot must be occupied")
    }

    pub(crate) fn raw_value_mut(&mut self, slot: usize) -> &mut V {
        self.slots.value_mut(slot).expect("slot must be occupied")
    }

    /// Applies a weight change to `index` and all its ancestors.
    ///
    /// The change is carried as separate `add` and `sub` legs so that
    /// unsigned weights never go through a negative intermediate; each node
    /// gains `add` before losing `sub`.
    pub(crate) fn update_at(&mut self, index: usize, add: P::Weight, sub: P::Weight) {
        let mut index = index;
        loop {
            let sum = self.slots.sum_mut(index);
            *sum += add;
            *sum -= sub;
            if self.tree.is_root(index) {
                break;
            }
            index = self.tree.parent(index);
        }
    }

    /// Exchanges the entries of two slots and repairs the annotations.
    ///
    /// Both weight adjustments walk toward the common ancestor by always
    /// advancing the numerically larger index to its parent; at and above
    /// the meeting point the net subtree content is unchanged, so the walk
    /// stops there rather than continuing to the root.
    fn relocate(&mut self, to: usize, from: usize) {
        debug_assert!(to != from);
        let to_weight = self.own_weight(to);
        let from_weight = self.own_weight(from);
        self.slots.swap_entries(to, from);

        let (mut to, mut from) = (to, from);
        while to != from {
            if to > from {
                let sum = self.slots.sum_mut(to);
                *sum += from_weight;
                *sum -= to_weight;
                to = self.tree.parent(to);
            } else {
                let sum = self.slots.sum_mut(from);
                *sum += to_weight;
                *sum -= from_weight;
                from = self.tree.parent(from);
            }
        }
    }

    /// Resets every annotation to the slot's own weight, stripping all
    /// subtree contributions.
    fn disassemble(&mut self) {
        for index in 0..self.slots.len() {
            let own = self.own_weight(index);
            *self.slots.sum_mut(index) = own;
        }
    }

    /// Rolls own weights up into subtree annotations, assuming every
    /// annotation currently equals the slot's own weight.
    fn assemble(&mut self) {
        for index in (1..self.slots.len()).rev() {
            let sum = self.slots.sum(index);
            *self.slots.sum_mut(self.tree.parent(index)) += sum;
        }
    }
}

impl<K, V, P, S> WeightTable<K, V, P, S>
where
    K: Hash + Eq,
    P: WeightPolicy<V>,
    S: BuildHasher,
{
    fn hash_key(&self, key: &K) -> u64 {
        self.build_hasher.hash_one(key)
    }

    /// Probes the chain starting at the key's initial place. Returns the
    /// key's slot, or the first vacant slot of the chain when the key is
    /// absent. Requires a non-empty slot array.
    fn probe(&self, hash: u64, key: &K) -> Result<usize, usize> {
        debug_assert!(!self.slots.is_empty());
        let mut index = self.placement.initial_place(hash);
        loop {
            match self.slots.key(index) {
                None => return Err(index),
                Some(occupant) if occupant == key => return Ok(index),
                Some(_) => index = self.placement.next_place(index),
            }
        }
    }

    /// Returns the slot holding `key`, if present.
    pub fn find_slot(&self, key: &K) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        self.probe(self.hash_key(key), key).ok()
    }

    /// Returns a reference to the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.slots.value(self.find_slot(key)?)
    }

    /// Returns `true` when `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find_slot(key).is_some()
    }

    /// Returns an auto-reconciling guard for the value stored for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<ValueRef<'_, K, V, P, S>> {
        let slot = self.find_slot(key)?;
        Some(ValueGuard::new(self, slot))
    }

    /// Inserts a key/value pair and propagates the value's weight to the
    /// root. Returns the slot the entry landed in.
    ///
    /// Fails with [`TableError::DuplicateKey`] when the key is already
    /// present; the offered pair is dropped and the table is unchanged.
    pub fn insert(&mut self, key: K, value: V) -> Result<usize, TableError> {
        let hash = self.hash_key(&key);
        let mut vacant = None;
        if !self.slots.is_empty() {
            match self.probe(hash, &key) {
                Ok(_) => return Err(TableError::DuplicateKey),
                Err(slot) => vacant = Some(slot),
            }
        }
        if let Some(log_size) = self.placement.about_to_insert() {
            self.rebuild(log_size);
            let Err(slot) = self.probe(hash, &key) else {
                unreachable!("key appeared during resize");
            };
            vacant = Some(slot);
        }
        let slot = vacant.expect("placement must allocate a table before the first insert");

        self.slots.fill(slot, key, value);
        self.placement.added();
        let weight = self.own_weight(slot);
        if weight != P::Weight::default() {
            self.update_at(slot, weight, P::Weight::default());
        }
        Ok(slot)
    }

    /// Removes `key` and returns its value.
    ///
    /// Removal is two-staged: the entry's weight is detached and propagated
    /// while the slot is still part of the probe chain, and only then is the
    /// chain closed around the vacated slot, so relocations never observe a
    /// half-accounted weight.
    pub fn remove(&mut self, key: &K) -> Result<V, TableError> {
        if self.slots.is_empty() {
            return Err(TableError::NotFound);
        }
        let slot = self
            .probe(self.hash_key(key), key)
            .map_err(|_| TableError::NotFound)?;

        let (_, value) = self.slots.take(slot).expect("probe returned a vacant slot");
        let weight = self.policy.weight_of(&value);
        if weight != P::Weight::default() {
            self.update_at(slot, P::Weight::default(), weight);
        }
        self.placement.removed();
        self.close_chain(slot);
        if let Some(log_size) = self.placement.trim() {
            self.rebuild(log_size);
        }
        Ok(value)
    }

    /// Backward-shift deletion: walks the probe chain after a vacated slot
    /// and relocates every entry whose initial place does not reach it
    /// through the hole.
    fn close_chain(&mut self, hole: usize) {
        let mut hole = hole;
        let mut index = self.placement.next_place(hole);
        loop {
            let initial = match self.slots.key(index) {
                None => break,
                Some(key) => self.placement.initial_place(self.hash_key(key)),
            };
            if !Self::chain_reaches(hole, index, initial) {
                self.relocate(hole, index);
                hole = index;
            }
            index = self.placement.next_place(index);
        }
    }

    /// Whether a probe starting at `initial` reaches `slot` without passing
    /// through `hole`, i.e. `initial` lies in the cyclic interval
    /// `(hole, slot]`.
    fn chain_reaches(hole: usize, slot: usize, initial: usize) -> bool {
        if hole < slot {
            initial > hole && initial <= slot
        } else {
            initial > hole || initial <= slot
        }
    }

    /// Rebuilds the table at a new log size: re-places every entry, then
    /// strips and reassembles the tree annotation in bulk.
    fn rebuild(&mut self, log_size: u32) {
        let old = mem::replace(
            &mut self.slots,
            SlotArray::with_len(Placement::capacity_of(log_size)),
        );
        self.placement.set_log_size(log_size);
        for (key, value) in old.into_entries() {
            let hash = self.hash_key(&key);
            let Err(slot) = self.probe(hash, &key) else {
                unreachable!("duplicate key during rebuild");
            };
            self.slots.fill(slot, key, value);
        }
        self.disassemble();
        self.assemble();
    }

    /// Full consistency check, for diagnostics and tests: every annotation
    /// equals own weight plus direct child annotations, every occupied slot
    /// is reachable by probing from its initial place, and the occupancy
    /// count matches the placement bookkeeping. Production code paths never
    /// call this; invariants are maintained incrementally.
    pub fn is_legal(&self) -> bool {
        let len = self.slots.len();
        let mut occupied = 0;
        for index in 0..len {
            let mut expected = self.own_weight(index);
            for child in self.tree.child_start(index)..self.tree.child_end(index, len) {
                expected += self.slots.sum(child);
            }
            if expected != self.slots.sum(index) {
                return false;
            }
            if let Some(key) = self.slots.key(index) {
                occupied += 1;
                let mut probe = self.placement.initial_place(self.hash_key(key));
                while probe != index {
                    if !self.slots.is_occupied(probe) {
                        return false;
                    }
                    probe = self.placement.next_place(probe);
                }
            }
        }
        occupied == self.placement.len()
    }

    #[cfg(test)]
    pub(crate) fn check(&self) {
        assert!(self.is_legal(), "table invariants violated");
    }
}

impl<K, V, P, S> fmt::Debug for WeightTable<K, V, P, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
    P: WeightPolicy<V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
