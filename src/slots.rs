//! Flat slot storage shared by the hash table and the embedded sum tree.
//!
//! Every slot carries an annotated weight (`sum`) whether or not it holds an
//! entry: subtree sums flow through vacant slots, so the annotation array
//! spans the whole capacity while entries occupy only some of it.

use crate::weight::Weight;

#[derive(Clone, Debug)]
struct Slot<K, V, W> {
    sum: W,
    entry: Option<(K, V)>,
}

/// A fixed-length array of slots. Occupancy is encoded by the entry `Option`;
/// relocation moves entry payloads without touching the annotations.
#[derive(Clone, Debug)]
pub(crate) struct SlotArray<K, V, W> {
    slots: Vec<Slot<K, V, W>>,
}

impl<K, V, W: Weight> SlotArray<K, V, W> {
    pub(crate) fn with_len(len: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(len, || Slot {
            sum: W::default(),
            entry: None,
        });
        Self { slots }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn is_occupied(&self, index: usize) -> bool {
        self.entry(index).is_some()
    }

    pub(crate) fn entry(&self, index: usize) -> Option<&(K, V)> {
        self.slots.get(index).and_then(|slot| slot.entry.as_ref())
    }

    pub(crate) fn key(&self, index: usize) -> Option<&K> {
        self.entry(index).map(|(key, _)| key)
    }

    pub(crate) fn value(&self, index: usize) -> Option<&V> {
        self.entry(index).map(|(_, value)| value)
    }

    pub(crate) fn value_mut(&mut self, index: usize) -> Option<&mut V> {
        self.slots
            .get_mut(index)
            .and_then(|slot| slot.entry.as_mut())
            .map(|(_, value)| value)
    }

    /// Annotated weight of `index`: its own weight plus the annotated
    /// weights of its direct children, maintained by the table.
    pub(crate) fn sum(&self, index: usize) -> W {
        self.slots[index].sum
    }

    pub(crate) fn sum_mut(&mut self, index: usize) -> &mut W {
        &mut self.slots[index].sum
    }

    /// Places an entry into a vacant slot.
    pub(crate) fn fill(&mut self, index: usize, key: K, value: V) {
        debug_assert!(!self.is_occupied(index));
        self.slots[index].entry = Some((key, value));
    }

    /// Vacates a slot, returning its entry. The annotation is left in place
    /// for the caller to reconcile.
    pub(crate) fn take(&mut self, index: usize) -> Option<(K, V)> {
        self.slots[index].entry.take()
    }

    /// Exchanges the entry payloads of two distinct slots, annotations
    /// untouched.
    pub(crate) fn swap_entries(&mut self, a: usize, b: usize) {
        debug_assert!(a != b);
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.slots.split_at_mut(high);
        std::mem::swap(&mut head[low].entry, &mut tail[0].entry);
    }

    pub(crate) fn iter_entries(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref().map(|(key, value)| (key, value)))
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = (K, V)> {
        self.slots.into_iter().filter_map(|slot| slot.entry)
    }
}
