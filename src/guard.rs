//! Scoped guards for in-place value mutation with deferred weight updates.
//!
//! A guard snapshots the slot's own weight when it is created and reconciles
//! the tree annotation against that snapshot later: [`ValueRef`] after every
//! forwarded operation, [`ValueStub`] once when the guard is released. Both
//! reconcile on drop, so the annotation is repaired on every exit path,
//! including early returns and unwinding.
//!
//! A guard borrows the table exclusively for its whole lifetime. That makes
//! the single-edit-window contract a borrow-check fact: no lookup, draw or
//! structural mutation can run while a guard is live, and a guard cannot
//! outlive a resize.

use std::ops;

use crate::{
    table::{DefaultHashBuilder, WeightTable},
    weight::{SelfWeight, WeightPolicy},
};

/// Mutation guard for one occupied slot of a [`WeightTable`].
///
/// `AUTO` selects the reconciliation mode; use the [`ValueRef`] and
/// [`ValueStub`] aliases rather than naming the const parameter directly.
pub struct ValueGuard<'a, K, V, P, S, const AUTO: bool>
where
    P: WeightPolicy<V>,
{
    table: &'a mut WeightTable<K, V, P, S>,
    slot: usize,
    old_weight: P::Weight,
}

/// Guard that reconciles the weight annotation after every forwarded
/// operation, keeping [`total_weight`][ValueGuard::total_weight] exact
/// between steps.
pub type ValueRef<'a, K, V, P = SelfWeight, S = DefaultHashBuilder> =
    ValueGuard<'a, K, V, P, S, true>;

/// Guard that batches all edits into a single reconciliation when it is
/// released or dropped. Cheaper for sequences of small edits.
pub type ValueStub<'a, K, V, P = SelfWeight, S = DefaultHashBuilder> =
    ValueGuard<'a, K, V, P, S, false>;

impl<'a, K, V, P, S, const AUTO: bool> ValueGuard<'a, K, V, P, S, AUTO>
where
    P: WeightPolicy<V>,
{
    pub(crate) fn new(table: &'a mut WeightTable<K, V, P, S>, slot: usize) -> Self {
        assert!(
            table.is_occupied(slot),
            "value guard requires an occupied slot"
        );
        let old_weight = table.own_weight(slot);
        Self {
            table,
            slot,
            old_weight,
        }
    }

    /// Index of the guarded slot.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Key of the guarded entry.
    pub fn key(&self) -> &K {
        self.table.key_at(self.slot).expect("guarded slot is occupied")
    }

    /// Reference to the guarded value, also available through `Deref`.
    pub fn get(&self) -> &V {
        self.table.raw_value(self.slot)
    }

    /// Total table weight as currently annotated.
    ///
    /// For a [`ValueRef`] this is exact after every forwarded operation; for
    /// a [`ValueStub`] it lags behind edits until [`refresh`][Self::refresh]
    /// or release.
    pub fn total_weight(&self) -> P::Weight {
        self.table.weight()
    }

    /// Replaces the guarded value, returning the previous one.
    pub fn set(&mut self, value: V) -> V {
        let old = std::mem::replace(self.value_mut_raw(), value);
        if AUTO {
            self.reconcile();
        }
        old
    }

    /// Reconciles the annotation now and re-snapshots the weight.
    pub fn refresh(&mut self) {
        self.reconcile();
    }

    /// Releases the guard, reconciling any outstanding weight change.
    /// Equivalent to dropping it; provided to make release points explicit.
    pub fn release(self) {}

    fn value_mut_raw(&mut self) -> &mut V {
        self.table.raw_value_mut(self.slot)
    }

    fn reconcile(&mut self) {
        let weight = self.table.own_weight(self.slot);
        if weight != self.old_weight {
            self.table.update_at(self.slot, weight, self.old_weight);
            self.old_weight = weight;
        }
    }
}

impl<K, V, P, S, const AUTO: bool> ops::Deref for ValueGuard<'_, K, V, P, S, AUTO>
where
    P: WeightPolicy<V>,
{
    type Target = V;

    fn deref(&self) -> &V {
        self.get()
    }
}

impl<K, V, P, S, const AUTO: bool> ops::DerefMut for ValueGuard<'_, K, V, P, S, AUTO>
where
    P: WeightPolicy<V>,
{
    /// Direct mutable access. Changes made this way are reconciled at the
    /// next [`refresh`][Self::refresh] or at release, in both modes.
    fn deref_mut(&mut self) -> &mut V {
        self.value_mut_raw()
    }
}

impl<K, V, P, S, const AUTO: bool> Drop for ValueGuard<'_, K, V, P, S, AUTO>
where
    P: WeightPolicy<V>,
{
    fn drop(&mut self) {
        self.reconcile();
    }
}

macro_rules! forward_assign_ops {
    ($($op_trait:ident :: $op_method:ident),* $(,)?) => {
        $(
            impl<K, V, P, S, Rhs, const AUTO: bool> ops::$op_trait<Rhs>
                for ValueGuard<'_, K, V, P, S, AUTO>
            where
                P: WeightPolicy<V>,
                V: ops::$op_trait<Rhs>,
            {
                fn $op_method(&mut self, rhs: Rhs) {
                    ops::$op_trait::$op_method(self.value_mut_raw(), rhs);
                    if AUTO {
                        self.reconcile();
                    }
                }
            }
        )*
    };
}

forward_assign_ops! {
    AddAssign::add_assign,
    SubAssign::sub_assign,
    MulAssign::mul_assign,
    DivAssign::div_assign,
    RemAssign::rem_assign,
    BitAndAssign::bitand_assign,
    BitOrAssign::bitor_assign,
    BitXorAssign::bitxor_assign,
    ShlAssign::shl_assign,
    ShrAssign::shr_assign,
}
