//! Weight types and the policies that extract them from stored values.

use std::ops::{Add, AddAssign, Sub, SubAssign};

/// An additive, zero-default, totally-ordered weight type.
///
/// `Default::default()` is the zero weight. The table only ever compares
/// weights with `<` and combines them with `+` and `-`; subtraction is only
/// performed where the minuend is known to contain the subtrahend, so
/// unsigned integer weights never underflow.
///
/// A blanket impl covers the primitive integer and float types as well as any
/// user-defined type with the same surface.
pub trait Weight:
    Copy
    + Default
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + AddAssign
    + SubAssign
{
}

impl<T> Weight for T where
    T: Copy
        + Default
        + PartialEq
        + PartialOrd
        + Add<Output = T>
        + Sub<Output = T>
        + AddAssign
        + SubAssign
{
}

/// Extracts the sampling weight from a stored value.
///
/// The policy is held by value in the table and consulted on every mutation,
/// so implementations should be cheap; the provided policies are zero-sized.
pub trait WeightPolicy<V> {
    /// The weight type this policy produces.
    type Weight: Weight;

    /// Returns the weight of `value`.
    fn weight_of(&self, value: &V) -> Self::Weight;
}

/// The value is its own weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelfWeight;

impl<V: Weight> WeightPolicy<V> for SelfWeight {
    type Weight = V;

    fn weight_of(&self, value: &V) -> V {
        *value
    }
}

/// For `(weight, payload)` pair values, the first component is the weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FirstWeight;

impl<W: Weight, T> WeightPolicy<(W, T)> for FirstWeight {
    type Weight = W;

    fn weight_of(&self, value: &(W, T)) -> W {
        value.0
    }
}
