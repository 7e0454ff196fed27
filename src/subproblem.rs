//! Dense bitset over source-relation indices, the planner's core
//! book-keeping type (spec.md §3 "Subproblem").
//!
//! Backed by a single `u64`, matching the reference `m::SmallBitset` used
//! throughout `original_source` (e.g. `cardinality_gen.cpp`'s
//! `using Subproblem = m::SmallBitset`). A query graph is limited to 64
//! sources, which comfortably covers the dense plan-table regime spec.md
//! §5 calls out (`n ≤ ~20`); queries needing more sources are not expected
//! to use dynamic-programming enumeration in the first place.

use std::fmt;
use std::ops::{BitAnd, BitOr, Sub};

/// A set of source-relation indices within one query graph.
///
/// Invariant: bits are always in `[0, num_sources)` for the owning query
/// graph; this type itself has no notion of `num_sources` and will happily
/// represent bits up to 63.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Subproblem(u64);

impl Subproblem {
    /// The empty subproblem.
    pub const EMPTY: Subproblem = Subproblem(0);

    /// The singleton subproblem identifying base relation `index`.
    pub fn singleton(index: usize) -> Self {
        debug_assert!(index < 64, "subproblem index out of range: {index}");
        Subproblem(1u64 << index)
    }

    /// The subproblem containing every index in `[0, n)`.
    pub fn full(n: usize) -> Self {
        debug_assert!(n <= 64, "too many sources for a 64-bit subproblem: {n}");
        if n == 64 {
            Subproblem(u64::MAX)
        } else {
            Subproblem((1u64 << n) - 1)
        }
    }

    pub fn from_bits(bits: u64) -> Self {
        Subproblem(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, index: usize) -> bool {
        (self.0 >> index) & 1 == 1
    }

    pub fn insert(self, index: usize) -> Self {
        Subproblem(self.0 | (1u64 << index))
    }

    pub fn union(self, other: Subproblem) -> Self {
        Subproblem(self.0 | other.0)
    }

    pub fn intersection(self, other: Subproblem) -> Self {
        Subproblem(self.0 & other.0)
    }

    /// `self` with every bit of `other` cleared.
    pub fn difference(self, other: Subproblem) -> Self {
        Subproblem(self.0 & !other.0)
    }

    pub fn is_subset_of(self, other: Subproblem) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn is_superset_of(self, other: Subproblem) -> bool {
        other.is_subset_of(self)
    }

    pub fn intersects(self, other: Subproblem) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_disjoint(self, other: Subproblem) -> bool {
        !self.intersects(other)
    }

    pub fn popcount(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate over the set bits, ascending.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                None
            } else {
                let idx = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(idx)
            }
        })
    }

    /// The lowest-indexed bit, if any. Used as a deterministic BFS root.
    pub fn lowest(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }
}

impl BitOr for Subproblem {
    type Output = Subproblem;
    fn bitor(self, rhs: Subproblem) -> Subproblem {
        self.union(rhs)
    }
}

impl BitAnd for Subproblem {
    type Output = Subproblem;
    fn bitand(self, rhs: Subproblem) -> Subproblem {
        self.intersection(rhs)
    }
}

impl Sub for Subproblem {
    type Output = Subproblem;
    fn sub(self, rhs: Subproblem) -> Subproblem {
        self.difference(rhs)
    }
}

impl fmt::Debug for Subproblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, idx) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{idx}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_and_contains() {
        let s = Subproblem::singleton(3);
        assert!(s.contains(3));
        assert!(!s.contains(0));
        assert_eq!(s.popcount(), 1);
    }

    #[test]
    fn union_intersection_difference() {
        let a = Subproblem::singleton(0).union(Subproblem::singleton(1));
        let b = Subproblem::singleton(1).union(Subproblem::singleton(2));
        assert_eq!(a.union(b).popcount(), 3);
        assert_eq!(a.intersection(b), Subproblem::singleton(1));
        assert_eq!(a.difference(b), Subproblem::singleton(0));
    }

    #[test]
    fn subset_superset() {
        let full = Subproblem::full(3);
        let a = Subproblem::singleton(0);
        assert!(a.is_subset_of(full));
        assert!(full.is_superset_of(a));
        assert!(!full.is_subset_of(a));
    }

    #[test]
    fn iter_is_ascending() {
        let s = Subproblem::singleton(0)
            .union(Subproblem::singleton(4))
            .union(Subproblem::singleton(2));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![0, 2, 4]);
    }

    #[test]
    fn full_of_64_is_all_ones() {
        assert_eq!(Subproblem::full(64).bits(), u64::MAX);
    }

    #[test]
    fn disjoint_and_intersects() {
        let a = Subproblem::singleton(0);
        let b = Subproblem::singleton(1);
        assert!(a.is_disjoint(b));
        assert!(!a.intersects(b));
        let c = a.union(b);
        assert!(a.intersects(c));
    }
}
