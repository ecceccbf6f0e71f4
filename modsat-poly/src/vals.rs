//! Sets of residues represented as sorted disjoint ranges.
//!
//! A [`ValSet`] is a subset of `[0, 2^w)` stored as inclusive ranges.
//! Narrowing in the solver only ever produces sets built from modular
//! intervals and solution sets of linear congruences, so a short range
//! list is a good fit; the representation degrades gracefully by letting
//! the caller bound the number of ranges it is willing to materialize.
use std::fmt;

use crate::pvar::{self, Val};

/// Result of querying a set for a value, with a hint for clustering
/// successive decisions.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Find {
    Empty,
    Singleton(Val),
    Multiple(Val),
}

/// A subset of `[0, 2^w)`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ValSet {
    width: u32,
    /// Sorted, disjoint, non-adjacent inclusive ranges.
    ranges: Vec<(Val, Val)>,
}

impl ValSet {
    pub fn empty(width: u32) -> ValSet {
        ValSet {
            width,
            ranges: vec![],
        }
    }

    pub fn full(width: u32) -> ValSet {
        ValSet {
            width,
            ranges: vec![(0, pvar::width_mask(width))],
        }
    }

    pub fn singleton(val: Val, width: u32) -> ValSet {
        debug_assert_eq!(val, pvar::truncate(val, width));
        ValSet {
            width,
            ranges: vec![(val, val)],
        }
    }

    /// Build from arbitrary inclusive ranges.
    pub fn from_ranges(width: u32, ranges: impl IntoIterator<Item = (Val, Val)>) -> ValSet {
        let mut ranges: Vec<_> = ranges.into_iter().collect();
        ranges.sort();
        let mut merged: Vec<(Val, Val)> = vec![];
        for (lo, hi) in ranges {
            debug_assert!(lo <= hi && hi <= pvar::width_mask(width));
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        ValSet {
            width,
            ranges: merged,
        }
    }

    /// The half-open interval `[lo, hi)` modulo `2^w`; empty when `lo == hi`.
    pub fn from_wrapped_interval(lo: Val, hi: Val, width: u32) -> ValSet {
        let lo = pvar::truncate(lo, width);
        let hi = pvar::truncate(hi, width);
        if lo == hi {
            ValSet::empty(width)
        } else if lo < hi {
            ValSet::from_ranges(width, vec![(lo, hi - 1)])
        } else {
            let mut ranges = vec![(lo, pvar::width_mask(width))];
            if hi > 0 {
                ranges.push((0, hi - 1));
            }
            ValSet::from_ranges(width, ranges)
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ranges == [(0, pvar::width_mask(self.width))]
    }

    /// Number of values in the set.
    pub fn count(&self) -> u128 {
        self.ranges
            .iter()
            .map(|&(lo, hi)| (hi - lo) as u128 + 1)
            .sum()
    }

    pub fn contains(&self, val: Val) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= val && val <= hi)
    }

    pub fn as_singleton(&self) -> Option<Val> {
        match self.ranges.as_slice() {
            [(lo, hi)] if lo == hi => Some(*lo),
            _ => None,
        }
    }

    /// Find a member of the set, preferring the hint when it is one.
    pub fn find(&self, hint: Val) -> Find {
        if self.is_empty() {
            Find::Empty
        } else if let Some(val) = self.as_singleton() {
            Find::Singleton(val)
        } else if self.contains(hint) {
            Find::Multiple(hint)
        } else {
            Find::Multiple(self.ranges[0].0)
        }
    }

    pub fn complement(&self) -> ValSet {
        let mask = pvar::width_mask(self.width);
        let mut ranges = vec![];
        let mut next = 0;
        for &(lo, hi) in &self.ranges {
            if lo > next {
                ranges.push((next, lo - 1));
            }
            if hi == mask {
                return ValSet {
                    width: self.width,
                    ranges,
                };
            }
            next = hi + 1;
        }
        ranges.push((next, mask));
        ValSet {
            width: self.width,
            ranges,
        }
    }

    pub fn intersect(&self, other: &ValSet) -> ValSet {
        debug_assert_eq!(self.width, other.width);
        let mut ranges = vec![];
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a_lo, a_hi) = self.ranges[i];
            let (b_lo, b_hi) = other.ranges[j];
            let lo = a_lo.max(b_lo);
            let hi = a_hi.min(b_hi);
            if lo <= hi {
                ranges.push((lo, hi));
            }
            if a_hi <= b_hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        ValSet {
            width: self.width,
            ranges,
        }
    }

    pub fn union(&self, other: &ValSet) -> ValSet {
        debug_assert_eq!(self.width, other.width);
        let ranges = self.ranges.iter().chain(other.ranges.iter()).cloned();
        ValSet::from_ranges(self.width, ranges)
    }

    /// The set without a single value.
    pub fn remove(&self, val: Val) -> ValSet {
        self.intersect(&ValSet::singleton(val, self.width).complement())
    }

    /// Iterate over all members. Only sensible for small sets; used by
    /// tests and by narrowing at enumerable widths.
    pub fn iter(&self) -> impl Iterator<Item = Val> + '_ {
        self.ranges.iter().flat_map(|&(lo, hi)| lo..=hi)
    }
}

impl fmt::Debug for ValSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, &(lo, hi)) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if lo == hi {
                write!(f, "{}", lo)?;
            } else {
                write!(f, "{}..={}", lo, hi)?;
            }
        }
        write!(f, "}}")
    }
}

/// The solution set of `a·x + b ≡ 0 (mod 2^w)`.
///
/// With `2^k = gcd(a, 2^w)` the congruence is solvable iff `2^k` divides
/// `b`, and the solutions form `2^k` points with stride `2^(w−k)`.
/// Returns `None` when that would exceed `max_ranges` points; the caller
/// is expected to skip narrowing in that case.
pub fn solve_linear(a: Val, b: Val, width: u32, max_ranges: usize) -> Option<ValSet> {
    let a = pvar::truncate(a, width);
    let b = pvar::truncate(b, width);
    if a == 0 {
        return Some(if b == 0 {
            ValSet::full(width)
        } else {
            ValSet::empty(width)
        });
    }
    let k = a.trailing_zeros();
    debug_assert!(k < width);
    if k > 0 && b & pvar::width_mask(k) != 0 {
        return Some(ValSet::empty(width));
    }
    if k >= 64 || (1u64 << k) > max_ranges as u64 {
        return None;
    }
    let sub_width = width - k;
    let x0 = pvar::mul_mod(
        pvar::neg_mod(b >> k, sub_width),
        pvar::inverse_odd(a >> k, sub_width),
        sub_width,
    );
    if k == 0 {
        return Some(ValSet::singleton(x0, width));
    }
    let stride = 1u64 << sub_width;
    let ranges = (0..1u64 << k).map(|t| {
        let x = x0 + t * stride;
        (x, x)
    });
    Some(ValSet::from_ranges(width, ranges))
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::pvar::truncate;

    fn naive(set: &ValSet) -> Vec<Val> {
        (0..=pvar::width_mask(set.width()))
            .filter(|&x| set.contains(x))
            .collect()
    }

    #[test]
    fn wrapped_intervals() {
        let s = ValSet::from_wrapped_interval(3, 1, 2);
        assert_eq!(naive(&s), vec![0, 3]);
        let s = ValSet::from_wrapped_interval(1, 3, 2);
        assert_eq!(naive(&s), vec![1, 2]);
        assert!(ValSet::from_wrapped_interval(2, 2, 2).is_empty());
    }

    #[test]
    fn find_prefers_hint() {
        let s = ValSet::from_ranges(4, vec![(2, 5), (9, 9)]);
        assert_eq!(s.find(4), Find::Multiple(4));
        assert_eq!(s.find(7), Find::Multiple(2));
        assert_eq!(ValSet::singleton(9, 4).find(0), Find::Singleton(9));
        assert_eq!(ValSet::empty(4).find(0), Find::Empty);
    }

    #[test]
    fn linear_solutions() {
        // x + 1 = 0 mod 4
        let s = solve_linear(1, 1, 2, 64).unwrap();
        assert_eq!(naive(&s), vec![3]);
        // 2x + 2 = 0 mod 4: x ∈ {1, 3}
        let s = solve_linear(2, 2, 2, 64).unwrap();
        assert_eq!(naive(&s), vec![1, 3]);
        // 4x + 2 = 0 mod 8: no solution
        let s = solve_linear(4, 2, 3, 64).unwrap();
        assert!(s.is_empty());
        // too many points to materialize
        assert_eq!(solve_linear(1 << 20, 0, 32, 64), None);
    }

    proptest! {
        #[test]
        fn set_algebra_matches_bitset(
            a in proptest::collection::vec(any::<bool>(), 16),
            b in proptest::collection::vec(any::<bool>(), 16),
        ) {
            let w = 4;
            let mk = |bits: &[bool]| {
                ValSet::from_ranges(
                    w,
                    bits.iter()
                        .enumerate()
                        .filter(|&(_, &on)| on)
                        .map(|(i, _)| (i as Val, i as Val)),
                )
            };
            let sa = mk(&a);
            let sb = mk(&b);
            for x in 0..16u64 {
                let ia = a[x as usize];
                let ib = b[x as usize];
                prop_assert_eq!(sa.contains(x), ia);
                prop_assert_eq!(sa.intersect(&sb).contains(x), ia && ib);
                prop_assert_eq!(sa.union(&sb).contains(x), ia || ib);
                prop_assert_eq!(sa.complement().contains(x), !ia);
            }
            prop_assert_eq!(sa.count(), a.iter().filter(|&&on| on).count() as u128);
        }

        #[test]
        fn solve_linear_matches_brute_force(
            a in any::<u64>(),
            b in any::<u64>(),
            w in 1u32..=8,
        ) {
            let a = truncate(a, w);
            let b = truncate(b, w);
            let s = solve_linear(a, b, w, 1 << 8).unwrap();
            for x in 0..=pvar::width_mask(w) {
                let residue = truncate(a.wrapping_mul(x).wrapping_add(b), w);
                prop_assert_eq!(s.contains(x), residue == 0);
            }
        }
    }
}
