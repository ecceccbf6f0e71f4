//! External dependency tags.
//!
//! Clients name asserted constraints with opaque nonzero integers. Every
//! constraint carries the set of tags it was derived from; learned
//! constraints and clauses inherit the join of their sources, and the
//! unsat core linearizes the join over the final conflict.
use std::num::NonZeroU32;

use smallvec::SmallVec;

/// Opaque nonzero name for an externally asserted constraint.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Dep(NonZeroU32);

impl Dep {
    /// Wrap a raw tag; zero is reserved for anonymous constraints.
    pub fn new(raw: u32) -> Option<Dep> {
        NonZeroU32::new(raw).map(Dep)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// A sorted set of dependency tags.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct DepSet {
    deps: SmallVec<[Dep; 2]>,
}

impl DepSet {
    pub fn empty() -> DepSet {
        DepSet::default()
    }

    pub fn from_dep(dep: Option<Dep>) -> DepSet {
        let mut deps = SmallVec::new();
        if let Some(dep) = dep {
            deps.push(dep);
        }
        DepSet { deps }
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Merge another set into this one.
    pub fn join(&mut self, other: &DepSet) {
        for &dep in &other.deps {
            if let Err(pos) = self.deps.binary_search(&dep) {
                self.deps.insert(pos, dep);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Dep> + '_ {
        self.deps.iter().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_a_sorted_union() {
        let d = |raw| Dep::new(raw).unwrap();
        let mut a = DepSet::from_dep(Some(d(3)));
        a.join(&DepSet::from_dep(Some(d(1))));
        a.join(&DepSet::from_dep(Some(d(3))));
        a.join(&DepSet::from_dep(None));
        let tags: Vec<u32> = a.iter().map(Dep::get).collect();
        assert_eq!(tags, vec![1, 3]);
    }
}
