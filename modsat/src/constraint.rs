//! Constraint atoms and their manager.
//!
//! Atoms are owned by an arena; everything else refers to them through
//! [`CRef`] indices. Each atom is paired with exactly one boolean
//! variable, and a signed occurrence of an atom is a [`SignedCRef`]
//! carrying the polarity bit, so negation never copies the atom. Atoms
//! are bucketed by storage level for coordinated release when levels are
//! popped, and deduplicated by structural hash.
use std::fmt;
use std::ops;

use partial_ref::{partial, PartialRef};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use modsat_poly::{PVar, Poly, Val, ValSet};

use crate::bool_vars::BoolVars;
use crate::clause::ClauseRef;
use crate::context::{BoolVarsP, ConstraintsP, Context};
use crate::dep::DepSet;
use crate::lit::{BLit, BVar};

pub mod bit;
pub mod eq;
pub mod ule;

/// Compact reference to a stored constraint atom.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct CRef(u32);

impl CRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for CRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// A signed occurrence of a constraint atom.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SignedCRef {
    pub cref: CRef,
    pub positive: bool,
}

impl SignedCRef {
    pub fn positive(cref: CRef) -> SignedCRef {
        SignedCRef {
            cref,
            positive: true,
        }
    }
}

impl ops::Not for SignedCRef {
    type Output = SignedCRef;
    fn not(self) -> SignedCRef {
        SignedCRef {
            cref: self.cref,
            positive: !self.positive,
        }
    }
}

impl fmt::Debug for SignedCRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.positive {
            write!(f, "{:?}", self.cref)
        } else {
            write!(f, "!{:?}", self.cref)
        }
    }
}

/// The kinds of constraint atoms.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// `p = 0`
    Eq(Poly),
    /// `p ≤ q` unsigned
    Ule(Poly, Poly),
    /// `value(v) ∈ set`
    Bit(PVar, ValSet),
}

/// An atom together with its solver bookkeeping.
pub struct ConstraintData {
    pub kind: ConstraintKind,
    pub bvar: BVar,
    /// Variables the atom touches; the first two positions are the watch
    /// slots and get reordered during search.
    pub vars: SmallVec<[PVar; 4]>,
    /// Storage level controlling the atom's lifetime.
    pub level: u32,
    pub deps: DepSet,
    /// Set when the constraint was asserted through a unit clause.
    pub unit_clause: Option<ClauseRef>,
}

/// Arena and index structures for all constraint atoms.
#[derive(Default)]
pub struct Constraints {
    slots: Vec<Option<ConstraintData>>,
    free: Vec<u32>,
    by_level: Vec<Vec<CRef>>,
    dedup: FxHashMap<ConstraintKind, CRef>,
    bv2c: Vec<Option<CRef>>,
    external: FxHashMap<u32, SignedCRef>,
    /// Externally asserted constraints, sorted by storage level.
    pub original: Vec<SignedCRef>,
    /// Constraints stemming from learned unit lemmas, sorted by level.
    pub redundant: Vec<SignedCRef>,
}

impl Constraints {
    pub fn data(&self, cref: CRef) -> &ConstraintData {
        self.slots[cref.index()]
            .as_ref()
            .expect("stale constraint reference")
    }

    pub fn data_mut(&mut self, cref: CRef) -> &mut ConstraintData {
        self.slots[cref.index()]
            .as_mut()
            .expect("stale constraint reference")
    }

    /// The boolean literal standing for a signed occurrence.
    pub fn blit(&self, sc: SignedCRef) -> BLit {
        BLit::from_var(self.data(sc.cref).bvar, !sc.positive)
    }

    /// The signed constraint a boolean literal stands for.
    pub fn lookup(&self, lit: BLit) -> Option<SignedCRef> {
        let cref = (*self.bv2c.get(lit.index())?)?;
        Some(SignedCRef {
            cref,
            positive: lit.is_positive(),
        })
    }

    pub fn register_external(&mut self, dep: u32, sc: SignedCRef) {
        self.external.insert(dep, sc);
    }

    pub fn lookup_external(&self, dep: u32) -> Option<SignedCRef> {
        self.external.get(&dep).cloned()
    }

    /// Evaluate a signed occurrence under the given assignment.
    ///
    /// `Some(true)` when the constraint currently holds, `Some(false)`
    /// when it is currently falsified, `None` when variables are missing.
    pub fn status(&self, sc: SignedCRef, asn: &[(PVar, Val)]) -> Option<bool> {
        let holds = match &self.data(sc.cref).kind {
            ConstraintKind::Eq(p) => p.eval(asn)? == 0,
            ConstraintKind::Ule(p, q) => p.eval(asn)? <= q.eval(asn)?,
            ConstraintKind::Bit(v, set) => {
                let val = asn.iter().find(|&&(u, _)| u == *v).map(|&(_, val)| val)?;
                set.contains(val)
            }
        };
        Some(holds == sc.positive)
    }

    /// Record an externally asserted constraint, keeping the list sorted
    /// by storage level.
    pub fn insert_original(&mut self, sc: SignedCRef) {
        let level = self.data(sc.cref).level;
        let pos = self
            .original
            .iter()
            .position(|&c| self.data(c.cref).level > level)
            .unwrap_or_else(|| self.original.len());
        self.original.insert(pos, sc);
        debug_assert!(self.is_level_sorted(&self.original));
    }

    /// Record a constraint stemming from a learned unit lemma.
    pub fn insert_redundant(&mut self, sc: SignedCRef) {
        let level = self.data(sc.cref).level;
        let pos = self
            .redundant
            .iter()
            .position(|&c| self.data(c.cref).level > level)
            .unwrap_or_else(|| self.redundant.len());
        self.redundant.insert(pos, sc);
        debug_assert!(self.is_level_sorted(&self.redundant));
    }

    /// Remove and return the original constraints stored above `level`.
    pub fn pop_original_above(&mut self, level: u32) -> Vec<SignedCRef> {
        let mut removed = vec![];
        while let Some(&sc) = self.original.last() {
            if self.data(sc.cref).level > level {
                removed.push(sc);
                self.original.pop();
            } else {
                break;
            }
        }
        removed
    }

    /// Remove and return the redundant constraints stored above `level`.
    pub fn pop_redundant_above(&mut self, level: u32) -> Vec<SignedCRef> {
        let mut removed = vec![];
        while let Some(&sc) = self.redundant.last() {
            if self.data(sc.cref).level > level {
                removed.push(sc);
                self.redundant.pop();
            } else {
                break;
            }
        }
        removed
    }

    /// Drop all atoms stored at `level` or above, releasing their boolean
    /// variables.
    pub fn release_level(&mut self, level: u32, bvars: &mut BoolVars) {
        while self.by_level.len() > level as usize {
            for cref in self.by_level.pop().unwrap() {
                let data = self.slots[cref.index()].take().expect("double release");
                self.bv2c[data.bvar.index()] = None;
                bvars.del_var(data.bvar);
                if self.dedup.get(&data.kind) == Some(&cref) {
                    self.dedup.remove(&data.kind);
                }
                self.free.push(cref.index() as u32);
            }
        }
    }

    fn alloc(&mut self, data: ConstraintData) -> CRef {
        let level = data.level as usize;
        let bvar = data.bvar;
        let kind = data.kind.clone();
        let cref = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(data);
                CRef(slot)
            }
            None => {
                self.slots.push(Some(data));
                CRef((self.slots.len() - 1) as u32)
            }
        };
        if self.by_level.len() <= level {
            self.by_level.resize_with(level + 1, Vec::new);
        }
        self.by_level[level].push(cref);
        if self.bv2c.len() <= bvar.index() {
            self.bv2c.resize(bvar.index() + 1, None);
        }
        self.bv2c[bvar.index()] = Some(cref);
        self.dedup.insert(kind, cref);
        cref
    }

    /// Check that a constraint list is sorted by storage level.
    fn is_level_sorted(&self, list: &[SignedCRef]) -> bool {
        list.windows(2)
            .all(|w| self.data(w[0].cref).level <= self.data(w[1].cref).level)
    }
}

/// Intern an atom, reusing a structurally equal one when possible.
pub(crate) fn intern(
    mut ctx: partial!(Context, mut ConstraintsP, mut BoolVarsP),
    level: u32,
    kind: ConstraintKind,
    deps: DepSet,
) -> CRef {
    if let Some(&cref) = ctx.part(ConstraintsP).dedup.get(&kind) {
        if ctx.part(ConstraintsP).data(cref).level <= level {
            ctx.part_mut(ConstraintsP).data_mut(cref).deps.join(&deps);
            return cref;
        }
    }
    let vars = match &kind {
        ConstraintKind::Eq(p) => p.free_vars().into(),
        ConstraintKind::Ule(p, q) => {
            let mut vars = p.free_vars();
            vars.extend(q.free_vars());
            vars.sort();
            vars.dedup();
            vars.into()
        }
        ConstraintKind::Bit(v, _) => {
            let mut vars = SmallVec::new();
            vars.push(*v);
            vars
        }
    };
    let bvar = ctx.part_mut(BoolVarsP).new_var();
    ctx.part_mut(ConstraintsP).alloc(ConstraintData {
        kind,
        bvar,
        vars,
        level,
        deps,
        unit_clause: None,
    })
}

/// `p = 0`
pub fn mk_eq(
    mut ctx: partial!(Context, mut ConstraintsP, mut BoolVarsP),
    level: u32,
    p: Poly,
    deps: DepSet,
) -> SignedCRef {
    SignedCRef::positive(intern(ctx.borrow(), level, ConstraintKind::Eq(p), deps))
}

/// `p ≠ 0`
pub fn mk_diseq(
    mut ctx: partial!(Context, mut ConstraintsP, mut BoolVarsP),
    level: u32,
    p: Poly,
    deps: DepSet,
) -> SignedCRef {
    !mk_eq(ctx.borrow(), level, p, deps)
}

/// `p ≤ q` unsigned
pub fn mk_ule(
    mut ctx: partial!(Context, mut ConstraintsP, mut BoolVarsP),
    level: u32,
    p: Poly,
    q: Poly,
    deps: DepSet,
) -> SignedCRef {
    SignedCRef::positive(intern(ctx.borrow(), level, ConstraintKind::Ule(p, q), deps))
}

/// `p < q` unsigned, as the negation of `q ≤ p`.
pub fn mk_ult(
    mut ctx: partial!(Context, mut ConstraintsP, mut BoolVarsP),
    level: u32,
    p: Poly,
    q: Poly,
    deps: DepSet,
) -> SignedCRef {
    !mk_ule(ctx.borrow(), level, q, p, deps)
}

/// `p ≤ q` signed, lowered to the unsigned comparison of both sides with
/// the high bit flipped.
pub fn mk_sle(
    mut ctx: partial!(Context, mut ConstraintsP, mut BoolVarsP),
    level: u32,
    p: Poly,
    q: Poly,
    deps: DepSet,
) -> SignedCRef {
    let offset = high_bit(&p);
    mk_ule(ctx.borrow(), level, p + offset, q + offset, deps)
}

/// `p < q` signed.
pub fn mk_slt(
    mut ctx: partial!(Context, mut ConstraintsP, mut BoolVarsP),
    level: u32,
    p: Poly,
    q: Poly,
    deps: DepSet,
) -> SignedCRef {
    let offset = high_bit(&p);
    mk_ult(ctx.borrow(), level, p + offset, q + offset, deps)
}

fn high_bit(p: &Poly) -> Val {
    1u64 << (p.width() - 1)
}

/// `value(v) ∈ set`
pub fn mk_viable(
    mut ctx: partial!(Context, mut ConstraintsP, mut BoolVarsP),
    level: u32,
    v: PVar,
    set: ValSet,
    deps: DepSet,
) -> SignedCRef {
    SignedCRef::positive(intern(ctx.borrow(), level, ConstraintKind::Bit(v, set), deps))
}

/// Render a signed constraint for logging.
pub fn display(constraints: &Constraints, sc: SignedCRef) -> String {
    let data = constraints.data(sc.cref);
    match (&data.kind, sc.positive) {
        (ConstraintKind::Eq(p), true) => format!("{} = 0", p),
        (ConstraintKind::Eq(p), false) => format!("{} != 0", p),
        (ConstraintKind::Ule(p, q), true) => format!("{} <=u {}", p, q),
        (ConstraintKind::Ule(p, q), false) => format!("{} <u {}", q, p),
        (ConstraintKind::Bit(v, set), true) => format!("{} in {:?}", v, set),
        (ConstraintKind::Bit(v, set), false) => format!("{} not in {:?}", v, set),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::context::Context;

    fn signed_value(x: Val, w: u32) -> i64 {
        let m = 1i64 << w;
        let x = x as i64;
        if x >= m / 2 {
            x - m
        } else {
            x
        }
    }

    #[test]
    fn signed_lowering_matches_signed_comparison() {
        let w = 3;
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        for x in 0..8 {
            for y in 0..8 {
                let slt = mk_slt(
                    ctx.borrow(),
                    0,
                    Poly::val(x, w),
                    Poly::val(y, w),
                    DepSet::empty(),
                );
                let sle = mk_sle(
                    ctx.borrow(),
                    0,
                    Poly::val(x, w),
                    Poly::val(y, w),
                    DepSet::empty(),
                );
                let sx = signed_value(x, w);
                let sy = signed_value(y, w);
                assert_eq!(ctx.part(ConstraintsP).status(slt, &[]), Some(sx < sy));
                assert_eq!(ctx.part(ConstraintsP).status(sle, &[]), Some(sx <= sy));
            }
        }
    }

    #[test]
    fn structurally_equal_atoms_share_storage() {
        let w = 4;
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        let p = Poly::val(3, w);
        let q = Poly::val(5, w);
        let first = mk_ule(ctx.borrow(), 0, p.clone(), q.clone(), DepSet::empty());
        let second = mk_ule(ctx.borrow(), 0, p.clone(), q.clone(), DepSet::empty());
        assert_eq!(first, second);
        // a strict comparison is the negated converse and shares its atom
        let strict = mk_ult(ctx.borrow(), 0, q, p, DepSet::empty());
        assert_eq!(strict.cref, first.cref);
        assert!(!strict.positive);
    }
}
