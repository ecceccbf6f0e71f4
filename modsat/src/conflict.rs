//! The conflict core.
//!
//! The core is the working set of conflict resolution: signed constraints
//! that are individually asserted or entailed but jointly infeasible,
//! possibly only under the current assignment (`needs_model`). The
//! learned lemma is the disjunction of the negated member literals plus
//! the negated premise literals collected while explainers rewrote the
//! core.
use partial_ref::{partial, PartialRef};

use log::debug;

use modsat_poly::PVar;

use crate::clause::{Clause, ClauseBuilder};
use crate::constraint::{self, Constraints, SignedCRef};
use crate::context::{BoolVarsP, ConflictP, ConstraintsP, Context, SearchP, VarsP};
use crate::dep::DepSet;
use crate::lit::BLit;

#[derive(Default)]
pub struct ConflictCore {
    members: Vec<SignedCRef>,
    /// Antecedents recorded by `replace`; they participate in the lemma
    /// but not in the variable scan.
    premises: Vec<SignedCRef>,
    needs_model: bool,
    /// The variable whose viable set collapsed, if that is how the
    /// conflict was discovered.
    conflict_var: Option<PVar>,
    /// Once set, explainers stop eliminating variables and justifications
    /// are collected wholesale.
    bailout: bool,
}

impl ConflictCore {
    pub fn is_conflict(&self) -> bool {
        !self.members.is_empty() || self.conflict_var.is_some()
    }

    pub fn reset(&mut self) {
        self.members.clear();
        self.premises.clear();
        self.needs_model = true;
        self.conflict_var = None;
        self.bailout = false;
    }

    pub fn members(&self) -> &[SignedCRef] {
        &self.members
    }

    pub fn premises(&self) -> &[SignedCRef] {
        &self.premises
    }

    pub fn conflict_var(&self) -> Option<PVar> {
        self.conflict_var
    }

    pub fn is_bailout(&self) -> bool {
        self.bailout
    }

    pub fn set_bailout(&mut self) {
        self.bailout = true;
    }

    pub fn needs_model(&self) -> bool {
        self.needs_model
    }

    /// Initialize from a single falsified constraint.
    pub fn set(&mut self, sc: SignedCRef) {
        debug_assert!(!self.is_conflict());
        self.members.push(sc);
        self.needs_model = true;
    }

    /// Initialize from an empty viable set, seeding the core with the
    /// constraints that justified the variable's range.
    pub fn set_var(&mut self, v: PVar, cjust: &[SignedCRef]) {
        debug_assert!(!self.is_conflict());
        self.members.extend_from_slice(cjust);
        self.conflict_var = Some(v);
        self.needs_model = true;
    }

    pub fn contains(&self, sc: SignedCRef) -> bool {
        self.members.contains(&sc)
    }

    pub fn insert(&mut self, sc: SignedCRef) {
        if !self.contains(sc) {
            self.members.push(sc);
        }
    }

    pub fn remove(&mut self, sc: SignedCRef) {
        self.members.retain(|&m| m != sc);
    }

    /// Swap one member for another, recording the antecedents that
    /// justify the exchange.
    pub fn replace(&mut self, old: SignedCRef, new: SignedCRef, premises: &[SignedCRef]) {
        self.remove(old);
        self.insert(new);
        for &p in premises {
            if !self.premises.contains(&p) {
                self.premises.push(p);
            }
        }
    }

    /// Replace the whole member set, e.g. after a covering explanation
    /// subsumed the previous core.
    pub fn replace_all(&mut self, members: Vec<SignedCRef>) {
        self.members = members;
        self.conflict_var = None;
    }

    pub fn set_needs_model(&mut self, needs_model: bool) {
        self.needs_model = needs_model;
    }

    /// Whether any member still mentions `v`.
    pub fn mentions(&self, v: PVar, constraints: &Constraints) -> bool {
        self.members
            .iter()
            .any(|&m| constraints.data(m.cref).vars.contains(&v))
    }

    /// Standard boolean resolution against `other` on the variable of
    /// `lit`: the member asserted as `lit` is cancelled and the remaining
    /// literals of `other` enter the core negated.
    pub fn resolve_bool(&mut self, lit: BLit, other: &Clause, constraints: &Constraints) {
        let pos = self
            .members
            .iter()
            .position(|&m| constraints.blit(m) == lit);
        match pos {
            Some(pos) => {
                self.members.swap_remove(pos);
            }
            None => return,
        }
        for &l in other.lits() {
            if l != lit {
                if let Some(sc) = constraints.lookup(!l) {
                    self.insert(sc);
                }
            }
        }
    }

}

/// Materialize the core as a clause: the negation of every member and
/// premise literal, plus, when the conflict depends on the current
/// model, one value-exclusion literal `v ≠ val` per assigned variable of
/// the core. The clause's storage level is the join of the constraints'
/// storage levels, which never exceeds `max_level`.
pub fn build_lemma(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ConstraintsP,
        ConflictP,
        SearchP,
        VarsP,
    ),
    max_level: u32,
) -> ClauseBuilder {
    let mut builder = ClauseBuilder::new();
    let mut model_vars: Vec<PVar> = vec![];
    {
        let core = ctx.part(ConflictP);
        let constraints = ctx.part(ConstraintsP);
        for &sc in core.members().iter().chain(core.premises().iter()) {
            let data = constraints.data(sc.cref);
            builder.push(!constraints.blit(sc));
            builder.bump_level(data.level);
            builder.join_deps(&data.deps);
        }
        if core.needs_model() {
            for &sc in core.members() {
                for &v in &constraints.data(sc.cref).vars {
                    if ctx.part(VarsP).is_assigned(v) && !model_vars.contains(&v) {
                        model_vars.push(v);
                    }
                }
            }
        }
    }
    // value-exclusion atoms live at the base level so they cannot outlast
    // the scope that declared their variable
    let base = ctx.part(SearchP).base_level();
    for v in model_vars {
        let val = ctx.part(VarsP).value(v);
        let atom = ctx.part(VarsP).poly(v).clone() - val;
        let sc = constraint::mk_eq(ctx.borrow(), base, atom, DepSet::empty());
        builder.push(!ctx.part(ConstraintsP).blit(sc));
        builder.bump_level(base);
    }
    debug_assert!(builder.level() <= max_level);
    builder
}

/// Record a falsified constraint as the current conflict.
pub fn set_conflict(mut ctx: partial!(Context, mut ConflictP), sc: SignedCRef) {
    debug!("conflict: {:?}", sc);
    ctx.part_mut(ConflictP).set(sc);
}

/// Record an emptied viable set as the current conflict.
pub fn set_conflict_var(mut ctx: partial!(Context, mut ConflictP, VarsP), v: PVar) {
    let (core, ctx) = ctx.split_part_mut(ConflictP);
    debug!("conflict: viable set of {} is empty", v);
    core.set_var(v, ctx.part(VarsP).cjust(v));
}

/// Render the core for logging.
pub fn display(core: &ConflictCore, constraints: &Constraints) -> String {
    let mut out = String::new();
    for (i, &sc) in core.members().iter().enumerate() {
        if i > 0 {
            out.push_str("  ;  ");
        }
        out.push_str(&constraint::display(constraints, sc));
    }
    if core.needs_model() {
        out.push_str("  ;  + current model");
    }
    out
}
