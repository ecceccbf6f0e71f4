//! Viable-value sets with trail-logged narrowing.
//!
//! Each variable carries an over-approximation of its admissible values.
//! Narrowing snapshots the prior set onto the trail so popping a level
//! restores it exactly; emptying a set registers a conflict on the
//! variable.
use partial_ref::{partial, PartialRef};

use log::trace;

use modsat_poly::{Find, PVar, Val, ValSet};

use crate::conflict;
use crate::context::{ConflictP, Context, SearchP, VarsP, ViableP};

/// Per-variable viable sets.
#[derive(Default)]
pub struct Viable {
    sets: Vec<ValSet>,
}

impl Viable {
    pub fn push(&mut self, width: u32) {
        self.sets.push(ValSet::full(width));
    }

    pub fn pop(&mut self) {
        self.sets.pop();
    }

    pub fn set(&self, v: PVar) -> &ValSet {
        &self.sets[v.index()]
    }

    pub fn is_viable(&self, v: PVar, val: Val) -> bool {
        self.sets[v.index()].contains(val)
    }

    pub fn is_empty(&self, v: PVar) -> bool {
        self.sets[v.index()].is_empty()
    }

    /// Find a viable value, preferring the hint.
    pub fn find_viable(&self, v: PVar, hint: Val) -> Find {
        self.sets[v.index()].find(hint)
    }

    /// Trail pop: put a snapshot back.
    pub fn restore(&mut self, v: PVar, prev: ValSet) {
        self.sets[v.index()] = prev;
    }
}

/// Intersect the viable set of `v` with `vals`.
///
/// The prior set is logged on the trail when it shrinks. When the result
/// is empty the solver registers a conflict on `v`.
pub fn intersect_viable(
    mut ctx: partial!(Context, mut ConflictP, mut SearchP, mut ViableP, VarsP),
    v: PVar,
    vals: &ValSet,
) {
    let prev = ctx.part(ViableP).set(v).clone();
    let next = prev.intersect(vals);
    if next == prev {
        return;
    }
    trace!("viable {}: {:?} -> {:?}", v, prev, next);
    ctx.part_mut(SearchP).log_viable(v, prev);
    let empty = next.is_empty();
    ctx.part_mut(ViableP).sets[v.index()] = next;
    if empty {
        conflict::set_conflict_var(ctx.borrow(), v);
    }
}

/// Exclude a single value, as when a decision is reverted.
pub fn add_non_viable(
    mut ctx: partial!(Context, mut ConflictP, mut SearchP, mut ViableP, VarsP),
    v: PVar,
    val: Val,
) {
    let width = ctx.part(VarsP).width(v);
    let vals = ValSet::singleton(val, width).complement();
    intersect_viable(ctx.borrow(), v, &vals);
}
