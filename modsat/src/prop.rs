//! Watch maintenance, narrowing, and the propagation queue.
//!
//! Every active constraint is registered on the watchlists of its first
//! two variables, with unassigned variables rotated into the watch slots.
//! When a watched variable gets a value the constraint either finds a
//! fresh unassigned variable to watch or narrows: assigned variables are
//! substituted into its polynomials, falsification is detected, and when
//! a single variable remains its viable set is intersected with the
//! satisfying values. A viable set collapsing to a single value triggers
//! an integer propagation with the constraint as justification.
//!
//! The propagation queue is a head pointer into the search stack; boolean
//! items activate the constraint named by the literal, integer items scan
//! the variable's watchlist.
use std::mem::replace;

use partial_ref::{partial, PartialRef};

use log::{debug, trace};

use modsat_poly::{PVar, Val, ValSet};

use crate::conflict;
use crate::constraint::{bit, eq, ule, ConstraintKind, SignedCRef};
use crate::context::{
    BoolVarsP, ConfigP, ConflictP, ConstraintsP, Context, SearchP, StatsP, VarsP, ViableP,
};
use crate::lit::BLit;
use crate::search::SearchItem;
use crate::vars::Justification;

/// Propagate queued assignments to fixpoint or until a conflict arises.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut StatsP,
        mut VarsP,
        mut ViableP,
        BoolVarsP,
        ConfigP,
    ),
) {
    ctx.part_mut(SearchP).log_qhead();
    while !ctx.part(ConflictP).is_conflict() {
        let item = match ctx.part_mut(SearchP).next_queued() {
            Some(item) => item,
            None => break,
        };
        match item {
            SearchItem::Assignment { var, .. } => propagate_var(ctx.borrow(), var),
            SearchItem::Boolean { lit } => propagate_lit(ctx.borrow(), lit),
        }
    }
    debug_assert!(ctx.part(ConflictP).is_conflict() || assignment_invariant(ctx.borrow()));
}

/// Scan the watchlist of a newly assigned variable.
fn propagate_var(
    mut ctx: partial!(
        Context,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut StatsP,
        mut VarsP,
        mut ViableP,
        BoolVarsP,
        ConfigP,
    ),
    v: PVar,
) {
    trace!("propagate assignment of {}", v);
    // Watches moved to other variables drop out of this list; narrowing
    // keeps the constraint watching v.
    let mut wlist = replace(ctx.part_mut(VarsP).watch_mut(v), vec![]);
    let mut i = 0;
    let mut j = 0;
    while i < wlist.len() && !ctx.part(ConflictP).is_conflict() {
        let sc = wlist[i];
        if !watch_step(ctx.borrow(), sc, v) {
            wlist[j] = sc;
            j += 1;
        }
        i += 1;
    }
    while i < wlist.len() {
        wlist[j] = wlist[i];
        j += 1;
        i += 1;
    }
    wlist.truncate(j);
    let current = ctx.part_mut(VarsP).watch_mut(v);
    wlist.extend(current.drain(..));
    *current = wlist;
}

/// Try to move the watch for `sc` away from `v`; narrow when every other
/// variable is already assigned. Returns true when the watch moved.
fn watch_step(
    mut ctx: partial!(
        Context,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut StatsP,
        mut VarsP,
        mut ViableP,
        BoolVarsP,
        ConfigP,
    ),
    sc: SignedCRef,
    v: PVar,
) -> bool {
    let moved = {
        let (constraints, mut rest) = ctx.split_part_mut(ConstraintsP);
        let data = constraints.data_mut(sc.cref);
        let idx = if data.vars.first() == Some(&v) { 0 } else { 1 };
        debug_assert_eq!(data.vars.get(idx), Some(&v));
        let mut moved = false;
        for k in (2..data.vars.len()).rev() {
            let candidate = data.vars[k];
            if !rest.part(VarsP).is_assigned(candidate) {
                data.vars.swap(idx, k);
                rest.part_mut(VarsP).watch_mut(candidate).push(sc);
                moved = true;
                break;
            }
        }
        moved
    };
    if !moved {
        narrow(ctx.borrow(), sc);
    }
    moved
}

/// Activate the constraint named by a queued boolean literal.
fn propagate_lit(
    mut ctx: partial!(
        Context,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut StatsP,
        mut VarsP,
        mut ViableP,
        BoolVarsP,
        ConfigP,
    ),
    lit: BLit,
) {
    trace!("propagate literal {}", lit);
    let sc = ctx
        .part(ConstraintsP)
        .lookup(lit)
        .expect("queued literal without constraint");
    activate(ctx.borrow(), sc);
}

/// Register watches for a constraint and narrow it once.
pub fn activate(
    mut ctx: partial!(
        Context,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut StatsP,
        mut VarsP,
        mut ViableP,
        BoolVarsP,
        ConfigP,
    ),
    sc: SignedCRef,
) {
    trace!("activate {:?}", sc);
    {
        let (constraints, mut rest) = ctx.split_part_mut(ConstraintsP);
        debug_assert!(rest.part(BoolVarsP).is_true(constraints.blit(sc)));
        let data = constraints.data_mut(sc.cref);
        // unassigned variables first, so the watch slots are as live as
        // possible at activation time
        let vars = rest.part(VarsP);
        data.vars.sort_by_key(|&u| vars.is_assigned(u));
        for k in 0..data.vars.len().min(2) {
            let watched = data.vars[k];
            rest.part_mut(VarsP).watch_mut(watched).push(sc);
        }
    }
    narrow(ctx.borrow(), sc);
}

/// Remove the watches of a constraint that is no longer active.
pub fn erase_watches(
    mut ctx: partial!(Context, mut VarsP, ConstraintsP),
    sc: SignedCRef,
) {
    let data = ctx.part(ConstraintsP).data(sc.cref);
    let watched: Vec<PVar> = data.vars.iter().take(2).cloned().collect();
    for v in watched {
        ctx.part_mut(VarsP).watch_mut(v).retain(|&c| c != sc);
    }
}

/// Narrow a constraint under the current assignment.
pub fn narrow(
    mut ctx: partial!(
        Context,
        mut ConflictP,
        mut SearchP,
        mut StatsP,
        mut VarsP,
        mut ViableP,
        ConfigP,
        ConstraintsP,
    ),
    sc: SignedCRef,
) {
    if ctx.part(ConflictP).is_conflict() {
        return;
    }
    let kind = ctx.part(ConstraintsP).data(sc.cref).kind.clone();
    match kind {
        ConstraintKind::Eq(p) => eq::narrow(ctx.borrow(), sc, &p),
        ConstraintKind::Ule(p, q) => ule::narrow(ctx.borrow(), sc, &p, &q),
        ConstraintKind::Bit(v, set) => bit::narrow(ctx.borrow(), sc, v, &set),
    }
}

/// Shared tail of all narrowing paths: remember the constraint as the
/// variable's justification, intersect the viable set, and propagate a
/// forced value.
pub fn narrow_with_set(
    mut ctx: partial!(
        Context,
        mut ConflictP,
        mut SearchP,
        mut StatsP,
        mut VarsP,
        mut ViableP,
        ConstraintsP,
    ),
    sc: SignedCRef,
    x: PVar,
    sat: &ValSet,
) {
    debug_assert!(!ctx.part(VarsP).is_assigned(x));
    ctx.part_mut(VarsP).push_cjust(x, sc);
    ctx.part_mut(SearchP).log_cjust(x);
    crate::viable::intersect_viable(ctx.borrow(), x, sat);
    if ctx.part(ConflictP).is_conflict() {
        return;
    }
    if let Some(val) = ctx.part(ViableP).set(x).as_singleton() {
        propagate_value(ctx.borrow(), x, val, sc);
    }
}

/// Assign a forced value, or record a conflict when the value is not
/// viable.
pub fn propagate_value(
    mut ctx: partial!(
        Context,
        mut ConflictP,
        mut SearchP,
        mut StatsP,
        mut VarsP,
        ViableP,
        ConstraintsP,
    ),
    v: PVar,
    val: Val,
    sc: SignedCRef,
) {
    if ctx.part(ViableP).is_viable(v, val) {
        let level = ctx.part(SearchP).level();
        assign_core(ctx.borrow(), v, val, Justification::Propagation { level });
    } else {
        conflict::set_conflict(ctx.borrow(), sc);
    }
}

/// Record an integer assignment on the search stack.
pub fn assign_core(
    mut ctx: partial!(Context, mut SearchP, mut StatsP, mut VarsP, ViableP),
    v: PVar,
    val: Val,
    j: Justification,
) {
    if j.is_decision() {
        ctx.part_mut(StatsP).decisions += 1;
    } else {
        ctx.part_mut(StatsP).propagations += 1;
    }
    debug!("assign {} := {} by {:?}", v, val, j);
    debug_assert!(ctx.part(ViableP).is_viable(v, val));
    ctx.part_mut(VarsP).assign(v, val, j);
    ctx.part_mut(SearchP).push_assignment(v, val);
}

/// Check that boolean assignment and constraint evaluation agree: no
/// true literal has a currently false constraint and vice versa.
pub fn assignment_invariant(
    ctx: partial!(Context, BoolVarsP, ConstraintsP, SearchP),
) -> bool {
    let asn = ctx.part(SearchP).assignment();
    for index in 0..ctx.part(BoolVarsP).var_count() {
        let lit = BLit::positive(crate::lit::BVar::from_index(index));
        let sc = match ctx.part(ConstraintsP).lookup(lit) {
            Some(sc) => sc,
            None => continue,
        };
        match ctx.part(BoolVarsP).value(lit) {
            Some(true) => {
                if ctx.part(ConstraintsP).status(sc, asn) == Some(false) {
                    return false;
                }
            }
            Some(false) => {
                if ctx.part(ConstraintsP).status(sc, asn) == Some(true) {
                    return false;
                }
            }
            None => {}
        }
    }
    true
}

/// Check that every active constraint is watched by its first variables:
/// exactly `min(2, |vars|)` watch entries, all in the right lists.
pub fn wlist_invariant(
    ctx: partial!(Context, BoolVarsP, ConstraintsP, VarsP),
) -> bool {
    let constraints = ctx.part(ConstraintsP);
    let active: Vec<SignedCRef> = constraints
        .original
        .iter()
        .chain(constraints.redundant.iter())
        .cloned()
        .filter(|&sc| ctx.part(BoolVarsP).is_true(constraints.blit(sc)))
        .collect();
    for sc in active {
        let expected = constraints.data(sc.cref).vars.len().min(2);
        let mut found = 0;
        for index in 0..ctx.part(VarsP).var_count() {
            let v = PVar::from_index(index);
            let n = ctx
                .part(VarsP)
                .watch(v)
                .iter()
                .filter(|&&c| c == sc)
                .count();
            if n > 1 {
                return false;
            }
            found += n;
        }
        if found != expected {
            return false;
        }
    }
    true
}
