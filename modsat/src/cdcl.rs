//! Conflict-driven learning over interleaved integer and boolean
//! assignments.
//!
//! When propagation falsifies a constraint or empties a viable set, the
//! conflict core is rewritten while walking the search stack top-down:
//! integer propagations are eliminated through the explainers, boolean
//! propagations through resolution with their reason clauses. Hitting a
//! decision materializes the core as a learned clause, backjumps below
//! the decision, and continues by guessing a literal of the lemma.
use partial_ref::{partial, PartialRef};

use log::{debug, trace};

use modsat_poly::PVar;

use crate::clause::{Clause, ClauseRef};
use crate::conflict;
use crate::constraint::SignedCRef;
use crate::context::{
    BoolVarsP, ClauseDbP, ConfigP, ConflictP, ConstraintsP, Context, SearchP, SolverStateP,
    StatsP, VarQueueP, VarsP, ViableP,
};
use crate::decision;
use crate::explain;
use crate::lit::BLit;
use crate::search::{self, SearchItem};
use crate::viable;

/// Resolve the current conflict: learn a lemma and backjump, or backjump
/// to the base level when the conflict does not depend on any decision.
pub fn resolve_conflict(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ClauseDbP,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut SolverStateP,
        mut StatsP,
        mut VarQueueP,
        mut VarsP,
        mut ViableP,
        ConfigP,
    ),
) {
    ctx.part_mut(StatsP).conflicts += 1;
    debug!(
        "resolve conflict: {}",
        conflict::display(ctx.part(ConflictP), ctx.part(ConstraintsP))
    );

    set_marks(ctx.borrow());
    bump_conflict_vars(ctx.borrow());
    ctx.part_mut(VarQueueP).decay();

    if let Some(v) = ctx.part(ConflictP).conflict_var() {
        // a viability collapse is a propagation of v that never made it
        // onto the stack
        resolve_value_step(ctx.borrow(), v);
        set_marks(ctx.borrow());
    }

    let mut i = ctx.part(SearchP).len();
    while i > 0 {
        i -= 1;
        let item = ctx.part(SearchP).items()[i];
        match item {
            SearchItem::Assignment { var, .. } => {
                if !ctx.part(VarsP).is_marked(var) {
                    continue;
                }
                let j = ctx.part(VarsP).justification(var);
                if j.level() <= ctx.part(SearchP).base_level() {
                    break;
                }
                if j.is_decision() {
                    revert_decision(ctx.borrow(), var);
                    return;
                }
                debug_assert!(j.is_propagation());
                resolve_value_step(ctx.borrow(), var);
                set_marks(ctx.borrow());
            }
            SearchItem::Boolean { lit } => {
                let bvar = lit.var();
                if !ctx.part(BoolVarsP).is_marked(bvar) {
                    continue;
                }
                if ctx.part(BoolVarsP).level(bvar) <= ctx.part(SearchP).base_level() {
                    break;
                }
                if ctx.part(BoolVarsP).is_decision(bvar) {
                    revert_bool_decision(ctx.borrow(), lit);
                    return;
                }
                debug_assert!(ctx.part(BoolVarsP).is_propagation(bvar));
                resolve_bool_step(ctx.borrow(), lit);
                set_marks(ctx.borrow());
            }
        }
    }
    report_unsat(ctx.borrow());
}

/// Mark the variables the conflict currently depends on.
fn set_marks(
    mut ctx: partial!(Context, mut BoolVarsP, mut VarsP, ConflictP, ConstraintsP),
) {
    ctx.part_mut(BoolVarsP).reset_marks();
    ctx.part_mut(VarsP).reset_marks();
    if let Some(v) = ctx.part(ConflictP).conflict_var() {
        ctx.part_mut(VarsP).set_mark(v);
    }
    let members: Vec<SignedCRef> = ctx.part(ConflictP).members().to_vec();
    for sc in members {
        let (bvar, vars) = {
            let data = ctx.part(ConstraintsP).data(sc.cref);
            (data.bvar, data.vars.clone())
        };
        ctx.part_mut(BoolVarsP).set_mark(bvar);
        for v in vars {
            ctx.part_mut(VarsP).set_mark(v);
        }
    }
}

/// Bump the activity of every integer variable in the core.
fn bump_conflict_vars(
    mut ctx: partial!(Context, mut VarQueueP, ConflictP, ConstraintsP),
) {
    let mut vars: Vec<PVar> = vec![];
    if let Some(v) = ctx.part(ConflictP).conflict_var() {
        vars.push(v);
    }
    for &sc in ctx.part(ConflictP).members() {
        vars.extend(ctx.part(ConstraintsP).data(sc.cref).vars.iter().cloned());
    }
    vars.sort();
    vars.dedup();
    for v in vars {
        ctx.part_mut(VarQueueP).bump(v);
    }
}

/// Eliminate a propagated variable from the core, or fall back to
/// collecting its justifications wholesale.
fn resolve_value_step(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ConflictP,
        mut ConstraintsP,
        mut StatsP,
        SearchP,
        VarsP,
    ),
    v: PVar,
) {
    if ctx.part(ConflictP).is_bailout() {
        insert_cjust(ctx.borrow(), v);
        return;
    }
    if !explain::resolve_value(ctx.borrow(), v) {
        debug!("bailout while eliminating {}", v);
        ctx.part_mut(StatsP).bailouts += 1;
        ctx.part_mut(ConflictP).set_bailout();
        insert_cjust(ctx.borrow(), v);
    }
}

fn insert_cjust(
    mut ctx: partial!(Context, mut ConflictP, VarsP),
    v: PVar,
) {
    let cjust: Vec<SignedCRef> = ctx.part(VarsP).cjust(v).to_vec();
    for sc in cjust {
        ctx.part_mut(ConflictP).insert(sc);
    }
}

/// Boolean resolution of the core with the reason clause of `lit`.
fn resolve_bool_step(
    mut ctx: partial!(Context, mut ConflictP, BoolVarsP, ClauseDbP, ConstraintsP),
    lit: BLit,
) {
    trace!("resolve boolean propagation {}", lit);
    let reason = ctx
        .part(BoolVarsP)
        .reason(lit.var())
        .expect("boolean propagation without a reason");
    let (core, ctx) = ctx.split_part_mut(ConflictP);
    core.resolve_bool(
        lit,
        ctx.part(ClauseDbP).clause(reason),
        ctx.part(ConstraintsP),
    );
}

/// Revert the integer decision `v`, excluding its value and learning a
/// lemma from the core.
fn revert_decision(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ClauseDbP,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut SolverStateP,
        mut StatsP,
        mut VarQueueP,
        mut VarsP,
        mut ViableP,
        ConfigP,
    ),
    v: PVar,
) {
    let val = ctx.part(VarsP).value(v);
    let lvl = ctx.part(VarsP).justification(v).level();
    debug!("revert decision {} := {} @ {}", v, val, lvl);

    let builder = conflict::build_lemma(ctx.borrow(), lvl);
    ctx.part_mut(ConflictP).reset();
    backjump(ctx.borrow(), lvl - 1);

    viable::add_non_viable(ctx.borrow(), v, val);

    if !builder.is_empty() {
        learn_lemma(ctx.borrow(), v, builder.build());
    }
    if ctx.part(ConflictP).is_conflict() {
        return;
    }
    if !ctx.part(VarsP).is_assigned(v) {
        decision::decide_var(ctx.borrow(), v);
    }
}

/// Revert the boolean decision `lit`: propagate its negation with a
/// reason built from the core and move to the next guess of the lemma it
/// was guessed from.
fn revert_bool_decision(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ClauseDbP,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut SolverStateP,
        mut StatsP,
        mut VarQueueP,
        mut VarsP,
        mut ViableP,
        ConfigP,
    ),
    lit: BLit,
) {
    let bvar = lit.var();
    let lvl = ctx.part(BoolVarsP).level(bvar);
    debug!("revert boolean decision {} @ {}", lit, lvl);

    let mut builder = conflict::build_lemma(ctx.borrow(), lvl);
    ctx.part_mut(ConflictP).reset();
    // the reason must imply the negation
    if !builder.contains(!lit) {
        builder.push(!lit);
    }
    let origin = ctx.part(BoolVarsP).lemma(bvar);
    debug_assert!(origin.is_some());

    backjump(ctx.borrow(), lvl - 1);

    let reason = add_lemma(ctx.borrow(), builder.build());
    if ctx.part(BoolVarsP).value(!lit).is_none() {
        propagate_bool(ctx.borrow(), !lit, reason);
    }
    if ctx.part(ConflictP).is_conflict() {
        return;
    }
    if let Some(origin) = origin {
        decide_bool_from(ctx.borrow(), origin);
    }
}

/// Store a lemma explaining the refutation of a decision on `v` and
/// guess one of its literals.
fn learn_lemma(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ClauseDbP,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut SolverStateP,
        mut VarsP,
    ),
    v: PVar,
    mut lemma: Clause,
) {
    lemma.set_justified_var(v);
    let non_unit = lemma.len() >= 2;
    let cref = add_lemma(ctx.borrow(), lemma);
    if non_unit {
        decide_bool_from(ctx.borrow(), cref);
    }
}

/// Store a learned clause. A unit clause is activated right away as a
/// boolean propagation.
fn add_lemma(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ClauseDbP,
        mut ConstraintsP,
        mut SearchP,
    ),
    lemma: Clause,
) -> ClauseRef {
    let unit = if lemma.len() == 1 {
        Some(lemma.lits()[0])
    } else {
        None
    };
    debug!("learned lemma with {} literals @ {}", lemma.len(), lemma.level());
    let cref = ctx.part_mut(ClauseDbP).store(lemma);
    if let Some(lit) = unit {
        let sc = ctx
            .part(ConstraintsP)
            .lookup(lit)
            .expect("lemma literal without constraint");
        ctx.part_mut(ConstraintsP).data_mut(sc.cref).unit_clause = Some(cref);
        ctx.part_mut(ConstraintsP).insert_redundant(sc);
        if ctx.part(BoolVarsP).value(lit).is_none() {
            propagate_bool(ctx.borrow(), lit, cref);
        }
    }
    cref
}

/// Guess a literal of a learned clause, starting at its guess cursor.
///
/// The single remaining choice is an asserting propagation; with several
/// choices the first one becomes a boolean decision at a new level. When
/// nothing can be guessed the clause is left to the host as a pending
/// disjunctive lemma.
fn decide_bool_from(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ClauseDbP,
        mut ConstraintsP,
        mut SearchP,
        mut SolverStateP,
        mut VarsP,
    ),
    lemma: ClauseRef,
) {
    let (lits, start, justified_var) = {
        let clause = ctx.part(ClauseDbP).clause(lemma);
        (
            clause.lits().to_vec(),
            clause.next_guess(),
            clause.justified_var(),
        )
    };
    let asn: Vec<_> = ctx.part(SearchP).assignment().to_vec();

    let mut choice = None;
    let mut fallback = None;
    let mut num_choices = 0;
    for (idx, &lit) in lits.iter().enumerate() {
        if ctx.part(BoolVarsP).value(lit) == Some(true) {
            // the lemma is already satisfied
            return;
        }
        if ctx.part(BoolVarsP).value(lit) == Some(false) {
            continue;
        }
        let sc = ctx
            .part(ConstraintsP)
            .lookup(lit)
            .expect("lemma literal without constraint");
        if ctx.part(ConstraintsP).status(sc, &asn) == Some(false) {
            continue;
        }
        num_choices += 1;
        if fallback.is_none() {
            fallback = Some(idx);
        }
        if choice.is_none() && idx >= start {
            choice = Some(idx);
        }
    }
    let choice = choice.or(fallback);

    let idx = match choice {
        Some(idx) => idx,
        None => {
            // all literals false under the current assignment; hand the
            // case split to the host
            debug!("no guessable literal, leaving lemma to the host");
            ctx.part_mut(SolverStateP).pending_lemma = Some(lemma);
            return;
        }
    };
    let lit = lits[idx];
    ctx.part_mut(ClauseDbP).clause_mut(lemma).advance_guess(idx + 1);
    if let Some(v) = justified_var {
        let sc = ctx
            .part(ConstraintsP)
            .lookup(lit)
            .expect("lemma literal without constraint");
        ctx.part_mut(VarsP).push_cjust(v, sc);
        ctx.part_mut(SearchP).log_cjust(v);
    }
    if num_choices == 1 {
        propagate_bool(ctx.borrow(), lit, lemma);
    } else {
        ctx.part_mut(SearchP).push_level();
        debug!("guess literal {} @ {}", lit, ctx.part(SearchP).level());
        assign_bool(ctx.borrow(), lit, None, Some(lemma));
    }
}

/// Assign a literal as a propagation with the given reason clause.
pub fn propagate_bool(
    mut ctx: partial!(Context, mut BoolVarsP, mut SearchP),
    lit: BLit,
    reason: ClauseRef,
) {
    trace!("propagate boolean literal {}", lit);
    assign_bool(ctx.borrow(), lit, Some(reason), None);
}

/// Record a boolean assignment on the search stack; narrowing happens
/// when the propagation queue reaches it.
fn assign_bool(
    mut ctx: partial!(Context, mut BoolVarsP, mut SearchP),
    lit: BLit,
    reason: Option<ClauseRef>,
    lemma: Option<ClauseRef>,
) {
    let level = ctx.part(SearchP).level();
    ctx.part_mut(BoolVarsP).assign(lit, level, reason, lemma);
    ctx.part_mut(SearchP).push_boolean(lit);
}

/// Pop levels until `new_level` is the current one.
pub fn backjump(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ClauseDbP,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut StatsP,
        mut VarQueueP,
        mut VarsP,
        mut ViableP,
        ConfigP,
    ),
    new_level: u32,
) {
    let num = ctx.part(SearchP).level() - new_level;
    if num > 0 {
        search::pop_levels(ctx.borrow(), num);
    }
}

/// A conflict that survived resolution is final: return to the base
/// level with the core intact for the unsat core query.
fn report_unsat(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ClauseDbP,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut StatsP,
        mut VarQueueP,
        mut VarsP,
        mut ViableP,
        ConfigP,
    ),
) {
    debug!("conflict does not depend on any decision");
    let base = ctx.part(SearchP).base_level();
    backjump(ctx.borrow(), base);
}
