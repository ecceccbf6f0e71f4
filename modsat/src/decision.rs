//! Decision heuristics.
//!
//! Decisions pick the unassigned variable with the highest activity and
//! assign it a viable value, preferring the value it last had so
//! successive attempts stay clustered.
use partial_ref::{partial, PartialRef};

use log::{debug, trace};

use modsat_poly::{Find, PVar};

use crate::conflict;
use crate::context::{
    ConflictP, Context, SearchP, StatsP, VarQueueP, VarsP, ViableP,
};
use crate::prop;
use crate::vars::Justification;

pub mod activity;

/// Pick the next free variable and assign it.
pub fn decide(
    mut ctx: partial!(
        Context,
        mut ConflictP,
        mut SearchP,
        mut StatsP,
        mut VarQueueP,
        mut VarsP,
        ViableP,
    ),
) {
    loop {
        let v = match ctx.part_mut(VarQueueP).next() {
            Some(v) => v,
            None => {
                debug_assert!(false, "decide called without a free variable");
                return;
            }
        };
        if !ctx.part(VarsP).is_assigned(v) {
            decide_var(ctx.borrow(), v);
            return;
        }
    }
}

/// Assign a viable value to `v`: a forced value propagates without a new
/// level, a free choice opens one.
pub fn decide_var(
    mut ctx: partial!(
        Context,
        mut ConflictP,
        mut SearchP,
        mut StatsP,
        mut VarsP,
        ViableP,
    ),
    v: PVar,
) {
    let hint = ctx.part(VarsP).value(v);
    trace!("decide {}", v);
    match ctx.part(ViableP).find_viable(v, hint) {
        Find::Empty => {
            // empty sets are discovered during narrowing; catching one
            // here means a propagation was missed
            debug_assert!(false, "empty viable set survived until decision");
            conflict::set_conflict_var(ctx.borrow(), v);
        }
        Find::Singleton(val) => {
            let level = ctx.part(SearchP).level();
            prop::assign_core(ctx.borrow(), v, val, Justification::Propagation { level });
        }
        Find::Multiple(val) => {
            ctx.part_mut(SearchP).push_level();
            let level = ctx.part(SearchP).level();
            debug!("decide {} := {} @ {}", v, val, level);
            prop::assign_core(ctx.borrow(), v, val, Justification::Decision { level });
        }
    }
}
