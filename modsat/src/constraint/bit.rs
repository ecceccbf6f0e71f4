//! Narrowing of viable-restriction atoms.
use partial_ref::{partial, PartialRef};

use modsat_poly::{PVar, ValSet};

use crate::conflict;
use crate::constraint::SignedCRef;
use crate::context::{
    ConfigP, ConflictP, ConstraintsP, Context, SearchP, StatsP, VarsP, ViableP,
};
use crate::prop;

/// Narrow `value(v) ∈ set` (or its complement for a negative occurrence).
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
    v: PVar,
    set: &ValSet,
) {
    if ctx.part(VarsP).is_assigned(v) {
        let val = ctx.part(VarsP).value(v);
        if set.contains(val) != sc.positive {
            conflict::set_conflict(ctx.borrow(), sc);
        }
        return;
    }
    let sat = if sc.positive {
        set.clone()
    } else {
        set.complement()
    };
    prop::narrow_with_set(ctx.borrow(), sc, v, &sat);
}
