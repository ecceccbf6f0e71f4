//! Conflict explanation: eliminating a pivot variable from the core.
use partial_ref::{partial, PartialRef};

use modsat_poly::PVar;

use crate::context::{
    BoolVarsP, ConflictP, ConstraintsP, Context, SearchP, VarsP,
};

pub mod intervals;
pub mod superpose;

/// Try to rewrite the conflict core so it no longer depends on the value
/// of `v`, using the variable's justifying constraints.
///
/// Polynomial superposition is attempted first as it can eliminate the
/// variable outright; the forbidden-interval explainer then handles the
/// inequality case. Returns false when neither applies, in which case the
/// caller falls back to bailout mode.
pub fn resolve_value(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ConflictP,
        mut ConstraintsP,
        SearchP,
        VarsP,
    ),
    v: PVar,
) -> bool {
    if superpose::try_eliminate(ctx.borrow(), v) {
        return true;
    }
    intervals::explain(ctx.borrow(), v)
}
