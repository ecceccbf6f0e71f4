//! Narrowing of polynomial equalities.
use partial_ref::{partial, PartialRef};

use modsat_poly::{vals, PVar, Poly, ValSet};

use crate::conflict;
use crate::constraint::SignedCRef;
use crate::context::{
    ConfigP, ConflictP, ConstraintsP, Context, SearchP, StatsP, VarsP, ViableP,
};
use crate::prop;

/// Narrow `p = 0` (or `p ≠ 0` for a negative occurrence) under the
/// current assignment.
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
    p: &Poly,
) {
    let p1 = p.subst_val(ctx.part(SearchP).assignment());
    if let Some(val) = p1.as_val() {
        if (val == 0) != sc.positive {
            conflict::set_conflict(ctx.borrow(), sc);
        }
        return;
    }
    let free = p1.free_vars();
    if free.len() != 1 {
        return;
    }
    let x = free[0];
    let w = p1.width();
    let solutions = match p1.is_unilinear() {
        Some((_, a, b)) => {
            let max_ranges = ctx.part(ConfigP).max_linear_ranges;
            match vals::solve_linear(a, b, w, max_ranges) {
                Some(solutions) => solutions,
                None => return,
            }
        }
        None => {
            if w > ctx.part(ConfigP).enum_bits {
                return;
            }
            univariate_solutions(&p1, x, w)
        }
    };
    let sat = if sc.positive {
        solutions
    } else {
        solutions.complement()
    };
    prop::narrow_with_set(ctx.borrow(), sc, x, &sat);
}

/// Roots of a univariate polynomial, by evaluation over the domain.
fn univariate_solutions(p: &Poly, x: PVar, w: u32) -> ValSet {
    let mask = modsat_poly::pvar::width_mask(w);
    ValSet::from_ranges(
        w,
        (0..=mask)
            .filter(|&val| p.eval(&[(x, val)]) == Some(0))
            .map(|val| (val, val)),
    )
}
