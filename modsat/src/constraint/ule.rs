//! Narrowing of unsigned inequalities.
use partial_ref::{partial, PartialRef};

use modsat_poly::{pvar, PVar, Poly, Val, ValSet};

use crate::conflict;
use crate::constraint::SignedCRef;
use crate::context::{
    ConfigP, ConflictP, ConstraintsP, Context, SearchP, StatsP, VarsP, ViableP,
};
use crate::prop;

/// Narrow `p ≤ q` (or `q < p` for a negative occurrence) under the
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
    q: &Poly,
) {
    let asn = ctx.part(SearchP).assignment();
    let p1 = p.subst_val(asn);
    let q1 = q.subst_val(asn);
    // the effective inequality under the occurrence's sign
    let (lhs, rhs, strict) = if sc.positive {
        (p1, q1, false)
    } else {
        (q1, p1, true)
    };
    if let (Some(b), Some(d)) = (lhs.as_val(), rhs.as_val()) {
        let holds = if strict { b < d } else { b <= d };
        if !holds {
            conflict::set_conflict(ctx.borrow(), sc);
        }
        return;
    }
    let mut free = lhs.free_vars();
    free.extend(rhs.free_vars());
    free.sort();
    free.dedup();
    if free.len() != 1 {
        return;
    }
    let x = free[0];
    let w = lhs.width();
    let enum_bits = ctx.part(ConfigP).enum_bits;
    let sat = match satisfying_set(&lhs, &rhs, strict, x, w, enum_bits) {
        Some(sat) => sat,
        None => return,
    };
    prop::narrow_with_set(ctx.borrow(), sc, x, &sat);
}

/// The set of values for `x` satisfying `lhs ⋈ rhs`, when it can be
/// computed cheaply: by evaluation at enumerable widths, otherwise in
/// closed form for the unit-coefficient shapes `a·x + b ⋈ c·x + d` with
/// `a, c ∈ {0, 1}`.
fn satisfying_set(
    lhs: &Poly,
    rhs: &Poly,
    strict: bool,
    x: PVar,
    w: u32,
    enum_bits: u32,
) -> Option<ValSet> {
    if w <= enum_bits {
        let mask = pvar::width_mask(w);
        return Some(ValSet::from_ranges(
            w,
            (0..=mask)
                .filter(|&val| {
                    let b = lhs.eval(&[(x, val)]).expect("univariate by construction");
                    let d = rhs.eval(&[(x, val)]).expect("univariate by construction");
                    if strict {
                        b < d
                    } else {
                        b <= d
                    }
                })
                .map(|val| (val, val)),
        ));
    }
    let (a1, b) = side_coefficients(lhs, x)?;
    let (a2, d) = side_coefficients(rhs, x)?;
    let forbidden = forbidden_region(a1, b, a2, d, strict, w)?;
    Some(match forbidden {
        Region::Full => ValSet::empty(w),
        Region::Interval(lo, hi) => ValSet::from_wrapped_interval(lo, hi, w).complement(),
    })
}

/// Decompose a substituted side as `a·x + b` with a constant coefficient.
fn side_coefficients(side: &Poly, x: PVar) -> Option<(Val, Val)> {
    if let Some(val) = side.as_val() {
        return Some((0, val));
    }
    match side.is_unilinear() {
        Some((v, a, b)) if v == x => Some((a, b)),
        _ => None,
    }
}

/// A forbidden region for the pivot of an inequality.
pub enum Region {
    Full,
    /// Half-open `[lo, hi)` modulo `2^w`; empty when `lo == hi`.
    Interval(Val, Val),
}

/// Values of `x` falsifying `a1·x + b ⋈ a2·x + d`, for coefficients in
/// `{0, 1}`.
///
/// The interval bounds follow the forbidden-interval analysis of
/// inequalities over `Z_{2^w}`; each case can be checked by shifting the
/// constraint so one side becomes `x`.
pub fn forbidden_region(
    a1: Val,
    b: Val,
    a2: Val,
    d: Val,
    strict: bool,
    w: u32,
) -> Option<Region> {
    let sub = |x, y| pvar::sub_mod(x, y, w);
    let neg = |x| pvar::neg_mod(x, w);
    let mask = pvar::width_mask(w);
    match (a1, a2) {
        (0, 0) => {
            let holds = if strict { b < d } else { b <= d };
            Some(if holds {
                Region::Interval(0, 0)
            } else {
                Region::Full
            })
        }
        (1, 1) => {
            if strict && b == d {
                Some(Region::Full)
            } else {
                Some(Region::Interval(neg(d), neg(b)))
            }
        }
        (1, 0) => {
            if strict {
                if d == 0 {
                    Some(Region::Full)
                } else {
                    Some(Region::Interval(sub(d, b), neg(b)))
                }
            } else {
                Some(Region::Interval(sub(pvar::add_mod(d, 1, w), b), neg(b)))
            }
        }
        (0, 1) => {
            if strict {
                if b == mask {
                    Some(Region::Full)
                } else {
                    Some(Region::Interval(neg(d), pvar::add_mod(sub(b, d), 1, w)))
                }
            } else {
                Some(Region::Interval(neg(d), sub(b, d)))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_forbidden(a1: Val, b: Val, a2: Val, d: Val, strict: bool, w: u32) -> Vec<Val> {
        (0..=pvar::width_mask(w))
            .filter(|&x| {
                let lhs = pvar::add_mod(pvar::mul_mod(a1, x, w), b, w);
                let rhs = pvar::add_mod(pvar::mul_mod(a2, x, w), d, w);
                let holds = if strict { lhs < rhs } else { lhs <= rhs };
                !holds
            })
            .collect()
    }

    #[test]
    fn closed_form_matches_brute_force() {
        let w = 4;
        for &(a1, a2) in &[(0, 0), (1, 1), (1, 0), (0, 1)] {
            for b in 0..16 {
                for d in 0..16 {
                    for &strict in &[false, true] {
                        let region = forbidden_region(a1, b, a2, d, strict, w).unwrap();
                        let set = match region {
                            Region::Full => ValSet::full(w),
                            Region::Interval(lo, hi) => {
                                ValSet::from_wrapped_interval(lo, hi, w)
                            }
                        };
                        let expect = brute_forbidden(a1, b, a2, d, strict, w);
                        let got: Vec<Val> =
                            (0..16).filter(|&x| set.contains(x)).collect();
                        assert_eq!(
                            got, expect,
                            "a1={} b={} a2={} d={} strict={}",
                            a1, b, a2, d, strict
                        );
                    }
                }
            }
        }
    }
}
