//! Conflict explanation by forbidden intervals.
//!
//! Each unit constraint over the pivot variable forbids an interval of
//! values under the current assignment of the other variables. When the
//! intervals together cover the whole domain the constraints are jointly
//! unsatisfiable independently of the pivot's value, and the core is
//! replaced by that covering: the source constraints, the side conditions
//! their intervals rely on, and one link per covering step stating that
//! an interval's upper bound lies inside its successor, encoded with the
//! equivalence `t ∈ [l, h)  ⇔  t − l <u h − l`.
use partial_ref::{partial, PartialRef};

use log::{debug, trace};

use modsat_poly::{pvar, PVar, Poly, Val};

use crate::constraint::{self, ConstraintKind, Constraints, SignedCRef};
use crate::context::{
    BoolVarsP, ConflictP, ConstraintsP, Context, SearchP, VarsP,
};
use crate::interval::EvalInterval;

/// One extracted record: the interval a source constraint forbids, and an
/// optional side condition that currently holds and enters the core
/// alongside it.
struct FiRecord {
    interval: EvalInterval,
    cond: Option<(ConstraintKind, bool)>,
    src: SignedCRef,
}

/// Replace the core by a covering of the pivot's domain, if one exists.
pub fn explain(
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
    let w = ctx.part(VarsP).width(v);
    let asn = ctx.part(SearchP).assignment_without(v);

    let mut candidates: Vec<SignedCRef> = ctx.part(ConflictP).members().to_vec();
    for &sc in ctx.part(VarsP).cjust(v) {
        if !candidates.contains(&sc) {
            candidates.push(sc);
        }
    }

    let mut records: Vec<FiRecord> = vec![];
    let mut has_full = false;
    let mut longest_i = 0;
    let mut longest_len = 0;
    for sc in candidates {
        if !ctx.part(ConstraintsP).data(sc.cref).vars.contains(&v) {
            continue;
        }
        let extracted = forbidden_interval(ctx.part(ConstraintsP), sc, v, &asn, w);
        if let Some((interval, cond)) = extracted {
            if interval.is_currently_empty(w) {
                continue;
            }
            trace!("forbidden interval for {:?}: len {}", sc, interval.current_len(w));
            if interval.is_full() {
                has_full = true;
            } else {
                let len = interval.current_len(w);
                if len > longest_len {
                    longest_len = len;
                    longest_i = records.len();
                }
            }
            records.push(FiRecord { interval, cond, src: sc });
            if has_full {
                break;
            }
        }
    }

    if has_full {
        // a single constraint forbids everything; its side conditions are
        // enough of an explanation
        let record = records.pop().expect("full interval was recorded");
        let mut members = vec![record.src];
        if let Some((kind, positive)) = record.cond {
            let sc = instantiate(ctx.borrow(), record.src, kind, positive);
            members.push(sc);
        }
        ctx.part_mut(ConflictP).replace_all(members);
        ctx.part_mut(ConflictP).set_needs_model(false);
        debug!("explained conflict on {} by a full forbidden interval", v);
        return true;
    }

    if records.is_empty() {
        return false;
    }

    let seq = match find_covering_sequence(&records, longest_i, w) {
        Some(seq) => seq,
        None => return false,
    };
    debug_assert!(seq.len() >= 2);
    debug!(
        "explained conflict on {} by covering {} intervals",
        v,
        seq.len()
    );

    let mut members: Vec<SignedCRef> = vec![];
    for &i in &seq {
        members.push(records[i].src);
    }
    for k in 0..seq.len() {
        let i = seq[k];
        let next = seq[(k + 1) % seq.len()];
        // upper bound of interval i lies inside interval next
        let hi = records[i].interval.hi().clone();
        let next_lo = records[next].interval.lo().clone();
        let next_hi = records[next].interval.hi().clone();
        let lhs = hi - next_lo.clone();
        let rhs = next_hi - next_lo;
        let (level, deps) = {
            let data = ctx.part(ConstraintsP).data(records[i].src.cref);
            (data.level, data.deps.clone())
        };
        let link = constraint::mk_ult(ctx.borrow(), level, lhs, rhs, deps);
        members.push(link);
        if let Some((kind, positive)) = records[i].cond.clone() {
            let sc = instantiate(ctx.borrow(), records[i].src, kind, positive);
            members.push(sc);
        }
    }
    ctx.part_mut(ConflictP).replace_all(members);
    ctx.part_mut(ConflictP).set_needs_model(false);
    true
}

/// Create a side-condition constraint at the source's storage level.
fn instantiate(
    mut ctx: partial!(Context, mut BoolVarsP, mut ConstraintsP),
    src: SignedCRef,
    kind: ConstraintKind,
    positive: bool,
) -> SignedCRef {
    let (level, deps) = {
        let data = ctx.part(ConstraintsP).data(src.cref);
        (data.level, data.deps.clone())
    };
    let cref = constraint::intern(ctx.borrow(), level, kind, deps);
    SignedCRef { cref, positive }
}

/// Find a sequence of record indices whose intervals cover `Z_{2^w}`.
///
/// Starting from the upper bound of the longest interval, greedily pick
/// the interval containing the running baseline that reaches furthest
/// beyond it, scanning records in reverse insertion order to break ties.
/// Fails when no interval contains the baseline.
fn find_covering_sequence(
    records: &[FiRecord],
    longest_i: usize,
    w: u32,
) -> Option<Vec<usize>> {
    let mut baseline = records[longest_i].interval.hi_val();
    let mut seq = vec![];
    while !records[longest_i].interval.currently_contains(baseline, w) {
        let mut best_extent = 0;
        let mut furthest_i = None;
        for i in (0..records.len()).rev() {
            let interval = &records[i].interval;
            if interval.currently_contains(baseline, w) {
                let extent = pvar::sub_mod(interval.hi_val(), baseline, w);
                if extent > best_extent {
                    best_extent = extent;
                    furthest_i = Some(i);
                }
            }
        }
        // a hole the records cannot cover
        let furthest_i = furthest_i?;
        seq.push(furthest_i);
        baseline = records[furthest_i].interval.hi_val();
    }
    debug_assert!(!seq.is_empty());
    if !records[seq[0]].interval.currently_contains(baseline, w) {
        seq.push(longest_i);
    }
    Some(seq)
}

/// The interval of pivot values that would falsify `sc` under the current
/// values of the other variables, with an optional side condition.
///
/// Every atom is viewed as an inequality `lhs ≤ rhs` or `lhs < rhs`
/// (`p = 0` is `p ≤ 0`, `p ≠ 0` is `0 < p`); the shapes handled are
/// `x + e1 ⋈ x + e2`, `x + e1 ⋈ e2` and `e1 ⋈ x + e2` with `e1`, `e2`
/// free of the pivot.
fn forbidden_interval(
    constraints: &Constraints,
    sc: SignedCRef,
    v: PVar,
    asn: &[(PVar, Val)],
    w: u32,
) -> Option<(EvalInterval, Option<(ConstraintKind, bool)>)> {
    let zero = Poly::zero(w);
    let (lhs, rhs, strict) = match (&constraints.data(sc.cref).kind, sc.positive) {
        (ConstraintKind::Eq(p), true) => (p.clone(), zero, false),
        (ConstraintKind::Eq(p), false) => (zero, p.clone(), true),
        (ConstraintKind::Ule(p, q), true) => (p.clone(), q.clone(), false),
        (ConstraintKind::Ule(p, q), false) => (q.clone(), p.clone(), true),
        (ConstraintKind::Bit(..), _) => return None,
    };

    let (a1, e1) = pivot_split(&lhs, v)?;
    let (a2, e2) = pivot_split(&rhs, v)?;
    let b = e1.eval(asn)?;
    let d = e2.eval(asn)?;
    let mask = pvar::width_mask(w);
    let neg = |x| pvar::neg_mod(x, w);
    let sub = |x, y| pvar::sub_mod(x, y, w);

    let result = match (a1, a2) {
        (0, 0) => {
            let holds = if strict { b < d } else { b <= d };
            if holds {
                return None;
            }
            let cond = if strict {
                (ConstraintKind::Ule(e2, e1), true)
            } else {
                (ConstraintKind::Ule(e1, e2), false)
            };
            (EvalInterval::full(), Some(cond))
        }
        (1, 1) => {
            if strict && b == d {
                (EvalInterval::full(), Some((ConstraintKind::Eq(e1 - e2), true)))
            } else {
                (
                    EvalInterval::proper(-e2, neg(d), -e1, neg(b)),
                    None,
                )
            }
        }
        (1, 0) => {
            if strict {
                if d == 0 {
                    (EvalInterval::full(), Some((ConstraintKind::Eq(e2), true)))
                } else {
                    (
                        EvalInterval::proper(e2 - e1.clone(), sub(d, b), -e1, neg(b)),
                        None,
                    )
                }
            } else {
                (
                    EvalInterval::proper(
                        e2 + 1 - e1.clone(),
                        sub(pvar::add_mod(d, 1, w), b),
                        -e1,
                        neg(b),
                    ),
                    None,
                )
            }
        }
        (0, 1) => {
            if strict {
                if b == mask {
                    (EvalInterval::full(), Some((ConstraintKind::Eq(e1 + 1), true)))
                } else {
                    (
                        EvalInterval::proper(
                            -e2.clone(),
                            neg(d),
                            e1 - e2 + 1,
                            pvar::add_mod(sub(b, d), 1, w),
                        ),
                        None,
                    )
                }
            } else {
                (
                    EvalInterval::proper(-e2.clone(), neg(d), e1 - e2, sub(b, d)),
                    None,
                )
            }
        }
        _ => return None,
    };
    Some((result.0, result.1))
}

/// Split a polynomial as `a·v + e` with `a ∈ {0, 1}` constant and `e`
/// free of `v`.
fn pivot_split(p: &Poly, v: PVar) -> Option<(Val, Poly)> {
    if p.degree(v) == 0 {
        return Some((0, p.clone()));
    }
    if p.degree(v) != 1 {
        return None;
    }
    let (coeff, rest) = p.factor(v, 1);
    match coeff.as_val() {
        Some(a) if a == 0 || a == 1 => Some((a, rest)),
        _ => None,
    }
}
