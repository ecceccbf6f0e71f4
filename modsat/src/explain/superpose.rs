//! Variable elimination by polynomial superposition.
//!
//! Two equalities mentioning the pivot resolve to an equality free of it:
//! from `p = 0` and `q = 0` follows `c·p − a·q = 0` where `a` and `c` are
//! the pivot coefficients. A currently true equality among the pivot's
//! justifications is resolved against a core equality; the resolvent
//! replaces the core member with the participating equalities recorded as
//! premises of the exchange.
use partial_ref::{partial, PartialRef};

use log::debug;

use modsat_poly::{PVar, Poly, Val};

use crate::constraint::{self, ConstraintKind, SignedCRef};
use crate::context::{
    BoolVarsP, ConflictP, ConstraintsP, Context, SearchP, VarsP,
};

/// Iterate superposition steps until the pivot disappears from the core
/// or no further pair applies. Returns true when the pivot was
/// eliminated.
pub fn try_eliminate(
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
    let asn: Vec<(PVar, Val)> = ctx.part(SearchP).assignment().to_vec();
    loop {
        if !ctx.part(ConflictP).mentions(v, ctx.part(ConstraintsP)) {
            return true;
        }
        let step = find_step(ctx.borrow(), v, &asn);
        let (target, justifying, resolvent) = match step {
            Some(step) => step,
            None => return false,
        };
        let (level, deps) = {
            let constraints = ctx.part(ConstraintsP);
            let a = constraints.data(target.cref);
            let b = constraints.data(justifying.cref);
            let mut deps = a.deps.clone();
            deps.join(&b.deps);
            (a.level.max(b.level), deps)
        };
        debug!(
            "superposition on {}: {:?} x {:?} -> {}",
            v, target, justifying, resolvent
        );
        let eq = constraint::mk_eq(ctx.borrow(), level, resolvent, deps);
        let premises: Vec<SignedCRef> = if target.positive {
            vec![justifying, target]
        } else {
            vec![justifying]
        };
        ctx.part_mut(ConflictP).replace(target, !eq, &premises);
    }
}

/// Find one applicable superposition step: a core equality mentioning the
/// pivot, a currently true justifying equality, and a resolvent that is
/// currently nonzero.
fn find_step(
    ctx: partial!(
        Context,
        BoolVarsP,
        ConflictP,
        ConstraintsP,
        SearchP,
        VarsP,
    ),
    v: PVar,
    asn: &[(PVar, Val)],
) -> Option<(SignedCRef, SignedCRef, Poly)> {
    let constraints = ctx.part(ConstraintsP);
    let core = ctx.part(ConflictP);

    let poly_of = |sc: SignedCRef| -> Option<&Poly> {
        match &constraints.data(sc.cref).kind {
            ConstraintKind::Eq(p) => Some(p),
            _ => None,
        }
    };

    let mut justifying: Vec<SignedCRef> = vec![];
    for &sc in core.members().iter().chain(ctx.part(VarsP).cjust(v).iter()) {
        if sc.positive
            && poly_of(sc).is_some()
            && constraints.data(sc.cref).vars.contains(&v)
            && constraints.status(sc, asn) == Some(true)
        {
            justifying.push(sc);
        }
    }

    for &target in core.members() {
        if !constraints.data(target.cref).vars.contains(&v) {
            continue;
        }
        let q = match poly_of(target) {
            Some(q) => q,
            None => continue,
        };
        // a positive member must be a falsified equality; a negative
        // member arose from an earlier resolvent and resolves directly
        if target.positive && constraints.status(target, asn) != Some(false) {
            continue;
        }
        for &c1 in &justifying {
            if c1 == target {
                continue;
            }
            let p = poly_of(c1).expect("filtered to equalities");
            for resolvent in p
                .resolve(v, q)
                .into_iter()
                .chain(q.resolve(v, p).into_iter())
            {
                if resolvent.degree(v) > 0 {
                    continue;
                }
                match resolvent.eval(asn) {
                    Some(val) if val != 0 => {
                        return Some((target, c1, resolvent));
                    }
                    _ => {}
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use proptest::prelude::*;

    use crate::dep::DepSet;
    use crate::vars::Justification;

    const W: u32 = 3;

    struct Setup {
        va: PVar,
        vx: PVar,
        c1: SignedCRef,
        c2: SignedCRef,
    }

    /// Stage a conflict state: `p = 0` justifies the pivot and holds at
    /// `(av, xv)`, `q = 0` is the falsified core member.
    fn stage(
        mut ctx: partial!(
            Context,
            mut BoolVarsP,
            mut ConflictP,
            mut ConstraintsP,
            mut SearchP,
            mut VarsP,
        ),
        p: &Poly,
        q: &Poly,
        av: Val,
        xv: Val,
        va: PVar,
        vx: PVar,
    ) -> Setup {
        let c1 = constraint::mk_eq(ctx.borrow(), 0, p.clone(), DepSet::empty());
        let c2 = constraint::mk_eq(ctx.borrow(), 0, q.clone(), DepSet::empty());
        ctx.part_mut(VarsP)
            .assign(va, av, Justification::Propagation { level: 0 });
        ctx.part_mut(VarsP)
            .assign(vx, xv, Justification::Propagation { level: 0 });
        ctx.part_mut(SearchP).push_assignment(va, av);
        ctx.part_mut(SearchP).push_assignment(vx, xv);
        ctx.part_mut(VarsP).push_cjust(vx, c1);
        ctx.part_mut(ConflictP).set(c2);
        Setup { va, vx, c1, c2 }
    }

    #[test]
    fn replaces_a_falsified_equality() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        let va = ctx.part_mut(VarsP).add_var(W);
        let vx = ctx.part_mut(VarsP).add_var(W);
        let a = Poly::var(va, W);
        let x = Poly::var(vx, W);
        // x + a vanishes at a = 1, x = 7; x + 2a + 2 does not
        let p = x.clone() + a.clone();
        let q = x + a * 2 + 2;
        let setup = stage(ctx.borrow(), &p, &q, 1, 7, va, vx);

        assert!(try_eliminate(ctx.borrow(), setup.vx));

        let core = ctx.part(ConflictP);
        assert!(!core.mentions(setup.vx, ctx.part(ConstraintsP)));
        assert_eq!(core.members().len(), 1);
        let member = core.members()[0];
        assert!(!member.positive);
        // the resolvent is p - q = -a - 2
        match &ctx.part(ConstraintsP).data(member.cref).kind {
            ConstraintKind::Eq(r) => {
                assert_eq!(r, &(Poly::var(setup.va, W) * 7 + 6));
            }
            _ => panic!("replacement is not an equality"),
        }
        assert!(core.premises().contains(&setup.c1));
        assert!(core.premises().contains(&setup.c2));
    }

    proptest! {
        /// Whenever the explainer replaces a core equality, the
        /// replacement must follow from the two participating equalities
        /// over the whole domain, the pivot must be gone, and the new
        /// member must still hold in the staged model.
        #[test]
        fn replacement_is_a_consequence(
            ap in 1u64..8,
            rc in 0u64..8,
            r0 in 0u64..8,
            aq in 1u64..8,
            sc in 0u64..8,
            s0 in 0u64..8,
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();
            let va = ctx.part_mut(VarsP).add_var(W);
            let vx = ctx.part_mut(VarsP).add_var(W);
            let a = Poly::var(va, W);
            let x = Poly::var(vx, W);
            let p = x.clone() * ap + a.clone() * rc + r0;
            let q = x * aq + a * sc + s0;
            prop_assume!(p != q);

            // a model where the justification holds and the target fails
            let mut witness = None;
            for av in 0..8 {
                for xv in 0..8 {
                    let asn = [(va, av), (vx, xv)];
                    if p.eval(&asn) == Some(0) && q.eval(&asn) != Some(0) {
                        witness = Some((av, xv));
                    }
                }
            }
            prop_assume!(witness.is_some());
            let (av, xv) = witness.unwrap();
            let setup = stage(ctx.borrow(), &p, &q, av, xv, va, vx);

            if try_eliminate(ctx.borrow(), setup.vx) {
                let core = ctx.part(ConflictP);
                prop_assert!(!core.mentions(setup.vx, ctx.part(ConstraintsP)));
                prop_assert!(core.premises().contains(&setup.c1));
                prop_assert!(core.premises().contains(&setup.c2));
                prop_assert_eq!(core.members().len(), 1);
                let member = core.members()[0];
                prop_assert!(!member.positive);
                let r = match &ctx.part(ConstraintsP).data(member.cref).kind {
                    ConstraintKind::Eq(r) => r.clone(),
                    _ => {
                        prop_assert!(false, "replacement is not an equality");
                        unreachable!()
                    }
                };
                // wherever both equalities vanish, the resolvent vanishes
                for bv in 0..8 {
                    for yv in 0..8 {
                        let asn = [(va, bv), (vx, yv)];
                        if p.eval(&asn) == Some(0) && q.eval(&asn) == Some(0) {
                            prop_assert_eq!(r.eval(&asn), Some(0));
                        }
                    }
                }
                // the exchanged member is true in the staged model, so
                // the lemma built from the core stays falsified
                let staged = [(va, av), (vx, xv)];
                prop_assert_eq!(
                    ctx.part(ConstraintsP).status(member, &staged),
                    Some(true)
                );
            }
        }
    }
}
