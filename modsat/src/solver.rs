//! The public solver interface.
use partial_ref::{partial, IntoPartialRef, IntoPartialRefMut, PartialRef};

use log::{debug, info, warn};

use modsat_poly::{PVar, Poly, Val};

use crate::cdcl;
use crate::clause::Clause;
use crate::config::SolverConfig;
use crate::constraint::{self, SignedCRef};
use crate::context::{
    BoolVarsP, ClauseDbP, ConfigP, ConflictP, ConstraintsP, Context, SearchP, SolverStateP,
    StatsP, VarQueueP, VarsP, ViableP,
};
use crate::decision;
use crate::dep::{Dep, DepSet};
use crate::prop;
use crate::search;
use crate::state::SatState;
use crate::stats::Stats;

/// A satisfiability solver for polynomial constraints over fixed-width
/// modular integers.
#[derive(Default)]
pub struct Solver {
    ctx: Box<Context>,
}

impl Solver {
    /// Create a new solver.
    pub fn new() -> Solver {
        Solver::default()
    }

    /// Replace the solver configuration.
    pub fn set_config(&mut self, config: SolverConfig) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        *ctx.part_mut(ConfigP) = config;
    }

    /// Declare a fresh variable of the given bit-width.
    pub fn add_var(&mut self, width: u32) -> PVar {
        assert!(width >= 1 && width <= 64, "unsupported bit-width");
        let mut ctx = self.ctx.into_partial_ref_mut();
        let v = ctx.part_mut(VarsP).add_var(width);
        ctx.part_mut(ViableP).push(width);
        let count = ctx.part(VarsP).var_count();
        ctx.part_mut(VarQueueP).set_var_count(count);
        ctx.part_mut(SearchP).log_add_var();
        debug!("new variable {} of width {}", v, width);
        v
    }

    /// The polynomial standing for a declared variable.
    pub fn var(&self, v: PVar) -> Poly {
        let ctx = self.ctx.into_partial_ref();
        ctx.part(VarsP).poly(v).clone()
    }

    /// Assert `p = 0`.
    pub fn add_eq(&mut self, p: Poly, dep: Option<Dep>) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let level = ctx.part(SearchP).base_level();
        let deps = DepSet::from_dep(dep);
        let sc = constraint::mk_eq(ctx.borrow(), level, p, deps);
        drop(ctx);
        self.new_constraint(sc, dep);
    }

    /// Assert `p ≠ 0`.
    pub fn add_diseq(&mut self, p: Poly, dep: Option<Dep>) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let level = ctx.part(SearchP).base_level();
        let deps = DepSet::from_dep(dep);
        let sc = constraint::mk_diseq(ctx.borrow(), level, p, deps);
        drop(ctx);
        self.new_constraint(sc, dep);
    }

    /// Assert `p ≤ q` (unsigned).
    pub fn add_ule(&mut self, p: Poly, q: Poly, dep: Option<Dep>) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let level = ctx.part(SearchP).base_level();
        let deps = DepSet::from_dep(dep);
        let sc = constraint::mk_ule(ctx.borrow(), level, p, q, deps);
        drop(ctx);
        self.new_constraint(sc, dep);
    }

    /// Assert `p < q` (unsigned).
    pub fn add_ult(&mut self, p: Poly, q: Poly, dep: Option<Dep>) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let level = ctx.part(SearchP).base_level();
        let deps = DepSet::from_dep(dep);
        let sc = constraint::mk_ult(ctx.borrow(), level, p, q, deps);
        drop(ctx);
        self.new_constraint(sc, dep);
    }

    /// Assert `p ≤ q` (signed).
    pub fn add_sle(&mut self, p: Poly, q: Poly, dep: Option<Dep>) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let level = ctx.part(SearchP).base_level();
        let deps = DepSet::from_dep(dep);
        let sc = constraint::mk_sle(ctx.borrow(), level, p, q, deps);
        drop(ctx);
        self.new_constraint(sc, dep);
    }

    /// Assert `p < q` (signed).
    pub fn add_slt(&mut self, p: Poly, q: Poly, dep: Option<Dep>) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let level = ctx.part(SearchP).base_level();
        let deps = DepSet::from_dep(dep);
        let sc = constraint::mk_slt(ctx.borrow(), level, p, q, deps);
        drop(ctx);
        self.new_constraint(sc, dep);
    }

    /// Activate a previously asserted external constraint with the given
    /// polarity.
    pub fn assign_eh(&mut self, dep: Dep, is_true: bool) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        pop_to_base(ctx.borrow());
        let sc = match ctx.part(ConstraintsP).lookup_external(dep.get()) {
            Some(sc) => sc,
            None => {
                warn!("no constraint for dependency {}", dep.get());
                return;
            }
        };
        let sc = if is_true { sc } else { !sc };
        drop(ctx);
        self.activate_at_base(sc, Some(dep));
    }

    /// Open a user scope.
    pub fn push(&mut self) {
        debug!("push user scope");
        let mut ctx = self.ctx.into_partial_ref_mut();
        pop_to_base(ctx.borrow());
        ctx.part_mut(SearchP).push_user_scope();
    }

    /// Close `num` user scopes, dropping everything asserted inside them.
    pub fn pop(&mut self, num: usize) {
        debug!("pop {} user scopes", num);
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(ConflictP).reset();
        ctx.part_mut(SolverStateP).sat_state = SatState::Unknown;
        ctx.part_mut(SolverStateP).pending_lemma = None;
        let target = ctx.part_mut(SearchP).pop_user_scopes(num);
        let num_levels = ctx.part(SearchP).level() - target;
        search::pop_levels(ctx.borrow(), num_levels);
    }

    /// Decide satisfiability of the asserted constraints.
    ///
    /// `Some(true)` is SAT, `Some(false)` UNSAT; `None` means the
    /// resource limit was reached or a disjunctive lemma is pending.
    pub fn check_sat(&mut self) -> Option<bool> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(SolverStateP).pending_lemma = None;
        info!("check-sat over {} variables", ctx.part(VarsP).var_count());
        loop {
            {
                let stats = ctx.part(StatsP);
                let config = ctx.part(ConfigP);
                if stats.conflicts >= config.max_conflicts
                    || stats.decisions >= config.max_decisions
                {
                    info!("giving up, resource limit reached");
                    ctx.part_mut(SolverStateP).sat_state = SatState::Unknown;
                    return None;
                }
            }
            ctx.part_mut(StatsP).iterations += 1;
            if ctx.part(SolverStateP).pending_lemma.is_some() {
                info!("undef, disjunctive lemma pending");
                return None;
            }
            let conflict = ctx.part(ConflictP).is_conflict();
            if conflict && ctx.part(SearchP).at_base_level() {
                info!("unsat");
                ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
                return Some(false);
            }
            if conflict {
                cdcl::resolve_conflict(ctx.borrow());
            } else if ctx.part(SearchP).can_propagate() {
                prop::propagate(ctx.borrow());
            } else if ctx.part(VarsP).all_assigned() {
                debug_assert!(verify_sat(ctx.borrow()));
                debug_assert!(prop::wlist_invariant(ctx.borrow()));
                info!("sat");
                ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
                return Some(true);
            } else {
                decision::decide(ctx.borrow());
            }
        }
    }

    /// The current integer assignment in assignment order.
    pub fn assignment(&self) -> Vec<(PVar, Val)> {
        let ctx = self.ctx.into_partial_ref();
        ctx.part(SearchP).assignment().to_vec()
    }

    /// External names involved in the final conflict. Only meaningful
    /// after `check_sat` returned UNSAT.
    pub fn unsat_core(&self) -> Vec<Dep> {
        let ctx = self.ctx.into_partial_ref();
        debug_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
        let core = ctx.part(ConflictP);
        let constraints = ctx.part(ConstraintsP);
        let mut deps = DepSet::empty();
        for &sc in core.members().iter().chain(core.premises().iter()) {
            deps.join(&constraints.data(sc.cref).deps);
        }
        deps.iter().collect()
    }

    /// Whether `check_sat` stopped on a lemma the host must handle.
    pub fn has_pending_lemma(&self) -> bool {
        let ctx = self.ctx.into_partial_ref();
        ctx.part(SolverStateP).pending_lemma.is_some()
    }

    /// Solving statistics so far.
    pub fn stats(&self) -> Stats {
        let ctx = self.ctx.into_partial_ref();
        *ctx.part(StatsP)
    }

    /// Register an asserted constraint: give it a unit clause, track its
    /// external name, and activate it.
    fn new_constraint(&mut self, sc: SignedCRef, dep: Option<Dep>) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        if let Some(dep) = dep {
            ctx.part_mut(ConstraintsP).register_external(dep.get(), sc);
        }
        drop(ctx);
        self.activate_at_base(sc, dep);
    }

    fn activate_at_base(&mut self, sc: SignedCRef, dep: Option<Dep>) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        pop_to_base(ctx.borrow());
        let lit = ctx.part(ConstraintsP).blit(sc);
        let level = ctx.part(ConstraintsP).data(sc.cref).level;
        let cref = ctx
            .part_mut(ClauseDbP)
            .store(Clause::from_unit(lit, level, DepSet::from_dep(dep)));
        ctx.part_mut(ConstraintsP).data_mut(sc.cref).unit_clause = Some(cref);
        ctx.part_mut(ConstraintsP).insert_original(sc);
        debug!(
            "assert {}",
            constraint::display(ctx.part(ConstraintsP), sc)
        );
        if ctx.part(ConflictP).is_conflict() {
            return;
        }
        match ctx.part(BoolVarsP).value(lit) {
            None => cdcl::propagate_bool(ctx.borrow(), lit, cref),
            Some(true) => {}
            Some(false) => {
                // asserted against its own negation
                ctx.part_mut(ConflictP).set(sc);
                ctx.part_mut(ConflictP).insert(!sc);
            }
        }
    }
}

/// Retract any leftover search levels so new assertions land at the
/// innermost user scope.
fn pop_to_base(
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
    let level = ctx.part(SearchP).level();
    let base = ctx.part(SearchP).base_level();
    if level > base {
        search::pop_levels(ctx.borrow(), level - base);
    }
}

/// Check the model against every asserted constraint.
fn verify_sat(
    ctx: partial!(
        Context,
        BoolVarsP,
        ConstraintsP,
        SearchP,
    ),
) -> bool {
    let constraints = ctx.part(ConstraintsP);
    let asn = ctx.part(SearchP).assignment();
    for &sc in &constraints.original {
        if ctx.part(BoolVarsP).is_true(constraints.blit(sc))
            && constraints.status(sc, asn) != Some(true)
        {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(raw: u32) -> Option<Dep> {
        Dep::new(raw)
    }

    #[test]
    fn units_propagate_without_search() {
        let mut solver = Solver::new();
        let v = solver.add_var(2);
        let a = solver.var(v);
        solver.add_eq(a + 1, None);
        assert_eq!(solver.check_sat(), Some(true));
        let asn = solver.assignment();
        assert_eq!(asn.len(), 1);
        assert_eq!(asn[0].1, 3);
        assert_eq!(solver.stats().decisions, 0);
    }

    #[test]
    fn unsat_core_reports_external_names() {
        let mut solver = Solver::new();
        let v = solver.add_var(3);
        let a = solver.var(v);
        solver.add_eq(a * 4 + 2, dep(7));
        assert_eq!(solver.check_sat(), Some(false));
        let core = solver.unsat_core();
        assert_eq!(core.len(), 1);
        assert_eq!(core[0].get(), 7);
    }

    #[test]
    fn push_pop_restores_satisfiability() {
        let mut solver = Solver::new();
        let v = solver.add_var(3);
        let a = solver.var(v);
        solver.add_diseq(a.clone(), None);
        assert_eq!(solver.check_sat(), Some(true));
        solver.push();
        solver.add_eq(a, None);
        assert_eq!(solver.check_sat(), Some(false));
        solver.pop(1);
        assert_eq!(solver.check_sat(), Some(true));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;

    use proptest::prelude::*;

    use modsat_poly::pvar;

    const WIDTH: u32 = 4;

    /// One random atom over two variables: coefficients for
    /// `c0·a + c1·b + c2 ⋈ d0·a + d1·b + d2`.
    type RawAtom = (u8, [u64; 3], [u64; 3]);

    fn eval_side(coeffs: &[u64; 3], x: u64, y: u64) -> u64 {
        let acc = coeffs[0]
            .wrapping_mul(x)
            .wrapping_add(coeffs[1].wrapping_mul(y))
            .wrapping_add(coeffs[2]);
        pvar::truncate(acc, WIDTH)
    }

    fn holds(kind: u8, lhs: u64, rhs: u64) -> bool {
        let flip = 1 << (WIDTH - 1);
        match kind {
            0 => pvar::sub_mod(lhs, rhs, WIDTH) == 0,
            1 => pvar::sub_mod(lhs, rhs, WIDTH) != 0,
            2 => lhs <= rhs,
            3 => lhs < rhs,
            4 => (lhs ^ flip) <= (rhs ^ flip),
            _ => (lhs ^ flip) < (rhs ^ flip),
        }
    }

    fn brute_force_sat(atoms: &[RawAtom]) -> bool {
        let mask = pvar::width_mask(WIDTH);
        (0..=mask).any(|x| {
            (0..=mask).any(|y| {
                atoms.iter().all(|&(kind, ref c, ref d)| {
                    holds(kind, eval_side(c, x, y), eval_side(d, x, y))
                })
            })
        })
    }

    fn atom_strategy() -> impl Strategy<Value = RawAtom> {
        (
            0u8..6,
            [0u64..16, 0u64..16, 0u64..16],
            [0u64..16, 0u64..16, 0u64..16],
        )
    }

    fn bounded_solver() -> Solver {
        let mut solver = Solver::new();
        let mut config = SolverConfig::default();
        config.max_conflicts = 50_000;
        solver.set_config(config);
        solver
    }

    fn assert_atom(solver: &mut Solver, a: &Poly, b: &Poly, atom: &RawAtom) {
        let &(kind, ref c, ref d) = atom;
        let side =
            |coeffs: &[u64; 3]| a.clone() * coeffs[0] + b.clone() * coeffs[1] + coeffs[2];
        let p = side(c);
        let q = side(d);
        match kind {
            0 => solver.add_eq(p - q, None),
            1 => solver.add_diseq(p - q, None),
            2 => solver.add_ule(p, q, None),
            3 => solver.add_ult(p, q, None),
            4 => solver.add_sle(p, q, None),
            _ => solver.add_slt(p, q, None),
        }
    }

    /// Check a returned model against raw atoms.
    fn model_holds(solver: &Solver, va: PVar, vb: PVar, atoms: &[RawAtom]) -> bool {
        let asn = solver.assignment();
        let value = |v| asn.iter().find(|&&(u, _)| u == v).map(|&(_, val)| val);
        let (x, y) = match (value(va), value(vb)) {
            (Some(x), Some(y)) => (x, y),
            _ => return false,
        };
        atoms
            .iter()
            .all(|&(kind, ref c, ref d)| holds(kind, eval_side(c, x, y), eval_side(d, x, y)))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn agrees_with_brute_force(
            atoms in proptest::collection::vec(atom_strategy(), 1..4),
        ) {
            let mut solver = bounded_solver();
            let va = solver.add_var(WIDTH);
            let vb = solver.add_var(WIDTH);
            let a = solver.var(va);
            let b = solver.var(vb);
            for atom in &atoms {
                assert_atom(&mut solver, &a, &b, atom);
            }
            let expected = brute_force_sat(&atoms);
            prop_assert_eq!(solver.check_sat(), Some(expected));
            if expected {
                prop_assert!(model_holds(&solver, va, vb, &atoms));
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Scopes are fully reversible: whatever is asserted and solved
        /// inside them, popping restores the outer problem's answer and
        /// a model for it, and a no-op window changes nothing.
        #[test]
        fn push_pop_roundtrip(
            base in proptest::collection::vec(atom_strategy(), 0..3),
            scope1 in proptest::collection::vec(atom_strategy(), 0..3),
            scope2 in proptest::collection::vec(atom_strategy(), 0..3),
        ) {
            let mut solver = bounded_solver();
            let va = solver.add_var(WIDTH);
            let vb = solver.add_var(WIDTH);
            let a = solver.var(va);
            let b = solver.var(vb);
            for atom in &base {
                assert_atom(&mut solver, &a, &b, atom);
            }
            let before = solver.check_sat();
            prop_assert_eq!(before, Some(brute_force_sat(&base)));

            solver.push();
            solver.pop(1);
            prop_assert_eq!(solver.check_sat(), before);

            solver.push();
            for atom in &scope1 {
                assert_atom(&mut solver, &a, &b, atom);
            }
            let mut inner = base.clone();
            inner.extend_from_slice(&scope1);
            prop_assert_eq!(solver.check_sat(), Some(brute_force_sat(&inner)));

            solver.push();
            for atom in &scope2 {
                assert_atom(&mut solver, &a, &b, atom);
            }
            inner.extend_from_slice(&scope2);
            prop_assert_eq!(solver.check_sat(), Some(brute_force_sat(&inner)));

            solver.pop(2);
            let after = solver.check_sat();
            prop_assert_eq!(after, before);
            if after == Some(true) {
                prop_assert!(model_holds(&solver, va, vb, &base));
            }
        }
    }
}
