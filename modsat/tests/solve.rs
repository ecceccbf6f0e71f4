//! End-to-end solving scenarios.
use modsat::{Dep, PVar, Poly, Solver, SolverConfig, Val};

/// Solver with a conflict budget so a regression fails instead of
/// spinning.
fn bounded_solver() -> Solver {
    let mut solver = Solver::new();
    let mut config = SolverConfig::default();
    config.max_conflicts = 200_000;
    solver.set_config(config);
    solver
}

fn model_value(asn: &[(PVar, Val)], v: PVar) -> Val {
    asn.iter()
        .find(|&&(u, _)| u == v)
        .map(|&(_, val)| val)
        .expect("variable missing from model")
}

fn assert_model_satisfies(solver: &Solver, eqs: &[Poly]) {
    let asn = solver.assignment();
    for p in eqs {
        assert_eq!(p.eval(&asn), Some(0), "{} not satisfied by the model", p);
    }
}

#[test]
fn fixed_unit_equation() {
    // a + 1 = 0 at width 2 fixes a = 3 without any search
    let mut solver = bounded_solver();
    let v = solver.add_var(2);
    let a = solver.var(v);
    solver.add_eq(a.clone() + 1, None);
    assert_eq!(solver.check_sat(), Some(true));
    assert_eq!(model_value(&solver.assignment(), v), 3);
    assert_eq!(solver.stats().decisions, 0);
}

#[test]
fn coupled_linear_equations() {
    // 2a + b + 1 = 0 and 2b + a = 0 at width 2
    let mut solver = bounded_solver();
    let va = solver.add_var(2);
    let vb = solver.add_var(2);
    let a = solver.var(va);
    let b = solver.var(vb);
    let p = a.clone() * 2 + b.clone() + 1;
    let q = b.clone() * 2 + a.clone();
    solver.add_eq(p.clone(), None);
    solver.add_eq(q.clone(), None);
    assert_eq!(solver.check_sat(), Some(true));
    assert_model_satisfies(&solver, &[p, q]);
    let asn = solver.assignment();
    assert_eq!(model_value(&asn, va), 2);
    assert_eq!(model_value(&asn, vb), 3);
}

#[test]
fn underconstrained_equation() {
    // 3b + a + 2 = 0 at width 2 has several solutions
    let mut solver = bounded_solver();
    let va = solver.add_var(2);
    let vb = solver.add_var(2);
    let a = solver.var(va);
    let b = solver.var(vb);
    let p = b.clone() * 3 + a.clone() + 2;
    solver.add_eq(p.clone(), None);
    assert_eq!(solver.check_sat(), Some(true));
    assert_model_satisfies(&solver, &[p]);
}

#[test]
fn even_coefficient_odd_constant() {
    // 4a + 2 = 0 at width 3: 4a is never 6
    let mut solver = bounded_solver();
    let v = solver.add_var(3);
    let a = solver.var(v);
    solver.add_eq(a * 4 + 2, None);
    assert_eq!(solver.check_sat(), Some(false));
}

#[test]
fn resolvable_equation_pair() {
    // a + 2b + 4 = 0 and a + 4b + 4 = 0 at width 3; satisfiable, e.g.
    // a = 4, b = 0
    let mut solver = bounded_solver();
    let va = solver.add_var(3);
    let vb = solver.add_var(3);
    let a = solver.var(va);
    let b = solver.var(vb);
    let p = a.clone() + b.clone() * 2 + 4;
    let q = a.clone() + b.clone() * 4 + 4;
    solver.add_eq(p.clone(), None);
    solver.add_eq(q.clone(), None);
    assert_eq!(solver.check_sat(), Some(true));
    assert_model_satisfies(&solver, &[p, q]);
}

#[test]
fn quartic_without_roots() {
    // a·a·(a·a − 1) + 1 = 0 at width 2: the quartic is 0 for every
    // residue, so the equation asks for 1 = 0
    let mut solver = bounded_solver();
    let v = solver.add_var(2);
    let a = solver.var(v);
    let p = a.clone() * a.clone() * (a.clone() * a.clone() - 1) + 1;
    solver.add_eq(p, None);
    assert_eq!(solver.check_sat(), Some(false));
}

#[test]
fn quadratic_with_roots() {
    // a·(a − 1) + 2 = 0 at width 2 has the roots 2 and 3
    let mut solver = bounded_solver();
    let v = solver.add_var(2);
    let a = solver.var(v);
    let p = a.clone() * (a.clone() - 1) + 2;
    solver.add_eq(p.clone(), None);
    assert_eq!(solver.check_sat(), Some(true));
    assert_model_satisfies(&solver, &[p]);
    let val = model_value(&solver.assignment(), v);
    assert!(val == 2 || val == 3);
}

#[test]
fn division_bounds_conflict() {
    // u = v·q + r with r < u and u < v·q is unsatisfiable at width 5
    let mut solver = bounded_solver();
    let vu = solver.add_var(5);
    let vv = solver.add_var(5);
    let vq = solver.add_var(5);
    let vr = solver.add_var(5);
    let u = solver.var(vu);
    let v = solver.var(vv);
    let q = solver.var(vq);
    let r = solver.var(vr);
    solver.add_eq(u.clone() - v.clone() * q.clone() - r.clone(), None);
    solver.add_ult(r, u.clone(), None);
    solver.add_ult(u, v * q, None);
    assert_eq!(solver.check_sat(), Some(false));
}

#[test]
fn remainder_chain_is_satisfiable_modulo_wraparound() {
    // n·q1 = a − b, n·q2 + r2 = c·(a − b), r2 < n, n ≠ 0 at width 5;
    // in modular arithmetic r2 may wrap, so models exist (e.g. the
    // all-but-n-zero one)
    let mut solver = bounded_solver();
    let vars: Vec<PVar> = (0..7).map(|_| solver.add_var(5)).collect();
    let n = solver.var(vars[0]);
    let q1 = solver.var(vars[1]);
    let a = solver.var(vars[2]);
    let b = solver.var(vars[3]);
    let c = solver.var(vars[4]);
    let q2 = solver.var(vars[5]);
    let r2 = solver.var(vars[6]);
    let p1 = n.clone() * q1 - a.clone() + b.clone();
    let p2 = n.clone() * q2 + r2.clone() - c.clone() * a + c * b;
    solver.add_eq(p1.clone(), None);
    solver.add_eq(p2.clone(), None);
    solver.add_ult(r2, n.clone(), None);
    solver.add_diseq(n, None);
    assert_eq!(solver.check_sat(), Some(true));
    assert_model_satisfies(&solver, &[p1, p2]);
    let asn = solver.assignment();
    assert!(model_value(&asn, vars[6]) < model_value(&asn, vars[0]));
    assert_ne!(model_value(&asn, vars[0]), 0);
}

#[test]
fn signed_comparisons_flip_the_high_bit() {
    // at width 3, -4 <s 0 holds while 1 <s 0 does not
    let mut solver = bounded_solver();
    let v = solver.add_var(3);
    let a = solver.var(v);
    solver.add_eq(a.clone() - 4, None);
    solver.add_slt(a, Poly::zero(3), None);
    assert_eq!(solver.check_sat(), Some(true));
    assert_eq!(model_value(&solver.assignment(), v), 4);

    let mut solver = bounded_solver();
    let v = solver.add_var(3);
    let a = solver.var(v);
    solver.add_eq(a.clone() - 1, None);
    solver.add_slt(a, Poly::zero(3), None);
    assert_eq!(solver.check_sat(), Some(false));
}

#[test]
fn unsigned_bounds_narrow_to_a_point() {
    // 5 ≤ a and a < 6 forces a = 5
    let mut solver = bounded_solver();
    let v = solver.add_var(4);
    let a = solver.var(v);
    solver.add_ule(Poly::val(5, 4), a.clone(), None);
    solver.add_ult(a, Poly::val(6, 4), None);
    assert_eq!(solver.check_sat(), Some(true));
    assert_eq!(model_value(&solver.assignment(), v), 5);
    assert_eq!(solver.stats().decisions, 0);
}

#[test]
fn incremental_scopes_and_cores() {
    let d1 = Dep::new(1);
    let d2 = Dep::new(2);
    let mut solver = bounded_solver();
    let v = solver.add_var(4);
    let a = solver.var(v);
    solver.add_ule(Poly::val(10, 4), a.clone(), d1);
    assert_eq!(solver.check_sat(), Some(true));
    solver.push();
    solver.add_ult(a.clone(), Poly::val(3, 4), d2);
    assert_eq!(solver.check_sat(), Some(false));
    let core = solver.unsat_core();
    assert!(!core.is_empty());
    solver.pop(1);
    assert_eq!(solver.check_sat(), Some(true));
    assert!(model_value(&solver.assignment(), v) >= 10);
}

#[test]
fn statistics_accumulate() {
    let mut solver = bounded_solver();
    let va = solver.add_var(3);
    let vb = solver.add_var(3);
    let a = solver.var(va);
    let b = solver.var(vb);
    solver.add_eq(a.clone() * b.clone() + 3, None);
    assert_eq!(solver.check_sat(), Some(true));
    let stats = solver.stats();
    assert!(stats.iterations > 0);
    assert!(stats.propagations + stats.decisions > 0);
}
