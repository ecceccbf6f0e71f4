//! A model-constructing satisfiability solver for systems of polynomial
//! equalities and inequalities over fixed-width modular integers.
//!
//! The solver interleaves assignment of integer values to arithmetic
//! variables with boolean assignment of literals naming constraints,
//! narrows viable value sets through a watched-variable scheme, and
//! escapes conflicts by clause learning driven by forbidden-interval and
//! polynomial-superposition explanations.

pub mod config;
pub mod dep;
pub mod solver;
pub mod stats;

mod bool_vars;
mod cdcl;
mod clause;
mod conflict;
mod constraint;
mod context;
mod decision;
mod explain;
mod interval;
mod lit;
mod prop;
mod search;
mod state;
mod vars;
mod viable;

pub use modsat_poly::{PVar, Poly, Val};

pub use crate::config::SolverConfig;
pub use crate::dep::Dep;
pub use crate::solver::Solver;
pub use crate::stats::Stats;
