//! Arithmetic kernel for the modsat solver.
//!
//! This crate contains the value-level building blocks of the solver:
//! arithmetic variables ([`PVar`]), residues of a fixed bit-width
//! ([`Val`] with width helpers), reduced polynomials modulo `2^w`
//! ([`Poly`]) and sets of residues ([`ValSet`]). It has no dependency on
//! the search engine and can be used on its own.

pub mod poly;
pub mod pvar;
pub mod vals;

pub use poly::Poly;
pub use pvar::{PVar, Val};
pub use vals::{Find, ValSet};
