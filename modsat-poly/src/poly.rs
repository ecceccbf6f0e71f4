//! Reduced polynomials over modular machine integers.
//!
//! A [`Poly`] is a sum of monomials with coefficients in `Z_{2^w}`,
//! kept in a canonical form: monomials are sorted, coefficients are
//! reduced and zero terms are dropped. Two polynomials of the same width
//! compare equal exactly when they are the same function... of the free
//! algebra; no reduction of powers is performed, so `x·x` and `x` are
//! distinct terms even though they agree on `Z_2`.
use std::cmp::Ordering;
use std::fmt;
use std::ops;

use crate::pvar::{self, PVar, Val};

/// A single monomial: a coefficient times a product of variables.
///
/// Powers are represented by repeating the variable, so the `vars` vector
/// is a sorted multiset.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Term {
    vars: Vec<PVar>,
    coeff: Val,
}

/// Graded ordering on monomials: higher degree first, ties lexicographic.
fn cmp_monomials(a: &[PVar], b: &[PVar]) -> Ordering {
    b.len().cmp(&a.len()).then_with(|| a.cmp(b))
}

/// A reduced polynomial modulo `2^w`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Poly {
    width: u32,
    terms: Vec<Term>,
}

impl Poly {
    /// The zero polynomial of the given width.
    pub fn zero(width: u32) -> Poly {
        Poly {
            width,
            terms: vec![],
        }
    }

    /// A constant polynomial.
    pub fn val(value: Val, width: u32) -> Poly {
        Poly::new(width, vec![Term {
            vars: vec![],
            coeff: value,
        }])
    }

    /// The polynomial consisting of a single variable.
    pub fn var(v: PVar, width: u32) -> Poly {
        Poly::new(width, vec![Term {
            vars: vec![v],
            coeff: 1,
        }])
    }

    fn new(width: u32, terms: Vec<Term>) -> Poly {
        Poly {
            width,
            terms: normalize(width, terms),
        }
    }

    /// The bit-width this polynomial is reduced by.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether the polynomial is a constant.
    pub fn is_val(&self) -> bool {
        self.as_val().is_some()
    }

    /// The value of a constant polynomial.
    pub fn as_val(&self) -> Option<Val> {
        match self.terms.len() {
            0 => Some(0),
            1 if self.terms[0].vars.is_empty() => Some(self.terms[0].coeff),
            _ => None,
        }
    }

    /// All variables occurring in the polynomial, sorted and deduplicated.
    pub fn free_vars(&self) -> Vec<PVar> {
        let mut vars: Vec<PVar> = self
            .terms
            .iter()
            .flat_map(|t| t.vars.iter().cloned())
            .collect();
        vars.sort();
        vars.dedup();
        vars
    }

    /// The largest power of `v` occurring in any monomial.
    pub fn degree(&self, v: PVar) -> usize {
        self.terms
            .iter()
            .map(|t| t.vars.iter().filter(|&&u| u == v).count())
            .max()
            .unwrap_or(0)
    }

    /// Decompose as `hi·v + lo` when the polynomial is linear in a single
    /// variable with constant coefficients.
    pub fn is_unilinear(&self) -> Option<(PVar, Val, Val)> {
        match self.terms.as_slice() {
            [t] if t.vars.len() == 1 => Some((t.vars[0], t.coeff, 0)),
            [t, u] if t.vars.len() == 1 && u.vars.is_empty() => {
                Some((t.vars[0], t.coeff, u.coeff))
            }
            _ => None,
        }
    }

    /// Split into `coeff·v^deg + rest` where `coeff` collects exactly the
    /// monomials containing `v` to the power `deg`.
    pub fn factor(&self, v: PVar, deg: usize) -> (Poly, Poly) {
        let mut coeff = vec![];
        let mut rest = vec![];
        for t in &self.terms {
            let mult = t.vars.iter().filter(|&&u| u == v).count();
            if mult == deg {
                let vars = t.vars.iter().cloned().filter(|&u| u != v).collect();
                coeff.push(Term {
                    vars,
                    coeff: t.coeff,
                });
            } else {
                rest.push(t.clone());
            }
        }
        (Poly::new(self.width, coeff), Poly::new(self.width, rest))
    }

    /// Exact division of every coefficient by a constant.
    pub fn try_div(&self, c: Val) -> Option<Poly> {
        if c == 0 {
            return None;
        }
        let mut terms = vec![];
        for t in &self.terms {
            if t.coeff % c != 0 {
                return None;
            }
            terms.push(Term {
                vars: t.vars.clone(),
                coeff: t.coeff / c,
            });
        }
        Some(Poly::new(self.width, terms))
    }

    /// Replace assigned variables by their values.
    pub fn subst_val(&self, asn: &[(PVar, Val)]) -> Poly {
        let lookup = |v: PVar| asn.iter().find(|&&(u, _)| u == v).map(|&(_, val)| val);
        let mut terms = vec![];
        for t in &self.terms {
            let mut coeff = t.coeff;
            let mut vars = vec![];
            for &v in &t.vars {
                match lookup(v) {
                    Some(val) => coeff = pvar::mul_mod(coeff, val, self.width),
                    None => vars.push(v),
                }
            }
            terms.push(Term { vars, coeff });
        }
        Poly::new(self.width, terms)
    }

    /// Evaluate under an assignment covering all free variables.
    pub fn eval(&self, asn: &[(PVar, Val)]) -> Option<Val> {
        self.subst_val(asn).as_val()
    }

    /// Eliminate `v` between `self` and `other`.
    ///
    /// Both polynomials must be linear in `v` with constant coefficients
    /// `a` and `c`; the resolvent is `c·self − a·other`, which cancels the
    /// `v` terms. Since the resolvent is a ring combination of the inputs,
    /// `self = 0 ∧ other = 0` implies that it is zero as well.
    pub fn resolve(&self, v: PVar, other: &Poly) -> Option<Poly> {
        if self.degree(v) != 1 || other.degree(v) != 1 {
            return None;
        }
        let (a, r) = self.factor(v, 1);
        let (c, s) = other.factor(v, 1);
        let a = a.as_val()?;
        let c = c.as_val()?;
        Some(r.scale(c) - s.scale(a))
    }

    fn scale(&self, c: Val) -> Poly {
        let terms = self
            .terms
            .iter()
            .map(|t| Term {
                vars: t.vars.clone(),
                coeff: pvar::mul_mod(t.coeff, c, self.width),
            })
            .collect();
        Poly::new(self.width, terms)
    }
}

/// Restore the canonical form: sorted monomials, merged duplicates,
/// reduced coefficients, no zero terms.
fn normalize(width: u32, mut terms: Vec<Term>) -> Vec<Term> {
    for t in &mut terms {
        t.vars.sort();
        t.coeff = pvar::truncate(t.coeff, width);
    }
    terms.sort_by(|a, b| cmp_monomials(&a.vars, &b.vars));
    let mut merged: Vec<Term> = vec![];
    for t in terms {
        match merged.last_mut() {
            Some(last) if last.vars == t.vars => {
                last.coeff = pvar::add_mod(last.coeff, t.coeff, width);
            }
            _ => merged.push(t),
        }
    }
    merged.retain(|t| t.coeff != 0);
    merged
}

impl ops::Add for Poly {
    type Output = Poly;
    fn add(self, rhs: Poly) -> Poly {
        debug_assert_eq!(self.width, rhs.width);
        let mut terms = self.terms;
        terms.extend(rhs.terms);
        Poly::new(self.width, terms)
    }
}

impl ops::Sub for Poly {
    type Output = Poly;
    fn sub(self, rhs: Poly) -> Poly {
        self + (-rhs)
    }
}

impl ops::Neg for Poly {
    type Output = Poly;
    fn neg(self) -> Poly {
        let width = self.width;
        let terms = self
            .terms
            .into_iter()
            .map(|t| Term {
                vars: t.vars,
                coeff: pvar::neg_mod(t.coeff, width),
            })
            .collect();
        Poly::new(width, terms)
    }
}

impl ops::Mul for Poly {
    type Output = Poly;
    fn mul(self, rhs: Poly) -> Poly {
        debug_assert_eq!(self.width, rhs.width);
        let mut terms = vec![];
        for a in &self.terms {
            for b in &rhs.terms {
                let mut vars = a.vars.clone();
                vars.extend(b.vars.iter().cloned());
                terms.push(Term {
                    vars,
                    coeff: pvar::mul_mod(a.coeff, b.coeff, self.width),
                });
            }
        }
        Poly::new(self.width, terms)
    }
}

impl ops::Add<Val> for Poly {
    type Output = Poly;
    fn add(self, rhs: Val) -> Poly {
        let c = Poly::val(rhs, self.width);
        self + c
    }
}

impl ops::Sub<Val> for Poly {
    type Output = Poly;
    fn sub(self, rhs: Val) -> Poly {
        let c = Poly::val(rhs, self.width);
        self - c
    }
}

impl ops::Mul<Val> for Poly {
    type Output = Poly;
    fn mul(self, rhs: Val) -> Poly {
        self.scale(rhs)
    }
}

impl ops::Mul<Poly> for Val {
    type Output = Poly;
    fn mul(self, rhs: Poly) -> Poly {
        rhs.scale(self)
    }
}

impl ops::Add<Poly> for Val {
    type Output = Poly;
    fn add(self, rhs: Poly) -> Poly {
        rhs + self
    }
}

impl fmt::Debug for Poly {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if t.vars.is_empty() {
                write!(f, "{}", t.coeff)?;
            } else {
                if t.coeff != 1 {
                    write!(f, "{}*", t.coeff)?;
                }
                for (j, v) in t.vars.iter().enumerate() {
                    if j > 0 {
                        write!(f, "*")?;
                    }
                    write!(f, "{}", v)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Poly {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
pub mod strategy {
    use super::*;
    use proptest::{collection, prelude::*};

    pub fn poly(
        width: u32,
        vars: usize,
        max_terms: usize,
    ) -> impl Strategy<Value = Poly> {
        collection::vec(
            (
                any::<Val>(),
                collection::vec(0..vars, 0..3usize),
            ),
            0..=max_terms,
        )
        .prop_map(move |raw| {
            let terms = raw
                .into_iter()
                .map(|(coeff, var_indices)| Term {
                    vars: var_indices.into_iter().map(PVar::from_index).collect(),
                    coeff,
                })
                .collect();
            Poly::new(width, terms)
        })
    }

    pub fn assignment(width: u32, vars: usize) -> impl Strategy<Value = Vec<(PVar, Val)>> {
        collection::vec(any::<Val>(), vars).prop_map(move |vals| {
            vals.into_iter()
                .enumerate()
                .map(|(i, val)| (PVar::from_index(i), crate::pvar::truncate(val, width)))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::pvar::truncate;

    fn v(i: usize) -> PVar {
        PVar::from_index(i)
    }

    #[test]
    fn constants_fold() {
        let w = 4;
        let p = Poly::val(7, w) + Poly::val(12, w);
        assert_eq!(p.as_val(), Some(3));
        assert!((Poly::val(8, w) * 2u64).is_zero());
    }

    #[test]
    fn unilinear_decomposition() {
        let w = 4;
        let p = Poly::var(v(0), w) * 3 + 5;
        assert_eq!(p.is_unilinear(), Some((v(0), 3, 5)));
        let q = Poly::var(v(0), w) * Poly::var(v(0), w) + 1;
        assert_eq!(q.is_unilinear(), None);
        assert_eq!(q.degree(v(0)), 2);
    }

    #[test]
    fn factor_splits_powers() {
        let w = 8;
        let a = Poly::var(v(0), w);
        let b = Poly::var(v(1), w);
        // 2*a*b + a + 3
        let p = a.clone() * b.clone() * 2 + a.clone() + 3;
        let (coeff, rest) = p.factor(v(0), 1);
        assert_eq!(coeff, b * 2 + 1);
        assert_eq!(rest, Poly::val(3, w));
    }

    #[test]
    fn try_div_is_exact() {
        let w = 8;
        let p = Poly::var(v(0), w) * 6 + 10;
        assert_eq!(p.try_div(2), Some(Poly::var(v(0), w) * 3 + 5));
        assert_eq!(p.try_div(4), None);
    }

    #[test]
    fn resolve_cancels_the_pivot() {
        let w = 3;
        let a = Poly::var(v(0), w);
        let b = Poly::var(v(1), w);
        // a + 2b + 4  and  a + 4b + 4  resolve on a to 2b - 4b = -2b = 6b
        let p = a.clone() + b.clone() * 2 + 4;
        let q = a + b.clone() * 4 + 4;
        let r = p.resolve(v(0), &q).unwrap();
        assert_eq!(r.degree(v(0)), 0);
        assert_eq!(r, b * 6);
    }

    proptest! {
        #[test]
        fn add_commutes(
            p in strategy::poly(8, 3, 4),
            q in strategy::poly(8, 3, 4),
        ) {
            prop_assert_eq!(p.clone() + q.clone(), q + p);
        }

        #[test]
        fn mul_distributes(
            p in strategy::poly(8, 3, 3),
            q in strategy::poly(8, 3, 3),
            r in strategy::poly(8, 3, 3),
        ) {
            let lhs = p.clone() * (q.clone() + r.clone());
            let rhs = p.clone() * q + p * r;
            prop_assert_eq!(lhs, rhs);
        }

        #[test]
        fn subst_commutes_with_ops(
            p in strategy::poly(8, 3, 4),
            q in strategy::poly(8, 3, 4),
            asn in strategy::assignment(8, 3),
        ) {
            let w = 8;
            let sum = (p.clone() + q.clone()).eval(&asn).unwrap();
            let direct = truncate(
                p.eval(&asn).unwrap().wrapping_add(q.eval(&asn).unwrap()),
                w,
            );
            prop_assert_eq!(sum, direct);

            let prod = (p.clone() * q.clone()).eval(&asn).unwrap();
            let direct = truncate(
                p.eval(&asn).unwrap().wrapping_mul(q.eval(&asn).unwrap()),
                w,
            );
            prop_assert_eq!(prod, direct);
        }

        #[test]
        fn resolvent_is_a_consequence(
            r in strategy::poly(8, 3, 3),
            s in strategy::poly(8, 3, 3),
            a in 0u64..=255,
            c in 0u64..=255,
            asn in strategy::assignment(8, 4),
        ) {
            let w = 8;
            let x = PVar::from_index(3);
            // p = a·x + r, q = c·x + s with x not occurring in r, s
            prop_assume!(r.degree(x) == 0 && s.degree(x) == 0);
            prop_assume!(a != 0 && c != 0);
            let p = Poly::var(x, w) * a + r.clone();
            let q = Poly::var(x, w) * c + s.clone();
            prop_assume!(p.degree(x) == 1 && q.degree(x) == 1);
            let resolvent = p.resolve(x, &q).unwrap();
            prop_assert_eq!(resolvent.degree(x), 0);
            // wherever p and q both vanish, the resolvent vanishes
            if p.eval(&asn) == Some(0) && q.eval(&asn) == Some(0) {
                prop_assert_eq!(resolvent.eval(&asn), Some(0));
            }
        }
    }
}
