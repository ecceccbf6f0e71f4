//! Intervals with symbolic bounds evaluated under the current model.
use modsat_poly::{pvar, Poly, Val};

/// A forbidden interval for a pivot variable.
///
/// Bounds are polynomials over the other variables together with their
/// values under the current assignment; the symbolic form goes into
/// learned constraints, the values drive the covering search. Proper
/// intervals are half-open `[lo, hi)` modulo `2^w` and may be empty under
/// the current values (`lo_val == hi_val`).
#[derive(Clone)]
pub enum EvalInterval {
    Full,
    Proper {
        lo: Poly,
        lo_val: Val,
        hi: Poly,
        hi_val: Val,
    },
}

impl EvalInterval {
    pub fn full() -> EvalInterval {
        EvalInterval::Full
    }

    pub fn proper(lo: Poly, lo_val: Val, hi: Poly, hi_val: Val) -> EvalInterval {
        EvalInterval::Proper {
            lo,
            lo_val,
            hi,
            hi_val,
        }
    }

    pub fn is_full(&self) -> bool {
        match self {
            EvalInterval::Full => true,
            _ => false,
        }
    }

    /// Interval length under the current values; `0` for a currently
    /// empty proper interval.
    pub fn current_len(&self, w: u32) -> Val {
        match self {
            EvalInterval::Full => pvar::width_mask(w),
            EvalInterval::Proper { lo_val, hi_val, .. } => pvar::sub_mod(*hi_val, *lo_val, w),
        }
    }

    pub fn is_currently_empty(&self, w: u32) -> bool {
        !self.is_full() && self.current_len(w) == 0
    }

    /// Wrap-aware membership under the current values.
    pub fn currently_contains(&self, val: Val, w: u32) -> bool {
        match self {
            EvalInterval::Full => true,
            EvalInterval::Proper { lo_val, hi_val, .. } => {
                pvar::sub_mod(val, *lo_val, w) < pvar::sub_mod(*hi_val, *lo_val, w)
            }
        }
    }

    pub fn lo(&self) -> &Poly {
        match self {
            EvalInterval::Proper { lo, .. } => lo,
            EvalInterval::Full => panic!("full interval has no bounds"),
        }
    }

    pub fn hi(&self) -> &Poly {
        match self {
            EvalInterval::Proper { hi, .. } => hi,
            EvalInterval::Full => panic!("full interval has no bounds"),
        }
    }

    pub fn hi_val(&self) -> Val {
        match self {
            EvalInterval::Proper { hi_val, .. } => *hi_val,
            EvalInterval::Full => panic!("full interval has no bounds"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraparound_membership() {
        let w = 3;
        let zero = Poly::zero(w);
        // [6, 2) modulo 8 contains 6, 7, 0, 1
        let iv = EvalInterval::proper(zero.clone(), 6, zero, 2);
        let members: Vec<Val> = (0..8).filter(|&x| iv.currently_contains(x, w)).collect();
        assert_eq!(members, vec![0, 1, 6, 7]);
        assert_eq!(iv.current_len(w), 4);
        assert!(!iv.is_currently_empty(w));
    }
}
