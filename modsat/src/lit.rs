//! Boolean variables and literals naming constraint atoms.
//!
//! Every constraint atom is paired with one boolean variable; a signed
//! occurrence of a constraint is a literal of that variable. Unlike a
//! plain SAT solver there is no external numbering to preserve, so
//! variables are plain 0-based indices.
use std::{fmt, ops};

/// The backing type used to represent literals and variables.
pub type LitIdx = u32;

/// A boolean variable.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BVar {
    index: LitIdx,
}

impl BVar {
    /// Creates a variable from a 0-based index.
    pub fn from_index(index: usize) -> BVar {
        debug_assert!(index <= BVar::max_var().index());
        BVar {
            index: index as LitIdx,
        }
    }

    /// The 0-based index representing this variable.
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// The variable with the largest supported index.
    ///
    /// Leaves headroom in the backing type for the sign bit of [`BLit`].
    pub const fn max_var() -> BVar {
        BVar {
            index: LitIdx::max_value() >> 4,
        }
    }
}

impl fmt::Debug for BVar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "b{}", self.index)
    }
}

impl fmt::Display for BVar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A boolean literal.
///
/// Internally a literal is represented as twice the index of its variable
/// when it is positive and one more when it is negative, so watch and
/// assignment tables can be indexed by the code directly.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BLit {
    code: LitIdx,
}

impl BLit {
    /// Creates a literal from a `BVar` and a `bool` that is `true` when
    /// the literal is negative.
    pub fn from_var(var: BVar, negative: bool) -> BLit {
        BLit {
            code: (var.index << 1) | (negative as LitIdx),
        }
    }

    /// The positive literal of a variable.
    pub fn positive(var: BVar) -> BLit {
        BLit::from_var(var, false)
    }

    /// 0-based index of the literal's variable.
    pub fn index(self) -> usize {
        (self.code >> 1) as usize
    }

    /// The literal's variable.
    pub fn var(self) -> BVar {
        BVar {
            index: self.code >> 1,
        }
    }

    /// Whether the literal is negative, i.e. a negated variable.
    pub fn is_negative(self) -> bool {
        (self.code & 1) != 0
    }

    /// Whether the literal is positive, i.e. a non-negated variable.
    pub fn is_positive(self) -> bool {
        !self.is_negative()
    }

    /// Twice the variable's index for positive literals and one more for
    /// negative literals.
    pub fn code(self) -> usize {
        self.code as usize
    }
}

impl ops::Not for BLit {
    type Output = BLit;
    fn not(self) -> BLit {
        BLit {
            code: self.code ^ 1,
        }
    }
}

impl ops::BitXor<bool> for BLit {
    type Output = BLit;

    fn bitxor(self, rhs: bool) -> BLit {
        BLit {
            code: self.code ^ (rhs as LitIdx),
        }
    }
}

impl fmt::Debug for BLit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_negative() {
            write!(f, "!{}", self.var())
        } else {
            write!(f, "{}", self.var())
        }
    }
}

impl fmt::Display for BLit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_flips_only_the_sign() {
        let lit = BLit::from_var(BVar::from_index(7), false);
        assert_eq!((!lit).var(), lit.var());
        assert!((!lit).is_negative());
        assert_eq!(!!lit, lit);
        assert_eq!(lit ^ true, !lit);
        assert_eq!(lit.code() ^ 1, (!lit).code());
    }
}
