//! Literals and variables.
use std::{fmt, ops};

use serde::{Deserialize, Serialize};

/// The backing type used to represent literals and variables.
pub type LitIdx = u32;

/// A boolean variable.
///
/// A boolean value is represented by an index. Internally these are 0-based, i.e. the first
/// variable has the index 0. For user IO a 1-based index is used, to allow denoting negated
/// variables using negative integers. This convention is also used in the DIMACS CNF format.
///
/// Creating a variable with an index larger than `Var::max_var().index()` is unsupported. This
/// might panic or be interpreted as a different variable.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Var {
    index: LitIdx,
}

impl Var {
    /// Creates a variable from a 1-based index as used in the DIMCAS CNF encoding.
    ///
    /// The parameter must be positive and may not represent a variable past `Var::max_var()`.
    pub fn from_dimacs(number: isize) -> Var {
        debug_assert!(number > 0);
        Var::from_index((number - 1) as usize)
    }

    /// Creates a variable from a 0-based index.
    ///
    /// The index may not represent a variable past `Var::max_var()`.
    pub fn from_index(index: usize) -> Var {
        debug_assert!(index <= Var::max_var().index());
        Var {
            index: index as LitIdx,
        }
    }

    /// The 1-based index representing this variable in the DIMACS CNF encoding.
    pub fn to_dimacs(self) -> isize {
        (self.index + 1) as isize
    }

    /// The 0-based index representing this variable.
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Converts to the variable representation used outside the solver's hot path (proof
    /// generation, checking, the public API).
    pub fn to_external(self) -> clasp_formula::Var {
        clasp_formula::Var::from_index(self.index())
    }

    /// Converts from the variable representation used outside the solver's hot path.
    pub fn from_external(var: clasp_formula::Var) -> Var {
        Var::from_index(var.index())
    }

    /// The variable with largest index that is supported.
    ///
    /// This is less than the backing integer type supports. This enables storing a variable index
    /// and additional bits (as in `Lit`) or sentinel values in a single word.
    pub const fn max_var() -> Var {
        // Allow for sign or tag bits
        Var {
            index: LitIdx::max_value() >> 4,
        }
    }

    /// Largest number of variables supported.
    ///
    /// This is exactly `Var::max_var().index() + 1`.
    pub const fn max_count() -> usize {
        Self::max_var().index() + 1
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A boolean literal.
///
/// A literal is a variable or the negation of a variable.
///
/// Conceptually a literal consists of a `Var`, a `bool` indicating whether the literal represents
/// the variable (positive literal) or its negation (negative literal), and a free "flag" bit used
/// as a scratch watch marker by the propagator (§4.2) and left untouched by equality/hashing.
///
/// Internally a literal is represented as an integer: bit 0 is the sign, bit 1 is the flag, the
/// remaining bits are the variable index. This integer is called the `code` of the literal. The
/// flag bit is ignored by `PartialEq`/`Hash`/`Ord` so it never observably changes a literal's
/// identity.
///
/// The restriction on the range of allowed indices for `Var` also applies to `Lit`.
#[derive(Copy, Clone, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Lit {
    code: LitIdx,
}

const FLAG_BIT: LitIdx = 1 << 1;
const VAR_SHIFT: LitIdx = 2;

impl Lit {
    /// Creates a literal from a `Var` and a `bool` that is `true` when the literal is negative.
    pub fn from_var(var: Var, negative: bool) -> Lit {
        Lit::from_litidx(var.index, negative)
    }

    /// Create a literal with the given [`Lit::code`] encoding (flag bit cleared).
    pub fn from_code(code: usize) -> Lit {
        debug_assert!(code >> 1 <= Var::max_var().index());
        Lit::from_litidx((code >> 1) as LitIdx, (code & 1) != 0)
    }

    fn from_litidx(index: LitIdx, negative: bool) -> Lit {
        debug_assert!(index <= Var::max_var().index);
        Lit {
            code: (index << VAR_SHIFT) | (negative as LitIdx),
        }
    }

    /// Returns a copy of this literal with the watch-marker flag bit set.
    pub fn with_flag(self) -> Lit {
        Lit {
            code: self.code | FLAG_BIT,
        }
    }

    /// Returns a copy of this literal with the watch-marker flag bit cleared.
    pub fn without_flag(self) -> Lit {
        Lit {
            code: self.code & !FLAG_BIT,
        }
    }

    /// Whether the watch-marker flag bit is set.
    pub fn flag(self) -> bool {
        (self.code & FLAG_BIT) != 0
    }

    /// Creates a literal from an integer.
    ///
    /// The absolute value is used as 1-based index, the sign of
    /// the integer is used as sign of the literal.
    pub fn from_dimacs(number: isize) -> Lit {
        Lit::from_var(Var::from_dimacs(number.abs()), number < 0)
    }

    /// 1-based Integer representation of the literal, opposite of `from_dimacs`.
    pub fn to_dimacs(self) -> isize {
        let mut number = self.var().to_dimacs();
        if self.is_negative() {
            number = -number
        }
        number
    }

    /// 0-based index of the literal's _variable_.
    pub fn index(self) -> usize {
        (self.code >> VAR_SHIFT) as usize
    }

    /// The literal's variable.
    pub fn var(self) -> Var {
        Var {
            index: self.code >> VAR_SHIFT,
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

    /// Encoding used to key hash sets/vectors, ignoring the flag bit.
    ///
    /// Two times the variable's index for positive literals and one more for negative literals.
    pub fn code(self) -> usize {
        (self.index() << 1) | (self.code & 1) as usize
    }

    /// Raw bit pattern, including the flag bit. Only meaningful to code that set the flag itself.
    pub fn raw_code(self) -> usize {
        self.code as usize
    }

    /// Converts to the literal representation used outside the solver's hot path (proof
    /// generation, checking, the public API). Drops the watch-marker flag bit.
    pub fn to_external(self) -> clasp_formula::Lit {
        clasp_formula::Lit::from_code(self.code())
    }

    /// Converts from the literal representation used outside the solver's hot path.
    pub fn from_external(lit: clasp_formula::Lit) -> Lit {
        Lit::from_code(lit.code())
    }
}

impl PartialEq for Lit {
    fn eq(&self, other: &Lit) -> bool {
        self.without_flag().code == other.without_flag().code
    }
}

impl Eq for Lit {}

impl std::hash::Hash for Lit {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.without_flag().code.hash(state)
    }
}

impl PartialOrd for Lit {
    fn partial_cmp(&self, other: &Lit) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lit {
    fn cmp(&self, other: &Lit) -> std::cmp::Ordering {
        self.without_flag().code.cmp(&other.without_flag().code)
    }
}

impl ops::Not for Lit {
    type Output = Lit;
    fn not(self) -> Lit {
        Lit {
            code: self.code ^ 1,
        }
    }
}

impl ops::BitXor<bool> for Lit {
    type Output = Lit;

    fn bitxor(self, rhs: bool) -> Lit {
        Lit {
            code: self.code ^ (rhs as LitIdx),
        }
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! lit {
    ($x:expr) => {
        $crate::lit::Lit::from_dimacs($x)
    };
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! var {
    ($x:expr) => {
        $crate::lit::Var::from_dimacs($x)
    };
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! lits {
    ( $( $x:expr ),* ) => { [ $( lit!( $x ) ),* ] };
    ( $( $x:expr ),* , ) => { lits! [ $( $ x),* ] };
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! vars {
    ( $( $x:expr ),* ) => { [ $( var!( $x ) ),* ] };
    ( $( $x:expr ),* , ) => { vars! [ $( $ x),* ] };
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! cnf {
    ( $( $( $x:expr ),* );* ; ) => { [ $( &[ $( lit!( $x ) ),* ] as &[$crate::lit::Lit] ),* ] };
}

/// Shortcut for tests
#[cfg(test)]
#[allow(unused_macros)]
macro_rules! cnf_formula {
    ( $( $t:tt )* ) => { $crate::cnf::CnfFormula::from(cnf![ $($t)* ].iter().cloned()) };
}

#[cfg(test)]
pub mod strategy {
    use super::*;
    use proptest::{prelude::*, *};

    pub fn var(index: impl Strategy<Value = usize>) -> impl Strategy<Value = Var> {
        index.prop_map(|index| Var::from_index(index))
    }

    pub fn lit(index: impl Strategy<Value = usize>) -> impl Strategy<Value = Lit> {
        (var(index), bool::ANY).prop_map(|(var, negative)| Lit::from_var(var, negative))
    }
}
