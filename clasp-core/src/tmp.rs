//! Temporary data.
use crate::lit::Lit;

/// Temporary data used by various parts of the solver.
///
/// Make sure to check any documented invariants when using this. Also make sure to check all
/// existing users when adding invariants.
#[derive(Default)]
pub struct TmpData {
    pub lits: Vec<Lit>,
    /// A second scratch clause buffer, used when a function needs two independent lists of
    /// literals at once (e.g. the original and the simplified version of a clause).
    pub lits_2: Vec<Lit>,
    /// Scratch buffer for literals converted to the external representation used by proof steps.
    pub ext_lits: Vec<clasp_formula::Lit>,
    /// A boolean for each literal.
    ///
    /// Reset to all-false, keep size.
    pub flags: Vec<bool>,
}

impl TmpData {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.flags.resize(count * 2, false);
    }
}
