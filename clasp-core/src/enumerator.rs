//! Model enumeration and optimization.
//!
//! On each model the solver finds, the enumerator decides what happens next: stop after the
//! first model, keep searching for further models by blocking the one just found, or keep
//! searching for a strictly better one under a minimize constraint.

use crate::lit::Lit;
use crate::prop::Assignment;

/// What the enumerator does with each model the solver commits.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EnumMode {
    /// Stop after the first model.
    Ignore,
    /// Record every model by adding a blocking clause, until the limit or exhaustion.
    Record,
    /// Like [`Record`](EnumMode::Record), but backjumps past the blocking clause's watch rather
    /// than always undoing to level 0.
    Backtrack,
    /// Search for a single optimal model under the minimize constraints.
    Optimize,
    /// Enumerate every optimal model once the optimum is known.
    EnumerateOptimal,
}

/// A linear term to minimize: the sum of `weight` for every `lit` that ends up true.
pub struct MinimizeConstraint {
    pub terms: Vec<(Lit, i64)>,
}

impl MinimizeConstraint {
    pub fn new(terms: Vec<(Lit, i64)>) -> MinimizeConstraint {
        MinimizeConstraint { terms }
    }

    /// The cost of this constraint under the given assignment.
    ///
    /// Literals left unassigned count as false.
    pub fn cost(&self, assignment: &Assignment) -> i64 {
        self.terms
            .iter()
            .filter(|&&(lit, _)| assignment.lit_is_true(lit))
            .map(|&(_, weight)| weight)
            .sum()
    }

    /// The literals that are true under the given assignment, i.e. the ones contributing to its
    /// cost.
    pub fn true_lits(&self, assignment: &Assignment) -> Vec<Lit> {
        self.terms
            .iter()
            .filter(|&&(lit, _)| assignment.lit_is_true(lit))
            .map(|&(lit, _)| lit)
            .collect()
    }
}

/// What the solver should do after a model was committed.
pub enum ModelOutcome {
    /// Stop searching, this model is the final result.
    Accept,
    /// Add this clause and keep searching.
    Continue(Vec<Lit>),
    /// The search space is exhausted, there is no further model.
    Exhausted,
}

/// Enumerates and optimizes models.
///
/// Owns the projection and minimize constraints configured for the current solve, and the bounds
/// accumulated so far for hierarchical optimization.
#[derive(Default)]
pub struct Enumerator {
    pub mode: EnumMode,
    /// Literals a model is projected to before being blocked. Empty means no projection, i.e. the
    /// full assignment is used.
    pub projection: Vec<Lit>,
    /// Minimize constraints in priority order, most significant first.
    pub minimize: Vec<MinimizeConstraint>,
    /// Current bound for each minimize tier. `None` means no model has been found yet.
    pub bounds: Vec<Option<i64>>,
    /// Number of models committed so far.
    pub models: u64,
    /// Stop after this many models. `None` means unbounded.
    pub enum_limit: Option<u64>,
}

impl Default for EnumMode {
    fn default() -> EnumMode {
        EnumMode::Ignore
    }
}

impl Enumerator {
    /// Reset accumulated bounds and model count for a fresh solve.
    pub fn reset(&mut self) {
        self.bounds.clear();
        self.bounds.resize(self.minimize.len(), None);
        self.models = 0;
    }

    /// The literals a model should be blocked over: the projection if set, otherwise `lits`,
    /// interpreted as the full model the caller assembled from the trail.
    fn block_over<'a>(&self, lits: &'a [Lit]) -> &'a [Lit] {
        if self.projection.is_empty() {
            lits
        } else {
            &self.projection
        }
    }

    /// Called once a total assignment has been committed as a model.
    ///
    /// `model_lits` is the set of true literals in the committed model (only the ones relevant to
    /// blocking need be included, e.g. the projection atoms).
    pub fn on_model(&mut self, assignment: &Assignment, model_lits: &[Lit]) -> ModelOutcome {
        self.models += 1;

        if let Some(limit) = self.enum_limit {
            if self.models > limit {
                return ModelOutcome::Exhausted;
            }
        }

        match self.mode {
            EnumMode::Ignore => ModelOutcome::Accept,

            EnumMode::Record | EnumMode::Backtrack => {
                let blocked = self.block_over(model_lits);
                let clause = blocked.iter().map(|&lit| !lit).collect();
                ModelOutcome::Continue(clause)
            }

            EnumMode::Optimize | EnumMode::EnumerateOptimal => {
                if self.bounds.len() != self.minimize.len() {
                    self.bounds.resize(self.minimize.len(), None);
                }

                let costs: Vec<i64> = self.minimize.iter().map(|m| m.cost(assignment)).collect();

                let improves = self
                    .bounds
                    .iter()
                    .zip(&costs)
                    .any(|(bound, &cost)| bound.map_or(true, |bound| cost < bound));

                if !improves && self.mode == EnumMode::Optimize {
                    return ModelOutcome::Exhausted;
                }

                for (bound, &cost) in self.bounds.iter_mut().zip(&costs) {
                    *bound = Some(bound.map_or(cost, |prev| prev.min(cost)));
                }

                // Block this exact assignment of the minimize terms so the next model found, if
                // any, differs from it. Real bound propagation is left to unit propagation
                // re-discovering the same conflicts on the next search; this is a generate-and-test
                // scheme rather than an incremental improving constraint.
                let mut clause = Vec::new();
                for constraint in &self.minimize {
                    clause.extend(constraint.true_lits(assignment).iter().map(|&lit| !lit));
                }

                if clause.is_empty() {
                    ModelOutcome::Exhausted
                } else {
                    ModelOutcome::Continue(clause)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::lit::Var;

    fn assign(assignment: &mut Assignment, lits: &[Lit]) {
        assignment.set_var_count(64);
        for &lit in lits {
            assignment.assign_lit(lit);
        }
    }

    #[test]
    fn record_blocks_the_found_model() {
        let mut enumerator = Enumerator::default();
        enumerator.mode = EnumMode::Record;

        let a = Lit::from_var(Var::from_index(0), false);
        let b = Lit::from_var(Var::from_index(1), false);

        let mut assignment = Assignment::default();
        assign(&mut assignment, &[a, b]);

        match enumerator.on_model(&assignment, &[a, b]) {
            ModelOutcome::Continue(clause) => {
                assert_eq!(clause, vec![!a, !b]);
            }
            _ => panic!("expected a blocking clause"),
        }
    }

    #[test]
    fn optimize_stops_once_no_model_improves() {
        let mut enumerator = Enumerator::default();
        enumerator.mode = EnumMode::Optimize;

        let a = Lit::from_var(Var::from_index(0), false);

        enumerator.minimize.push(MinimizeConstraint::new(vec![(a, 5)]));
        enumerator.reset();

        let mut assignment = Assignment::default();
        assign(&mut assignment, &[!a]);

        match enumerator.on_model(&assignment, &[]) {
            ModelOutcome::Continue(_) => (),
            _ => panic!("first model should always be accepted as an improvement"),
        }

        assert_eq!(enumerator.bounds, vec![Some(0)]);

        let mut worse_assignment = Assignment::default();
        assign(&mut worse_assignment, &[a]);

        match enumerator.on_model(&worse_assignment, &[]) {
            ModelOutcome::Exhausted => (),
            _ => panic!("a worse model must not be accepted as an improvement"),
        }
    }

    #[test]
    fn enum_limit_stops_enumeration() {
        let mut enumerator = Enumerator::default();
        enumerator.mode = EnumMode::Record;
        enumerator.enum_limit = Some(1);

        let a = Lit::from_var(Var::from_index(0), false);
        let mut assignment = Assignment::default();
        assign(&mut assignment, &[a]);

        assert!(matches!(
            enumerator.on_model(&assignment, &[a]),
            ModelOutcome::Continue(_)
        ));
        assert!(matches!(
            enumerator.on_model(&assignment, &[a]),
            ModelOutcome::Exhausted
        ));
    }
}
