//! Weight and cardinality constraints.
//!
//! A weight constraint ties a literal to a linear inequality over a set of literals: the
//! constraint literal becomes true exactly when the sum of the weights of the true literals among
//! its body reaches the bound, and false exactly when it can no longer be reached. Cardinality
//! constraints are the special case where every weight is 1.
//!
//! Unlike clauses, a weight constraint is not watched incrementally. Its whole body is rescanned
//! on every call, which keeps the implementation simple at the cost of giving up the two-watched
//! scheme's amortized cost.

use partial_ref::{partial, PartialRef};

use crate::clause::{self, ClauseHeader, Tier};
use crate::context::{
    AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, TmpDataP, TrailP,
    WeightConstraintsP,
};
use crate::lit::Lit;
use crate::prop::{enqueue_assignment, Conflict, Reason};

/// A single weight constraint.
pub struct WeightConstraint {
    lits: Vec<Lit>,
    weights: Vec<i64>,
    bound: i64,
    constraint_lit: Lit,
}

impl WeightConstraint {
    /// Create a weight constraint.
    ///
    /// `constraint_lit` becomes true exactly when the sum of the weights of the true literals
    /// among `lits` is at least `bound`.
    pub fn new(
        constraint_lit: Lit,
        lits: Vec<Lit>,
        weights: Vec<i64>,
        bound: i64,
    ) -> WeightConstraint {
        assert_eq!(lits.len(), weights.len());
        assert!(bound >= 1, "a weight constraint's bound must be positive");
        assert!(
            bound <= weights.iter().sum(),
            "a weight constraint's bound can never be reached"
        );
        WeightConstraint {
            lits,
            weights,
            bound,
            constraint_lit,
        }
    }

    /// Create a cardinality constraint, the special case of a weight constraint where every
    /// weight is 1.
    pub fn cardinality(constraint_lit: Lit, lits: Vec<Lit>, bound: i64) -> WeightConstraint {
        let weights = vec![1; lits.len()];
        WeightConstraint::new(constraint_lit, lits, weights, bound)
    }
}

/// Storage for all weight constraints posted to the solver.
#[derive(Default)]
pub struct WeightConstraints {
    constraints: Vec<WeightConstraint>,
}

impl WeightConstraints {
    /// Post a new weight constraint.
    pub fn add(&mut self, constraint: WeightConstraint) {
        self.constraints.push(constraint);
    }

    /// Whether there are no weight constraints to propagate.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Outcome of propagating the weight constraints.
pub enum PropResult {
    /// Nothing left to derive at the current trail position.
    Fixpoint,
    /// At least one literal was assigned; the caller should run clausal propagation again before
    /// calling this again.
    Changed,
    /// The current assignment violates a weight constraint.
    Conflict(Conflict),
}

/// Propagate all weight constraints once.
///
/// Returns as soon as a single literal is forced, so that clausal unit propagation can process it
/// before this is called again.
pub fn propagate_fixpoint(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TmpDataP,
        mut TrailP,
        WeightConstraintsP,
    ),
) -> PropResult {
    let count = ctx.part(WeightConstraintsP).constraints.len();

    for index in 0..count {
        match propagate_one(ctx.borrow(), index) {
            PropResult::Fixpoint => continue,
            other => return other,
        }
    }

    PropResult::Fixpoint
}

/// What [`propagate_one`]'s read-only scan over the constraint decided to do.
///
/// Kept as owned data so the scan (which borrows [`AssignmentP`] read-only) can finish and drop
/// its borrow before the forcing/conflict phase takes a mutable one.
enum Action {
    Fixpoint,
    Conflict(Vec<Lit>),
    Force { forced: Lit, antecedents: Vec<Lit> },
}

fn propagate_one(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TmpDataP,
        mut TrailP,
        WeightConstraintsP,
    ),
    index: usize,
) -> PropResult {
    let (weight_constraints, mut ctx) = ctx.split_part(WeightConstraintsP);
    let constraint = &weight_constraints.constraints[index];

    let action = {
        let assignment = ctx.part(AssignmentP);

        let mut true_sum: i64 = 0;
        let mut max_sum: i64 = 0;

        for (&lit, &weight) in constraint.lits.iter().zip(&constraint.weights) {
            match assignment.lit_value(lit) {
                Some(true) => {
                    true_sum += weight;
                    max_sum += weight;
                }
                Some(false) => (),
                None => max_sum += weight,
            }
        }

        let constraint_value = assignment.lit_value(constraint.constraint_lit);
        let bound = constraint.bound;
        let head = constraint.constraint_lit;

        if max_sum < bound {
            match constraint_value {
                Some(true) => {
                    let mut lits: Vec<Lit> = constraint
                        .lits
                        .iter()
                        .copied()
                        .filter(|&lit| assignment.lit_value(lit) == Some(false))
                        .collect();
                    lits.push(!head);
                    Action::Conflict(lits)
                }
                Some(false) => Action::Fixpoint,
                None => {
                    let antecedents: Vec<Lit> = constraint
                        .lits
                        .iter()
                        .copied()
                        .filter(|&lit| assignment.lit_value(lit) == Some(false))
                        .collect();
                    Action::Force {
                        forced: !head,
                        antecedents,
                    }
                }
            }
        } else if true_sum >= bound {
            match constraint_value {
                Some(false) => {
                    let mut lits: Vec<Lit> = constraint
                        .lits
                        .iter()
                        .copied()
                        .filter(|&lit| assignment.lit_value(lit) == Some(true))
                        .map(|lit| !lit)
                        .collect();
                    lits.push(head);
                    Action::Conflict(lits)
                }
                Some(true) => Action::Fixpoint,
                None => {
                    let antecedents: Vec<Lit> = constraint
                        .lits
                        .iter()
                        .copied()
                        .filter(|&lit| assignment.lit_value(lit) == Some(true))
                        .collect();
                    Action::Force {
                        forced: head,
                        antecedents,
                    }
                }
            }
        } else if constraint_value == Some(true) {
            constraint
                .lits
                .iter()
                .zip(&constraint.weights)
                .find(|&(&lit, &weight)| {
                    assignment.lit_value(lit).is_none() && max_sum - weight < bound
                })
                .map(|(&lit, _)| {
                    let mut antecedents: Vec<Lit> = constraint
                        .lits
                        .iter()
                        .copied()
                        .filter(|&other| {
                            other != lit && assignment.lit_value(other) == Some(false)
                        })
                        .collect();
                    antecedents.push(head);
                    Action::Force {
                        forced: lit,
                        antecedents,
                    }
                })
                .unwrap_or(Action::Fixpoint)
        } else if constraint_value == Some(false) {
            constraint
                .lits
                .iter()
                .zip(&constraint.weights)
                .find(|&(&lit, &weight)| {
                    assignment.lit_value(lit).is_none() && true_sum + weight >= bound
                })
                .map(|(&lit, _)| {
                    let mut antecedents: Vec<Lit> = constraint
                        .lits
                        .iter()
                        .copied()
                        .filter(|&other| other != lit && assignment.lit_value(other) == Some(true))
                        .collect();
                    antecedents.push(!head);
                    Action::Force {
                        forced: !lit,
                        antecedents,
                    }
                })
                .unwrap_or(Action::Fixpoint)
        } else {
            Action::Fixpoint
        }
    };

    match action {
        Action::Fixpoint => PropResult::Fixpoint,
        Action::Conflict(lits) => raise_conflict(ctx.borrow(), &lits),
        Action::Force { forced, antecedents } => force(ctx.borrow(), forced, &antecedents),
    }
}

/// Enqueue `forced` with a reason clause recording `antecedents` as its (currently true) cause.
fn force(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TmpDataP,
        mut TrailP,
    ),
    forced: Lit,
    antecedents: &[Lit],
) -> PropResult {
    if ctx.part(AssignmentP).lit_value(forced) == Some(false) {
        let mut false_lits: Vec<Lit> = antecedents.iter().map(|&lit| !lit).collect();
        false_lits.push(forced);
        return raise_conflict(ctx.borrow(), &false_lits);
    }
    if ctx.part(AssignmentP).lit_value(forced) == Some(true) {
        return PropResult::Fixpoint;
    }

    if antecedents.len() < 2 {
        let reason = match antecedents.first() {
            None => Reason::Unit,
            Some(&antecedent) => Reason::Binary([!antecedent]),
        };
        enqueue_assignment(ctx.borrow(), forced, reason);
    } else {
        let (tmp_data, mut ctx) = ctx.split_part_mut(TmpDataP);
        let lits = &mut tmp_data.lits;
        lits.clear();
        lits.push(forced);
        lits.extend(antecedents.iter().map(|&lit| !lit));

        let mut header = ClauseHeader::new();
        header.set_tier(Tier::Irred);
        let cref = clause::db::add_clause(ctx.borrow(), header, lits);

        enqueue_assignment(ctx.borrow(), forced, Reason::Long(cref));
    }

    PropResult::Changed
}

/// Build a [`Conflict`] from a set of literals that are all currently false.
///
/// Materializes a clause when there are more than 2 literals; used both for weight constraint
/// conflicts and, via [`post_propagator`](crate::post_propagator), for enumerator blocking
/// clauses that turn out to conflict with the current total assignment.
pub(crate) fn build_conflict(
    ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP),
    false_lits: &[Lit],
) -> Conflict {
    assert!(
        false_lits.len() >= 2,
        "a conflicting clause always involves at least 2 literals"
    );

    if false_lits.len() == 2 {
        Conflict::Binary([false_lits[0], false_lits[1]])
    } else {
        let mut header = ClauseHeader::new();
        header.set_tier(Tier::Irred);
        let cref = clause::db::add_clause(ctx, header, false_lits);
        Conflict::Long(cref)
    }
}

fn raise_conflict(
    ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP),
    false_lits: &[Lit],
) -> PropResult {
    PropResult::Conflict(build_conflict(ctx, false_lits))
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::context::{set_var_count, WeightConstraintsP};
    use crate::lit::Var;
    use crate::prop::{enqueue_assignment, propagate};

    #[test]
    fn cardinality_forces_head_false_when_unreachable() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 4);

        let head = Lit::from_var(Var::from_index(0), false);
        let a = Lit::from_var(Var::from_index(1), false);
        let b = Lit::from_var(Var::from_index(2), false);
        let c = Lit::from_var(Var::from_index(3), false);

        ctx.part_mut(WeightConstraintsP)
            .add(WeightConstraint::cardinality(head, vec![a, b, c], 2));

        enqueue_assignment(ctx.borrow(), !a, Reason::Unit);
        enqueue_assignment(ctx.borrow(), !b, Reason::Unit);
        propagate(ctx.borrow()).unwrap();

        match propagate_fixpoint(ctx.borrow()) {
            PropResult::Changed => (),
            _ => panic!("expected weight constraint to force the head literal"),
        }

        propagate(ctx.borrow()).unwrap();
        assert_eq!(ctx.part(AssignmentP).lit_value(head), Some(false));
    }

    #[test]
    fn cardinality_forces_remaining_lits_when_needed() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 4);

        let head = Lit::from_var(Var::from_index(0), false);
        let a = Lit::from_var(Var::from_index(1), false);
        let b = Lit::from_var(Var::from_index(2), false);
        let c = Lit::from_var(Var::from_index(3), false);

        ctx.part_mut(WeightConstraintsP)
            .add(WeightConstraint::cardinality(head, vec![a, b, c], 2));

        enqueue_assignment(ctx.borrow(), head, Reason::Unit);
        enqueue_assignment(ctx.borrow(), !a, Reason::Unit);
        propagate(ctx.borrow()).unwrap();

        loop {
            match propagate_fixpoint(ctx.borrow()) {
                PropResult::Changed => {
                    propagate(ctx.borrow()).unwrap();
                }
                PropResult::Fixpoint => break,
                PropResult::Conflict(_) => panic!("unexpected conflict"),
            }
        }

        assert_eq!(ctx.part(AssignmentP).lit_value(b), Some(true));
        assert_eq!(ctx.part(AssignmentP).lit_value(c), Some(true));
    }

    #[test]
    fn cardinality_conflicts_when_head_true_but_unreachable() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 4);

        let head = Lit::from_var(Var::from_index(0), false);
        let a = Lit::from_var(Var::from_index(1), false);
        let b = Lit::from_var(Var::from_index(2), false);
        let c = Lit::from_var(Var::from_index(3), false);

        ctx.part_mut(WeightConstraintsP)
            .add(WeightConstraint::cardinality(head, vec![a, b, c], 2));

        enqueue_assignment(ctx.borrow(), head, Reason::Unit);
        enqueue_assignment(ctx.borrow(), !a, Reason::Unit);
        enqueue_assignment(ctx.borrow(), !b, Reason::Unit);
        propagate(ctx.borrow()).unwrap();

        match propagate_fixpoint(ctx.borrow()) {
            PropResult::Conflict(_) => (),
            _ => panic!("expected a conflict"),
        }
    }
}
