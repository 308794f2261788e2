//! The post-propagator pipeline.
//!
//! Runs after clausal unit propagation reaches a fixpoint: first the weight constraints, then,
//! once a total assignment is reached, the enumerator's model check. Both can in turn force
//! further clausal propagation or a conflict, so [`propagate_to_fixpoint`] loops until nothing
//! changes.
//!
//! This is a fixed, statically dispatched sequence rather than a dynamic registry of
//! `dyn PostPropagator` objects: the solver only ever has these two non-clausal propagators, and
//! keeping them as concrete functions over `partial!` references avoids fighting the borrow
//! splitting the rest of the crate relies on.

use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP, Context, EnumeratorP, ImplGraphP,
    TmpDataP, TrailP, WatchlistsP, WeightConstraintsP,
};
use crate::enumerator::ModelOutcome;
use crate::lit::Lit;
use crate::prop::{propagate, Conflict};
use crate::weight::{self, PropResult};

/// Propagate clauses and weight constraints to a joint fixpoint.
pub fn propagate_to_fixpoint(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TmpDataP,
        mut TrailP,
        mut WatchlistsP,
        WeightConstraintsP,
    ),
) -> Result<(), Conflict> {
    loop {
        propagate(ctx.borrow())?;

        if ctx.part(WeightConstraintsP).is_empty() {
            return Ok(());
        }

        match weight::propagate_fixpoint(ctx.borrow()) {
            PropResult::Fixpoint => return Ok(()),
            PropResult::Changed => continue,
            PropResult::Conflict(conflict) => return Err(conflict),
        }
    }
}

/// Outcome of committing a total assignment as a model.
pub enum ModelResult {
    /// Accept this model as the final result.
    Accept,
    /// No further model exists (or the enumeration limit was reached); this model was the last.
    Exhausted,
    /// The enumerator rejected this model; continue the search past the given conflict.
    Conflict(Conflict),
}

/// Run the enumerator over a freshly found total assignment.
pub fn on_model(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP, mut EnumeratorP, AssignmentP),
) -> ModelResult {
    let (assignment, mut ctx) = ctx.split_part(AssignmentP);

    let model_lits: Vec<Lit> = {
        let enumerator = ctx.part(EnumeratorP);

        if !enumerator.projection.is_empty() {
            enumerator
                .projection
                .iter()
                .copied()
                .filter(|&lit| assignment.lit_is_true(lit))
                .collect()
        } else {
            enumerator
                .minimize
                .iter()
                .flat_map(|terms| terms.true_lits(assignment))
                .collect()
        }
    };

    let outcome = ctx.part_mut(EnumeratorP).on_model(assignment, &model_lits);

    match outcome {
        ModelOutcome::Accept => ModelResult::Accept,
        ModelOutcome::Exhausted => ModelResult::Exhausted,
        ModelOutcome::Continue(clause) => {
            if clause.len() < 2 {
                // A single-literal (or empty) blocking clause means the search space collapses
                // to nothing further to try; treat it the same as exhaustion.
                ModelResult::Exhausted
            } else {
                ModelResult::Conflict(weight::build_conflict(ctx.borrow(), &clause))
            }
        }
    }
}
