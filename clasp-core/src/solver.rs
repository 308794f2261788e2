//! Search engine and constraint database entry point.
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use anyhow::Error;
use log::info;

use clasp_formula::{CnfFormula, Lit, Var};

use crate::assumptions;
use crate::cdcl::conflict_step;
use crate::checker::ProofProcessor;
use crate::context::{
    config_changed, ensure_var_count, AssignmentP, AssumptionsP, Context, ProofP, SolverConfigP,
    SolverStateP,
};
use crate::config::{SolverConfig, SolverConfigUpdate};
use crate::dimacs::{DimacsHeader, DimacsParser};
use crate::lit as internal;
use crate::load::load_clause;
use crate::state::SatState;
use crate::variables::{self, data::SamplingMode};

pub use crate::proof::ProofFormat;

/// A CDCL based search engine and constraint database.
///
/// The public interface of this type uses user-facing [`clasp_formula::Lit`]/[`Var`] values. The
/// solver renumbers and may eliminate variables internally; [`Solver::hide_var`],
/// [`Solver::witness_var`] and [`Solver::new_lits`] manage the mapping between user variables and
/// the solver's internal ones.
pub struct Solver<'a> {
    ctx: Box<Context<'a>>,
    scratch: Vec<Lit>,
}

impl<'a> Default for Solver<'a> {
    fn default() -> Self {
        Solver {
            ctx: Box::new(Context::default()),
            scratch: vec![],
        }
    }
}

impl<'a> Solver<'a> {
    /// Create a new solver.
    pub fn new() -> Solver<'a> {
        Solver::default()
    }

    /// Convert a slice of user literals to internal literals, registering new variables and
    /// resizing the context's per-variable storage as needed.
    fn to_internal(&mut self, user_lits: &[Lit]) -> Vec<internal::Lit> {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        variables::solver_from_user_lits(ctx.borrow(), &mut self.scratch, user_lits, true);
        ensure_var_count(ctx.borrow());
        self.scratch
            .iter()
            .map(|&lit| internal::Lit::from_external(lit))
            .collect()
    }

    /// Add a single clause.
    pub fn add_clause(&mut self, lits: &[Lit]) {
        let clause = self.to_internal(lits);
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        load_clause(ctx.borrow(), &clause);
    }

    /// Add a formula, i.e. a list of clauses.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        for clause in formula.iter() {
            self.add_clause(clause);
        }
    }

    /// Reads and adds a formula in DIMACS CNF format.
    ///
    /// Using this avoids creating a temporary [`CnfFormula`].
    pub fn add_dimacs_cnf(&mut self, input: impl io::Read) -> Result<(), Error> {
        use io::BufRead;

        let mut buffer = io::BufReader::new(input);
        let mut parser = DimacsParser::new();

        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);

            self.add_formula(&parser.take_formula());
        }
        parser.eof()?;
        self.add_formula(&parser.take_formula());
        parser.check_header()?;

        info!(
            "Parsed formula with {} variables and {} clauses",
            parser.var_count(),
            parser.clause_count()
        );

        Ok(())
    }

    /// Change the set of assumptions used for the next call to [`Solver::solve`].
    pub fn assume(&mut self, lits: &[Lit]) {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        assumptions::set_assumptions(ctx.borrow(), lits);
        ensure_var_count(ctx.borrow());
    }

    /// Subset of the current assumptions that caused the formula to be unsatisfiable under
    /// assumptions.
    ///
    /// Returns `None` unless the solver found the formula unsatisfiable under the last set of
    /// assumptions passed to [`Solver::assume`].
    pub fn failed_core(&self) -> Option<&[Lit]> {
        let ctx = self.ctx.as_ref().into_partial_ref();
        if ctx.part(SolverStateP).sat_state == SatState::UnsatUnderAssumptions {
            Some(ctx.part(AssumptionsP).user_failed_core())
        } else {
            None
        }
    }

    /// Check the satisfiability of the current formula, honoring the current assumptions.
    pub fn solve(&mut self) -> Result<bool, Error> {
        Ok(self
            .solve_with_interrupt(&AtomicBool::new(false))?
            .expect("solving without an interrupt flag cannot be interrupted"))
    }

    /// Check satisfiability, polling `interrupt` between conflict analysis/restart/reduce steps.
    ///
    /// Returns `Ok(None)` if `interrupt` was set before a result was reached, leaving the solver's
    /// state as [`SatState::Unknown`] so that solving can be resumed later.
    pub fn solve_with_interrupt(&mut self, interrupt: &AtomicBool) -> Result<Option<bool>, Error> {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        while ctx.part(SolverStateP).sat_state == SatState::Unknown {
            if interrupt.load(Ordering::Relaxed) {
                return Ok(None);
            }
            conflict_step(ctx.borrow());
        }
        Ok(match ctx.part(SolverStateP).sat_state {
            SatState::Unknown => None,
            SatState::Sat => Some(true),
            SatState::Unsat | SatState::UnsatUnderAssumptions => Some(false),
        })
    }

    /// Set of literals that satisfy the formula, using user variable names.
    pub fn model(&self) -> Option<Vec<Lit>> {
        let ctx = self.ctx.as_ref().into_partial_ref();
        if ctx.part(SolverStateP).sat_state == SatState::Sat {
            Some(
                ctx.part(AssignmentP)
                    .assignment()
                    .iter()
                    .enumerate()
                    .flat_map(|(index, assignment)| {
                        assignment.map(|polarity| {
                            internal::Lit::from_var(internal::Var::from_index(index), !polarity)
                                .to_external()
                        })
                    })
                    .collect(),
            )
        } else {
            None
        }
    }

    /// Allocate three fresh user literals.
    pub fn new_lits(&mut self) -> (Lit, Lit, Lit) {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        let mut next = || Var::positive(variables::new_user_var(ctx.borrow()));
        (next(), next(), next())
    }

    /// Hide a variable, removing it from the sampled/witness variables observed by the user.
    ///
    /// Panics if `var` is currently an assumption variable.
    pub fn hide_var(&mut self, var: Var) {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        let global = variables::global_from_user(ctx.borrow(), var, false);
        variables::set_sampling_mode(ctx.borrow(), global, SamplingMode::Hide);
    }

    /// Make a variable a witness variable: part of a found model, but not constrained to be
    /// equivalent between models with different sampling variable assignments.
    ///
    /// Panics if `var` is currently an assumption variable.
    pub fn witness_var(&mut self, var: Var) {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        let global = variables::global_from_user(ctx.borrow(), var, false);
        variables::set_sampling_mode(ctx.borrow(), global, SamplingMode::Witness);
    }

    /// Turn all currently hidden (internal) variables into witness variables and return them.
    pub fn observe_internal_vars(&mut self) -> Vec<Var> {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        variables::observe_internal_vars(ctx.borrow())
    }

    /// Update the solver configuration.
    pub fn config(&mut self, update: &SolverConfigUpdate) -> Result<(), Error> {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        update.apply_to(ctx.part_mut(SolverConfigP))?;
        config_changed(ctx.borrow(), update);
        Ok(())
    }

    /// The current solver configuration.
    pub fn config_ref(&self) -> &SolverConfig {
        &self.ctx.solver_config
    }

    /// Write the generated proof to `target`, in the given format.
    pub fn write_proof(&mut self, target: impl io::Write + 'a, format: ProofFormat) {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        ctx.part_mut(ProofP).write_proof(target, format);
    }

    /// Flush and close the currently active proof.
    pub fn close_proof(&mut self) -> Result<(), Error> {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        ctx.part_mut(ProofP).close_proof();
        Ok(())
    }

    /// Register a [`ProofProcessor`] that is fed every proof step as it is generated.
    ///
    /// This enables on the fly checking and also turns on the production of unsat cores without
    /// having to write an explicit proof.
    pub fn add_proof_processor(&mut self, processor: &'a mut dyn ProofProcessor) {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        ctx.part_mut(ProofP).add_processor(processor);
    }

    /// Enable on the fly checking of the generated proof, without requiring an explicit checker.
    pub fn enable_self_checking(&mut self) {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        ctx.part_mut(ProofP).begin_checking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::dimacs::write_dimacs;
    use clasp_formula::test::{sat_formula, sgen_unsat_formula};

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve().ok(), Some(false));
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve().ok(), Some(true));

            let model = solver.model().unwrap();

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sat_via_dimacs(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            let mut dimacs = vec![];

            write_dimacs(&mut dimacs, &formula).unwrap();

            solver.add_dimacs_cnf(&mut &dimacs[..]).unwrap();

            prop_assert_eq!(solver.solve().ok(), Some(true));

            let model = solver.model().unwrap();

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sgen_unsat_incremetal_clauses(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            let mut last_state = Some(true);

            for clause in formula.iter() {
                solver.add_clause(clause);

                let state = solver.solve().ok();
                if state != last_state {
                    prop_assert_eq!(state, Some(false));
                    prop_assert_eq!(last_state, Some(true));
                    last_state = state;
                }
            }

            prop_assert_eq!(last_state, Some(false));
        }
    }
}
