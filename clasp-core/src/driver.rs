//! Incremental solving driver.
//!
//! [`Solver`] exposes a boolean-satisfiability interface: clauses and assumptions in terms of
//! [`clasp_formula::Lit`]. [`Driver`] sits one layer above it and speaks the language a grounder
//! does: ASPIF directives for the ground program seen so far, fed in increment by increment, with
//! [`Driver::start`]/[`Driver::next`] driving the actual search and [`Driver::stop`] available to
//! cancel it from another thread.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use clasp_aspif::Directive;
use clasp_formula::Lit;

use crate::assumptions;
use crate::builder::Builder;
use crate::cdcl::conflict_step;
use crate::context::{ensure_var_count, AssignmentP, AssumptionsP, Context, SolverStateP};
use crate::lit as internal;
use crate::state::SatState;

/// Outcome of a call to [`Driver::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverResult {
    /// A model was found. Retrieve it with [`Driver::model`].
    Sat,
    /// The ground program, under the current assumptions, has no further models.
    Unsat,
    /// [`Driver::stop`] was called before a result was reached.
    ///
    /// The search is left in the same state it was in before the call, so that a later call to
    /// [`Driver::next`] resumes it rather than starting over.
    Interrupted,
}

/// Drives incremental solving of a ground program fed in as ASPIF directives.
///
/// Use [`Driver::add_directive`] to feed directives for the current increment, then
/// [`Driver::start`] to finalize it and enable search, then [`Driver::next`] to look for a model.
/// Further directives for the next increment can be added once [`Driver::next`] has returned
/// [`DriverResult::Unsat`] (or after accepting a [`DriverResult::Sat`] result), starting the cycle
/// again.
pub struct Driver<'a> {
    ctx: Box<Context<'a>>,
    builder: Builder,
    interrupt: Arc<AtomicBool>,
    assumptions: Vec<Lit>,
}

impl<'a> Default for Driver<'a> {
    fn default() -> Self {
        Driver {
            ctx: Box::new(Context::default()),
            builder: Builder::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
            assumptions: vec![],
        }
    }
}

impl<'a> Driver<'a> {
    /// Create a new, empty driver.
    pub fn new() -> Driver<'a> {
        Driver::default()
    }

    /// Feed a single directive of the current increment into the ground program builder.
    pub fn add_directive(&mut self, directive: Directive) {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        self.builder.add_directive(ctx.borrow(), directive);
    }

    /// Finalize the current increment: emit completion clauses for every atom seen since the last
    /// call, and adopt any `Assume` directives seen so far as the active assumptions.
    ///
    /// Call this once all directives for the increment have been fed in, before [`Driver::next`].
    pub fn start(&mut self) {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        self.builder.finalize(ctx.borrow());
        self.assumptions.clear();
        self.assumptions.extend_from_slice(self.builder.assumptions());
        assumptions::set_assumptions(ctx.borrow(), &self.assumptions);
        ensure_var_count(ctx.borrow());
    }

    /// Search for a model of the current increment, under the current assumptions.
    ///
    /// Polls the interrupt flag between conflict analysis/restart/reduce steps; see
    /// [`Driver::interrupt_handle`].
    pub fn next(&mut self) -> DriverResult {
        let mut ctx = self.ctx.as_mut().into_partial_ref_mut();
        while ctx.part(SolverStateP).sat_state == SatState::Unknown {
            if self.interrupt.load(Ordering::Relaxed) {
                return DriverResult::Interrupted;
            }
            conflict_step(ctx.borrow());
        }
        match ctx.part(SolverStateP).sat_state {
            SatState::Unknown => unreachable!(),
            SatState::Sat => DriverResult::Sat,
            SatState::Unsat | SatState::UnsatUnderAssumptions => DriverResult::Unsat,
        }
    }

    /// Whether calling [`Driver::next`] again, after a [`DriverResult::Sat`] result, could find a
    /// different model.
    ///
    /// This depends on the configured [`crate::enumerator::EnumMode`]: recording/optimizing modes
    /// keep searching automatically within a single [`Driver::next`] call and report only the
    /// final outcome, so once `next` returns there is nothing further to ask for under the same
    /// assumptions.
    pub fn more(&self) -> bool {
        let ctx = self.ctx.as_ref().into_partial_ref();
        ctx.part(SolverStateP).sat_state == SatState::Unknown
    }

    /// Request cancellation of an in-progress [`Driver::next`] call.
    ///
    /// Can be called from another thread using the handle returned by
    /// [`Driver::interrupt_handle`].
    pub fn stop(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    /// A cloneable handle that can be used to call [`Driver::stop`]'s effect from another thread.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Clear a pending interrupt request so that a future [`Driver::next`] call is not cancelled
    /// immediately.
    pub fn clear_interrupt(&mut self) {
        self.interrupt.store(false, Ordering::Relaxed);
    }

    /// The model found by the last [`Driver::next`] call, if it returned [`DriverResult::Sat`].
    ///
    /// Atoms are reported using their ASPIF atom ids as the variable index.
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

    /// Subset of the current assumptions responsible for unsatisfiability, if the last
    /// [`Driver::next`] call returned [`DriverResult::Unsat`] because of them.
    pub fn unsat_core(&self) -> Option<&[Lit]> {
        let ctx = self.ctx.as_ref().into_partial_ref();
        if ctx.part(SolverStateP).sat_state == SatState::UnsatUnderAssumptions {
            Some(ctx.part(AssumptionsP).user_failed_core())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clasp_aspif::Body;

    fn lit(n: isize) -> Lit {
        Lit::from_dimacs(n)
    }

    #[test]
    fn single_increment_sat() {
        let mut driver = Driver::new();

        // 1 :- 2.
        // 2.
        driver.add_directive(Directive::Rule {
            choice: false,
            head: vec![1],
            body: Body::Normal(vec![lit(2)]),
        });
        driver.add_directive(Directive::Rule {
            choice: false,
            head: vec![2],
            body: Body::Normal(vec![]),
        });

        driver.start();

        assert_eq!(driver.next(), DriverResult::Sat);
        let model = driver.model().unwrap();
        assert!(model.contains(&lit(1)));
        assert!(model.contains(&lit(2)));
    }

    #[test]
    fn completion_propagates_through_body() {
        let mut driver = Driver::new();

        // 1 :- 2.
        driver.add_directive(Directive::Rule {
            choice: false,
            head: vec![1],
            body: Body::Normal(vec![lit(2)]),
        });
        // :- 2. (integrity constraint forcing atom 2 false)
        driver.add_directive(Directive::Rule {
            choice: false,
            head: vec![],
            body: Body::Normal(vec![lit(2)]),
        });

        driver.start();

        assert_eq!(driver.next(), DriverResult::Sat);
        let model = driver.model().unwrap();
        assert!(model.contains(&lit(-1)));
        assert!(model.contains(&lit(-2)));
    }

    #[test]
    fn assumption_forces_unsat() {
        let mut driver = Driver::new();

        // 1 :- 2.
        driver.add_directive(Directive::Rule {
            choice: false,
            head: vec![1],
            body: Body::Normal(vec![lit(2)]),
        });
        // :- 2. (atom 2, and by completion atom 1, are forced false)
        driver.add_directive(Directive::Rule {
            choice: false,
            head: vec![],
            body: Body::Normal(vec![lit(2)]),
        });
        driver.add_directive(Directive::Assume {
            lits: vec![lit(1)],
        });

        driver.start();

        assert_eq!(driver.next(), DriverResult::Unsat);
        assert_eq!(driver.unsat_core().unwrap(), &[lit(1)]);
    }

    #[test]
    fn interrupt_before_next_is_reported() {
        let mut driver = Driver::new();

        driver.add_directive(Directive::Rule {
            choice: true,
            head: vec![1],
            body: Body::Normal(vec![]),
        });
        driver.start();

        driver.stop();
        assert_eq!(driver.next(), DriverResult::Interrupted);

        driver.clear_interrupt();
        assert_eq!(driver.next(), DriverResult::Sat);
    }
}
