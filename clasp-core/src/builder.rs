//! Translates ingested ASPIF directives into constraints against the shared context.
//!
//! Normal and choice rules are not completed as they stream in: a head atom can gain further
//! supporting rules later in the same (incremental) program, so the builder only records, per
//! atom, the literal that becomes true whenever one of its rule bodies holds. [`Builder::finalize`]
//! emits the completion clauses once the caller knows no further rules for the current step will
//! arrive. Sum/weight bodies skip this bookkeeping entirely: they are posted as [`WeightConstraint`]
//! s directly, since the weight constraint's own propagator already maintains the constraint
//! literal's biconditional with the body.
use std::collections::HashMap;

use partial_ref::{partial, PartialRef};

use clasp_aspif::{Atom, Body, Directive, ExternalValue};

use crate::context::{
    self, AnalyzeConflictP, AssignmentP, AssumptionsP, BinaryClausesP, ClauseAllocP, ClauseDbP,
    Context, EnumeratorP, ImplGraphP, ProofP, SolverStateP, TmpDataP, TrailP, VsidsP, WatchlistsP,
    WeightConstraintsP,
};
use crate::enumerator::MinimizeConstraint;
use crate::lit::{Lit, Var};
use crate::load::load_clause;
use crate::weight::WeightConstraint;

/// Whether an atom was declared by a choice rule or has at least one normal-rule body supporting
/// it, collected while a program is being built.
#[derive(Default)]
struct AtomSupport {
    /// Literals whose truth alone justifies the atom, one per supporting rule body.
    bodies: Vec<Lit>,
    /// Whether any rule declaring this atom as a head was a choice rule.
    choice: bool,
    /// Whether the grounder gave this atom an external value, exempting it from completion.
    external: bool,
}

/// Accumulates ground program directives and turns them into solver constraints.
///
/// One `Builder` corresponds to one incremental ASPIF program; call [`finalize`](Builder::finalize)
/// at each `Step` directive (or at end of input for a non-incremental program).
#[derive(Default)]
pub struct Builder {
    atoms: HashMap<Atom, AtomSupport>,
    max_atom: Atom,
    project: Option<Vec<Atom>>,
    assumptions: Vec<clasp_formula::Lit>,
    output: Vec<(String, Vec<clasp_formula::Lit>)>,
}

impl Builder {
    /// Create a new, empty builder.
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Output directives seen so far, as `(text, condition)` pairs.
    pub fn output(&self) -> &[(String, Vec<clasp_formula::Lit>)] {
        &self.output
    }

    /// Assumption literals accumulated from `Assume` directives.
    ///
    /// Later `Assume` directives replace earlier ones, matching ASPIF's "active assumptions"
    /// semantics.
    pub fn assumptions(&self) -> &[clasp_formula::Lit] {
        &self.assumptions
    }

    fn ensure_atom<'a>(
        &mut self,
        mut ctx: partial!(
            Context<'a>,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut BinaryClausesP,
            mut ImplGraphP,
            mut TmpDataP,
            mut VsidsP,
            mut WatchlistsP,
        ),
        atom: Atom,
    ) -> Lit {
        self.max_atom = self.max_atom.max(atom);
        let var_count = atom as usize;
        if ctx.part(AssignmentP).assignment().len() < var_count {
            context::set_var_count(ctx.borrow(), var_count);
        }
        Lit::from_var(Var::from_dimacs(atom as isize), false)
    }

    fn support_mut(&mut self, atom: Atom) -> &mut AtomSupport {
        self.atoms.entry(atom).or_insert_with(AtomSupport::default)
    }

    /// Feed a single directive into the builder.
    #[allow(clippy::too_many_arguments)]
    pub fn add_directive<'a>(
        &mut self,
        mut ctx: partial!(
            Context<'a>,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut AssumptionsP,
            mut BinaryClausesP,
            mut ClauseAllocP,
            mut ClauseDbP,
            mut EnumeratorP,
            mut ImplGraphP,
            mut ProofP<'a>,
            mut SolverStateP,
            mut TmpDataP,
            mut TrailP,
            mut VsidsP,
            mut WatchlistsP,
            mut WeightConstraintsP,
        ),
        directive: Directive,
    ) {
        match directive {
            Directive::Rule { choice, head, body } => self.add_rule(ctx.borrow(), choice, &head, body),
            Directive::Minimize { priority, terms } => self.add_minimize(ctx.borrow(), priority, terms),
            Directive::Project { atoms } => self.add_project(ctx.borrow(), atoms),
            Directive::Output { text, condition } => self.output.push((text, condition)),
            Directive::External { atom, value } => self.add_external(ctx.borrow(), atom, value),
            Directive::Assume { lits } => self.assumptions = lits,
            // Heuristic modifiers, acyclicity edges and theory atoms feed the decision heuristic,
            // the (external) unfounded-set checker and theory propagators respectively; none of
            // those are built here.
            Directive::Heuristic { .. } | Directive::Edge { .. } | Directive::Theory(_) => {}
            Directive::Comment(_) => {}
        }
    }

    fn add_rule<'a>(
        &mut self,
        mut ctx: partial!(
            Context<'a>,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut AssumptionsP,
            mut BinaryClausesP,
            mut ClauseAllocP,
            mut ClauseDbP,
            mut ImplGraphP,
            mut ProofP<'a>,
            mut SolverStateP,
            mut TmpDataP,
            mut TrailP,
            mut VsidsP,
            mut WatchlistsP,
            mut WeightConstraintsP,
        ),
        choice: bool,
        head: &[Atom],
        body: Body,
    ) {
        if head.is_empty() {
            // An integrity constraint: the body must never hold. Equivalent to a rule with a fresh
            // always-false head, i.e. just forbid the body directly.
            let body_lit = self.body_literal(ctx.borrow(), &body);
            load_clause(ctx.borrow(), &[!body_lit]);
            return;
        }

        let body_lit = self.body_literal(ctx.borrow(), &body);

        for &atom in head {
            self.ensure_atom(ctx.borrow(), atom);
            let support = self.support_mut(atom);
            support.bodies.push(body_lit);
            support.choice |= choice;
        }
    }

    /// Returns a literal that is true exactly when `body` holds.
    ///
    /// A single-literal normal body is used directly, skipping the fresh auxiliary atom other
    /// ground program builders always introduce; an empty body becomes the fresh constant "true"
    /// literal obtained by forcing it into the trail as a unit.
    fn body_literal<'a>(
        &mut self,
        mut ctx: partial!(
            Context<'a>,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut AssumptionsP,
            mut BinaryClausesP,
            mut ClauseAllocP,
            mut ClauseDbP,
            mut ImplGraphP,
            mut ProofP<'a>,
            mut SolverStateP,
            mut TmpDataP,
            mut TrailP,
            mut VsidsP,
            mut WatchlistsP,
            mut WeightConstraintsP,
        ),
        body: &Body,
    ) -> Lit {
        match body {
            Body::Normal(lits) => {
                let lits: Vec<Lit> = lits
                    .iter()
                    .map(|&lit| Lit::from_external(lit))
                    .inspect(|lit| {
                        self.ensure_atom(ctx.borrow(), lit.var().to_dimacs() as Atom);
                    })
                    .collect();

                match lits.len() {
                    0 => {
                        let fresh = self.fresh_var(ctx.borrow());
                        load_clause(ctx.borrow(), &[fresh]);
                        fresh
                    }
                    1 => lits[0],
                    _ => {
                        let fresh = self.fresh_var(ctx.borrow());

                        // fresh -> each body literal
                        for &lit in &lits {
                            load_clause(ctx.borrow(), &[!fresh, lit]);
                        }
                        // all body literals -> fresh
                        let mut clause: Vec<Lit> = lits.iter().map(|&lit| !lit).collect();
                        clause.push(fresh);
                        load_clause(ctx.borrow(), &clause);

                        fresh
                    }
                }
            }
            Body::Sum { bound, terms } => {
                let fresh = self.fresh_var(ctx.borrow());

                let mut lits = Vec::with_capacity(terms.len());
                let mut weights = Vec::with_capacity(terms.len());
                for &(lit, weight) in terms {
                    let lit = Lit::from_external(lit);
                    self.ensure_atom(ctx.borrow(), lit.var().to_dimacs() as Atom);
                    lits.push(lit);
                    weights.push(weight);
                }

                ctx.part_mut(WeightConstraintsP)
                    .add(WeightConstraint::new(fresh, lits, weights, *bound));

                fresh
            }
        }
    }

    /// Allocates a fresh solver variable not used by any ASPIF atom.
    ///
    /// Uses variable indices past every atom seen so far, so it can never collide with an atom the
    /// grounder assigns later.
    fn fresh_var<'a>(
        &mut self,
        mut ctx: partial!(
            Context<'a>,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut BinaryClausesP,
            mut ImplGraphP,
            mut TmpDataP,
            mut VsidsP,
            mut WatchlistsP,
        ),
    ) -> Lit {
        let next = ctx.part(AssignmentP).assignment().len().max(self.max_atom as usize) + 1;
        context::set_var_count(ctx.borrow(), next);
        self.max_atom = next as Atom;
        Lit::from_var(Var::from_dimacs(next as isize), false)
    }

    fn add_minimize<'a>(
        &mut self,
        mut ctx: partial!(Context<'a>, mut EnumeratorP),
        _priority: i64,
        terms: Vec<(clasp_formula::Lit, i64)>,
    ) {
        let terms: Vec<(Lit, i64)> = terms
            .into_iter()
            .map(|(lit, weight)| (Lit::from_external(lit), weight))
            .collect();
        ctx.part_mut(EnumeratorP)
            .minimize
            .push(MinimizeConstraint::new(terms));
    }

    fn add_project<'a>(&mut self, mut ctx: partial!(Context<'a>, mut EnumeratorP), atoms: Vec<Atom>) {
        self.project = Some(atoms.clone());
        let projection = &mut ctx.part_mut(EnumeratorP).projection;
        projection.clear();
        projection.extend(
            atoms
                .into_iter()
                .map(|atom| Lit::from_var(Var::from_dimacs(atom as isize), false)),
        );
    }

    fn add_external<'a>(
        &mut self,
        mut ctx: partial!(
            Context<'a>,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut BinaryClausesP,
            mut ImplGraphP,
            mut TmpDataP,
            mut VsidsP,
            mut WatchlistsP,
        ),
        atom: Atom,
        value: ExternalValue,
    ) {
        self.ensure_atom(ctx.borrow(), atom);
        let support = self.support_mut(atom);
        support.external = true;

        match value {
            ExternalValue::Free | ExternalValue::True | ExternalValue::False => {
                // Treated like a choice atom: completion never forces it false for lack of a
                // rule body. `True`/`False` only fix its default value, which a later rule or an
                // explicit assumption can still override at solve time.
                support.choice = true;
            }
            ExternalValue::Release => {
                // Releasing an external atom without a defining rule leaves it unconstrained,
                // same as `Free`. Retracting an external that since gained rules is not supported
                // here: incremental retraction of ground rules is out of scope.
                support.choice = true;
            }
        }
    }

    /// Emits Clark completion clauses for every atom seen since the builder was created (or since
    /// the last call to `finalize`).
    ///
    /// Atoms that were never the head of any rule and were never marked external default to
    /// false, mirroring stable model semantics for unsupported atoms.
    pub fn finalize<'a>(
        &mut self,
        mut ctx: partial!(
            Context<'a>,
            mut AnalyzeConflictP,
            mut AssignmentP,
            mut AssumptionsP,
            mut BinaryClausesP,
            mut ClauseAllocP,
            mut ClauseDbP,
            mut ImplGraphP,
            mut ProofP<'a>,
            mut SolverStateP,
            mut TmpDataP,
            mut TrailP,
            mut VsidsP,
            mut WatchlistsP,
        ),
    ) {
        for (&atom, support) in self.atoms.iter() {
            let atom_lit = Lit::from_var(Var::from_dimacs(atom as isize), false);

            if support.bodies.is_empty() {
                if !support.choice {
                    load_clause(ctx.borrow(), &[!atom_lit]);
                }
                continue;
            }

            // Every supporting body implies the atom.
            for &body_lit in &support.bodies {
                load_clause(ctx.borrow(), &[!body_lit, atom_lit]);
            }

            // A non-choice atom additionally requires at least one supporting body to hold.
            if !support.choice {
                let mut clause = vec![!atom_lit];
                clause.extend(support.bodies.iter().copied());
                load_clause(ctx.borrow(), &clause);
            }
        }

        self.atoms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::context::{AssignmentP, SolverStateP};
    use crate::state::SatState;

    fn lit(n: i64) -> clasp_formula::Lit {
        clasp_formula::Lit::from_dimacs(n as isize)
    }

    #[test]
    fn normal_rule_completion() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        let mut builder = Builder::new();

        // 1 :- 2, 3.
        builder.add_directive(
            ctx.borrow(),
            Directive::Rule {
                choice: false,
                head: vec![1],
                body: Body::Normal(vec![lit(2), lit(3)]),
            },
        );
        builder.finalize(ctx.borrow());

        assert!(ctx.part(AssignmentP).assignment().len() >= 3);

        load_clause(ctx.borrow(), &[crate::lit::Lit::from_dimacs(2)]);
        load_clause(ctx.borrow(), &[crate::lit::Lit::from_dimacs(3)]);

        while ctx.part(SolverStateP).sat_state == SatState::Unknown {
            crate::cdcl::conflict_step(ctx.borrow());
        }

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Sat);
        assert_eq!(
            ctx.part(AssignmentP).lit_value(crate::lit::Lit::from_dimacs(1)),
            Some(true)
        );
    }

    #[test]
    fn unsupported_atom_is_false() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        let mut builder = Builder::new();

        // 2 :- 1. (atom 1 never appears as a head, so it defaults to false, forcing 2 false too)
        builder.add_directive(
            ctx.borrow(),
            Directive::Rule {
                choice: false,
                head: vec![2],
                body: Body::Normal(vec![lit(1)]),
            },
        );
        builder.finalize(ctx.borrow());

        while ctx.part(SolverStateP).sat_state == SatState::Unknown {
            crate::cdcl::conflict_step(ctx.borrow());
        }

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Sat);
        assert_eq!(
            ctx.part(AssignmentP).lit_value(crate::lit::Lit::from_dimacs(1)),
            Some(false)
        );
        assert_eq!(
            ctx.part(AssignmentP).lit_value(crate::lit::Lit::from_dimacs(2)),
            Some(false)
        );
    }

    #[test]
    fn choice_rule_is_unconstrained() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        let mut builder = Builder::new();

        // {1}.
        builder.add_directive(
            ctx.borrow(),
            Directive::Rule {
                choice: true,
                head: vec![1],
                body: Body::Normal(vec![]),
            },
        );
        builder.finalize(ctx.borrow());

        while ctx.part(SolverStateP).sat_state == SatState::Unknown {
            crate::cdcl::conflict_step(ctx.borrow());
        }

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Sat);
    }
}
