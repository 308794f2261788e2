//! Simplification using unit clauses.

use partial_ref::{partial, PartialRef};

use crate::binary::simplify_binary;
use crate::clause::db::filter_clauses;
use crate::context::{
    AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, ProofP, TmpDataP,
    TrailP, WatchlistsP,
};
use crate::proof::{self, clause_hash, lit_hash, DeleteClauseProof, ProofStep};

/// Remove satisfied clauses and false literals.
pub fn prove_units(
    mut ctx: partial!(
        Context,
        mut ImplGraphP,
        mut ProofP,
        mut TmpDataP,
        mut TrailP,
        AssignmentP,
        ClauseAllocP,
    ),
) -> bool {
    // TODO move this somewhere else?

    let mut new_unit = false;

    if ctx.part(TrailP).current_level() == 0 {
        let (impl_graph, mut ctx) = ctx.split_part_mut(ImplGraphP);

        let mut unit_proofs = vec![];

        let (trail, mut ctx) = ctx.split_part_mut(TrailP);
        let (tmp_data, mut ctx) = ctx.split_part_mut(TmpDataP);

        let ext_lits = &mut tmp_data.ext_lits;

        for &lit in trail.trail() {
            new_unit = true;
            let (proof, mut ctx) = ctx.split_part_mut(ProofP);
            if proof.prove_propagated_unit_clauses() {
                let ctx_lits = ctx.borrow();
                let reason = impl_graph.reason(lit.var());
                if !reason.is_unit() {
                    let lits = impl_graph.reason(lit.var()).lits(&ctx_lits);

                    ext_lits.clear();
                    ext_lits.extend(lits.iter().map(|lit| lit.to_external()));
                    let hash = clause_hash(&ext_lits[..]) ^ lit_hash(lit.to_external());

                    unit_proofs.push((lit.to_external(), hash));
                }
            }

            impl_graph.update_removed_unit(lit.var());
        }

        trail.clear();

        if !unit_proofs.is_empty() {
            ctx.part_mut(ProofP)
                .add_step(&ProofStep::UnitClauses(unit_proofs.into()));
        }
    }

    new_unit
}

/// Remove satisfied clauses and false literals.
pub fn simplify(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProofP,
        mut TmpDataP,
        mut WatchlistsP,
        AssignmentP,
    ),
) {
    simplify_binary(ctx.borrow());

    let (assignment, mut ctx) = ctx.split_part(AssignmentP);
    let (tmp_data, mut ctx) = ctx.split_part_mut(TmpDataP);

    let new_lits = &mut tmp_data.lits;
    let ext_lits = &mut tmp_data.ext_lits;

    let (ctx_2, mut ctx) = ctx.split_borrow();

    filter_clauses(ctx_2, |alloc, cref| {
        let clause = alloc.clause_mut(cref);
        new_lits.clear();
        for &lit in clause.lits() {
            match assignment.lit_value(lit) {
                None => new_lits.push(lit),
                Some(true) => {
                    ext_lits.clear();
                    ext_lits.extend(clause.lits().iter().map(|lit| lit.to_external()));
                    proof::add_step(
                        ctx.borrow(),
                        false,
                        &ProofStep::DeleteClause {
                            clause: &ext_lits[..],
                            proof: DeleteClauseProof::Satisfied,
                        },
                    );
                    return false;
                }
                Some(false) => (),
            }
        }
        if new_lits.len() < clause.lits().len() {
            if ctx.part(ProofP).is_active() {
                let hash = clause
                    .lits()
                    .iter()
                    .fold(0, |hash, &lit| hash ^ lit_hash(lit.to_external()));

                ext_lits.clear();
                ext_lits.extend(new_lits.iter().map(|lit| lit.to_external()));
                proof::add_step(
                    ctx.borrow(),
                    false,
                    &ProofStep::AtClause {
                        redundant: false,
                        clause: &ext_lits[..],
                        propagation_hashes: &[hash],
                    },
                );

                ext_lits.clear();
                ext_lits.extend(clause.lits().iter().map(|lit| lit.to_external()));
                proof::add_step(
                    ctx.borrow(),
                    false,
                    &ProofStep::DeleteClause {
                        clause: &ext_lits[..],
                        proof: DeleteClauseProof::Simplified,
                    },
                );
            }

            match new_lits[..] {
                // Cannot have empty or unit clauses after full propagation. An empty clause would
                // have been a conflict and a unit clause must be satisfied and thus would have been
                // dropped above.
                [] | [_] => unreachable!(),
                [lit_0, lit_1] => {
                    ctx.part_mut(BinaryClausesP)
                        .add_binary_clause([lit_0, lit_1]);
                    false
                }
                ref lits => {
                    clause.lits_mut()[..lits.len()].copy_from_slice(lits);
                    clause.header_mut().set_len(lits.len());
                    true
                }
            }
        } else {
            true
        }
    })
}
