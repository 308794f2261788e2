//! A CDCL-based search engine and constraint database for ASP, SAT and PB solving.
#[macro_use]
pub mod lit;
pub mod checker;
pub mod cnf;
pub mod config;
pub mod dimacs;
pub mod driver;
pub mod enumerator;
pub mod model;
pub mod proof;
pub mod solver;
pub mod state;

mod analyze_conflict;
mod assumptions;
mod binary;
mod builder;
mod cdcl;
mod clause;
mod context;
mod decision;
mod glue;
mod load;
mod post_propagator;
mod prop;
mod schedule;
mod simplify;
mod tmp;
mod variables;
mod vec_mut_scan;
mod vli_enc;
mod weight;

#[cfg(test)]
mod test;

pub use clasp_formula::{CnfFormula, ExtendFormula, Lit, Var};
pub use proof::ProofFormat;
pub use solver::Solver;
