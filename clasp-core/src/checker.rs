//! Check unsatisfiability proofs.
//!
//! The actual checking logic lives in the `clasp-checker` crate, which implements a full
//! RUP/LRAT-style checker for the native proof format emitted by [`crate::proof::Proof`]. This
//! module re-exports that crate's public surface under the path solver code and tests expect, and
//! adds the LRAT proof processor.

mod write_lrat;

pub use clasp_checker::{
    CheckedProofStep, CheckedSamplingMode, CheckedUserVar, Checker, CheckerError, CheckerData,
    ProofProcessor, ProofTranscriptProcessor, ProofTranscriptStep,
};

pub use write_lrat::WriteLrat;
