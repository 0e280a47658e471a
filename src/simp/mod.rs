//! The simplifier: conditional rewriting with simp lemmas, simplification procedures and
//! structural fallbacks over a bottom-up congruence traversal.

mod arith;
mod discharge;
mod fallbacks;
mod main;
mod match_unfold;
mod rewrite;
mod simprocs;
mod theorems;
mod types;

pub use arith::{certify_linear, ArithProcedure, LinearCombo, NatLinear};
pub use discharge::is_eqn_thm_hypothesis;
pub use main::simp;
pub use rewrite::{mk_default_methods, mk_methods};
pub use simprocs::{nat_numeral, Simprocs};
pub use theorems::{conclusion_sides, is_perm, ConclKind, Origin, SimpTheorem, SimpTheorems, DEFAULT_PRIORITY};
pub use types::{discharger, simproc, Config, Context, Discharge, Methods, Simp, SimpResult, Simproc, State, Step};
