//! A conditional term-rewriting simplifier for a dependently typed core calculus.
//!
//! The meta layer ([meta], [unify], [synth], [app_builder]) provides the services the
//! simplifier relies on; [simp] holds the rewriting engine itself.

pub mod ac_lt;
pub mod app_builder;
pub mod discr_tree;
pub mod env;
pub mod error;
pub mod expr;
pub mod mctx;
pub mod meta;
pub mod prelude;
pub mod simp;
pub mod synth;
pub mod unify;
