use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::ac_lt::{AcLt, ExprOrder};
use crate::expr::{mk_app, Expr};
use crate::meta::Meta;

use super::arith::{ArithProcedure, NatLinear};
use super::theorems::{Origin, SimpTheorems};

#[derive(Debug, Clone)]
pub struct Config {
    pub max_steps: usize,
    /// Upper bound on the nested simplifier runs started by default discharge during one
    /// top-level call.
    pub max_discharge_depth: usize,
    pub decide: bool,
    pub ground: bool,
    pub arith: bool,
    pub single_pass: bool,
    pub use_erased: bool,
    pub catch_runtime: bool,
    pub memoize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_steps: 100_000,
            max_discharge_depth: 2,
            decide: false,
            ground: false,
            arith: false,
            single_pass: false,
            use_erased: false,
            catch_runtime: false,
            memoize: true,
        }
    }
}

impl Config {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_discharge_depth(mut self, depth: usize) -> Self {
        self.max_discharge_depth = depth;
        self
    }

    pub fn with_decide(mut self, decide: bool) -> Self {
        self.decide = decide;
        self
    }

    pub fn with_ground(mut self, ground: bool) -> Self {
        self.ground = ground;
        self
    }

    pub fn with_arith(mut self, arith: bool) -> Self {
        self.arith = arith;
        self
    }

    pub fn with_single_pass(mut self, single_pass: bool) -> Self {
        self.single_pass = single_pass;
        self
    }

    pub fn with_use_erased(mut self, use_erased: bool) -> Self {
        self.use_erased = use_erased;
        self
    }

    pub fn with_catch_runtime(mut self, catch_runtime: bool) -> Self {
        self.catch_runtime = catch_runtime;
        self
    }

    pub fn with_memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }
}

/// The outcome of simplifying an expression: the new expression and a proof that the
/// old one equals it. A missing proof means the two are definitionally equal.
#[derive(Debug, Clone)]
pub struct SimpResult {
    pub expr: Expr,
    pub proof: Option<Expr>,
    pub cache: bool,
}

impl SimpResult {
    pub fn new(expr: Expr) -> Self {
        SimpResult {
            expr,
            proof: None,
            cache: true,
        }
    }

    pub fn with_proof(expr: Expr, proof: Expr) -> Self {
        SimpResult {
            expr,
            proof: Some(proof),
            cache: true,
        }
    }

    /// The equality proof, `Eq.refl` when the step was definitional.
    pub fn get_proof(&self, meta: &mut Meta) -> anyhow::Result<Expr> {
        match &self.proof {
            Some(h) => Ok(h.clone()),
            None => meta.mk_eq_refl(&self.expr),
        }
    }

    /// Composes `self : a = b` with `next : b = c`.
    pub fn mk_eq_trans(self, meta: &mut Meta, next: SimpResult) -> anyhow::Result<SimpResult> {
        let cache = self.cache && next.cache;
        let proof = match (self.proof, next.proof) {
            (None, p) | (p, None) => p,
            (Some(h1), Some(h2)) => Some(meta.mk_eq_trans(&h1, &h2)?),
        };
        Ok(SimpResult {
            expr: next.expr,
            proof,
            cache,
        })
    }

    /// Applies the result, an equation between functions, to `extra_args`.
    pub fn add_extra_args(self, meta: &mut Meta, extra_args: &[Expr]) -> anyhow::Result<SimpResult> {
        let mut expr = self.expr;
        let mut proof = self.proof;
        for arg in extra_args {
            expr = mk_app(expr, arg.clone());
            proof = match proof {
                Some(h) => Some(meta.mk_congr_fun(&h, arg)?),
                None => None,
            };
        }
        Ok(SimpResult {
            expr,
            proof,
            cache: self.cache,
        })
    }
}

/// What a `pre` or `post` procedure asks the traversal to do next.
#[derive(Debug, Clone)]
pub enum Step {
    /// Simplify the result again.
    Visit(SimpResult),
    /// Stop here with this result.
    Done(SimpResult),
    /// Keep going with the remaining procedures, possibly from a rewritten expression.
    Continue(Option<SimpResult>),
}

pub type Simproc = Arc<dyn Fn(&mut Simp<'_>, &Expr) -> anyhow::Result<Step>>;

pub type Discharge = Arc<dyn Fn(&mut Simp<'_>, &Expr) -> anyhow::Result<Option<Expr>>>;

pub fn simproc(f: impl Fn(&mut Simp<'_>, &Expr) -> anyhow::Result<Step> + 'static) -> Simproc {
    Arc::new(f)
}

pub fn discharger(
    f: impl Fn(&mut Simp<'_>, &Expr) -> anyhow::Result<Option<Expr>> + 'static,
) -> Discharge {
    Arc::new(f)
}

/// The procedures the traversal calls at every subterm.
#[derive(Clone)]
pub struct Methods {
    pub pre: Simproc,
    pub post: Simproc,
    /// `None` selects the default discharger.
    pub discharge: Option<Discharge>,
}

impl std::fmt::Debug for Methods {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Methods")
            .field("discharge", &self.discharge.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Context {
    pub config: Config,
    pub simp_theorems: SimpTheorems,
    pub order: Arc<dyn ExprOrder>,
    pub arith: Arc<dyn ArithProcedure>,
}

impl Context {
    pub fn new(config: Config, simp_theorems: SimpTheorems) -> Self {
        Context {
            config,
            simp_theorems,
            order: Arc::new(AcLt::new(true)),
            arith: Arc::new(NatLinear),
        }
    }

    pub fn with_order(mut self, order: impl ExprOrder + 'static) -> Self {
        self.order = Arc::new(order);
        self
    }

    pub fn with_arith(mut self, arith: impl ArithProcedure + 'static) -> Self {
        self.arith = Arc::new(arith);
        self
    }
}

/// Mutable state of one top-level simplification call.
#[derive(Debug, Default, Clone)]
pub struct State {
    pub cache: HashMap<Expr, SimpResult>,
    pub num_steps: usize,
    /// Nested simplifier runs started by default discharge so far. Never decreases
    /// within a call.
    pub discharge_depth: usize,
    pub used_theorems: IndexSet<Origin>,
}

/// The simplifier handle threaded through every procedure.
pub struct Simp<'a> {
    pub meta: Meta<'a>,
    pub ctx: Context,
    pub methods: Methods,
    pub state: State,
    pub(super) in_discharge: usize,
}

impl<'a> Simp<'a> {
    pub fn new(meta: Meta<'a>, ctx: Context, methods: Methods) -> Self {
        Simp {
            meta,
            ctx,
            methods,
            state: State::default(),
            in_discharge: 0,
        }
    }

    /// Runs `step` and, unless it already finished or asked for a revisit, continues with
    /// `f` on the (possibly rewritten) expression, composing proofs along the way.
    pub fn and_then(
        &mut self,
        e: &Expr,
        step: Step,
        f: impl FnOnce(&mut Self, &Expr) -> anyhow::Result<Step>,
    ) -> anyhow::Result<Step> {
        match step {
            Step::Done(_) | Step::Visit(_) => Ok(step),
            Step::Continue(None) => f(self, e),
            Step::Continue(Some(r)) => {
                let e = r.expr.clone();
                Ok(match f(self, &e)? {
                    Step::Done(r2) => Step::Done(r.mk_eq_trans(&mut self.meta, r2)?),
                    Step::Visit(r2) => Step::Visit(r.mk_eq_trans(&mut self.meta, r2)?),
                    Step::Continue(None) => Step::Continue(Some(r)),
                    Step::Continue(Some(r2)) => {
                        Step::Continue(Some(r.mk_eq_trans(&mut self.meta, r2)?))
                    }
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{mk_nat_lit, BinderInfo};
    use crate::prelude::{self, lam, nat, nat_succ};

    #[test]
    fn results_compose() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let a = SimpResult::new(mk_nat_lit(1));
        let b = SimpResult::new(mk_nat_lit(1));
        let r = a.mk_eq_trans(&mut meta, b).unwrap();
        assert!(r.proof.is_none());

        let h = meta.mk_eq_refl(&mk_nat_lit(2)).unwrap();
        let a = SimpResult::new(mk_nat_lit(2));
        let b = SimpResult::with_proof(mk_nat_lit(2), h.clone());
        let r = a.mk_eq_trans(&mut meta, b).unwrap();
        assert_eq!(r.proof, Some(h.clone()));
        let r = r.clone().mk_eq_trans(&mut meta, SimpResult::with_proof(mk_nat_lit(2), h)).unwrap();
        insta::assert_snapshot!(r.proof.unwrap(), @"Eq.trans Nat 2 2 2 (Eq.refl Nat 2) (Eq.refl Nat 2)");
    }

    #[test]
    fn extra_args_use_congr_fun() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let f = lam("x", BinderInfo::Default, nat(), nat_succ);
        let h = meta.mk_eq_refl(&f).unwrap();
        let r = SimpResult::with_proof(f.clone(), h)
            .add_extra_args(&mut meta, &[mk_nat_lit(4)])
            .unwrap();
        let ty = meta.infer_type(&r.proof.unwrap()).unwrap();
        let ty = meta.instantiate_mvars(&ty);
        let parts = crate::app_builder::eq_parts(&ty).unwrap();
        assert_eq!(parts.rhs, mk_app(f, mk_nat_lit(4)));
    }
}
