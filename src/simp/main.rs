//! The traversal: `pre`, congruence over application spines, `post`, and revisits until
//! a fixpoint is reached.

use anyhow::bail;

use crate::error::Exception;
use crate::expr::{mk_app, mk_mdata, Expr};
use crate::meta::{Meta, TransparencyMode};

use super::rewrite::mk_methods;
use super::simprocs::Simprocs;
use super::types::{Context, Discharge, Simp, SimpResult, State, Step};

impl<'a> Simp<'a> {
    /// Top-level entry: fresh state, `Instances` transparency, and a fully instantiated
    /// result.
    pub fn run(&mut self, e: &Expr) -> anyhow::Result<SimpResult> {
        self.state = State::default();
        self.in_discharge = 0;
        let e = self.meta.instantiate_mvars(e);
        let saved = self.meta.config.transparency;
        self.meta.config.transparency = TransparencyMode::Instances;
        let result = self.simp(&e);
        self.meta.config.transparency = saved;
        let result = result?;
        Ok(SimpResult {
            expr: self.meta.instantiate_mvars(&result.expr),
            proof: result.proof.map(|h| self.meta.instantiate_mvars(&h)),
            cache: result.cache,
        })
    }

    /// Simplifies `target` and returns the new expression together with a proof of
    /// `target = new`, `Eq.refl` if nothing changed.
    pub fn simp_target(&mut self, target: &Expr) -> anyhow::Result<(Expr, Expr)> {
        let r = self.run(target)?;
        let proof = r.get_proof(&mut self.meta)?;
        Ok((r.expr, proof))
    }

    /// The recursive entry point, also used by discharge and match unfolding.
    pub fn simp(&mut self, e: &Expr) -> anyhow::Result<SimpResult> {
        let e = self.meta.instantiate_mvars(e);
        if let Some(r) = self.state.cache.get(&e) {
            return Ok(r.clone());
        }
        if self.meta.is_proof(&e)? {
            return Ok(SimpResult::new(e));
        }
        self.meta.inc_rec_depth()?;
        let r = self.simp_loop(&e);
        self.meta.dec_rec_depth();
        let r = r?;
        self.cache_result(&e, &r);
        Ok(r)
    }

    fn cache_result(&mut self, e: &Expr, r: &SimpResult) {
        if self.ctx.config.memoize && self.in_discharge == 0 && r.cache && !e.has_mvar() {
            self.state.cache.insert(e.clone(), r.clone());
        }
    }

    fn simp_loop(&mut self, e: &Expr) -> anyhow::Result<SimpResult> {
        if self.state.num_steps >= self.ctx.config.max_steps {
            bail!(Exception::MaxSteps(self.ctx.config.max_steps));
        }
        self.state.num_steps += 1;
        let pre = self.methods.pre.clone();
        match pre(self, e)? {
            Step::Done(r) => Ok(r),
            Step::Visit(r) => {
                let next = self.simp(&r.expr)?;
                r.mk_eq_trans(&mut self.meta, next)
            }
            Step::Continue(r) => {
                let r = r.unwrap_or_else(|| SimpResult::new(e.clone()));
                self.visit_pre_continue(e, r)
            }
        }
    }

    fn visit_pre_continue(&mut self, e: &Expr, r: SimpResult) -> anyhow::Result<SimpResult> {
        let reduced = r.expr.head_beta();
        if reduced != r.expr {
            let r = SimpResult { expr: reduced, ..r };
            let next = self.simp(&r.expr)?;
            return r.mk_eq_trans(&mut self.meta, next);
        }
        let step = self.congr(&r.expr)?;
        let r = r.mk_eq_trans(&mut self.meta, step)?;
        self.visit_post(e, r)
    }

    fn visit_post(&mut self, e: &Expr, r: SimpResult) -> anyhow::Result<SimpResult> {
        let post = self.methods.post.clone();
        match post(self, &r.expr)? {
            Step::Done(r2) => r.mk_eq_trans(&mut self.meta, r2),
            Step::Continue(None) => self.visit_post_continue(e, r),
            Step::Visit(r2) | Step::Continue(Some(r2)) => {
                let r = r.mk_eq_trans(&mut self.meta, r2)?;
                self.visit_post_continue(e, r)
            }
        }
    }

    fn visit_post_continue(&mut self, e: &Expr, r: SimpResult) -> anyhow::Result<SimpResult> {
        if self.ctx.config.single_pass || *e == r.expr {
            return Ok(r);
        }
        let next = self.simp(&r.expr)?;
        r.mk_eq_trans(&mut self.meta, next)
    }

    /// One congruence step. Binders are left alone.
    fn congr(&mut self, e: &Expr) -> anyhow::Result<SimpResult> {
        match e {
            Expr::App(_) => self.congr_args(e),
            Expr::MData(inner) => {
                let r = self.simp(&inner.expr)?;
                Ok(SimpResult {
                    expr: mk_mdata(inner.data.clone(), r.expr),
                    ..r
                })
            }
            _ => Ok(SimpResult::new(e.clone())),
        }
    }

    /// Simplifies the explicit, non-dependent arguments of an application.
    fn congr_args(&mut self, e: &Expr) -> anyhow::Result<SimpResult> {
        let f = e.get_app_fn().clone();
        let args = e.get_app_args();
        let mut r = if matches!(f, Expr::Const(_) | Expr::FVar(_)) {
            SimpResult::new(f.clone())
        } else {
            self.simp(&f)?
        };
        let mut f_ty = self.meta.infer_type(&f)?;
        for arg in &args {
            if !f_ty.is_forall() {
                f_ty = self.meta.whnf(&f_ty)?;
            }
            let simp_arg = match &f_ty {
                Expr::ForallE(binder) => !binder.body.has_loose_bvar(0),
                _ => false,
            };
            f_ty = match &f_ty {
                Expr::ForallE(binder) => binder.body.instantiate1(arg),
                _ => f_ty.clone(),
            };
            let arg_r = if simp_arg {
                self.simp(arg)?
            } else {
                SimpResult::new(arg.clone())
            };
            r = self.mk_congr_result(r, arg, arg_r)?;
        }
        if log::log_enabled!(target: "simp::congr", log::Level::Trace) && r.proof.is_some() {
            log::trace!(target: "simp::congr", "{e} ==> {}", r.expr);
        }
        Ok(r)
    }

    fn mk_congr_result(&mut self, f: SimpResult, arg: &Expr, a: SimpResult) -> anyhow::Result<SimpResult> {
        let cache = f.cache && a.cache;
        let expr = mk_app(f.expr.clone(), a.expr.clone());
        let proof = match (&f.proof, &a.proof) {
            (None, None) => None,
            (Some(hf), None) => Some(self.meta.mk_congr_fun(hf, arg)?),
            (None, Some(ha)) => Some(self.meta.mk_congr_arg(&f.expr, ha)?),
            (Some(hf), Some(ha)) => Some(self.meta.mk_congr(hf, ha)?),
        };
        Ok(SimpResult { expr, proof, cache })
    }
}

/// Simplifies `e` with the default method bundle built from `simprocs` and `discharge`.
pub fn simp(
    meta: Meta<'_>,
    e: &Expr,
    ctx: Context,
    simprocs: Simprocs,
    discharge: Option<Discharge>,
) -> anyhow::Result<SimpResult> {
    let methods = mk_methods(simprocs, discharge);
    Simp::new(meta, ctx, methods).run(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{mk_nat_lit, BinderInfo, Name};
    use crate::prelude::{self, nat, nat_add, nat_eq, nat_succ, pi};
    use crate::simp::{mk_default_methods, Config, SimpTheorems, DEFAULT_PRIORITY};

    #[test]
    fn congruence_under_applications() {
        let env = prelude::mk_env().unwrap();
        let ctx = Context::new(Config::default(), SimpTheorems::new());
        let mut s = Simp::new(Meta::new(&env), ctx, mk_default_methods(Simprocs::default_nat()));
        let x = s.meta.add_local_decl(Name::intern("x"), BinderInfo::Default, nat());
        let e = nat_succ(nat_add(x.clone(), nat_add(mk_nat_lit(2), mk_nat_lit(3))));
        let r = s.run(&e).unwrap();
        assert_eq!(r.expr, nat_succ(nat_add(x, mk_nat_lit(5))));
        // literal folding is definitional
        assert!(r.proof.is_none());
    }

    #[test]
    fn max_steps_is_runtime() {
        let mut env = prelude::mk_env().unwrap();
        let grow = Name::intern("grow");
        let ty = pi("a", BinderInfo::Default, nat(), |a| {
            let lhs = nat_add(a, mk_nat_lit(0));
            nat_eq(lhs.clone(), nat_add(lhs, mk_nat_lit(0)))
        });
        env.add_axiom(grow.clone(), vec![], ty).unwrap();
        let mut meta = Meta::new(&env);
        let mut thms = SimpTheorems::new();
        thms.add_const(&mut meta, &grow, true, DEFAULT_PRIORITY).unwrap();
        let ctx = Context::new(Config::default().with_max_steps(50), thms);
        let e = nat_add(mk_nat_lit(1), mk_nat_lit(0));
        let err = simp(meta, &e, ctx, Simprocs::new(), None).unwrap_err();
        assert!(matches!(err.downcast_ref::<Exception>(), Some(Exception::MaxSteps(50))));
    }
}
