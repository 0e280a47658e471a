//! Rewriting with simp lemmas: candidate retrieval, per-lemma trials and the default
//! `pre`/`post` method bundle.

use std::sync::Arc;

use crate::error::RecoverExt;
use crate::expr::{mk_app_n, BinderInfo, Expr, Name};
use crate::mctx::MetavarKind;
use crate::meta::TransparencyMode;

use super::simprocs::Simprocs;
use super::theorems::{conclusion_sides, ConclKind, SimpTheorem};
use super::types::{simproc, Discharge, Methods, Simp, SimpResult, Step};

impl<'a> Simp<'a> {
    /// Tries the lemmas of one phase on `e`, best candidate first, and returns the first
    /// rewrite that goes through.
    pub fn rewrite(&mut self, e: &Expr, pre: bool) -> anyhow::Result<Option<SimpResult>> {
        let tree = if pre {
            &self.ctx.simp_theorems.pre
        } else {
            &self.ctx.simp_theorems.post
        };
        let mut candidates = tree.get_match_with_extra(&mut self.meta, e)?;
        if candidates.is_empty() {
            log::trace!(target: "simp::rewrite", "no theorems found for {}-rewriting {e}", phase(pre));
            return Ok(None);
        }
        candidates.sort_by(|(a, _), (b, _)| b.priority.cmp(&a.priority).then(a.index.cmp(&b.index)));
        for (thm, num_extra) in candidates {
            if !self.ctx.config.use_erased && self.ctx.simp_theorems.is_erased(&thm.origin) {
                continue;
            }
            let r = self
                .try_theorem_with_extra_args(e, &thm, num_extra, None)
                .or_recover(false)?;
            if let Some(r) = r {
                log::trace!(target: "simp::rewrite", "rewrite result {e} ==> {}", r.expr);
                return Ok(Some(r));
            }
        }
        Ok(None)
    }

    fn try_theorem_with_extra_args(
        &mut self,
        e: &Expr,
        thm: &SimpTheorem,
        num_extra: usize,
        transparency: Option<TransparencyMode>,
    ) -> anyhow::Result<Option<SimpResult>> {
        if num_extra == 0 {
            return self.try_theorem(e, thm, transparency);
        }
        let args = e.get_app_args();
        if num_extra > args.len() {
            return Ok(None);
        }
        let extra = &args[args.len() - num_extra..];
        let head = e.strip_args(num_extra);
        match self.try_theorem(&head, thm, transparency)? {
            Some(r) => Ok(Some(r.add_extra_args(&mut self.meta, extra)?)),
            None => Ok(None),
        }
    }

    /// One lemma trial in its own metavariable scope. Every assignment made while
    /// matching is local to the trial.
    pub fn try_theorem(
        &mut self,
        e: &Expr,
        thm: &SimpTheorem,
        transparency: Option<TransparencyMode>,
    ) -> anyhow::Result<Option<SimpResult>> {
        let saved = self.meta.enter_scope(true);
        let r = self.try_theorem_core(e, thm, transparency);
        self.meta.exit_scope(saved);
        r
    }

    /// Matches, synthesizes the hypotheses, then builds the step. A permutative lemma is
    /// applied only when the instantiated right-hand side precedes the target in the
    /// expression order. The check runs for every permutative lemma, not only when the
    /// two sides are structurally equal, so `a + b = b + a` cannot loop.
    fn try_theorem_core(
        &mut self,
        e: &Expr,
        thm: &SimpTheorem,
        transparency: Option<TransparencyMode>,
    ) -> anyhow::Result<Option<SimpResult>> {
        let tracing = log::log_enabled!(target: "simp::rewrite", log::Level::Trace);
        let proof = thm.instantiate_proof(&mut self.meta);
        let ty = self.meta.infer_type(&proof)?;
        let ty = self.meta.instantiate_mvars(&ty);
        let (xs, bis, concl) = self.meta.forall_meta_telescope(&ty, MetavarKind::SyntheticOpaque);
        let (lhs, rhs, kind) = conclusion_sides(&concl);

        let unified = match transparency {
            Some(mode) => self.meta.with_transparency(mode, |meta| meta.is_def_eq(&lhs, e))?,
            None => self.meta.is_def_eq(&lhs, e)?,
        };
        if !unified {
            if !e.is_mvar() && log::log_enabled!(target: "simp::unify", log::Level::Trace) {
                log::trace!(target: "simp::unify", "{thm}, failed to unify {lhs} =?= {e}");
            }
            return Ok(None);
        }

        if !self.synthesize_args(thm, &xs, &bis)? {
            return Ok(None);
        }

        let proof = self.meta.instantiate_mvars(&mk_app_n(proof, &xs));
        let rhs = self.meta.instantiate_mvars(&rhs);
        if self.meta.has_assignable_mvar(&proof) || self.meta.has_assignable_mvar(&rhs) {
            if tracing {
                log::trace!(target: "simp::rewrite", "{thm}, resulting expression has unassigned metavariables");
            }
            return Ok(None);
        }

        if thm.perm {
            let e = self.meta.instantiate_mvars(e);
            if !self.ctx.order.lt(&rhs, &e) {
                if tracing {
                    log::trace!(target: "simp::rewrite", "{thm}, perm rejected {e} ==> {rhs}");
                }
                return Ok(None);
            }
        }

        let proof = match kind {
            ConclKind::Eq if thm.rfl => None,
            ConclKind::Eq => Some(proof),
            ConclKind::EqTrue => Some(self.meta.mk_eq_true(&proof)?),
            ConclKind::EqFalse => Some(self.meta.mk_eq_false(&proof)?),
        };
        if tracing {
            log::trace!(target: "simp::rewrite", "{thm}, {e} ==> {rhs}");
        }
        self.state.used_theorems.insert(thm.origin.clone());
        Ok(Some(SimpResult {
            expr: rhs,
            proof,
            cache: true,
        }))
    }

    /// Fills the lemma parameters that matching left open: instances by synthesis,
    /// hypotheses by discharge. Hypotheses that cannot be discharged yet are retried once
    /// after the other parameters are in place.
    fn synthesize_args(&mut self, thm: &SimpTheorem, xs: &[Expr], bis: &[BinderInfo]) -> anyhow::Result<bool> {
        let mut postponed = vec![];
        for (x, bi) in xs.iter().zip(bis) {
            if !self.meta.instantiate_mvars(x).is_mvar() {
                continue;
            }
            let ty = self.meta.infer_type(x)?;
            let ty = self.meta.instantiate_mvars(&ty);
            if bi.is_inst_implicit() {
                let ok = match self.meta.synth_instance(&ty)? {
                    Some(inst) => self.meta.is_def_eq(x, &inst)?,
                    None => false,
                };
                if !ok {
                    log::trace!(target: "simp::discharge", "{thm}, failed to synthesize instance {ty}");
                    return Ok(false);
                }
            } else if !self.meta.is_prop(&ty)? || !self.discharge_arg(x, &ty)? {
                postponed.push(x.clone());
            }
        }
        for x in postponed {
            if !self.meta.instantiate_mvars(&x).is_mvar() {
                continue;
            }
            let ty = self.meta.infer_type(&x)?;
            let ty = self.meta.instantiate_mvars(&ty);
            if self.meta.is_prop(&ty)? && !self.discharge_arg(&x, &ty)? {
                log::trace!(target: "simp::discharge", "{thm}, failed to discharge hypotheses {ty}");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn discharge_arg(&mut self, x: &Expr, ty: &Expr) -> anyhow::Result<bool> {
        match self.discharge(ty)? {
            Some(h) => self.meta.is_def_eq(x, &h),
            None => Ok(false),
        }
    }

    /// Rewrites `e` with the equation theorems `eqns` of its head, at the given
    /// transparency. Used by ground unfolding and match unfolding.
    pub fn rewrite_using_eqns(
        &mut self,
        e: &Expr,
        eqns: &[Name],
        rfl_only: bool,
        transparency: TransparencyMode,
    ) -> anyhow::Result<Option<SimpResult>> {
        for name in eqns {
            let thm = SimpTheorem::from_decl(&mut self.meta, name, true, 0)?;
            if rfl_only && !thm.rfl {
                continue;
            }
            let num_extra = e.get_app_num_args().saturating_sub(thm.lhs_arity);
            let r = self
                .try_theorem_with_extra_args(e, &thm, num_extra, Some(transparency))
                .or_recover(false)?;
            if r.is_some() {
                return Ok(r);
            }
        }
        Ok(None)
    }

    pub fn rewrite_pre(&mut self, e: &Expr) -> anyhow::Result<Step> {
        Ok(match self.rewrite(e, true)? {
            Some(r) => Step::Visit(r),
            None => Step::Continue(None),
        })
    }

    pub fn rewrite_post(&mut self, e: &Expr) -> anyhow::Result<Step> {
        Ok(match self.rewrite(e, false)? {
            Some(r) => Step::Visit(r),
            None => Step::Continue(None),
        })
    }

    fn pre_default(&mut self, e: &Expr, simprocs: &Simprocs) -> anyhow::Result<Step> {
        let step = self.rewrite_pre(e)?;
        self.and_then(e, step, |s, e| simprocs.run_pre(s, e))
    }

    fn post_default(&mut self, e: &Expr, simprocs: &Simprocs) -> anyhow::Result<Step> {
        let step = self.rewrite_post(e)?;
        let step = self.and_then(e, step, |s, e| simprocs.run_post(s, e))?;
        let step = self.and_then(e, step, |s, e| Ok(done(s.simp_ctor_eq(e)?)))?;
        let step = self.and_then(e, step, |s, e| Ok(visit(s.simp_match(e)?)))?;
        let step = self.and_then(e, step, |s, e| Ok(visit(s.simp_ground(e)?)))?;
        let step = self.and_then(e, step, |s, e| {
            if !s.ctx.config.arith {
                return Ok(Step::Continue(None));
            }
            let arith = s.ctx.arith.clone();
            Ok(visit(arith.simp(s, e)?))
        })?;
        self.and_then(e, step, |s, e| Ok(done(s.simp_using_decide(e)?)))
    }
}

fn phase(pre: bool) -> &'static str {
    if pre {
        "pre"
    } else {
        "post"
    }
}

fn done(r: Option<SimpResult>) -> Step {
    match r {
        Some(r) => Step::Done(r),
        None => Step::Continue(None),
    }
}

fn visit(r: Option<SimpResult>) -> Step {
    match r {
        Some(r) => Step::Visit(r),
        None => Step::Continue(None),
    }
}

/// The standard method bundle: lemma rewriting and `simprocs` in both phases, then the
/// structural fallbacks in `post`. `discharge` replaces the default discharger.
pub fn mk_methods(simprocs: Simprocs, discharge: Option<Discharge>) -> Methods {
    let simprocs = Arc::new(simprocs);
    let pre_procs = simprocs.clone();
    Methods {
        pre: simproc(move |s, e| s.pre_default(e, &pre_procs)),
        post: simproc(move |s, e| s.post_default(e, &simprocs)),
        discharge,
    }
}

pub fn mk_default_methods(simprocs: Simprocs) -> Methods {
    mk_methods(simprocs, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{mk_nat_lit, Name};
    use crate::meta::Meta;
    use crate::prelude::{self, nat, nat_add, nat_eq, pi};
    use crate::simp::{Config, Context, Origin, SimpTheorems, DEFAULT_PRIORITY};

    #[test]
    fn conditional_lemma_needs_discharge() {
        let mut env = prelude::mk_env().unwrap();
        // cond : ∀ a, a = 1 → a + a = 2
        let cond = Name::intern("cond");
        let ty = pi("a", BinderInfo::Default, nat(), |a| {
            let h = nat_eq(a.clone(), mk_nat_lit(1));
            pi("h", BinderInfo::Default, h, |_| nat_eq(nat_add(a.clone(), a.clone()), mk_nat_lit(2)))
        });
        env.add_axiom(cond.clone(), vec![], ty).unwrap();
        let mut meta = Meta::new(&env);
        let mut thms = SimpTheorems::new();
        thms.add_const(&mut meta, &cond, true, DEFAULT_PRIORITY).unwrap();
        let ctx = Context::new(Config::default(), thms);
        let mut s = Simp::new(meta, ctx, mk_default_methods(Simprocs::default_nat()));

        let r = s.run(&nat_add(mk_nat_lit(1), mk_nat_lit(1))).unwrap();
        assert_eq!(r.expr, mk_nat_lit(2));

        let x = s.meta.add_local_decl(Name::intern("x"), BinderInfo::Default, nat());
        let e = nat_add(x.clone(), x);
        let r = s.run(&e).unwrap();
        assert_eq!(r.expr, e);
        assert!(s.state.used_theorems.is_empty());
    }

    #[test]
    fn records_used_theorems() {
        let mut env = prelude::mk_env().unwrap();
        let zero_add = Name::intern("zero_add'");
        let ty = pi("a", BinderInfo::Default, nat(), |a| {
            nat_eq(nat_add(mk_nat_lit(0), a.clone()), a)
        });
        env.add_axiom(zero_add.clone(), vec![], ty).unwrap();
        let mut meta = Meta::new(&env);
        let mut thms = SimpTheorems::new();
        thms.add_const(&mut meta, &zero_add, true, DEFAULT_PRIORITY).unwrap();
        let ctx = Context::new(Config::default(), thms);
        let mut s = Simp::new(meta, ctx, mk_default_methods(Simprocs::new()));
        let x = s.meta.add_local_decl(Name::intern("x"), BinderInfo::Default, nat());
        let r = s.run(&nat_add(mk_nat_lit(0), x.clone())).unwrap();
        assert_eq!(r.expr, x);
        assert!(r.proof.is_some());
        let used: Vec<_> = s.state.used_theorems.iter().cloned().collect();
        assert_eq!(used, vec![Origin::Decl(zero_add)]);
    }
}
