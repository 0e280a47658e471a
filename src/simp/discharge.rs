//! Discharging side conditions of conditional rewrites.

use crate::app_builder::eq_parts;
use crate::error::RecoverExt;
use crate::expr::{mk_app, mk_lambda, BinderInfo, Expr, Name};
use crate::meta::Meta;
use crate::prelude::{EQ, FALSE, HEQ, TRUE};

use super::types::Simp;

/// `∀ .., a₁ = b₁ → .. → aₙ = bₙ → False`, the shape of the hypotheses equation
/// theorems of overlapping patterns carry. Every binder is an equation or is used further
/// down the chain.
pub fn is_eqn_thm_hypothesis(e: &Expr) -> bool {
    fn go(e: &Expr) -> bool {
        match e {
            Expr::ForallE(binder) => {
                let d = binder.binder_type.consume_mdata();
                (d.is_app_of(&EQ, 3) || d.is_app_of(&HEQ, 4) || binder.body.has_loose_bvar(0))
                    && go(&binder.body)
            }
            _ => e.consume_mdata().is_const_of(&FALSE),
        }
    }
    e.is_forall() && go(e)
}

impl<'a> Simp<'a> {
    /// Proves `p` with the user discharger if there is one, otherwise with the default.
    pub fn discharge(&mut self, p: &Expr) -> anyhow::Result<Option<Expr>> {
        match self.methods.discharge.clone() {
            Some(discharge) => discharge(self, p),
            None => self.discharge_default(p),
        }
    }

    /// Equation-theorem hypotheses by case analysis, then an assumption in the local
    /// context, then a bounded nested simplifier run that must reach `True`.
    pub fn discharge_default(&mut self, p: &Expr) -> anyhow::Result<Option<Expr>> {
        let p = self.meta.instantiate_mvars(p);
        if is_eqn_thm_hypothesis(&p) {
            let r = self
                .meta
                .discharge_eqn_thm_hypothesis(&p)
                .or_recover(self.ctx.config.catch_runtime)?;
            if let Some(h) = r {
                log::trace!(target: "simp::discharge", "{p} discharged by case analysis");
                return Ok(Some(h));
            }
        }

        let decls: Vec<_> = self
            .meta
            .lctx
            .iter_rev()
            .filter(|decl| !decl.implementation_detail)
            .cloned()
            .collect();
        for decl in decls {
            if self.meta.is_def_eq(&decl.ty, &p)? {
                log::trace!(target: "simp::discharge", "{p} discharged by assumption {}", decl.user_name);
                return Ok(Some(decl.to_expr()));
            }
        }

        if self.state.discharge_depth >= self.ctx.config.max_discharge_depth {
            log::trace!(target: "simp::discharge", "maximum discharge depth has been reached, {p}");
            return Ok(None);
        }
        self.state.discharge_depth += 1;
        self.in_discharge += 1;
        let r = self.simp(&p).map(Some).or_recover(false);
        self.in_discharge -= 1;
        let Some(r) = r? else {
            return Ok(None);
        };
        if !r.expr.consume_mdata().is_const_of(&TRUE) {
            log::trace!(target: "simp::discharge", "failed to discharge {p}, simplified to {}", r.expr);
            return Ok(None);
        }
        let h = r.get_proof(&mut self.meta)?;
        Ok(Some(self.meta.mk_of_eq_true(&h)?))
    }
}

impl<'a> Meta<'a> {
    /// Proves a hypothesis recognized by [is_eqn_thm_hypothesis] by introducing its
    /// binders and refuting one of the equations through constructor disjointness and
    /// injectivity.
    pub fn discharge_eqn_thm_hypothesis(&mut self, p: &Expr) -> anyhow::Result<Option<Expr>> {
        assert!(is_eqn_thm_hypothesis(p), "equation theorem hypothesis expected");
        self.eqn_hyp_go(p)
    }

    fn eqn_hyp_go(&mut self, goal: &Expr) -> anyhow::Result<Option<Expr>> {
        let goal = if goal.is_forall() {
            goal.clone()
        } else {
            self.whnf_d(goal)?
        };
        let Expr::ForallE(binder) = &goal else {
            return Ok(None);
        };
        let binder = binder.clone();
        self.with_local_decl(
            binder.binder_name.clone(),
            binder.binder_info,
            binder.binder_type.clone(),
            |meta, h| {
                let body = binder.body.instantiate1(&h);
                let d = binder.binder_type.consume_mdata();
                let r = if d.is_app_of(&EQ, 3) {
                    meta.unify_eq(&h, d, &body)?
                } else if d.is_app_of(&HEQ, 4) {
                    None
                } else {
                    meta.eqn_hyp_go(&body)?
                };
                match r {
                    Some(proof) => Ok(Some(meta.mk_lambda_fvars(&[h], &proof)?)),
                    None => Ok(None),
                }
            },
        )
    }

    /// Proves `goal` from `h : a = b`: solved trivially when `a` and `b` agree, by
    /// `noConfusion` when both are constructor applications, and by substitution when
    /// one side is a local.
    fn unify_eq(&mut self, h: &Expr, eq_ty: &Expr, goal: &Expr) -> anyhow::Result<Option<Expr>> {
        let eq_ty = self.instantiate_mvars(eq_ty);
        let Some(eq) = eq_parts(&eq_ty) else {
            return Ok(None);
        };
        let a = self.whnf_d(&eq.lhs)?;
        let b = self.whnf_d(&eq.rhs)?;
        if self.is_def_eq(&a, &b)? {
            return self.eqn_hyp_go(goal);
        }
        if let (Some((ca, _)), Some((cb, _))) = (self.ctor_app(&a), self.ctor_app(&b)) {
            if ca.induct != cb.induct {
                return Ok(None);
            }
            let nc = self.mk_no_confusion(goal, h)?;
            if ca.cidx != cb.cidx {
                return Ok(Some(nc));
            }
            // same constructor: `noConfusion h : (a₁ = b₁ → .. → goal) → goal`
            let nc_ty = self.infer_type(&nc)?;
            let nc_ty = self.whnf_d(&nc_ty)?;
            let Expr::ForallE(premise) = &nc_ty else {
                return Ok(None);
            };
            return Ok(self
                .eqn_hyp_go(&premise.binder_type)?
                .map(|p| mk_app(nc, p)));
        }
        if h.fvar_id().is_some_and(|id| goal.contains_fvar(id)) {
            return Ok(None);
        }
        if let Some(x) = b.fvar_id().filter(|x| !a.contains_fvar(*x)) {
            let motive = mk_lambda(Name::intern("x"), BinderInfo::Default, eq.ty.clone(), goal.abstract_fvars(&[x]));
            let Some(m) = self.eqn_hyp_go(&goal.replace_fvar(x, &a))? else {
                return Ok(None);
            };
            return Ok(Some(self.mk_eq_ndrec(&motive, &m, h)?));
        }
        if let Some(x) = a.fvar_id().filter(|x| !b.contains_fvar(*x)) {
            let motive = mk_lambda(Name::intern("x"), BinderInfo::Default, eq.ty.clone(), goal.abstract_fvars(&[x]));
            let Some(m) = self.eqn_hyp_go(&goal.replace_fvar(x, &b))? else {
                return Ok(None);
            };
            let h = self.mk_eq_symm(h)?;
            return Ok(Some(self.mk_eq_ndrec(&motive, &m, &h)?));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::mk_nat_lit;
    use crate::prelude::{self, false_prop, nat, nat_eq, nat_succ, pi};

    fn zero_ne_succ() -> Expr {
        pi("k", BinderInfo::Default, nat(), |k| {
            pi("h", BinderInfo::Default, nat_eq(mk_nat_lit(0), nat_succ(k)), |_| false_prop())
        })
    }

    #[test]
    fn recognizes_eqn_hypotheses() {
        assert!(is_eqn_thm_hypothesis(&zero_ne_succ()));
        assert!(!is_eqn_thm_hypothesis(&false_prop()));
        let unused = pi("k", BinderInfo::Default, nat(), |_| false_prop());
        assert!(!is_eqn_thm_hypothesis(&unused));
        let not_false = pi("k", BinderInfo::Default, nat(), |k| nat_eq(k.clone(), k));
        assert!(!is_eqn_thm_hypothesis(&not_false));
    }

    #[test]
    fn refutes_constructor_clash() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let p = zero_ne_succ();
        let h = meta.discharge_eqn_thm_hypothesis(&p).unwrap().unwrap();
        let ty = meta.infer_type(&h).unwrap();
        assert!(meta.is_def_eq(&ty, &p).unwrap());
    }

    #[test]
    fn injectivity_then_clash() {
        // ∀ k, succ 0 = succ (succ k) → False
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let p = pi("k", BinderInfo::Default, nat(), |k| {
            let eq = nat_eq(nat_succ(mk_nat_lit(0)), nat_succ(nat_succ(k)));
            pi("h", BinderInfo::Default, eq, |_| false_prop())
        });
        assert!(meta.discharge_eqn_thm_hypothesis(&p).unwrap().is_some());
    }
}
