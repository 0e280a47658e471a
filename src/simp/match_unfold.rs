//! Reduction of `match` applications: simplify the discriminants, then rewrite with the
//! matcher's equation theorems.

use crate::env::MatcherInfo;
use crate::expr::{mk_app_n, BinderInfo, Expr, Name};
use crate::meta::TransparencyMode;

use super::types::{Simp, SimpResult};

impl<'a> Simp<'a> {
    pub fn simp_match(&mut self, e: &Expr) -> anyhow::Result<Option<SimpResult>> {
        let Some(name) = e.get_app_fn().const_name() else {
            return Ok(None);
        };
        let env = self.meta.env;
        let Some(info) = env.matcher_info(name) else {
            return Ok(None);
        };
        if e.get_app_num_args() < info.arity() {
            return Ok(None);
        }
        if let Some(r) = self.simp_match_discrs(e, info)? {
            return Ok(Some(r));
        }
        self.simp_match_core(e)
    }

    /// Rewrites a matcher application with the equation theorems of the matcher. Arms
    /// guarded by overlap hypotheses are taken when the discharger refutes the earlier
    /// patterns.
    pub fn simp_match_core(&mut self, e: &Expr) -> anyhow::Result<Option<SimpResult>> {
        let Some(name) = e.get_app_fn().const_name() else {
            return Ok(None);
        };
        let env = self.meta.env;
        let Some(eqns) = env.eqns(name) else {
            return Ok(None);
        };
        let r = self.rewrite_using_eqns(e, eqns, false, TransparencyMode::Reducible)?;
        if let Some(r) = &r {
            log::trace!(target: "simp::rewrite", "match, {e} ==> {}", r.expr);
        }
        Ok(r)
    }

    /// Simplifies the first discriminant that changes, provided it is not a function and
    /// the type of the match does not depend on it.
    pub fn simp_match_discrs(&mut self, e: &Expr, info: &MatcherInfo) -> anyhow::Result<Option<SimpResult>> {
        let f = e.get_app_fn().clone();
        let args = e.get_app_args();
        for i in info.first_discr_pos()..info.first_alt_pos() {
            let discr = args[i].clone();
            let discr_ty = self.meta.infer_type(&discr)?;
            if self.meta.whnf_d(&discr_ty)?.is_arrow() {
                continue;
            }
            let ctx = self.meta.with_local_decl(Name::intern("x"), BinderInfo::Default, discr_ty, |meta, x| {
                let mut abstracted = args.clone();
                abstracted[i] = x.clone();
                let body = mk_app_n(f.clone(), &abstracted);
                let body_ty = meta.infer_type(&body)?;
                let body_ty = meta.instantiate_mvars(&body_ty);
                match x.fvar_id() {
                    Some(id) if !body_ty.contains_fvar(id) => Ok(Some(meta.mk_lambda_fvars(&[x], &body)?)),
                    _ => Ok(None),
                }
            })?;
            let Some(ctx) = ctx else {
                continue;
            };
            let r = self.simp(&discr)?;
            if r.expr == discr {
                continue;
            }
            let mut new_args = args;
            new_args[i] = r.expr.clone();
            let proof = match &r.proof {
                Some(h) => Some(self.meta.mk_congr_arg(&ctx, h)?),
                None => None,
            };
            return Ok(Some(SimpResult {
                expr: mk_app_n(f, &new_args),
                proof,
                cache: r.cache,
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{mk_const, mk_nat_lit, Level};
    use crate::meta::Meta;
    use crate::prelude::{self, bool_ty, cnst, lam, nat, nat_add, BOOL_FALSE, BOOL_TRUE, NAT_IS_ZERO_MATCH_1};
    use crate::simp::{mk_default_methods, Config, Context, SimpTheorems, Simprocs};

    fn is_zero_match(n: Expr) -> Expr {
        mk_app_n(
            mk_const(NAT_IS_ZERO_MATCH_1.clone(), vec![Level::one()]),
            &[
                lam("_", BinderInfo::Default, nat(), |_| bool_ty()),
                n,
                cnst(&BOOL_TRUE),
                lam("_", BinderInfo::Default, nat(), |_| cnst(&BOOL_FALSE)),
            ],
        )
    }

    #[test]
    fn discriminants_then_equations() {
        let env = prelude::mk_env().unwrap();
        let ctx = Context::new(Config::default(), SimpTheorems::new());
        let mut s = Simp::new(Meta::new(&env), ctx, mk_default_methods(Simprocs::default_nat()));
        let e = is_zero_match(nat_add(mk_nat_lit(0), mk_nat_lit(0)));
        let info = env.matcher_info(&NAT_IS_ZERO_MATCH_1).unwrap();
        let r = s.simp_match_discrs(&e, info).unwrap().unwrap();
        assert_eq!(r.expr, is_zero_match(mk_nat_lit(0)));

        let r = s.simp_match_core(&r.expr).unwrap().unwrap();
        assert_eq!(r.expr, cnst(&BOOL_TRUE));
        assert!(r.proof.is_none());

        // the wildcard arm needs `3 = 0 → False` discharged
        let r = s.run(&is_zero_match(mk_nat_lit(3))).unwrap();
        assert_eq!(r.expr, cnst(&BOOL_FALSE));
        assert!(r.proof.is_some());
    }
}
