//! Structural fallbacks of the `post` phase, tried after lemma rewriting and the
//! registered procedures made no progress.

use crate::app_builder::eq_parts;
use crate::env::ConstantKind;
use crate::error::RecoverExt;
use crate::expr::{BinderInfo, Expr, Name};
use crate::meta::TransparencyMode;
use crate::prelude::{false_prop, true_prop, BOOL_FALSE, BOOL_TRUE, FALSE, TRUE};

use super::theorems::Origin;
use super::types::{Simp, SimpResult};

impl<'a> Simp<'a> {
    /// `C as = D bs` with distinct constructors `C` and `D` is `False`.
    pub fn simp_ctor_eq(&mut self, e: &Expr) -> anyhow::Result<Option<SimpResult>> {
        let Some(eq) = eq_parts(e) else {
            return Ok(None);
        };
        let lhs = self.meta.whnf(&eq.lhs)?;
        let rhs = self.meta.whnf(&eq.rhs)?;
        let (Some((c1, _)), Some((c2, _))) = (self.meta.ctor_app(&lhs), self.meta.ctor_app(&rhs)) else {
            return Ok(None);
        };
        if c1.induct != c2.induct || c1.cidx == c2.cidx {
            return Ok(None);
        }
        let h = self.meta.with_local_decl(Name::intern("h"), BinderInfo::Default, e.clone(), |meta, h| {
            let nc = meta.mk_no_confusion(&false_prop(), &h)?;
            meta.mk_lambda_fvars(&[h], &nc)
        })?;
        let proof = self.meta.mk_eq_false_prime(e, &h);
        log::trace!(target: "simp::rewrite", "constructor mismatch, {e} ==> False");
        Ok(Some(SimpResult::with_proof(false_prop(), proof)))
    }

    /// Closes a ground proposition by evaluating its `Decidable` instance.
    pub fn simp_using_decide(&mut self, e: &Expr) -> anyhow::Result<Option<SimpResult>> {
        if !self.ctx.config.decide || e.has_fvar() || e.has_expr_mvar() {
            return Ok(None);
        }
        let head = e.consume_mdata();
        if head.is_const_of(&TRUE) || head.is_const_of(&FALSE) {
            return Ok(None);
        }
        let catch_runtime = self.ctx.config.catch_runtime;
        self.decide_core(e).or_recover(catch_runtime)
    }

    fn decide_core(&mut self, e: &Expr) -> anyhow::Result<Option<SimpResult>> {
        if !self.meta.is_prop(e)? {
            return Ok(None);
        }
        let Some(d) = self.meta.mk_decide(e)? else {
            return Ok(None);
        };
        let r = self.meta.whnf_d(&d)?;
        let value = if r.is_const_of(&BOOL_TRUE) {
            true
        } else if r.is_const_of(&BOOL_FALSE) {
            false
        } else {
            return Ok(None);
        };
        let proof = self.meta.mk_eq_of_decide(&d, value)?;
        let expr = if value { true_prop() } else { false_prop() };
        log::trace!(target: "simp::rewrite", "decide, {e} ==> {expr}");
        Ok(Some(SimpResult::with_proof(expr, proof)))
    }

    /// Unfolds a fully applied closed definition, through its `rfl` equation theorems
    /// when one applies and by delta otherwise.
    pub fn simp_ground(&mut self, e: &Expr) -> anyhow::Result<Option<SimpResult>> {
        if !self.ctx.config.ground || e.has_fvar() || e.has_expr_mvar() {
            return Ok(None);
        }
        let Expr::Const(head) = e.get_app_fn() else {
            return Ok(None);
        };
        if self.ctx.simp_theorems.is_erased(&Origin::Decl(head.name.clone())) {
            return Ok(None);
        }
        let env = self.meta.env;
        if env.is_matcher(&head.name) {
            return Ok(None);
        }
        let Some(info) = env.find(&head.name) else {
            return Ok(None);
        };
        if e.get_app_num_args() < info.ty.forall_arity() {
            return Ok(None);
        }
        if let Some(eqns) = env.eqns(&head.name) {
            if let Some(r) = self.rewrite_using_eqns(e, eqns, true, TransparencyMode::Default)? {
                log::trace!(target: "simp::ground", "{e} ==> {}", r.expr);
                return Ok(Some(r));
            }
        }
        let ConstantKind::Definition(def) = &info.kind else {
            return Ok(None);
        };
        let value = def
            .value
            .instantiate_level_params(&info.level_params, &head.levels)
            .beta(&e.get_app_args());
        if value == *e {
            return Ok(None);
        }
        log::trace!(target: "simp::ground", "unfolded {e} ==> {value}");
        Ok(Some(SimpResult::new(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::mk_nat_lit;
    use crate::meta::Meta;
    use crate::prelude::{self, nat_eq, nat_succ, NAT_ZERO};
    use crate::simp::{mk_default_methods, Config, Context, SimpTheorems, Simprocs};

    #[test]
    fn distinct_constructors_are_unequal() {
        let env = prelude::mk_env().unwrap();
        let ctx = Context::new(Config::default(), SimpTheorems::new());
        let mut s = Simp::new(Meta::new(&env), ctx, mk_default_methods(Simprocs::new()));
        let e = nat_eq(nat_succ(mk_nat_lit(2)), crate::prelude::cnst(&NAT_ZERO));
        let r = s.simp_ctor_eq(&e).unwrap().unwrap();
        assert_eq!(r.expr, false_prop());
        insta::assert_snapshot!(r.proof.unwrap(), @"eq_false' (Eq Nat (Nat.succ 2) Nat.zero) (fun (h : Eq Nat (Nat.succ 2) Nat.zero) => Nat.noConfusion False (Nat.succ 2) Nat.zero h)");
        let same = nat_eq(nat_succ(mk_nat_lit(2)), nat_succ(mk_nat_lit(1)));
        assert!(s.simp_ctor_eq(&same).unwrap().is_none());
    }

    #[test]
    fn decide_needs_the_flag() {
        let env = prelude::mk_env().unwrap();
        let e = nat_eq(mk_nat_lit(4), mk_nat_lit(4));
        let ctx = Context::new(Config::default(), SimpTheorems::new());
        let mut s = Simp::new(Meta::new(&env), ctx, mk_default_methods(Simprocs::new()));
        assert!(s.simp_using_decide(&e).unwrap().is_none());
        s.ctx.config.decide = true;
        assert_eq!(s.simp_using_decide(&e).unwrap().unwrap().expr, true_prop());
    }
}
