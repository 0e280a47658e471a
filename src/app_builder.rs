//! Builders for the proof terms the simplifier emits. Implicit arguments and universe
//! levels are recovered from the types of the explicit ones.

use anyhow::{bail, Context as _};

use crate::expr::{mk_app_n, mk_const, mk_lambda, Expr, Level};
use crate::meta::Meta;
use crate::prelude::{
    BOOL, BOOL_FALSE, BOOL_TRUE, CONGR, CONGR_ARG, CONGR_FUN, DECIDABLE, DECIDABLE_DECIDE, EQ,
    EQ_FALSE, EQ_FALSE_OF_DECIDE, EQ_FALSE_PRIME, EQ_NDREC, EQ_REFL, EQ_SYMM, EQ_TRANS, EQ_TRUE,
    EQ_TRUE_OF_DECIDE, NOT, OF_EQ_TRUE,
};

/// The parts of `@Eq.{u} α a b`.
#[derive(Debug, Clone)]
pub struct EqParts {
    pub level: Level,
    pub ty: Expr,
    pub lhs: Expr,
    pub rhs: Expr,
}

/// Recognizes `@Eq α a b` syntactically.
pub fn eq_parts(e: &Expr) -> Option<EqParts> {
    let e = e.consume_mdata();
    if !e.is_app_of(&EQ, 3) {
        return None;
    }
    let level = e.get_app_fn().const_levels()?.first()?.clone();
    let mut args = e.get_app_args().into_iter();
    Some(EqParts {
        level,
        ty: args.next()?,
        lhs: args.next()?,
        rhs: args.next()?,
    })
}

impl<'a> Meta<'a> {
    /// The equation proved by `h`, looking through reducible definitions if needed.
    pub fn eq_of_proof(&mut self, h: &Expr) -> anyhow::Result<EqParts> {
        let ty = self.infer_type(h)?;
        let ty = self.instantiate_mvars(&ty);
        if let Some(parts) = eq_parts(&ty) {
            return Ok(parts);
        }
        let ty = self.whnf_r(&ty)?;
        eq_parts(&ty).with_context(|| format!("equality proof expected, got {h} : {ty}"))
    }

    pub fn mk_eq(&mut self, a: &Expr, b: &Expr) -> anyhow::Result<Expr> {
        let ty = self.infer_type(a)?;
        let level = self.get_level(&ty)?;
        Ok(mk_app_n(mk_const(EQ.clone(), vec![level]), &[ty, a.clone(), b.clone()]))
    }

    pub fn mk_eq_refl(&mut self, a: &Expr) -> anyhow::Result<Expr> {
        let ty = self.infer_type(a)?;
        let level = self.get_level(&ty)?;
        Ok(mk_app_n(mk_const(EQ_REFL.clone(), vec![level]), &[ty, a.clone()]))
    }

    pub fn mk_eq_symm(&mut self, h: &Expr) -> anyhow::Result<Expr> {
        let eq = self.eq_of_proof(h)?;
        Ok(mk_app_n(
            mk_const(EQ_SYMM.clone(), vec![eq.level]),
            &[eq.ty, eq.lhs, eq.rhs, h.clone()],
        ))
    }

    pub fn mk_eq_trans(&mut self, h1: &Expr, h2: &Expr) -> anyhow::Result<Expr> {
        let eq1 = self.eq_of_proof(h1)?;
        let eq2 = self.eq_of_proof(h2)?;
        Ok(mk_app_n(
            mk_const(EQ_TRANS.clone(), vec![eq1.level]),
            &[eq1.ty, eq1.lhs, eq1.rhs, eq2.rhs, h1.clone(), h2.clone()],
        ))
    }

    /// `congrArg f h : f a = f b` from `h : a = b` and a non-dependent `f`.
    pub fn mk_congr_arg(&mut self, f: &Expr, h: &Expr) -> anyhow::Result<Expr> {
        let eq = self.eq_of_proof(h)?;
        let f_ty = self.infer_type(f)?;
        let f_ty = self.whnf(&f_ty)?;
        let Expr::ForallE(binder) = &f_ty else {
            bail!("function expected in congrArg: {f}");
        };
        if binder.body.has_loose_bvars() {
            bail!("congrArg with a dependent function: {f}");
        }
        let beta = binder.body.clone();
        let v = self.get_level(&beta)?;
        Ok(mk_app_n(
            mk_const(CONGR_ARG.clone(), vec![eq.level, v]),
            &[eq.ty, beta, eq.lhs, eq.rhs, f.clone(), h.clone()],
        ))
    }

    /// `congrFun h a : f a = g a` from `h : f = g`.
    pub fn mk_congr_fun(&mut self, h: &Expr, a: &Expr) -> anyhow::Result<Expr> {
        let eq = self.eq_of_proof(h)?;
        let fn_ty = self.whnf(&eq.ty)?;
        let Expr::ForallE(binder) = &fn_ty else {
            bail!("equality of functions expected in congrFun: {h}");
        };
        let alpha = binder.binder_type.clone();
        let u = self.get_level(&alpha)?;
        let v = self.with_local_decl(
            binder.binder_name.clone(),
            binder.binder_info,
            alpha.clone(),
            |this, x| this.get_level(&binder.body.instantiate1(&x)),
        )?;
        let beta = mk_lambda(
            binder.binder_name.clone(),
            binder.binder_info,
            alpha.clone(),
            binder.body.clone(),
        );
        Ok(mk_app_n(
            mk_const(CONGR_FUN.clone(), vec![u, v]),
            &[alpha, beta, eq.lhs, eq.rhs, h.clone(), a.clone()],
        ))
    }

    /// `congr h₁ h₂ : f a = g b` from `h₁ : f = g` and `h₂ : a = b`.
    pub fn mk_congr(&mut self, h1: &Expr, h2: &Expr) -> anyhow::Result<Expr> {
        let eq_fn = self.eq_of_proof(h1)?;
        let eq_arg = self.eq_of_proof(h2)?;
        let fn_ty = self.whnf(&eq_fn.ty)?;
        let Expr::ForallE(binder) = &fn_ty else {
            bail!("equality of functions expected in congr: {h1}");
        };
        if binder.body.has_loose_bvars() {
            bail!("congr with a dependent function: {h1}");
        }
        let beta = binder.body.clone();
        let v = self.get_level(&beta)?;
        Ok(mk_app_n(
            mk_const(CONGR.clone(), vec![eq_arg.level, v]),
            &[
                eq_arg.ty,
                beta,
                eq_fn.lhs,
                eq_fn.rhs,
                eq_arg.lhs,
                eq_arg.rhs,
                h1.clone(),
                h2.clone(),
            ],
        ))
    }

    /// `eq_true h : p = True` from `h : p`.
    pub fn mk_eq_true(&mut self, h: &Expr) -> anyhow::Result<Expr> {
        let p = self.infer_type(h)?;
        let p = self.instantiate_mvars(&p);
        Ok(mk_app_n(mk_const(EQ_TRUE.clone(), vec![]), &[p, h.clone()]))
    }

    /// `eq_false h : p = False` from `h : ¬p`.
    pub fn mk_eq_false(&mut self, h: &Expr) -> anyhow::Result<Expr> {
        let not_p = self.infer_type(h)?;
        let not_p = self.instantiate_mvars(&not_p);
        let not_p = not_p.consume_mdata();
        let Some(p) = not_p.app_arg().filter(|_| not_p.is_app_of(&NOT, 1)) else {
            bail!("negation expected in eq_false: {not_p}");
        };
        Ok(mk_app_n(mk_const(EQ_FALSE.clone(), vec![]), &[p.clone(), h.clone()]))
    }

    /// `eq_false' h : p = False` from `h : p → False`.
    pub fn mk_eq_false_prime(&mut self, p: &Expr, h: &Expr) -> Expr {
        mk_app_n(mk_const(EQ_FALSE_PRIME.clone(), vec![]), &[p.clone(), h.clone()])
    }

    /// `of_eq_true h : p` from `h : p = True`.
    pub fn mk_of_eq_true(&mut self, h: &Expr) -> anyhow::Result<Expr> {
        let eq = self.eq_of_proof(h)?;
        Ok(mk_app_n(mk_const(OF_EQ_TRUE.clone(), vec![]), &[eq.lhs, h.clone()]))
    }

    /// `Decidable.decide p inst`, or `None` when no instance can be synthesized.
    pub fn mk_decide(&mut self, p: &Expr) -> anyhow::Result<Option<Expr>> {
        let class = mk_app_n(mk_const(DECIDABLE.clone(), vec![]), &[p.clone()]);
        let Some(inst) = self.synth_instance(&class)? else {
            return Ok(None);
        };
        Ok(Some(mk_app_n(
            mk_const(DECIDABLE_DECIDE.clone(), vec![]),
            &[p.clone(), inst],
        )))
    }

    /// `eq_true_of_decide` or `eq_false_of_decide` applied to `Eq.refl b`, where `decide`
    /// is `Decidable.decide p inst` and evaluates to `b`.
    pub fn mk_eq_of_decide(&mut self, decide: &Expr, value: bool) -> anyhow::Result<Expr> {
        let args = decide.get_app_args();
        let [p, inst] = args.as_slice() else {
            bail!("decide application expected: {decide}");
        };
        let (lemma, b) = if value {
            (EQ_TRUE_OF_DECIDE.clone(), BOOL_TRUE.clone())
        } else {
            (EQ_FALSE_OF_DECIDE.clone(), BOOL_FALSE.clone())
        };
        let refl = mk_app_n(
            mk_const(EQ_REFL.clone(), vec![Level::one()]),
            &[mk_const(BOOL.clone(), vec![]), mk_const(b, vec![])],
        );
        Ok(mk_app_n(mk_const(lemma, vec![]), &[p.clone(), inst.clone(), refl]))
    }

    /// `T.noConfusion h : T.noConfusionType target a b` from `h : a = b` at an inductive
    /// type `T`.
    pub fn mk_no_confusion(&mut self, target: &Expr, h: &Expr) -> anyhow::Result<Expr> {
        let eq = self.eq_of_proof(h)?;
        let ty = self.whnf(&eq.ty)?;
        let Expr::Const(head) = ty.get_app_fn() else {
            bail!("inductive type expected in noConfusion: {ty}");
        };
        if self.env.inductive_val(&head.name).is_none() {
            bail!("inductive type expected in noConfusion: {ty}");
        }
        let target_level = self.get_level(target)?;
        let mut levels = vec![target_level];
        levels.extend(head.levels.iter().cloned());
        let mut args = ty.get_app_args();
        args.extend([target.clone(), eq.lhs, eq.rhs, h.clone()]);
        Ok(mk_app_n(
            mk_const(head.name.extend("noConfusion"), levels),
            &args,
        ))
    }

    /// `Eq.ndrec m h : motive b` from `m : motive a` and `h : a = b`.
    pub fn mk_eq_ndrec(&mut self, motive: &Expr, m: &Expr, h: &Expr) -> anyhow::Result<Expr> {
        let eq = self.eq_of_proof(h)?;
        let motive_ty = self.infer_type(motive)?;
        let motive_ty = self.whnf(&motive_ty)?;
        let Expr::ForallE(binder) = &motive_ty else {
            bail!("motive expected in Eq.ndrec: {motive}");
        };
        let Expr::Sort(sort) = self.whnf(&binder.body)? else {
            bail!("motive expected in Eq.ndrec: {motive}");
        };
        Ok(mk_app_n(
            mk_const(EQ_NDREC.clone(), vec![sort.level.clone(), eq.level]),
            &[eq.ty, eq.lhs, motive.clone(), m.clone(), eq.rhs, h.clone()],
        ))
    }
}
