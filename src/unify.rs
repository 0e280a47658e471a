//! Definitional equality with metavariable assignment.
//!
//! Every call is transactional: when `is_def_eq` answers `false` (or fails) the
//! metavariable context is rolled back to where it was before the call.

use anyhow::Context as _;

use crate::expr::{mk_app, mk_bvar, mk_lambda, mk_nat_lit, Expr, ExprBinder, Level};
use crate::meta::{lit_to_ctor, Meta};
use crate::prelude::NAT_ADD;

impl<'a> Meta<'a> {
    pub fn is_def_eq(&mut self, a: &Expr, b: &Expr) -> anyhow::Result<bool> {
        self.stats.def_eq_calls += 1;
        let snapshot = self.save();
        match self.with_inc_rec_depth(|this| this.is_def_eq_core(a, b)) {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.restore(snapshot);
                Ok(false)
            }
            Err(err) => {
                self.restore(snapshot);
                Err(err)
            }
        }
    }

    /// Like [Meta::is_def_eq] but the caller keeps the assignments only on success and
    /// does not care about the rollback of partial work inside a conjunction.
    fn is_def_eq_args(&mut self, a: &[&Expr], b: &[&Expr]) -> anyhow::Result<bool> {
        if a.len() != b.len() {
            return Ok(false);
        }
        for (x, y) in a.iter().zip(b) {
            if !self.is_def_eq_core(x, y)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn is_def_eq_levels(&mut self, a: &[Level], b: &[Level]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.is_level_def_eq(x, y))
    }

    fn is_def_eq_core(&mut self, a: &Expr, b: &Expr) -> anyhow::Result<bool> {
        let a = self.instantiate_mvars(a);
        let b = self.instantiate_mvars(b);
        if a == b {
            return Ok(true);
        }
        match (&a, &b) {
            (Expr::Sort(x), Expr::Sort(y)) => return Ok(self.is_level_def_eq(&x.level, &y.level)),
            (Expr::Lit(_), Expr::Lit(_)) => return Ok(false),
            _ => {}
        }

        if let Some(r) = self.try_assign(&a, &b)? {
            return Ok(r);
        }
        if let Some(r) = self.try_assign(&b, &a)? {
            return Ok(r);
        }

        match (&a, &b) {
            (Expr::Lam(x), Expr::Lam(y)) | (Expr::ForallE(x), Expr::ForallE(y)) => {
                return self.is_def_eq_binding(x, y);
            }
            _ => {}
        }

        let a1 = self.whnf_core(&a)?;
        let b1 = self.whnf_core(&b)?;
        if !a1.ptr_eq(&a) || !b1.ptr_eq(&b) {
            return self.is_def_eq_core(&a1, &b1);
        }

        if let (Expr::Const(f), Expr::Const(g)) = (a.get_app_fn(), b.get_app_fn()) {
            if f.name == g.name && a.get_app_num_args() == b.get_app_num_args() {
                let snapshot = self.save();
                let (_, xs) = a.get_app_fn_args();
                let (_, ys) = b.get_app_fn_args();
                if self.is_def_eq_levels(&f.levels, &g.levels) && self.is_def_eq_args(&xs, &ys)? {
                    return Ok(true);
                }
                self.restore(snapshot);
            }
        }

        let a1 = self.reduce_native(&a)?;
        let b1 = self.reduce_native(&b)?;
        if a1.is_some() || b1.is_some() {
            let a1 = a1.unwrap_or_else(|| a.clone());
            let b1 = b1.unwrap_or_else(|| b.clone());
            return self.is_def_eq_core(&a1, &b1);
        }

        match (self.delta_height(&a), self.delta_height(&b)) {
            (None, None) => {}
            (Some(ha), Some(hb)) if ha == hb => {
                if let (Some(a1), Some(b1)) = (self.unfold_definition(&a), self.unfold_definition(&b)) {
                    return self.is_def_eq_core(&a1, &b1);
                }
            }
            (Some(ha), hb) if hb.map_or(true, |hb| ha > hb) => {
                if let Some(a1) = self.unfold_definition(&a) {
                    return self.is_def_eq_core(&a1, &b);
                }
            }
            _ => {
                if let Some(b1) = self.unfold_definition(&b) {
                    return self.is_def_eq_core(&a, &b1);
                }
            }
        }

        if let (Expr::App(_), Expr::App(_)) = (&a, &b) {
            if a.get_app_num_args() == b.get_app_num_args() {
                let snapshot = self.save();
                let (f, xs) = a.get_app_fn_args();
                let (g, ys) = b.get_app_fn_args();
                if self.is_def_eq_core(f, g)? && self.is_def_eq_args(&xs, &ys)? {
                    return Ok(true);
                }
                self.restore(snapshot);
            }
        }

        if let Some(r) = self.try_eta(&a, &b)? {
            return Ok(r);
        }
        if let Some(r) = self.try_eta(&b, &a)? {
            return Ok(r);
        }

        if let Some(r) = self.try_nat_offset(&a, &b)? {
            return Ok(r);
        }
        if let Some(r) = self.try_nat_offset(&b, &a)? {
            return Ok(r);
        }
        if a.nat_lit().is_some() && !b.nat_lit().is_some() {
            return self.is_def_eq_core(&lit_to_ctor(&a), &b);
        }
        if b.nat_lit().is_some() && !a.nat_lit().is_some() {
            return self.is_def_eq_core(&a, &lit_to_ctor(&b));
        }

        if let (Expr::Const(f), Expr::Const(g)) = (&a, &b) {
            if f.name == g.name {
                return Ok(self.is_def_eq_levels(&f.levels, &g.levels));
            }
        }

        self.is_def_eq_proof_irrel(&a, &b)
    }

    fn is_def_eq_binding(&mut self, a: &ExprBinder, b: &ExprBinder) -> anyhow::Result<bool> {
        if !self.is_def_eq_core(&a.binder_type, &b.binder_type)? {
            return Ok(false);
        }
        self.with_local_decl(
            a.binder_name.clone(),
            a.binder_info,
            a.binder_type.clone(),
            |this, x| {
                let body_a = a.body.instantiate1(&x);
                let body_b = b.body.instantiate1(&x);
                this.is_def_eq_core(&body_a, &body_b)
            },
        )
    }

    /// `fun x => t` against a non-lambda `s`: compare with `fun x => s x`.
    fn try_eta(&mut self, a: &Expr, b: &Expr) -> anyhow::Result<Option<bool>> {
        let Expr::Lam(inner) = a else {
            return Ok(None);
        };
        if b.is_lambda() {
            return Ok(None);
        }
        let expanded = mk_lambda(
            inner.binder_name.clone(),
            inner.binder_info,
            inner.binder_type.clone(),
            mk_app(b.lift_loose_bvars(0, 1), mk_bvar(0)),
        );
        self.is_def_eq_core(a, &expanded).map(Some)
    }

    /// `Nat.add t k =?= n` with literals `k ≤ n` reduces to `t =?= n - k`.
    fn try_nat_offset(&mut self, a: &Expr, b: &Expr) -> anyhow::Result<Option<bool>> {
        let Some(n) = b.nat_lit() else {
            return Ok(None);
        };
        if !a.is_app_of(&NAT_ADD, 2) {
            return Ok(None);
        }
        let args = a.get_app_args();
        let Some(k) = self.nat_value(&args[1])? else {
            return Ok(None);
        };
        if k > n {
            return Ok(Some(false));
        }
        self.is_def_eq_core(&args[0], &mk_nat_lit(n - k)).map(Some)
    }

    /// Two proofs of the same proposition are equal.
    fn is_def_eq_proof_irrel(&mut self, a: &Expr, b: &Expr) -> anyhow::Result<bool> {
        if a.has_loose_bvars() || b.has_loose_bvars() {
            return Ok(false);
        }
        let Ok(ty_a) = self.infer_type(a) else {
            return Ok(false);
        };
        if !self.is_prop(&ty_a).unwrap_or(false) {
            return Ok(false);
        }
        let Ok(ty_b) = self.infer_type(b) else {
            return Ok(false);
        };
        self.is_def_eq_core(&ty_a, &ty_b)
    }

    /// Assigns `m := v` when `m` is an assignable metavariable, or solves the Miller
    /// pattern `?f x₁ … xₙ =?= v` with distinct free variables `xᵢ`.
    fn try_assign(&mut self, m: &Expr, v: &Expr) -> anyhow::Result<Option<bool>> {
        let Expr::MVar(head) = m.get_app_fn() else {
            return Ok(None);
        };
        let id = head.id;
        if !self.is_assignable(id) {
            return Ok(None);
        }
        let args = m.get_app_args();
        if !args.iter().all(|x| x.is_fvar()) {
            return Ok(None);
        }
        for (i, x) in args.iter().enumerate() {
            if args[..i].contains(x) {
                return Ok(None);
            }
        }
        if v.contains_mvar(id) {
            return Ok(Some(false));
        }
        let decl = self.get_mvar_decl(id)?;
        let scope_ok = v
            .collect_fvars()
            .into_iter()
            .all(|x| decl.lctx.contains(x) || args.iter().any(|a| a.fvar_id() == Some(x)));
        if !scope_ok {
            return Ok(Some(false));
        }
        let mvar_ty = decl.ty.clone();
        let value = if args.is_empty() {
            v.clone()
        } else {
            self.mk_lambda_fvars(&args, v)
                .context("abstracting a pattern assignment")?
        };
        if self.has_assignable_mvar(&mvar_ty) && args.is_empty() {
            let value_ty = self.infer_type(&value)?;
            if !self.is_def_eq_core(&mvar_ty, &value_ty)? {
                return Ok(Some(false));
            }
        }
        log::trace!(target: "simp::unify", "{} := {}", m, value);
        self.assign(id, value);
        Ok(Some(true))
    }

    pub fn is_level_def_eq(&mut self, a: &Level, b: &Level) -> bool {
        let a = self.instantiate_level(a).normalize();
        let b = self.instantiate_level(b).normalize();
        if a == b {
            return true;
        }
        match (&a, &b) {
            (Level::MVar(id), _) if self.is_level_assignable(*id) && !b.occurs(*id) => {
                self.mctx.assign_level(*id, b.clone());
                true
            }
            (_, Level::MVar(id)) if self.is_level_assignable(*id) && !a.occurs(*id) => {
                self.mctx.assign_level(*id, a.clone());
                true
            }
            (Level::Succ(x), Level::Succ(y)) => self.is_level_def_eq(x, y),
            (Level::Max(x1, x2), Level::Max(y1, y2)) | (Level::IMax(x1, x2), Level::IMax(y1, y2)) => {
                self.is_level_def_eq(x1, y1) && self.is_level_def_eq(x2, y2)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::{mk_nat_lit, BinderInfo, Name};
    use crate::mctx::MetavarKind;
    use crate::meta::Meta;
    use crate::prelude::{self, lam, nat, nat_add, nat_eq, nat_succ, of_nat};

    #[test]
    fn assigns_and_rolls_back() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let m = meta.mk_fresh_expr_mvar(nat(), MetavarKind::Natural, None);
        let id = m.mvar_id().unwrap();
        let pat = nat_add(m.clone(), mk_nat_lit(1));
        assert!(!meta.is_def_eq(&pat, &nat_eq(mk_nat_lit(1), mk_nat_lit(1))).unwrap());
        assert!(!meta.is_assigned(id));
        assert!(meta.is_def_eq(&pat, &nat_add(mk_nat_lit(5), mk_nat_lit(1))).unwrap());
        assert_eq!(meta.instantiate_mvars(&m), mk_nat_lit(5));
    }

    #[test]
    fn literals_meet_constructors() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let m = meta.mk_fresh_expr_mvar(nat(), MetavarKind::Natural, None);
        assert!(meta.is_def_eq(&nat_succ(m.clone()), &mk_nat_lit(3)).unwrap());
        assert_eq!(meta.instantiate_mvars(&m), mk_nat_lit(2));
        assert!(meta.is_def_eq(&of_nat(4), &mk_nat_lit(4)).unwrap());
        assert!(!meta.is_def_eq(&nat_succ(mk_nat_lit(0)), &mk_nat_lit(0)).unwrap());
    }

    #[test]
    fn occurs_check_and_scope() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let m = meta.mk_fresh_expr_mvar(nat(), MetavarKind::Natural, None);
        assert!(!meta.is_def_eq(&m, &nat_succ(m.clone())).unwrap());
        let r = meta
            .with_local_decl(Name::intern("x"), BinderInfo::Default, nat(), |meta, x| {
                meta.is_def_eq(&m, &x)
            })
            .unwrap();
        assert!(!r);
    }

    #[test]
    fn eta_and_binders() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let f = lam("x", BinderInfo::Default, nat(), nat_succ);
        let succ = crate::prelude::cnst(&crate::prelude::NAT_SUCC);
        assert!(meta.is_def_eq(&f, &succ).unwrap());
        let g = lam("y", BinderInfo::Default, nat(), |y| nat_add(y, mk_nat_lit(0)));
        let h = lam("z", BinderInfo::Default, nat(), |z| nat_add(z, mk_nat_lit(0)));
        assert!(meta.is_def_eq(&g, &h).unwrap());
    }
}
