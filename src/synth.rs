//! Type class instance synthesis.
//!
//! Instances are tried in priority order (newest first among equal priorities); each
//! attempt runs in its own metavariable scope so a failed candidate leaves no trace.

use crate::expr::{mk_app_n, Expr, Name};
use crate::mctx::MetavarKind;
use crate::meta::Meta;

impl<'a> Meta<'a> {
    /// Finds an instance of the class application `ty`. Types with unassigned
    /// metavariables are not resolved.
    pub fn synth_instance(&mut self, ty: &Expr) -> anyhow::Result<Option<Expr>> {
        self.stats.synth_calls += 1;
        let ty = self.instantiate_mvars(ty);
        if ty.has_expr_mvar() {
            return Ok(None);
        }
        let r = self.synth_core(&ty, 0)?;
        if log::log_enabled!(target: "simp::discharge", log::Level::Trace) {
            match &r {
                Some(inst) => log::trace!(target: "simp::discharge", "synthesized {ty} := {inst}"),
                None => log::trace!(target: "simp::discharge", "failed to synthesize {ty}"),
            }
        }
        Ok(r)
    }

    fn synth_core(&mut self, ty: &Expr, depth: usize) -> anyhow::Result<Option<Expr>> {
        if depth > self.config.max_synth_depth {
            return Ok(None);
        }
        let ty = self.whnf_r(ty)?;
        let Some(class) = ty.get_app_fn().const_name() else {
            return Ok(None);
        };
        if !self.env.is_class(class) {
            return Ok(None);
        }
        let candidates: Vec<Name> = self
            .env
            .instances_of(class)
            .into_iter()
            .map(|info| info.name.clone())
            .collect();
        for name in candidates {
            let r = self.with_fresh_scope(false, |this| this.try_instance(&name, &ty, depth))?;
            if r.is_some() {
                return Ok(r);
            }
        }
        Ok(None)
    }

    fn try_instance(&mut self, name: &Name, ty: &Expr, depth: usize) -> anyhow::Result<Option<Expr>> {
        let inst = self.mk_const_with_fresh_levels(name)?;
        let inst_ty = self.infer_type(&inst)?;
        let (xs, binder_infos, concl) = self.forall_meta_telescope(&inst_ty, MetavarKind::Natural);
        if !self.is_def_eq(&concl, ty)? {
            return Ok(None);
        }
        for (x, bi) in xs.iter().zip(&binder_infos) {
            let Some(id) = x.mvar_id() else {
                continue;
            };
            if !bi.is_inst_implicit() || self.is_assigned(id) {
                continue;
            }
            let x_ty = self.infer_type(x)?;
            let x_ty = self.instantiate_mvars(&x_ty);
            let Some(v) = self.synth_core(&x_ty, depth + 1)? else {
                return Ok(None);
            };
            if !self.is_def_eq(x, &v)? {
                return Ok(None);
            }
        }
        let r = self.instantiate_mvars(&mk_app_n(inst, &xs));
        if self.has_assignable_mvar(&r) {
            return Ok(None);
        }
        Ok(Some(r))
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::{mk_app, mk_app_n, mk_nat_lit, Level};
    use crate::meta::Meta;
    use crate::prelude::{self, cnst, nat, nat_eq, nat_le, DECIDABLE, NAT_DEC_EQ, NAT_DEC_LE, OF_NAT, INST_OF_NAT_NAT};
    use crate::expr::mk_const;

    #[test]
    fn decidable_nat_props() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let goal = mk_app(cnst(&DECIDABLE), nat_eq(mk_nat_lit(2), mk_nat_lit(3)));
        let inst = meta.synth_instance(&goal).unwrap().unwrap();
        assert_eq!(inst, mk_app_n(cnst(&NAT_DEC_EQ), &[mk_nat_lit(2), mk_nat_lit(3)]));

        let goal = mk_app(cnst(&DECIDABLE), nat_le(mk_nat_lit(1), mk_nat_lit(2)));
        let inst = meta.synth_instance(&goal).unwrap().unwrap();
        assert_eq!(inst, mk_app_n(cnst(&NAT_DEC_LE), &[mk_nat_lit(1), mk_nat_lit(2)]));
    }

    #[test]
    fn numerals() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let goal = mk_app_n(mk_const(OF_NAT.clone(), vec![Level::zero()]), &[nat(), mk_nat_lit(7)]);
        let inst = meta.synth_instance(&goal).unwrap().unwrap();
        assert_eq!(inst, mk_app(cnst(&INST_OF_NAT_NAT), mk_nat_lit(7)));
    }

    #[test]
    fn non_class_goal() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        assert!(meta.synth_instance(&nat()).unwrap().is_none());
        assert_eq!(meta.mctx.depth, 0);
    }
}
