//! The meta layer: metavariable scopes, type inference and weak-head normalization.

use anyhow::{bail, Context as _};

use crate::env::{ConstantKind, ConstructorVal, DefinitionVal, Environment, ReducibilityStatus};
use crate::error::Exception;
use crate::expr::{
    mk_app, mk_app_n, mk_arrow, mk_binding, mk_const, mk_fvar, mk_mvar, mk_nat_lit, mk_sort,
    Binder, BinderInfo, Expr, FVarId, LMVarId, Level, Literal, MVarId, Name,
};
use crate::mctx::{LocalContext, LocalDecl, MetaCtx, MetavarDecl, MetavarKind};
use crate::prelude::{
    BOOL_FALSE, BOOL_TRUE, DECIDABLE_IS_FALSE, DECIDABLE_IS_TRUE, EQ, EQ_REFL, NAT, NAT_ADD,
    NAT_BEQ, NAT_BLE, NAT_DEC_EQ, NAT_DEC_LE, NAT_DIV, NAT_LE, NAT_LE_OF_BLE_EQ_TRUE,
    NAT_LINEAR_IS_UNSAT, NAT_LINEAR_IS_VALID, NAT_MOD, NAT_MUL, NAT_NE_OF_BEQ_EQ_FALSE,
    NAT_NOT_LE_OF_BLE_EQ_FALSE, NAT_SUB, NAT_SUCC, NAT_ZERO, OF_NAT_OF_NAT,
};
use crate::simp::certify_linear;

/// Which definitions weak-head normalization and unification may unfold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TransparencyMode {
    Reducible,
    Instances,
    #[default]
    Default,
    All,
}

#[derive(Debug, Clone)]
pub struct MetaConfig {
    pub transparency: TransparencyMode,
    pub max_rec_depth: usize,
    /// Set while a lemma trial runs: its synthetic-opaque parameters become assignable.
    pub assign_synthetic_opaque: bool,
    pub max_synth_depth: usize,
}

impl Default for MetaConfig {
    fn default() -> Self {
        MetaConfig {
            transparency: TransparencyMode::Default,
            max_rec_depth: 512,
            assign_synthetic_opaque: false,
            max_synth_depth: 16,
        }
    }
}

/// Counters for the expensive operations, inspected by tests.
#[derive(Debug, Clone, Default)]
pub struct MetaStats {
    pub whnf_calls: usize,
    pub def_eq_calls: usize,
    pub synth_calls: usize,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    mctx: MetaCtx,
}

#[derive(Debug, Clone, Copy)]
pub struct SavedScope {
    depth: usize,
    assign_synthetic_opaque: bool,
}

pub struct Meta<'a> {
    pub env: &'a Environment,
    pub mctx: MetaCtx,
    pub lctx: LocalContext,
    pub config: MetaConfig,
    pub stats: MetaStats,
    rec_depth: usize,
}

/// `0 ↦ Nat.zero`, `n+1 ↦ Nat.succ n`; anything else is returned unchanged.
pub fn lit_to_ctor(e: &Expr) -> Expr {
    match e.nat_lit() {
        Some(0) => mk_const(NAT_ZERO.clone(), vec![]),
        Some(n) => mk_app(mk_const(NAT_SUCC.clone(), vec![]), mk_nat_lit(n - 1)),
        None => e.clone(),
    }
}

impl<'a> Meta<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Meta {
            env,
            mctx: Default::default(),
            lctx: Default::default(),
            config: Default::default(),
            stats: Default::default(),
            rec_depth: 0,
        }
    }

    pub fn with_config(env: &'a Environment, config: MetaConfig) -> Self {
        Meta {
            config,
            ..Meta::new(env)
        }
    }

    pub fn save(&self) -> Snapshot {
        Snapshot {
            mctx: self.mctx.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.mctx = snapshot.mctx;
    }

    /// Opens a new metavariable depth. Metavariables created before are frozen until the
    /// matching [Meta::exit_scope].
    pub fn enter_scope(&mut self, uses_synthetic_opaque: bool) -> SavedScope {
        let saved = SavedScope {
            depth: self.mctx.depth,
            assign_synthetic_opaque: self.config.assign_synthetic_opaque,
        };
        self.mctx.depth += 1;
        self.config.assign_synthetic_opaque = uses_synthetic_opaque;
        saved
    }

    /// Restores the enclosing depth. Metavariables of the closed scope are forgotten, so
    /// results must be instantiated before leaving it.
    pub fn exit_scope(&mut self, saved: SavedScope) {
        self.mctx.depth = saved.depth;
        self.mctx.drop_deeper_than(saved.depth);
        self.config.assign_synthetic_opaque = saved.assign_synthetic_opaque;
    }

    pub fn with_fresh_scope<T>(
        &mut self,
        uses_synthetic_opaque: bool,
        f: impl FnOnce(&mut Self) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let saved = self.enter_scope(uses_synthetic_opaque);
        let r = f(self);
        self.exit_scope(saved);
        r
    }

    pub fn with_transparency<T>(
        &mut self,
        mode: TransparencyMode,
        f: impl FnOnce(&mut Self) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let saved = self.config.transparency;
        self.config.transparency = mode;
        let r = f(self);
        self.config.transparency = saved;
        r
    }

    pub fn inc_rec_depth(&mut self) -> anyhow::Result<()> {
        if self.rec_depth >= self.config.max_rec_depth {
            bail!(Exception::MaxRecDepth);
        }
        self.rec_depth += 1;
        Ok(())
    }

    pub fn dec_rec_depth(&mut self) {
        self.rec_depth -= 1;
    }

    pub fn with_inc_rec_depth<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        self.inc_rec_depth()?;
        let r = f(self);
        self.dec_rec_depth();
        r
    }

    pub fn mk_fresh_expr_mvar(&mut self, ty: Expr, kind: MetavarKind, user_name: Option<Name>) -> Expr {
        let id = MVarId::fresh();
        self.mctx.add_expr_mvar(
            id,
            MetavarDecl {
                user_name,
                ty,
                kind,
                depth: self.mctx.depth,
                lctx: self.lctx.clone(),
            },
        );
        mk_mvar(id)
    }

    pub fn mk_fresh_level_mvar(&mut self) -> Level {
        let id = LMVarId::fresh();
        self.mctx.add_level_mvar(id);
        Level::MVar(id)
    }

    /// `Const name` with every universe parameter replaced by a fresh level metavariable.
    pub fn mk_const_with_fresh_levels(&mut self, name: &Name) -> anyhow::Result<Expr> {
        let num_levels = self.env.get(name)?.level_params.len();
        let levels = (0..num_levels).map(|_| self.mk_fresh_level_mvar()).collect();
        Ok(mk_const(name.clone(), levels))
    }

    pub fn get_mvar_decl(&self, id: MVarId) -> anyhow::Result<&MetavarDecl> {
        self.mctx
            .find_decl(id)
            .with_context(|| format!("unknown metavariable {id}"))
    }

    pub fn is_assigned(&self, id: MVarId) -> bool {
        self.mctx.is_assigned(id)
    }

    pub fn is_assignable(&self, id: MVarId) -> bool {
        let Some(decl) = self.mctx.find_decl(id) else {
            return false;
        };
        decl.depth == self.mctx.depth
            && !self.mctx.is_assigned(id)
            && (decl.kind != MetavarKind::SyntheticOpaque || self.config.assign_synthetic_opaque)
    }

    pub fn is_level_assignable(&self, id: LMVarId) -> bool {
        self.mctx.is_level_owned(id) && !self.mctx.is_level_assigned(id)
    }

    pub fn assign(&mut self, id: MVarId, value: Expr) {
        self.mctx.assign(id, value);
    }

    pub fn instantiate_level(&self, l: &Level) -> Level {
        self.mctx.instantiate_level(l)
    }

    /// Substitutes every assigned metavariable, beta-reducing `?f a` when `?f` was
    /// assigned a lambda.
    pub fn instantiate_mvars(&self, e: &Expr) -> Expr {
        if !e.has_mvar() {
            return e.clone();
        }
        e.replace(&mut |e, _| {
            if !e.has_mvar() {
                return Some(e.clone());
            }
            match e {
                Expr::MVar(inner) => Some(match self.mctx.get_assignment(inner.id) {
                    Some(value) => self.instantiate_mvars(value),
                    None => e.clone(),
                }),
                Expr::App(_) => {
                    let (f, args) = e.get_app_fn_args();
                    let Expr::MVar(m) = f else {
                        return None;
                    };
                    let value = self.mctx.get_assignment(m.id)?;
                    let f = self.instantiate_mvars(value);
                    let args: Vec<Expr> = args.into_iter().map(|a| self.instantiate_mvars(a)).collect();
                    Some(f.beta(&args))
                }
                Expr::Sort(_) | Expr::Const(_) => {
                    Some(e.replace_levels(&|l| self.instantiate_level(l)))
                }
                _ => None,
            }
        })
    }

    /// Conservative check for metavariables the current scope could still assign. Short
    /// circuits on the cached flags, so ground terms cost nothing.
    pub fn has_assignable_mvar(&self, e: &Expr) -> bool {
        if !e.has_mvar() {
            return false;
        }
        e.find(&|e| match e {
            Expr::MVar(inner) => {
                self.mctx.is_owned(inner.id) && !self.mctx.is_assigned(inner.id)
            }
            Expr::Sort(inner) => self.level_has_assignable_mvar(&inner.level),
            Expr::Const(inner) => inner.levels.iter().any(|l| self.level_has_assignable_mvar(l)),
            _ => false,
        })
        .is_some()
    }

    fn level_has_assignable_mvar(&self, l: &Level) -> bool {
        match l {
            Level::Zero | Level::Param(_) => false,
            Level::MVar(id) => match self.mctx.get_level_assignment(*id) {
                Some(value) => self.level_has_assignable_mvar(value),
                None => self.mctx.is_level_owned(*id),
            },
            Level::Succ(l) => self.level_has_assignable_mvar(l),
            Level::Max(a, b) | Level::IMax(a, b) => {
                self.level_has_assignable_mvar(a) || self.level_has_assignable_mvar(b)
            }
        }
    }

    /// Introduces a local that stays in scope for the rest of the session.
    pub fn add_local_decl(&mut self, user_name: Name, binder_info: BinderInfo, ty: Expr) -> Expr {
        let fvar_id = FVarId::fresh_with_name(user_name.clone());
        self.lctx.push(LocalDecl {
            fvar_id,
            user_name,
            ty,
            binder_info,
            implementation_detail: false,
        });
        mk_fvar(fvar_id)
    }

    pub fn with_local_decl<T>(
        &mut self,
        user_name: Name,
        binder_info: BinderInfo,
        ty: Expr,
        f: impl FnOnce(&mut Self, Expr) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let len = self.lctx.len();
        let fvar_id = FVarId::fresh_with_name(user_name.clone());
        self.lctx.push(LocalDecl {
            fvar_id,
            user_name,
            ty,
            binder_info,
            implementation_detail: false,
        });
        let r = f(self, mk_fvar(fvar_id));
        self.lctx.truncate(len);
        r
    }

    fn local_binders(&self, xs: &[Expr]) -> anyhow::Result<Vec<Binder>> {
        xs.iter()
            .map(|x| {
                let Some(id) = x.fvar_id() else {
                    bail!("free variable expected: {x}");
                };
                let Some(decl) = self.lctx.find(id) else {
                    bail!("unknown free variable: {x}");
                };
                Ok(Binder {
                    fvar: id,
                    name: decl.user_name.clone(),
                    ty: self.instantiate_mvars(&decl.ty),
                    info: decl.binder_info,
                })
            })
            .collect()
    }

    pub fn mk_lambda_fvars(&self, xs: &[Expr], e: &Expr) -> anyhow::Result<Expr> {
        Ok(mk_binding(true, &self.local_binders(xs)?, e))
    }

    pub fn mk_forall_fvars(&self, xs: &[Expr], e: &Expr) -> anyhow::Result<Expr> {
        Ok(mk_binding(false, &self.local_binders(xs)?, e))
    }

    /// Instantiates the leading foralls of `ty` with fresh metavariables of `kind`.
    pub fn forall_meta_telescope(
        &mut self,
        ty: &Expr,
        kind: MetavarKind,
    ) -> (Vec<Expr>, Vec<BinderInfo>, Expr) {
        let mut mvars: Vec<Expr> = vec![];
        let mut binder_infos = vec![];
        let mut t = ty.clone();
        while let Expr::ForallE(inner) = &t {
            let d = inner.binder_type.instantiate_rev(&mvars);
            let m = self.mk_fresh_expr_mvar(d, kind, Some(inner.binder_name.clone()));
            mvars.push(m);
            binder_infos.push(inner.binder_info);
            t = inner.body.clone();
        }
        let t = t.instantiate_rev(&mvars);
        (mvars, binder_infos, t)
    }

    fn open_binders(&mut self, e: &Expr, lambda: bool) -> (Vec<Expr>, Expr) {
        let mut fvars: Vec<Expr> = vec![];
        let mut e = e.clone();
        loop {
            let inner = match &e {
                Expr::Lam(inner) if lambda => inner.clone(),
                Expr::ForallE(inner) if !lambda => inner.clone(),
                _ => break,
            };
            let ty = inner.binder_type.instantiate_rev(&fvars);
            let fvar_id = FVarId::fresh_with_name(inner.binder_name.clone());
            self.lctx.push(LocalDecl {
                fvar_id,
                user_name: inner.binder_name.clone(),
                ty,
                binder_info: inner.binder_info,
                implementation_detail: false,
            });
            fvars.push(mk_fvar(fvar_id));
            e = inner.body.clone();
        }
        let body = e.instantiate_rev(&fvars);
        (fvars, body)
    }

    pub fn infer_type(&mut self, e: &Expr) -> anyhow::Result<Expr> {
        match e {
            Expr::BVar(inner) => bail!("unexpected bound variable #{}", inner.index),
            Expr::FVar(inner) => match self.lctx.find(inner.id) {
                Some(decl) => Ok(decl.ty.clone()),
                None => bail!("unknown free variable {}", inner.id),
            },
            Expr::MVar(inner) => Ok(self.get_mvar_decl(inner.id)?.ty.clone()),
            Expr::Sort(inner) => Ok(mk_sort(Level::succ(inner.level.clone()))),
            Expr::Const(inner) => {
                let info = self.env.get(&inner.name)?;
                Ok(info.ty.instantiate_level_params(&info.level_params, &inner.levels))
            }
            Expr::Lit(inner) => Ok(match inner.lit {
                Literal::Nat(_) => mk_const(NAT.clone(), vec![]),
                Literal::Str(_) => mk_const(Name::intern("String"), vec![]),
            }),
            Expr::MData(inner) => self.infer_type(&inner.expr),
            Expr::App(_) => {
                let (f, args) = e.get_app_fn_args();
                let mut ty = self.infer_type(f)?;
                let mut j = 0;
                for i in 0..args.len() {
                    if let Expr::ForallE(inner) = &ty {
                        ty = inner.body.clone();
                        continue;
                    }
                    let pending: Vec<Expr> = args[j..i].iter().map(|a| (*a).clone()).collect();
                    ty = self.whnf(&ty.instantiate_rev(&pending))?;
                    j = i;
                    let Expr::ForallE(inner) = &ty else {
                        bail!("function expected: {e}");
                    };
                    ty = inner.body.clone();
                }
                let pending: Vec<Expr> = args[j..].iter().map(|a| (*a).clone()).collect();
                Ok(ty.instantiate_rev(&pending).head_beta())
            }
            Expr::Lam(_) => {
                let len = self.lctx.len();
                let (fvars, body) = self.open_binders(e, true);
                let r = self
                    .infer_type(&body)
                    .and_then(|ty| self.mk_forall_fvars(&fvars, &ty));
                self.lctx.truncate(len);
                r
            }
            Expr::ForallE(_) => {
                let len = self.lctx.len();
                let (fvars, body) = self.open_binders(e, false);
                let r: anyhow::Result<Expr> = (|| {
                    let mut level = self.get_level(&body)?;
                    for x in fvars.iter().rev() {
                        let ty = self.infer_type(x)?;
                        level = Level::mk_imax(self.get_level(&ty)?, level);
                    }
                    Ok(mk_sort(level))
                })();
                self.lctx.truncate(len);
                r
            }
        }
    }

    /// The universe `u` such that `ty : Sort u`.
    pub fn get_level(&mut self, ty: &Expr) -> anyhow::Result<Level> {
        let sort = self.infer_type(ty)?;
        let sort = self.whnf(&sort)?;
        match sort {
            Expr::Sort(inner) => Ok(self.instantiate_level(&inner.level)),
            Expr::MVar(_) => {
                let l = self.mk_fresh_level_mvar();
                if !self.is_def_eq(&sort, &mk_sort(l.clone()))? {
                    bail!("type expected: {ty}");
                }
                Ok(l)
            }
            _ => bail!("type expected: {ty}"),
        }
    }

    /// `e : Prop`
    pub fn is_prop(&mut self, e: &Expr) -> anyhow::Result<bool> {
        let ty = self.infer_type(e)?;
        Ok(self.whnf(&ty)?.is_prop())
    }

    /// `e : p` for some `p : Prop`
    pub fn is_proof(&mut self, e: &Expr) -> anyhow::Result<bool> {
        let ty = self.infer_type(e)?;
        self.is_prop(&ty)
    }

    fn can_unfold(&self, name: &Name, def: &DefinitionVal) -> bool {
        match self.config.transparency {
            TransparencyMode::All => true,
            TransparencyMode::Default => def.reducibility != ReducibilityStatus::Irreducible,
            TransparencyMode::Instances => {
                def.reducibility == ReducibilityStatus::Reducible || self.env.is_instance(name)
            }
            TransparencyMode::Reducible => def.reducibility == ReducibilityStatus::Reducible,
        }
    }

    /// Height of the definition at the head of `e`, if it may be unfolded.
    pub fn delta_height(&self, e: &Expr) -> Option<usize> {
        let name = e.get_app_fn().const_name()?;
        let def = self.env.definition_val(name)?;
        self.can_unfold(name, def).then_some(def.height)
    }

    /// One step of delta reduction at the head, followed by beta.
    pub fn unfold_definition(&self, e: &Expr) -> Option<Expr> {
        let Expr::Const(head) = e.get_app_fn() else {
            return None;
        };
        let info = self.env.find(&head.name)?;
        let ConstantKind::Definition(def) = &info.kind else {
            return None;
        };
        if !self.can_unfold(&head.name, def) {
            return None;
        }
        let value = def
            .value
            .instantiate_level_params(&info.level_params, &head.levels);
        Some(value.beta(&e.get_app_args()))
    }

    /// Beta, iota on `casesOn`, matcher unfolding (at default transparency and above)
    /// and metavariable instantiation at the head. No delta.
    pub fn whnf_core(&mut self, e: &Expr) -> anyhow::Result<Expr> {
        match e {
            Expr::MData(inner) => self.whnf_core(&inner.expr),
            Expr::MVar(inner) => match self.mctx.get_assignment(inner.id) {
                Some(value) => {
                    let value = self.instantiate_mvars(value);
                    self.whnf_core(&value)
                }
                None => Ok(e.clone()),
            },
            Expr::App(_) => {
                let f0 = e.get_app_fn();
                let f = self.whnf_core(f0)?;
                if f.is_lambda() {
                    let r = f.beta(&e.get_app_args());
                    return self.whnf_core(&r);
                }
                let e = if f.ptr_eq(f0) {
                    e.clone()
                } else {
                    mk_app_n(f.clone(), &e.get_app_args())
                };
                if let Some(r) = self.reduce_cases_on(&e)? {
                    return self.whnf_core(&r);
                }
                if let Some(r) = self.reduce_matcher(&e) {
                    return self.whnf_core(&r);
                }
                Ok(e)
            }
            _ => Ok(e.clone()),
        }
    }

    fn reduce_matcher(&self, e: &Expr) -> Option<Expr> {
        if self.config.transparency < TransparencyMode::Default {
            return None;
        }
        let name = e.get_app_fn().const_name()?;
        let info = self.env.matcher_info(name)?;
        if e.get_app_num_args() < info.arity() {
            return None;
        }
        self.unfold_definition(e)
    }

    fn reduce_cases_on(&mut self, e: &Expr) -> anyhow::Result<Option<Expr>> {
        let Expr::Const(head) = e.get_app_fn() else {
            return Ok(None);
        };
        let Some(info) = self.env.find(&head.name) else {
            return Ok(None);
        };
        let ConstantKind::CasesOn(val) = &info.kind else {
            return Ok(None);
        };
        let args = e.get_app_args();
        if args.len() < val.arity() {
            return Ok(None);
        }
        let major = self.whnf(&args[val.major_idx()])?;
        let Some((ctor, ctor_args)) = self.ctor_app(&major) else {
            return Ok(None);
        };
        if ctor.induct != val.induct {
            return Ok(None);
        }
        let minor = &args[val.major_idx() + 1 + ctor.cidx];
        let r = minor.beta(&ctor_args[ctor.num_params..]);
        Ok(Some(mk_app_n(r, &args[val.arity()..])))
    }

    /// Decomposes a saturated constructor application. Nat literals count as
    /// `Nat.zero`/`Nat.succ` applications.
    pub fn ctor_app(&self, e: &Expr) -> Option<(ConstructorVal, Vec<Expr>)> {
        let e = lit_to_ctor(e.consume_mdata());
        let name = e.get_app_fn().const_name()?;
        let ctor = self.env.constructor_val(name)?;
        let args = e.get_app_args();
        if args.len() != ctor.num_params + ctor.num_fields {
            return None;
        }
        Some((ctor.clone(), args))
    }

    /// The value of a closed natural number expression, computed through literals,
    /// `Nat.zero` and `Nat.succ`.
    pub fn nat_value(&mut self, e: &Expr) -> anyhow::Result<Option<u64>> {
        let e = self.whnf(e)?;
        if let Some(n) = e.nat_lit() {
            return Ok(Some(n));
        }
        if e.is_const_of(&NAT_ZERO) {
            return Ok(Some(0));
        }
        if e.is_app_of(&NAT_SUCC, 1) {
            if let Some(arg) = e.app_arg() {
                return Ok(self.nat_value(arg)?.and_then(|n| n.checked_add(1)));
            }
        }
        Ok(None)
    }

    /// Native evaluation of `Nat` primitives on literals, numeral folding, the linear
    /// arithmetic checkers, and the `noConfusionType` computation rule.
    pub(crate) fn reduce_native(&mut self, e: &Expr) -> anyhow::Result<Option<Expr>> {
        let Expr::Const(head) = e.get_app_fn() else {
            return Ok(None);
        };
        let name = head.name.clone();
        let args = e.get_app_args();
        if name == *OF_NAT_OF_NAT && args.len() == 3 {
            if args[1].nat_lit().is_some() && self.whnf(&args[0])?.is_const_of(&NAT) {
                return Ok(Some(args[1].clone()));
            }
            return Ok(None);
        }
        if name == *NAT_SUCC && args.len() == 1 {
            return Ok(self
                .nat_value(&args[0])?
                .and_then(|n| n.checked_add(1))
                .map(mk_nat_lit));
        }
        if (name == *NAT_LINEAR_IS_VALID || name == *NAT_LINEAR_IS_UNSAT) && args.len() == 1 {
            let p = self.instantiate_mvars(&args[0]);
            let expected = name == *NAT_LINEAR_IS_VALID;
            let ok = certify_linear(&p) == Some(expected);
            return Ok(Some(mk_const(if ok { BOOL_TRUE.clone() } else { BOOL_FALSE.clone() }, vec![])));
        }
        if name.last() == "noConfusionType" {
            return self.reduce_no_confusion_type(&name, &args);
        }
        if args.len() != 2 {
            return Ok(None);
        }
        let is_nat_op = [
            &*NAT_ADD, &*NAT_SUB, &*NAT_MUL, &*NAT_DIV, &*NAT_MOD, &*NAT_BEQ, &*NAT_BLE,
            &*NAT_DEC_EQ, &*NAT_DEC_LE,
        ]
        .contains(&&name);
        if !is_nat_op {
            return Ok(None);
        }
        let (Some(a), Some(b)) = (self.nat_value(&args[0])?, self.nat_value(&args[1])?) else {
            return Ok(None);
        };
        let bool_lit = |b: bool| mk_const(if b { BOOL_TRUE.clone() } else { BOOL_FALSE.clone() }, vec![]);
        let r = if name == *NAT_ADD {
            a.checked_add(b).map(mk_nat_lit)
        } else if name == *NAT_SUB {
            Some(mk_nat_lit(a.saturating_sub(b)))
        } else if name == *NAT_MUL {
            a.checked_mul(b).map(mk_nat_lit)
        } else if name == *NAT_DIV {
            Some(mk_nat_lit(if b == 0 { 0 } else { a / b }))
        } else if name == *NAT_MOD {
            Some(mk_nat_lit(if b == 0 { a } else { a % b }))
        } else if name == *NAT_BEQ {
            Some(bool_lit(a == b))
        } else if name == *NAT_BLE {
            Some(bool_lit(a <= b))
        } else if name == *NAT_DEC_EQ {
            Some(self.mk_nat_decision(
                e,
                a == b,
                &NAT_BEQ,
                &NAT_NE_OF_BEQ_EQ_FALSE,
                &NAT_NE_OF_BEQ_EQ_FALSE,
            ))
        } else {
            Some(self.mk_nat_decision(
                e,
                a <= b,
                &NAT_BLE,
                &NAT_LE_OF_BLE_EQ_TRUE,
                &NAT_NOT_LE_OF_BLE_EQ_FALSE,
            ))
        };
        Ok(r)
    }

    /// `Decidable.isTrue`/`isFalse` for a decided `Nat` comparison `e = Nat.decXX n m`.
    fn mk_nat_decision(&self, e: &Expr, holds: bool, test: &Name, pos: &Name, neg: &Name) -> Expr {
        let args = e.get_app_args();
        let (n, m) = (args[0].clone(), args[1].clone());
        let prop = if *test == *NAT_BEQ {
            mk_app_n(mk_const(EQ.clone(), vec![Level::one()]), &[mk_const(NAT.clone(), vec![]), n.clone(), m.clone()])
        } else {
            mk_app_n(mk_const(NAT_LE.clone(), vec![]), &[n.clone(), m.clone()])
        };
        let bool_const = |b: bool| mk_const(if b { BOOL_TRUE.clone() } else { BOOL_FALSE.clone() }, vec![]);
        let refl = mk_app_n(
            mk_const(EQ_REFL.clone(), vec![Level::one()]),
            &[mk_const(Name::intern("Bool"), vec![]), bool_const(holds)],
        );
        if holds {
            let proof = if *test == *NAT_BEQ {
                mk_app_n(mk_const(EQ_REFL.clone(), vec![Level::one()]), &[mk_const(NAT.clone(), vec![]), n])
            } else {
                mk_app_n(mk_const(pos.clone(), vec![]), &[n, m, refl])
            };
            mk_app_n(mk_const(DECIDABLE_IS_TRUE.clone(), vec![]), &[prop, proof])
        } else {
            let proof = mk_app_n(mk_const(neg.clone(), vec![]), &[n, m, refl]);
            mk_app_n(mk_const(DECIDABLE_IS_FALSE.clone(), vec![]), &[prop, proof])
        }
    }

    /// `T.noConfusionType params P (C as) (D bs)` is `P` when `C ≠ D`, and
    /// `(a₁ = b₁ → ⋯ → aₙ = bₙ → P) → P` otherwise.
    fn reduce_no_confusion_type(&mut self, name: &Name, args: &[Expr]) -> anyhow::Result<Option<Expr>> {
        let Some(induct) = name.prefix() else {
            return Ok(None);
        };
        let Some(num_params) = self.env.inductive_val(&induct).map(|v| v.num_params) else {
            return Ok(None);
        };
        if args.len() != num_params + 3 {
            return Ok(None);
        }
        let p = args[num_params].clone();
        let v1 = self.whnf(&args[num_params + 1])?;
        let v2 = self.whnf(&args[num_params + 2])?;
        let (Some((c1, as1)), Some((c2, as2))) = (self.ctor_app(&v1), self.ctor_app(&v2)) else {
            return Ok(None);
        };
        if c1.cidx != c2.cidx {
            return Ok(Some(p));
        }
        let mut hyps = vec![];
        for (a, b) in as1[c1.num_params..].iter().zip(&as2[c2.num_params..]) {
            let ty = self.infer_type(a)?;
            let level = self.get_level(&ty)?;
            hyps.push(mk_app_n(mk_const(EQ.clone(), vec![level]), &[ty, a.clone(), b.clone()]));
        }
        let mut premise = p.clone();
        for h in hyps.into_iter().rev() {
            premise = mk_arrow(h, premise);
        }
        Ok(Some(mk_arrow(premise, p)))
    }

    pub fn whnf(&mut self, e: &Expr) -> anyhow::Result<Expr> {
        self.stats.whnf_calls += 1;
        self.with_inc_rec_depth(|this| {
            let mut e = e.clone();
            loop {
                e = this.whnf_core(&e)?;
                if let Some(r) = this.reduce_native(&e)? {
                    e = r;
                    continue;
                }
                if let Some(r) = this.unfold_definition(&e) {
                    e = r;
                    continue;
                }
                return Ok(e);
            }
        })
    }

    pub fn whnf_r(&mut self, e: &Expr) -> anyhow::Result<Expr> {
        self.with_transparency(TransparencyMode::Reducible, |this| this.whnf(e))
    }

    pub fn whnf_d(&mut self, e: &Expr) -> anyhow::Result<Expr> {
        self.with_transparency(TransparencyMode::Default, |this| this.whnf(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::mk_prop;
    use crate::prelude::{self, list_length, list_lit, nat, nat_add, nat_eq, of_nat, DECIDABLE_DECIDE};

    #[test]
    fn native_nat_arithmetic() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let e = nat_add(of_nat(2), nat_add(mk_nat_lit(3), mk_nat_lit(4)));
        assert_eq!(meta.whnf(&e).unwrap(), mk_nat_lit(9));
        let e = mk_app(mk_const(NAT_SUCC.clone(), vec![]), mk_nat_lit(41));
        assert_eq!(meta.whnf(&e).unwrap(), mk_nat_lit(42));
    }

    #[test]
    fn decide_reduces_through_cases_on() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let p = nat_eq(mk_nat_lit(2), mk_nat_lit(2));
        let inst = mk_app_n(mk_const(NAT_DEC_EQ.clone(), vec![]), &[mk_nat_lit(2), mk_nat_lit(2)]);
        let d = mk_app_n(mk_const(DECIDABLE_DECIDE.clone(), vec![]), &[p, inst]);
        assert!(meta.whnf_d(&d).unwrap().is_const_of(&BOOL_TRUE));

        let p = nat_eq(mk_nat_lit(2), mk_nat_lit(3));
        let inst = mk_app_n(mk_const(NAT_DEC_EQ.clone(), vec![]), &[mk_nat_lit(2), mk_nat_lit(3)]);
        let d = mk_app_n(mk_const(DECIDABLE_DECIDE.clone(), vec![]), &[p, inst]);
        assert!(meta.whnf_d(&d).unwrap().is_const_of(&BOOL_FALSE));
    }

    #[test]
    fn infer_list_length() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let l = list_lit(Level::zero(), nat(), &[mk_nat_lit(1)]);
        let e = list_length(Level::zero(), nat(), l);
        assert_eq!(meta.infer_type(&e).unwrap(), nat());
        assert!(meta.is_prop(&nat_eq(e.clone(), mk_nat_lit(1))).unwrap());
        assert!(!meta.is_prop(&e).unwrap());
        assert_eq!(meta.infer_type(&nat_eq(e, mk_nat_lit(1))).unwrap(), mk_prop());
    }

    #[test]
    fn fresh_scope_freezes_outer_mvars() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let outer = meta.mk_fresh_expr_mvar(nat(), MetavarKind::Natural, None);
        let id = outer.mvar_id().unwrap();
        assert!(meta.is_assignable(id));
        meta.with_fresh_scope(false, |meta| {
            assert!(!meta.is_assignable(id));
            let inner = meta.mk_fresh_expr_mvar(nat(), MetavarKind::SyntheticOpaque, None);
            assert!(!meta.is_assignable(inner.mvar_id().unwrap()));
            Ok(())
        })
        .unwrap();
        meta.with_fresh_scope(true, |meta| {
            let inner = meta.mk_fresh_expr_mvar(nat(), MetavarKind::SyntheticOpaque, None);
            assert!(meta.is_assignable(inner.mvar_id().unwrap()));
            assert!(meta.has_assignable_mvar(&nat_add(inner, mk_nat_lit(1))));
            Ok(())
        })
        .unwrap();
        assert!(meta.is_assignable(id));
        assert!(!meta.config.assign_synthetic_opaque);
        assert_eq!(meta.mctx.num_expr_mvars(), 1);
    }

    #[test]
    fn rec_depth_is_runtime() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::with_config(
            &env,
            MetaConfig {
                max_rec_depth: 0,
                ..Default::default()
            },
        );
        let err = meta.whnf(&nat()).unwrap_err();
        assert!(crate::error::is_runtime_exception(&err));
    }
}
