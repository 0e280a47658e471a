//! Simp lemmas and the pre/post lemma sets.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;

use anyhow::bail;

use crate::app_builder::eq_parts;
use crate::discr_tree::{DiscrTree, Key};
use crate::env::ConstantKind;
use crate::expr::{mk_const, Expr, FVarId, Level, MVarId, Name};
use crate::mctx::MetavarKind;
use crate::meta::Meta;
use crate::prelude::{false_prop, true_prop, EQ_REFL, NOT};

pub const DEFAULT_PRIORITY: u32 = 1000;

/// Where a simp lemma comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    Decl(Name),
    FVar(FVarId),
    Stx(Name),
    Other(Name),
}

impl Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Decl(name) => write!(f, "{name}"),
            Origin::FVar(id) => write!(f, "{id}"),
            Origin::Stx(name) => write!(f, "[{name}]"),
            Origin::Other(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConclKind {
    /// `lhs = rhs`
    Eq,
    /// a proposition `p`, used as `p = True`
    EqTrue,
    /// `¬p`, used as `p = False`
    EqFalse,
}

/// Reads the rewrite off a lemma's conclusion.
pub fn conclusion_sides(concl: &Expr) -> (Expr, Expr, ConclKind) {
    if let Some(eq) = eq_parts(concl) {
        return (eq.lhs, eq.rhs, ConclKind::Eq);
    }
    let concl = concl.consume_mdata();
    if concl.is_app_of(&NOT, 1) {
        if let Some(p) = concl.app_arg() {
            return (p.clone(), false_prop(), ConclKind::EqFalse);
        }
    }
    (concl.clone(), true_prop(), ConclKind::EqTrue)
}

#[derive(Debug, Clone)]
pub struct SimpTheorem {
    pub origin: Origin,
    /// Proof term, universe polymorphic over `level_params`.
    pub proof: Expr,
    pub level_params: Vec<Name>,
    pub keys: Vec<Key>,
    pub priority: u32,
    pub post: bool,
    /// Left- and right-hand side agree up to a renaming of the lemma's variables.
    pub perm: bool,
    /// Holds by `Eq.refl`, so rewriting with it needs no proof.
    pub rfl: bool,
    /// Registration order.
    pub index: usize,
    /// Number of arguments the left-hand side is applied to.
    pub lhs_arity: usize,
}

impl Display for SimpTheorem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.origin)?;
        if self.perm {
            write!(f, ":perm")?;
        }
        write!(f, "#{}", self.index)
    }
}

impl SimpTheorem {
    /// The proof with every universe parameter replaced by a fresh level metavariable.
    pub fn instantiate_proof(&self, meta: &mut Meta) -> Expr {
        if self.level_params.is_empty() {
            return self.proof.clone();
        }
        let levels: Vec<Level> = self
            .level_params
            .iter()
            .map(|_| meta.mk_fresh_level_mvar())
            .collect();
        self.proof.instantiate_level_params(&self.level_params, &levels)
    }

    /// Builds a lemma from a proof. The statement is opened with throwaway
    /// metavariables to compute its index keys.
    pub fn new(
        meta: &mut Meta,
        origin: Origin,
        proof: Expr,
        level_params: Vec<Name>,
        post: bool,
        priority: u32,
    ) -> anyhow::Result<SimpTheorem> {
        let rfl = match &origin {
            Origin::Decl(name) => is_rfl_theorem(meta, name),
            _ => false,
        };
        let ty = meta.infer_type(&proof)?;
        let ty = meta.instantiate_mvars(&ty);
        let (keys, perm, lhs_arity) = meta.with_fresh_scope(false, |meta| {
            let (_, _, concl) = meta.forall_meta_telescope(&ty, MetavarKind::Natural);
            let (lhs, rhs, kind) = conclusion_sides(&concl);
            if kind == ConclKind::Eq && lhs.is_mvar() {
                bail!("invalid simp lemma {origin}, left-hand side is a metavariable");
            }
            let keys = meta.mk_path(&lhs)?;
            let perm = kind == ConclKind::Eq && is_perm(&lhs, &rhs);
            Ok((keys, perm, lhs.get_app_num_args()))
        })?;
        Ok(SimpTheorem {
            origin,
            proof,
            level_params,
            keys,
            priority,
            post,
            perm,
            rfl,
            index: 0,
            lhs_arity,
        })
    }

    pub fn from_decl(meta: &mut Meta, name: &Name, post: bool, priority: u32) -> anyhow::Result<SimpTheorem> {
        let info = meta.env.get(name)?;
        let level_params = info.level_params.clone();
        let proof = mk_const(
            name.clone(),
            level_params.iter().cloned().map(Level::param).collect(),
        );
        SimpTheorem::new(meta, Origin::Decl(name.clone()), proof, level_params, post, priority)
    }
}

/// A theorem proved by `Eq.refl`, possibly under binders.
fn is_rfl_theorem(meta: &Meta, name: &Name) -> bool {
    let Some(info) = meta.env.find(name) else {
        return false;
    };
    let ConstantKind::Theorem(value) = &info.kind else {
        return false;
    };
    let mut value = value;
    while let Expr::Lam(inner) = value {
        value = &inner.body;
    }
    value.get_app_fn().is_const_of(&EQ_REFL)
}

/// Structural equality up to a consistent renaming of metavariables.
pub fn is_perm(lhs: &Expr, rhs: &Expr) -> bool {
    fn go(a: &Expr, b: &Expr, fwd: &mut HashMap<MVarId, MVarId>, bwd: &mut HashMap<MVarId, MVarId>) -> bool {
        match (a.consume_mdata(), b.consume_mdata()) {
            (Expr::MVar(x), Expr::MVar(y)) => {
                let ok_fwd = *fwd.entry(x.id).or_insert(y.id) == y.id;
                let ok_bwd = *bwd.entry(y.id).or_insert(x.id) == x.id;
                ok_fwd && ok_bwd
            }
            (Expr::App(x), Expr::App(y)) => go(&x.fun, &y.fun, fwd, bwd) && go(&x.arg, &y.arg, fwd, bwd),
            (Expr::Lam(x), Expr::Lam(y)) | (Expr::ForallE(x), Expr::ForallE(y)) => {
                go(&x.binder_type, &y.binder_type, fwd, bwd) && go(&x.body, &y.body, fwd, bwd)
            }
            (a, b) => a == b,
        }
    }
    go(lhs, rhs, &mut HashMap::new(), &mut HashMap::new())
}

/// A lemma set: one discrimination tree per phase and the erased lemmas.
#[derive(Debug, Clone, Default)]
pub struct SimpTheorems {
    pub pre: DiscrTree<Arc<SimpTheorem>>,
    pub post: DiscrTree<Arc<SimpTheorem>>,
    erased: HashSet<Origin>,
    next_index: usize,
}

impl SimpTheorems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut thm: SimpTheorem) {
        thm.index = self.next_index;
        self.next_index += 1;
        self.erased.remove(&thm.origin);
        let keys = thm.keys.clone();
        if thm.post {
            self.post.insert(&keys, Arc::new(thm));
        } else {
            self.pre.insert(&keys, Arc::new(thm));
        }
    }

    /// Adds the global theorem `name`.
    pub fn add_const(&mut self, meta: &mut Meta, name: &Name, post: bool, priority: u32) -> anyhow::Result<()> {
        let thm = SimpTheorem::from_decl(meta, name, post, priority)?;
        log::debug!(target: "simp::rewrite", "added simp lemma {thm} with keys {:?}", thm.keys);
        self.add(thm);
        Ok(())
    }

    /// Adds a local hypothesis `h` as a lemma.
    pub fn add_fvar(&mut self, meta: &mut Meta, h: &Expr, post: bool, priority: u32) -> anyhow::Result<()> {
        let Some(id) = h.fvar_id() else {
            bail!("local hypothesis expected: {h}");
        };
        let thm = SimpTheorem::new(meta, Origin::FVar(id), h.clone(), vec![], post, priority)?;
        self.add(thm);
        Ok(())
    }

    /// Adds an arbitrary closed proof term under the name `name`.
    pub fn add_expr(&mut self, meta: &mut Meta, name: Name, proof: Expr, post: bool, priority: u32) -> anyhow::Result<()> {
        let thm = SimpTheorem::new(meta, Origin::Other(name), proof, vec![], post, priority)?;
        self.add(thm);
        Ok(())
    }

    pub fn erase(&mut self, origin: Origin) {
        self.erased.insert(origin);
    }

    pub fn is_erased(&self, origin: &Origin) -> bool {
        self.erased.contains(origin)
    }

    pub fn len(&self) -> usize {
        self.pre.len() + self.post.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
