//! Metavariable and local contexts.
//!
//! The metavariable context is persistent (`im` maps), so taking a checkpoint before a
//! speculative unification and rolling back to it are both O(1).

use crate::expr::{mk_fvar, BinderInfo, Expr, FVarId, LMVarId, Level, MVarId, Name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetavarKind {
    Natural,
    Synthetic,
    /// Never assigned by unification unless the current scope explicitly allows it.
    SyntheticOpaque,
}

#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub fvar_id: FVarId,
    pub user_name: Name,
    pub ty: Expr,
    pub binder_info: BinderInfo,
    pub implementation_detail: bool,
}

impl LocalDecl {
    pub fn to_expr(&self) -> Expr {
        mk_fvar(self.fvar_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalContext {
    decls: im::Vector<LocalDecl>,
}

impl LocalContext {
    pub fn find(&self, id: FVarId) -> Option<&LocalDecl> {
        self.decls.iter().rev().find(|decl| decl.fvar_id == id)
    }

    pub fn contains(&self, id: FVarId) -> bool {
        self.find(id).is_some()
    }

    pub fn push(&mut self, decl: LocalDecl) {
        self.decls.push_back(decl);
    }

    pub fn pop(&mut self) -> Option<LocalDecl> {
        self.decls.pop_back()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.decls.truncate(len);
    }

    /// Most recent declaration first.
    pub fn iter_rev(&self) -> impl Iterator<Item = &LocalDecl> {
        self.decls.iter().rev()
    }
}

#[derive(Debug, Clone)]
pub struct MetavarDecl {
    pub user_name: Option<Name>,
    pub ty: Expr,
    pub kind: MetavarKind,
    pub depth: usize,
    pub lctx: LocalContext,
}

#[derive(Debug, Clone, Default)]
pub struct MetaCtx {
    pub depth: usize,
    decls: im::HashMap<MVarId, MetavarDecl>,
    eassign: im::HashMap<MVarId, Expr>,
    level_depths: im::HashMap<LMVarId, usize>,
    lassign: im::HashMap<LMVarId, Level>,
}

impl MetaCtx {
    pub fn add_expr_mvar(&mut self, id: MVarId, decl: MetavarDecl) {
        self.decls.insert(id, decl);
    }

    pub fn add_level_mvar(&mut self, id: LMVarId) {
        self.level_depths.insert(id, self.depth);
    }

    pub fn find_decl(&self, id: MVarId) -> Option<&MetavarDecl> {
        self.decls.get(&id)
    }

    pub fn get_assignment(&self, id: MVarId) -> Option<&Expr> {
        self.eassign.get(&id)
    }

    pub fn get_level_assignment(&self, id: LMVarId) -> Option<&Level> {
        self.lassign.get(&id)
    }

    pub fn is_assigned(&self, id: MVarId) -> bool {
        self.eassign.contains_key(&id)
    }

    pub fn is_level_assigned(&self, id: LMVarId) -> bool {
        self.lassign.contains_key(&id)
    }

    pub fn assign(&mut self, id: MVarId, value: Expr) {
        self.eassign.insert(id, value);
    }

    pub fn assign_level(&mut self, id: LMVarId, value: Level) {
        self.lassign.insert(id, value);
    }

    /// A metavariable is owned by the current scope iff it was created at the current depth.
    pub fn is_owned(&self, id: MVarId) -> bool {
        self.decls.get(&id).is_some_and(|decl| decl.depth == self.depth)
    }

    pub fn is_level_owned(&self, id: LMVarId) -> bool {
        self.level_depths.get(&id).is_some_and(|d| *d == self.depth)
    }

    /// Forgets the metavariables created deeper than `depth`, with their assignments.
    pub fn drop_deeper_than(&mut self, depth: usize) {
        let decls = &self.decls;
        self.eassign
            .retain(|id, _| decls.get(id).map_or(true, |decl| decl.depth <= depth));
        self.decls.retain(|_, decl| decl.depth <= depth);
        let level_depths = &self.level_depths;
        self.lassign
            .retain(|id, _| level_depths.get(id).map_or(true, |d| *d <= depth));
        self.level_depths.retain(|_, d| *d <= depth);
    }

    pub fn num_expr_mvars(&self) -> usize {
        self.decls.len()
    }

    pub fn num_level_mvars(&self) -> usize {
        self.level_depths.len()
    }

    pub fn instantiate_level(&self, l: &Level) -> Level {
        if !l.has_mvar() {
            return l.clone();
        }
        l.replace(&|l| match l {
            Level::MVar(id) => self
                .lassign
                .get(id)
                .map(|value| self.instantiate_level(value)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::mk_nat_lit;
    use crate::prelude::nat;

    #[test]
    fn checkpoint_is_persistent() {
        let mut mctx = MetaCtx::default();
        let id = MVarId::fresh();
        mctx.add_expr_mvar(
            id,
            MetavarDecl {
                user_name: None,
                ty: nat(),
                kind: MetavarKind::Natural,
                depth: 0,
                lctx: Default::default(),
            },
        );
        let saved = mctx.clone();
        mctx.assign(id, mk_nat_lit(1));
        assert!(mctx.is_assigned(id));
        assert!(!saved.is_assigned(id));
        assert!(saved.is_owned(id));
    }

    #[test]
    fn scope_ownership() {
        let mut mctx = MetaCtx::default();
        let l = LMVarId::fresh();
        mctx.add_level_mvar(l);
        mctx.depth += 1;
        assert!(!mctx.is_level_owned(l));
        mctx.depth -= 1;
        mctx.assign_level(l, Level::one());
        assert_eq!(mctx.instantiate_level(&Level::succ(Level::MVar(l))).to_nat(), Some(2));
    }

    #[test]
    fn deeper_mvars_are_dropped() {
        let mut mctx = MetaCtx::default();
        let decl = |depth| MetavarDecl {
            user_name: None,
            ty: nat(),
            kind: MetavarKind::Natural,
            depth,
            lctx: Default::default(),
        };
        let (outer, inner) = (MVarId::fresh(), MVarId::fresh());
        mctx.add_expr_mvar(outer, decl(0));
        mctx.depth = 1;
        mctx.add_expr_mvar(inner, decl(1));
        mctx.assign(inner, mk_nat_lit(2));
        let l = LMVarId::fresh();
        mctx.add_level_mvar(l);
        mctx.assign_level(l, Level::one());
        mctx.depth = 0;
        mctx.drop_deeper_than(0);
        assert_eq!((mctx.num_expr_mvars(), mctx.num_level_mvars()), (1, 0));
        assert!(mctx.find_decl(outer).is_some());
        assert!(mctx.find_decl(inner).is_none());
        assert!(!mctx.is_assigned(inner));
        assert!(!mctx.is_level_assigned(l));
    }
}
