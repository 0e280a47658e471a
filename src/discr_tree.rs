//! Discrimination trees: a trie over the preorder key sequence of a term, used to find
//! the lemmas whose left-hand side may match a given expression.

use std::collections::BTreeMap;
use std::fmt::Display;

use crate::expr::{Expr, FVarId, Literal, Name};
use crate::meta::{Meta, TransparencyMode};
use crate::simp::nat_numeral;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Star,
    Other,
    Sort,
    Arrow,
    Lit(u64),
    Str(String),
    FVar(FVarId, usize),
    Const(Name, usize),
}

impl Key {
    fn arity(&self) -> usize {
        match self {
            Key::Const(_, n) | Key::FVar(_, n) => *n,
            Key::Arrow => 2,
            _ => 0,
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Star => write!(f, "*"),
            Key::Other => write!(f, "◾"),
            Key::Sort => write!(f, "Sort"),
            Key::Arrow => write!(f, "→"),
            Key::Lit(n) => write!(f, "{n}"),
            Key::Str(s) => write!(f, "{s:?}"),
            Key::FVar(id, _) => write!(f, "{id}"),
            Key::Const(name, _) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone)]
struct Trie<V> {
    values: Vec<V>,
    children: BTreeMap<Key, Trie<V>>,
}

impl<V> Default for Trie<V> {
    fn default() -> Self {
        Trie {
            values: vec![],
            children: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscrTree<V> {
    root: Trie<V>,
    len: usize,
}

impl<V> Default for DiscrTree<V> {
    fn default() -> Self {
        DiscrTree {
            root: Trie::default(),
            len: 0,
        }
    }
}

impl<'a> Meta<'a> {
    /// Reduction applied before a key is read off: `whnf_core` and reducible delta, but
    /// no literal folding, so `2 + 3` still keys as `Nat.add`.
    fn reduce_dt(&mut self, e: &Expr) -> anyhow::Result<Expr> {
        self.with_transparency(TransparencyMode::Reducible, |this| {
            let mut e = this.instantiate_mvars(e);
            loop {
                e = this.whnf_core(&e)?;
                match this.unfold_definition(&e) {
                    Some(r) => e = r,
                    None => return Ok(e),
                }
            }
        })
    }

    /// Arguments that do not take part in indexing: instances, proofs, and implicit
    /// arguments that are not types.
    fn ignored_args(&mut self, f: &Expr, args: &[Expr]) -> anyhow::Result<Vec<bool>> {
        let mut ty = self.infer_type(f)?;
        let mut ignored = Vec::with_capacity(args.len());
        for arg in args {
            if !ty.is_forall() {
                ty = self.whnf(&ty)?;
            }
            let Expr::ForallE(binder) = &ty else {
                ignored.push(false);
                continue;
            };
            let bi = binder.binder_info;
            let skip = if bi.is_inst_implicit() {
                true
            } else if bi.is_explicit() {
                !arg.has_loose_bvars() && self.is_proof(arg)?
            } else {
                !self.is_type(arg)?
            };
            ignored.push(skip);
            ty = binder.body.instantiate1(arg);
        }
        Ok(ignored)
    }

    fn is_type(&mut self, e: &Expr) -> anyhow::Result<bool> {
        if e.has_loose_bvars() {
            return Ok(false);
        }
        let ty = self.infer_type(e)?;
        Ok(self.whnf(&ty)?.is_sort())
    }

    /// The key of `e` together with the subterms indexed below it; `None` marks an
    /// ignored argument. Metavariables key as [Key::Star].
    fn key_args(&mut self, e: &Expr) -> anyhow::Result<(Key, Vec<Option<Expr>>)> {
        let e = self.reduce_dt(e)?;
        if let Some(n) = nat_numeral(&e) {
            return Ok((Key::Lit(n), vec![]));
        }
        let f = e.get_app_fn();
        let args = e.get_app_args();
        let key = match f {
            Expr::MVar(_) => return Ok((Key::Star, vec![])),
            Expr::Lit(inner) => match &inner.lit {
                Literal::Str(s) if args.is_empty() => Key::Str(s.clone()),
                _ => Key::Other,
            },
            Expr::Sort(_) if args.is_empty() => Key::Sort,
            Expr::ForallE(binder) if args.is_empty() && !binder.body.has_loose_bvars() => {
                let children = vec![Some(binder.binder_type.clone()), Some(binder.body.clone())];
                return Ok((Key::Arrow, children));
            }
            Expr::Const(inner) => Key::Const(inner.name.clone(), args.len()),
            Expr::FVar(inner) => Key::FVar(inner.id, args.len()),
            _ => Key::Other,
        };
        if key.arity() == 0 {
            return Ok((key, vec![]));
        }
        let ignored = self.ignored_args(f, &args)?;
        let children = args
            .into_iter()
            .zip(ignored)
            .map(|(a, skip)| (!skip).then_some(a))
            .collect();
        Ok((key, children))
    }

    /// Preorder key sequence of a lemma's left-hand side. Metavariables and ignored
    /// arguments become [Key::Star].
    pub fn mk_path(&mut self, e: &Expr) -> anyhow::Result<Vec<Key>> {
        let mut path = vec![];
        let mut todo = vec![Some(e.clone())];
        while let Some(e) = todo.pop() {
            let Some(e) = e else {
                path.push(Key::Star);
                continue;
            };
            let (key, args) = self.key_args(&e)?;
            path.push(key);
            todo.extend(args.into_iter().rev());
        }
        Ok(path)
    }
}

impl<V: Clone> DiscrTree<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, keys: &[Key], value: V) {
        let mut node = &mut self.root;
        for key in keys {
            node = node.children.entry(key.clone()).or_default();
        }
        node.values.push(value);
        self.len += 1;
    }

    pub fn values(&self) -> Vec<V> {
        fn go<V: Clone>(t: &Trie<V>, out: &mut Vec<V>) {
            out.extend(t.values.iter().cloned());
            for child in t.children.values() {
                go(child, out);
            }
        }
        let mut out = vec![];
        go(&self.root, &mut out);
        out
    }

    /// Values whose pattern may match `e`. Target metavariables only match stars.
    pub fn get_match(&self, meta: &mut Meta, e: &Expr) -> anyhow::Result<Vec<V>> {
        let mut out = vec![];
        Self::get_match_core(&self.root, meta, vec![Some(e.clone())], &mut out)?;
        Ok(out)
    }

    fn get_match_core(
        node: &Trie<V>,
        meta: &mut Meta,
        mut todo: Vec<Option<Expr>>,
        out: &mut Vec<V>,
    ) -> anyhow::Result<()> {
        let Some(e) = todo.pop() else {
            out.extend(node.values.iter().cloned());
            return Ok(());
        };
        if let Some(child) = node.children.get(&Key::Star) {
            Self::get_match_core(child, meta, todo.clone(), out)?;
        }
        let Some(e) = e else {
            return Ok(());
        };
        let (key, args) = meta.key_args(&e)?;
        if key == Key::Star {
            return Ok(());
        }
        if let Some(child) = node.children.get(&key) {
            todo.extend(args.into_iter().rev());
            Self::get_match_core(child, meta, todo, out)?;
        }
        Ok(())
    }

    /// Like [DiscrTree::get_match], but also matches the prefixes `f a₁ … aₖ` of an
    /// application `f a₁ … aₙ`, reporting the number `n - k` of extra arguments.
    pub fn get_match_with_extra(&self, meta: &mut Meta, e: &Expr) -> anyhow::Result<Vec<(V, usize)>> {
        let mut out: Vec<(V, usize)> = self
            .get_match(meta, e)?
            .into_iter()
            .map(|v| (v, 0))
            .collect();
        let num_args = e.get_app_num_args();
        for extra in 1..=num_args {
            let prefix = e.strip_args(extra);
            out.extend(self.get_match(meta, &prefix)?.into_iter().map(|v| (v, extra)));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{mk_nat_lit, BinderInfo, Level};
    use crate::mctx::MetavarKind;
    use crate::prelude::{self, cnst, list_length, list_lit, nat, nat_add, of_nat, NAT_ADD};

    #[test]
    fn paths_skip_implicit_and_instance_args() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let m = meta.mk_fresh_expr_mvar(nat(), MetavarKind::Natural, None);
        let path = meta.mk_path(&nat_add(m, of_nat(1))).unwrap();
        let shown: Vec<String> = path.iter().map(|k| k.to_string()).collect();
        insta::assert_debug_snapshot!(shown, @r###"
        [
            "Nat.add",
            "*",
            "1",
        ]
        "###);
        let l = list_lit(Level::zero(), nat(), &[mk_nat_lit(1)]);
        let path = meta.mk_path(&list_length(Level::zero(), nat(), l)).unwrap();
        let shown: Vec<String> = path.iter().map(|k| k.to_string()).collect();
        insta::assert_debug_snapshot!(shown, @r###"
        [
            "List.length",
            "Nat",
            "List.cons",
            "Nat",
            "1",
            "List.nil",
            "Nat",
        ]
        "###);
    }

    #[test]
    fn match_with_stars_and_extra_args() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let mut tree = DiscrTree::new();
        let m = meta.mk_fresh_expr_mvar(nat(), MetavarKind::Natural, None);
        let keys = meta.mk_path(&nat_add(m, mk_nat_lit(0))).unwrap();
        tree.insert(&keys, "add_zero");
        let keys = meta.mk_path(&cnst(&NAT_ADD)).unwrap();
        tree.insert(&keys, "add_fn");

        let (hits, misses) = meta
            .with_local_decl(Name::intern("x"), BinderInfo::Default, nat(), |meta, x| {
                let hits = tree.get_match_with_extra(meta, &nat_add(x.clone(), mk_nat_lit(0)))?;
                let misses = tree.get_match(meta, &nat_add(x, mk_nat_lit(1)))?;
                Ok((hits, misses))
            })
            .unwrap();
        assert_eq!(hits, vec![("add_zero", 0), ("add_fn", 2)]);
        assert!(misses.is_empty());
    }
}
