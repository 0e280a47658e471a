//! Strict total order on expressions, used to orient permutative rewrites.

use std::cmp::Ordering;

use crate::expr::{Expr, Literal};

/// A strict order on expressions. Permutative lemmas only fire when the result is
/// strictly smaller than the input, which rules out rewrite cycles.
pub trait ExprOrder {
    fn lt(&self, a: &Expr, b: &Expr) -> bool;
}

/// Orders by approximate depth first, then structurally: variable-like terms before
/// constants before applications, free variables by creation order, constants by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcLt {
    /// Decide by depth alone whenever depths differ. Without it depth is only a final
    /// tie-break after the structural comparison.
    pub allow_approx: bool,
}

impl AcLt {
    pub fn new(allow_approx: bool) -> Self {
        AcLt { allow_approx }
    }

    fn rank(e: &Expr) -> u8 {
        match e {
            Expr::Lit(_) => 0,
            Expr::BVar(_) => 1,
            Expr::FVar(_) => 2,
            Expr::MVar(_) => 3,
            Expr::Sort(_) => 4,
            Expr::Const(_) => 5,
            Expr::App(_) => 6,
            Expr::Lam(_) => 7,
            Expr::ForallE(_) => 8,
            Expr::MData(_) => 9,
        }
    }

    pub fn compare(&self, a: &Expr, b: &Expr) -> Ordering {
        if a.ptr_eq(b) || a == b {
            return Ordering::Equal;
        }
        let (a, b) = (a.consume_mdata(), b.consume_mdata());
        if self.allow_approx {
            let by_depth = a.approx_depth().cmp(&b.approx_depth());
            if by_depth != Ordering::Equal {
                return by_depth;
            }
        }
        let r = self.compare_structural(a, b);
        if r == Ordering::Equal {
            a.approx_depth().cmp(&b.approx_depth())
        } else {
            r
        }
    }

    fn compare_structural(&self, a: &Expr, b: &Expr) -> Ordering {
        let by_rank = Self::rank(a).cmp(&Self::rank(b));
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (a, b) {
            (Expr::Lit(x), Expr::Lit(y)) => match (&x.lit, &y.lit) {
                (Literal::Nat(n), Literal::Nat(m)) => n.cmp(m),
                (Literal::Nat(_), Literal::Str(_)) => Ordering::Less,
                (Literal::Str(_), Literal::Nat(_)) => Ordering::Greater,
                (Literal::Str(s), Literal::Str(t)) => s.cmp(t),
            },
            (Expr::BVar(x), Expr::BVar(y)) => x.index.cmp(&y.index),
            (Expr::FVar(x), Expr::FVar(y)) => x.id.cmp(&y.id),
            (Expr::MVar(x), Expr::MVar(y)) => x.id.cmp(&y.id),
            (Expr::Sort(x), Expr::Sort(y)) => x.level.cmp(&y.level),
            (Expr::Const(x), Expr::Const(y)) => x
                .name
                .cmp(&y.name)
                .then_with(|| x.levels.cmp(&y.levels)),
            (Expr::App(_), Expr::App(_)) => {
                let (f, xs) = a.get_app_fn_args();
                let (g, ys) = b.get_app_fn_args();
                xs.len()
                    .cmp(&ys.len())
                    .then_with(|| self.compare(f, g))
                    .then_with(|| {
                        xs.iter()
                            .zip(&ys)
                            .map(|(x, y)| self.compare(x, y))
                            .find(|o| *o != Ordering::Equal)
                            .unwrap_or(Ordering::Equal)
                    })
            }
            (Expr::Lam(x), Expr::Lam(y)) | (Expr::ForallE(x), Expr::ForallE(y)) => self
                .compare(&x.binder_type, &y.binder_type)
                .then_with(|| self.compare(&x.body, &y.body)),
            _ => Ordering::Equal,
        }
    }
}

impl ExprOrder for AcLt {
    fn lt(&self, a: &Expr, b: &Expr) -> bool {
        self.compare(a, b) == Ordering::Less
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{mk_fvar, mk_nat_lit, FVarId, Name};
    use crate::prelude::{nat_add, nat_succ};

    #[test]
    fn irreflexive_and_asymmetric() {
        let x = mk_fvar(FVarId::fresh_with_name(Name::intern("x")));
        let y = mk_fvar(FVarId::fresh_with_name(Name::intern("y")));
        for order in [AcLt::new(false), AcLt::new(true)] {
            let xy = nat_add(x.clone(), y.clone());
            let yx = nat_add(y.clone(), x.clone());
            assert!(!order.lt(&xy, &xy));
            assert!(order.lt(&xy, &yx));
            assert!(!order.lt(&yx, &xy));
            assert!(order.lt(&x, &y));
            assert!(order.lt(&mk_nat_lit(3), &x));
        }
    }

    #[test]
    fn approx_prefers_shallow_terms() {
        let x = mk_fvar(FVarId::fresh_with_name(Name::intern("x")));
        let deep = nat_succ(nat_succ(nat_succ(mk_nat_lit(0))));
        let shallow = nat_add(x.clone(), x);
        assert!(AcLt::new(true).lt(&shallow, &deep));
        // structurally both are `App`s; `Nat.add` takes more arguments
        assert!(AcLt::new(false).lt(&deep, &shallow));
    }
}
