//! Simplification procedures: user-registered rewriting functions tried alongside the
//! lemma set, and the built-in `Nat` literal folding procedures.

use std::collections::HashSet;

use crate::app_builder::eq_parts;
use crate::expr::{mk_app_n, mk_const, mk_nat_lit, Expr, Level, Name};
use crate::prelude::{
    bool_ty, false_prop, nat, true_prop, BOOL_FALSE, EQ_FALSE, EQ_REFL, EQ_SELF, NAT, NAT_ADD, NAT_MUL,
    NAT_NE_OF_BEQ_EQ_FALSE, NAT_SUB, NAT_SUCC, OF_NAT_OF_NAT,
};

use super::types::{simproc, Simp, SimpResult, Simproc, Step};

/// Registered simplification procedures, passed explicitly to the method bundle.
#[derive(Clone, Default)]
pub struct Simprocs {
    pre: Vec<(Name, Simproc)>,
    post: Vec<(Name, Simproc)>,
    erased: HashSet<Name>,
}

impl std::fmt::Debug for Simprocs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |procs: &[(Name, Simproc)]| procs.iter().map(|(n, _)| n.to_string()).collect::<Vec<_>>();
        f.debug_struct("Simprocs")
            .field("pre", &names(&self.pre))
            .field("post", &names(&self.post))
            .field("erased", &self.erased)
            .finish()
    }
}

impl Simprocs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: Name, post: bool, proc: Simproc) {
        self.erased.remove(&name);
        if post {
            self.post.push((name, proc));
        } else {
            self.pre.push((name, proc));
        }
    }

    pub fn erase(&mut self, name: Name) {
        self.erased.insert(name);
    }

    pub fn is_erased(&self, name: &Name) -> bool {
        self.erased.contains(name)
    }

    /// Literal folding for `Nat.add`, `Nat.mul`, `Nat.sub`, `Nat.succ` and literal
    /// equalities, all in the post phase.
    pub fn default_nat() -> Self {
        let mut procs = Simprocs::new();
        procs.add(Name::intern("reduceAdd"), true, simproc(|_, e| Ok(reduce_bin(e, &NAT_ADD, u64::checked_add))));
        procs.add(Name::intern("reduceMul"), true, simproc(|_, e| Ok(reduce_bin(e, &NAT_MUL, u64::checked_mul))));
        procs.add(
            Name::intern("reduceSub"),
            true,
            simproc(|_, e| Ok(reduce_bin(e, &NAT_SUB, |a, b| Some(a.saturating_sub(b))))),
        );
        procs.add(Name::intern("reduceSucc"), true, simproc(|_, e| Ok(reduce_succ(e))));
        procs.add(Name::intern("reduceEqDiff"), true, simproc(reduce_eq_diff));
        procs
    }

    fn run(&self, s: &mut Simp, e: &Expr, post: bool) -> anyhow::Result<Step> {
        let procs = if post { &self.post } else { &self.pre };
        let mut acc: Option<SimpResult> = None;
        for (name, proc) in procs {
            if self.erased.contains(name) {
                continue;
            }
            let current = acc.as_ref().map_or_else(|| e.clone(), |r| r.expr.clone());
            let step = proc(s, &current)?;
            if log::log_enabled!(target: "simp::rewrite", log::Level::Trace) {
                if let Step::Done(r) | Step::Visit(r) | Step::Continue(Some(r)) = &step {
                    log::trace!(target: "simp::rewrite", "simproc {name}: {current} ==> {}", r.expr);
                }
            }
            match step {
                Step::Done(r) => return Ok(Step::Done(compose(s, acc, r)?)),
                Step::Visit(r) => return Ok(Step::Visit(compose(s, acc, r)?)),
                Step::Continue(Some(r)) => acc = Some(compose(s, acc, r)?),
                Step::Continue(None) => {}
            }
        }
        Ok(Step::Continue(acc))
    }

    pub fn run_pre(&self, s: &mut Simp, e: &Expr) -> anyhow::Result<Step> {
        self.run(s, e, false)
    }

    pub fn run_post(&self, s: &mut Simp, e: &Expr) -> anyhow::Result<Step> {
        self.run(s, e, true)
    }
}

fn compose(s: &mut Simp, acc: Option<SimpResult>, r: SimpResult) -> anyhow::Result<SimpResult> {
    match acc {
        Some(prev) => prev.mk_eq_trans(&mut s.meta, r),
        None => Ok(r),
    }
}

/// The value of a `Nat` numeral: a literal or `OfNat.ofNat Nat n _` with a literal `n`.
pub fn nat_numeral(e: &Expr) -> Option<u64> {
    let e = e.consume_mdata();
    if let Some(n) = e.nat_lit() {
        return Some(n);
    }
    if e.is_app_of(&OF_NAT_OF_NAT, 3) {
        let args = e.get_app_args();
        if args[0].is_const_of(&NAT) {
            return args[1].nat_lit();
        }
    }
    None
}

fn reduce_bin(e: &Expr, op: &Name, f: impl Fn(u64, u64) -> Option<u64>) -> Step {
    if !e.is_app_of(op, 2) {
        return Step::Continue(None);
    }
    let args = e.get_app_args();
    let (Some(a), Some(b)) = (nat_numeral(&args[0]), nat_numeral(&args[1])) else {
        return Step::Continue(None);
    };
    match f(a, b) {
        Some(v) => Step::Done(SimpResult::new(mk_nat_lit(v))),
        None => Step::Continue(None),
    }
}

fn reduce_succ(e: &Expr) -> Step {
    if !e.is_app_of(&NAT_SUCC, 1) {
        return Step::Continue(None);
    }
    match e.app_arg().and_then(nat_numeral).and_then(|n| n.checked_add(1)) {
        Some(v) => Step::Done(SimpResult::new(mk_nat_lit(v))),
        None => Step::Continue(None),
    }
}

/// `a = b` on `Nat` numerals.
fn reduce_eq_diff(_: &mut Simp, e: &Expr) -> anyhow::Result<Step> {
    let Some(eq) = eq_parts(e) else {
        return Ok(Step::Continue(None));
    };
    if !eq.ty.is_const_of(&NAT) {
        return Ok(Step::Continue(None));
    }
    let (Some(a), Some(b)) = (nat_numeral(&eq.lhs), nat_numeral(&eq.rhs)) else {
        return Ok(Step::Continue(None));
    };
    if a == b {
        // `eq_self a : (a = a) = True`, and `b` is definitionally `a`
        let proof = mk_app_n(mk_const(EQ_SELF.clone(), vec![Level::one()]), &[nat(), eq.lhs]);
        return Ok(Step::Done(SimpResult::with_proof(true_prop(), proof)));
    }
    let refl = mk_app_n(
        mk_const(EQ_REFL.clone(), vec![Level::one()]),
        &[bool_ty(), mk_const(BOOL_FALSE.clone(), vec![])],
    );
    let ne = mk_app_n(
        mk_const(NAT_NE_OF_BEQ_EQ_FALSE.clone(), vec![]),
        &[eq.lhs, eq.rhs, refl],
    );
    let proof = mk_app_n(mk_const(EQ_FALSE.clone(), vec![]), &[e.clone(), ne]);
    Ok(Step::Done(SimpResult::with_proof(false_prop(), proof)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Meta;
    use crate::prelude::{self, nat_add, nat_eq, nat_succ, of_nat};
    use crate::simp::{mk_default_methods, Context, SimpTheorems};

    fn with_simp<T>(f: impl FnOnce(&mut Simp) -> T) -> T {
        let env = prelude::mk_env().unwrap();
        let ctx = Context::new(Default::default(), SimpTheorems::new());
        let mut s = Simp::new(Meta::new(&env), ctx, mk_default_methods(Simprocs::default_nat()));
        f(&mut s)
    }

    #[test]
    fn folds_literals() {
        with_simp(|s| {
            let procs = Simprocs::default_nat();
            let e = nat_add(of_nat(2), mk_nat_lit(3));
            let Step::Done(r) = procs.run_post(s, &e).unwrap() else {
                panic!("expected a folded literal");
            };
            assert_eq!(r.expr, mk_nat_lit(5));
            let Step::Done(r) = procs.run_post(s, &nat_succ(mk_nat_lit(9))).unwrap() else {
                panic!("expected a folded literal");
            };
            assert_eq!(r.expr, mk_nat_lit(10));
        });
    }

    #[test]
    fn literal_equalities_carry_proofs() {
        with_simp(|s| {
            let procs = Simprocs::default_nat();
            for (a, b, expected) in [(2, 2, true_prop()), (2, 3, false_prop())] {
                let e = nat_eq(mk_nat_lit(a), mk_nat_lit(b));
                let Step::Done(r) = procs.run_post(s, &e).unwrap() else {
                    panic!("expected a decided equality");
                };
                assert_eq!(r.expr, expected);
                let ty = s.meta.infer_type(&r.proof.unwrap()).unwrap();
                let parts = eq_parts(&ty).unwrap();
                assert!(s.meta.is_def_eq(&parts.lhs, &e).unwrap());
                assert_eq!(parts.rhs, expected);
            }
        });
    }

    #[test]
    fn erased_procs_are_skipped() {
        with_simp(|s| {
            let mut procs = Simprocs::default_nat();
            procs.erase(Name::intern("reduceAdd"));
            let e = nat_add(mk_nat_lit(2), mk_nat_lit(3));
            assert!(matches!(procs.run_post(s, &e).unwrap(), Step::Continue(None)));
        });
    }
}
