mod common;

use simp_core::app_builder::eq_parts;
use simp_core::env::ReducibilityStatus;
use simp_core::error::is_runtime_exception;
use simp_core::expr::{mk_app, mk_app_n, mk_arrow, mk_const, mk_nat_lit, BinderInfo, Level, Name};
use simp_core::meta::Meta;
use simp_core::prelude::{
    bool_ty, cnst, false_prop, lam, list_length, list_lit, nat, nat_add, nat_eq, nat_le, nat_mul,
    nat_succ, true_prop, BOOL_FALSE, BOOL_TRUE, EQ_REFL, NAT_IS_ZERO, NAT_ZERO,
};
use simp_core::simp::{mk_default_methods, Config, Context, Simp, SimpTheorems, Simprocs};

use common::{env, local};

fn simp_with(meta: Meta<'_>, config: Config, simprocs: Simprocs) -> Simp<'_> {
    Simp::new(meta, Context::new(config, SimpTheorems::new()), mk_default_methods(simprocs))
}

#[test]
fn constructor_mismatch_is_false() {
    let env = env();
    let mut meta = Meta::new(&env);
    let a = local(&mut meta, "a", nat());
    let b = local(&mut meta, "b", nat());
    let mut s = simp_with(meta, Config::default(), Simprocs::new());

    let r = s.run(&nat_eq(nat_succ(a.clone()), cnst(&NAT_ZERO))).unwrap();
    assert_eq!(r.expr, false_prop());
    let ty = s.meta.infer_type(&r.proof.unwrap()).unwrap();
    let eq = eq_parts(&ty).unwrap();
    assert_eq!(eq.lhs, nat_eq(nat_succ(a.clone()), cnst(&NAT_ZERO)));
    assert_eq!(eq.rhs, false_prop());

    // same constructor: nothing to say
    let e = nat_eq(nat_succ(a), nat_succ(b));
    let r = s.run(&e).unwrap();
    assert_eq!(r.expr, e);
    assert!(r.proof.is_none());
}

#[test]
fn decide_closes_literal_propositions() {
    let env = env();
    let mut meta = Meta::new(&env);
    let x = local(&mut meta, "x", nat());
    let mut s = simp_with(meta, Config::default().with_decide(true), Simprocs::new());

    let r = s.run(&nat_eq(mk_nat_lit(2), mk_nat_lit(2))).unwrap();
    assert_eq!(r.expr, true_prop());
    let r = s.run(&nat_eq(mk_nat_lit(2), mk_nat_lit(3))).unwrap();
    assert_eq!(r.expr, false_prop());

    // not closed: no instance search at all
    let before = s.meta.stats.synth_calls;
    let e = nat_eq(x, mk_nat_lit(2));
    assert_eq!(s.run(&e).unwrap().expr, e);
    assert_eq!(s.meta.stats.synth_calls, before);
}

#[test]
fn ground_skips_open_terms_without_reducing() {
    let env = env();
    let mut meta = Meta::new(&env);
    let x = local(&mut meta, "x", nat());
    let mut s = simp_with(meta, Config::default().with_ground(true), Simprocs::default_nat());
    let e = list_length(Level::zero(), nat(), list_lit(Level::zero(), nat(), &[x]));
    let before = s.meta.stats.whnf_calls;
    assert!(s.simp_ground(&e).unwrap().is_none());
    assert_eq!(s.meta.stats.whnf_calls, before);
}

#[test]
fn ground_list_length() {
    let env = env();
    let mut s = simp_with(Meta::new(&env), Config::default().with_ground(true), Simprocs::default_nat());
    let list = list_lit(Level::zero(), nat(), &[mk_nat_lit(1), mk_nat_lit(2), mk_nat_lit(3)]);
    let r = s.run(&list_length(Level::zero(), nat(), list)).unwrap();
    assert_eq!(r.expr, mk_nat_lit(3));
    // equation theorems of `List.length` hold by `rfl`
    assert!(r.proof.is_none());
}

#[test]
fn ground_unfolds_through_match() {
    let env = env();
    let mut s = simp_with(Meta::new(&env), Config::default().with_ground(true), Simprocs::new());
    let is_zero = |n| mk_app(cnst(&NAT_IS_ZERO), n);

    let r = s.run(&is_zero(mk_nat_lit(5))).unwrap();
    assert_eq!(r.expr, cnst(&BOOL_FALSE));
    let r = s.run(&is_zero(mk_nat_lit(0))).unwrap();
    assert_eq!(r.expr, cnst(&BOOL_TRUE));

    let ty = s.meta.infer_type(&r.expr).unwrap();
    assert_eq!(ty, bool_ty());
}

#[test]
fn ground_unfolds_when_no_equation_applies() {
    let mut env = env();
    let foo = Name::intern("foo");
    env.add_definition(
        foo.clone(),
        vec![],
        mk_arrow(nat(), nat()),
        lam("n", BinderInfo::Default, nat(), |n| nat_add(n, mk_nat_lit(1))),
        ReducibilityStatus::Semireducible,
    )
    .unwrap();
    let foo_app = |n| mk_app(cnst(&foo), n);
    // foo.eq_1 : foo 0 = 1
    let eq_1 = Name::intern("foo.eq_1");
    let refl = mk_app_n(mk_const(EQ_REFL.clone(), vec![Level::one()]), &[nat(), mk_nat_lit(1)]);
    env.add_theorem(eq_1.clone(), vec![], nat_eq(foo_app(mk_nat_lit(0)), mk_nat_lit(1)), refl)
        .unwrap();
    env.add_eqns(foo.clone(), vec![eq_1]).unwrap();

    let mut s = simp_with(Meta::new(&env), Config::default().with_ground(true), Simprocs::default_nat());
    let r = s.simp_ground(&foo_app(mk_nat_lit(5))).unwrap().unwrap();
    assert_eq!(r.expr, nat_add(mk_nat_lit(5), mk_nat_lit(1)));
    assert!(r.proof.is_none());
    assert_eq!(s.run(&foo_app(mk_nat_lit(5))).unwrap().expr, mk_nat_lit(6));

    // where the equation matches it is still preferred
    let r = s.simp_ground(&foo_app(mk_nat_lit(0))).unwrap().unwrap();
    assert_eq!(r.expr, mk_nat_lit(1));
}

#[test]
fn linear_arithmetic_closes_propositions() {
    let env = env();
    let mut meta = Meta::new(&env);
    let x = local(&mut meta, "x", nat());
    let mut s = simp_with(meta, Config::default().with_arith(true), Simprocs::new());

    let valid = nat_le(x.clone(), nat_add(x.clone(), mk_nat_lit(1)));
    let r = s.run(&valid).unwrap();
    assert_eq!(r.expr, true_prop());
    let ty = s.meta.infer_type(&r.proof.unwrap()).unwrap();
    assert_eq!(eq_parts(&ty).unwrap().lhs, valid);

    let unsat = nat_eq(nat_add(x.clone(), mk_nat_lit(1)), mk_nat_lit(0));
    assert_eq!(s.run(&unsat).unwrap().expr, false_prop());

    // depends on `x`
    let open = nat_eq(x.clone(), mk_nat_lit(3));
    assert_eq!(s.run(&open).unwrap().expr, open);

    // coefficients past the machine range leave the proposition alone
    let big = || mk_nat_lit(u64::MAX);
    let huge = nat_eq(nat_mul(big(), nat_mul(big(), nat_mul(big(), x))), mk_nat_lit(0));
    assert_eq!(s.run(&huge).unwrap().expr, huge);
}

#[test]
fn linear_arithmetic_needs_the_flag() {
    let env = env();
    let mut meta = Meta::new(&env);
    let x = local(&mut meta, "x", nat());
    let mut s = simp_with(meta, Config::default(), Simprocs::new());
    let e = nat_le(x.clone(), nat_add(x, mk_nat_lit(1)));
    assert_eq!(s.run(&e).unwrap().expr, e);
}

#[test]
fn decide_errors_follow_the_runtime_policy() {
    let env = env();
    let e = nat_eq(mk_nat_lit(2), mk_nat_lit(2));
    let shallow = || {
        let mut meta = Meta::new(&env);
        meta.config.max_rec_depth = 0;
        meta
    };

    let mut s = simp_with(shallow(), Config::default().with_decide(true), Simprocs::new());
    let err = s.simp_using_decide(&e).unwrap_err();
    assert!(is_runtime_exception(&err));

    let config = Config::default().with_decide(true).with_catch_runtime(true);
    let mut s = simp_with(shallow(), config, Simprocs::new());
    assert!(s.simp_using_decide(&e).unwrap().is_none());
}
