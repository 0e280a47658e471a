mod common;

use std::cell::Cell;
use std::rc::Rc;

use simp_core::error::is_runtime_exception;
use simp_core::expr::{mk_arrow, mk_nat_lit, mk_prop, BinderInfo, Expr, Name};
use simp_core::meta::Meta;
use simp_core::prelude::{cnst, false_prop, nat, nat_eq, nat_succ, pi, true_prop};
use simp_core::simp::{discharger, mk_default_methods, mk_methods, Config, Context, Simp, Simprocs};

use common::{axiom, env, lemmas, local, nat_fn};

/// `P0 : Prop`, `p0 : P0` and `l_k : P(k-1) → P(k)` for `k = 1..=3`.
fn chain(env: &mut simp_core::env::Environment) -> (Vec<Expr>, Vec<Name>) {
    let props: Vec<Expr> = (0..4)
        .map(|k| cnst(&axiom(env, &format!("P{k}"), mk_prop())))
        .collect();
    let mut names = vec![axiom(env, "p0", props[0].clone())];
    for k in 1..4 {
        let ty = mk_arrow(props[k - 1].clone(), props[k].clone());
        names.push(axiom(env, &format!("l_{k}"), ty));
    }
    (props, names)
}

#[test]
fn nested_discharge_is_bounded() {
    let mut env = env();
    let (props, names) = chain(&mut env);
    let names: Vec<&Name> = names.iter().collect();

    for (max_depth, expected) in [(2, props[3].clone()), (3, true_prop())] {
        let mut meta = Meta::new(&env);
        let thms = lemmas(&mut meta, &names);
        let config = Config::default().with_max_discharge_depth(max_depth);
        let mut s = Simp::new(meta, Context::new(config, thms), mk_default_methods(Simprocs::new()));
        let r = s.run(&props[3]).unwrap();
        assert_eq!(r.expr, expected, "max_discharge_depth = {max_depth}");
        assert!(s.state.discharge_depth <= max_depth);
    }
}

#[test]
fn assumptions_discharge_hypotheses() {
    let mut env = env();
    let (props, names) = chain(&mut env);
    let mut meta = Meta::new(&env);
    // only `l_3`, with `P2` available as a local hypothesis
    let thms = lemmas(&mut meta, &[&names[3]]);
    local(&mut meta, "h", props[2].clone());
    let config = Config::default().with_max_discharge_depth(0);
    let mut s = Simp::new(meta, Context::new(config, thms), mk_default_methods(Simprocs::new()));
    let r = s.run(&props[3]).unwrap();
    assert_eq!(r.expr, true_prop());
    assert_eq!(s.state.discharge_depth, 0);
}

#[test]
fn equation_hypotheses_by_case_analysis() {
    let env = env();
    let ctx = Context::new(Config::default(), Default::default());
    let mut s = Simp::new(Meta::new(&env), ctx, mk_default_methods(Simprocs::new()));
    // ∀ k, 0 = k + 1 → False
    let p = pi("k", BinderInfo::Default, nat(), |k| {
        pi("h", BinderInfo::Default, nat_eq(mk_nat_lit(0), nat_succ(k)), |_| false_prop())
    });
    let h = s.discharge_default(&p).unwrap().unwrap();
    let ty = s.meta.infer_type(&h).unwrap();
    assert!(s.meta.is_def_eq(&ty, &p).unwrap());
    // the proof is built without the nested simplifier
    assert_eq!(s.state.discharge_depth, 0);
}

#[test]
fn user_discharger_replaces_default() {
    let mut env = env();
    let f = nat_fn(&mut env, "f");
    let guarded = axiom(
        &mut env,
        "guarded",
        pi("a", BinderInfo::Default, nat(), |a| {
            pi("h", BinderInfo::Default, nat_eq(a.clone(), mk_nat_lit(0)), |_| nat_eq(f(a), mk_nat_lit(7)))
        }),
    );
    let e = f(mk_nat_lit(0));

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let refuse = discharger(move |_, _| {
        counter.set(counter.get() + 1);
        Ok(None)
    });
    let mut meta = Meta::new(&env);
    let thms = lemmas(&mut meta, &[&guarded]);
    let mut s = Simp::new(meta, Context::new(Config::default(), thms), mk_methods(Simprocs::default_nat(), Some(refuse)));
    assert_eq!(s.run(&e).unwrap().expr, e);
    // once in the first pass and once more for the postponed retry
    assert_eq!(calls.get(), 2);
    assert_eq!(s.state.discharge_depth, 0);

    // the default discharger proves `0 = 0` by simplification
    let mut meta = Meta::new(&env);
    let thms = lemmas(&mut meta, &[&guarded]);
    let mut s = Simp::new(meta, Context::new(Config::default(), thms), mk_default_methods(Simprocs::default_nat()));
    assert_eq!(s.run(&e).unwrap().expr, mk_nat_lit(7));
}

#[test]
fn case_analysis_errors_follow_the_runtime_policy() {
    let env = env();
    // ∀ k, 0 = k + 1 → False
    let p = pi("k", BinderInfo::Default, nat(), |k| {
        pi("h", BinderInfo::Default, nat_eq(mk_nat_lit(0), nat_succ(k)), |_| false_prop())
    });
    for catch_runtime in [false, true] {
        let mut meta = Meta::new(&env);
        // the first reduction inside case analysis hits the recursion limit
        meta.config.max_rec_depth = 0;
        let config = Config::default()
            .with_max_discharge_depth(0)
            .with_catch_runtime(catch_runtime);
        let ctx = Context::new(config, Default::default());
        let mut s = Simp::new(meta, ctx, mk_default_methods(Simprocs::new()));
        let r = s.discharge_default(&p);
        if catch_runtime {
            assert!(r.unwrap().is_none());
        } else {
            assert!(is_runtime_exception(&r.unwrap_err()));
        }
    }
}
