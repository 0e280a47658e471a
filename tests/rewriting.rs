mod common;

use simp_core::expr::{mk_nat_lit, BinderInfo, Name};
use simp_core::meta::Meta;
use simp_core::prelude::{nat, nat_add, nat_eq, pi};
use simp_core::simp::{mk_default_methods, Config, Context, Origin, Simp, SimpTheorems, Simprocs};

use common::{axiom, env, lemmas, local, nat_fn};

#[test]
fn commutativity_terminates() {
    let mut env = env();
    let add_comm = axiom(
        &mut env,
        "add_comm",
        pi("a", BinderInfo::Default, nat(), |a| {
            pi("b", BinderInfo::Default, nat(), |b| {
                nat_eq(nat_add(a.clone(), b.clone()), nat_add(b, a))
            })
        }),
    );
    let mut meta = Meta::new(&env);
    let x = local(&mut meta, "x", nat());
    let y = local(&mut meta, "y", nat());
    let thms = lemmas(&mut meta, &[&add_comm]);
    let mut s = Simp::new(meta, Context::new(Config::default(), thms), mk_default_methods(Simprocs::new()));

    let r = s.run(&nat_add(y.clone(), x.clone())).unwrap();
    assert_eq!(r.expr, nat_add(x.clone(), y.clone()));
    assert!(r.proof.is_some());

    // already in order: the permuted result is rejected
    let r = s.run(&nat_add(x.clone(), y.clone())).unwrap();
    assert_eq!(r.expr, nat_add(x, y));
    assert!(r.proof.is_none());
}

#[test]
fn equal_priorities_keep_registration_order() {
    let mut env = env();
    let f = nat_fn(&mut env, "f");
    let to_one = axiom(&mut env, "f_one", pi("n", BinderInfo::Default, nat(), |n| nat_eq(f(n), mk_nat_lit(1))));
    let to_two = axiom(&mut env, "f_two", pi("n", BinderInfo::Default, nat(), |n| nat_eq(f(n), mk_nat_lit(2))));
    let e = f(mk_nat_lit(0));

    for (order, expected) in [([&to_one, &to_two], 1), ([&to_two, &to_one], 2)] {
        let mut meta = Meta::new(&env);
        let thms = lemmas(&mut meta, &order);
        let mut s = Simp::new(meta, Context::new(Config::default(), thms), mk_default_methods(Simprocs::new()));
        let r = s.run(&e).unwrap();
        assert_eq!(r.expr, mk_nat_lit(expected));
    }

    // a higher priority wins regardless of order
    let mut meta = Meta::new(&env);
    let mut thms = SimpTheorems::new();
    thms.add_const(&mut meta, &to_one, true, 1000).unwrap();
    thms.add_const(&mut meta, &to_two, true, 2000).unwrap();
    let mut s = Simp::new(meta, Context::new(Config::default(), thms), mk_default_methods(Simprocs::new()));
    assert_eq!(s.run(&e).unwrap().expr, mk_nat_lit(2));
}

#[test]
fn erased_lemmas_are_skipped() {
    let mut env = env();
    let f = nat_fn(&mut env, "f");
    let to_one = axiom(&mut env, "f_one", pi("n", BinderInfo::Default, nat(), |n| nat_eq(f(n), mk_nat_lit(1))));
    let e = f(mk_nat_lit(0));
    let mut meta = Meta::new(&env);
    let mut thms = lemmas(&mut meta, &[&to_one]);
    thms.erase(Origin::Decl(to_one));
    let mut s = Simp::new(meta, Context::new(Config::default(), thms), mk_default_methods(Simprocs::new()));
    assert_eq!(s.run(&e).unwrap().expr, e);

    s.ctx.config = Config::default().with_use_erased(true);
    assert_eq!(s.run(&e).unwrap().expr, mk_nat_lit(1));
}

#[test]
fn results_carry_no_metavariables() {
    let mut env = env();
    let f = nat_fn(&mut env, "f");
    let g = nat_fn(&mut env, "g");
    // `b` is not determined by the left-hand side
    let loose = axiom(
        &mut env,
        "loose",
        pi("a", BinderInfo::Default, nat(), |a| {
            pi("b", BinderInfo::Default, nat(), |b| nat_eq(f(a), g(b)))
        }),
    );
    // the hypothesis is discharged by simplification
    let guarded = axiom(
        &mut env,
        "guarded",
        pi("a", BinderInfo::Default, nat(), |a| {
            pi("h", BinderInfo::Default, nat_eq(a.clone(), mk_nat_lit(0)), |_| nat_eq(g(a), mk_nat_lit(7)))
        }),
    );
    let mut meta = Meta::new(&env);
    let thms = lemmas(&mut meta, &[&loose, &guarded]);
    let mut s = Simp::new(meta, Context::new(Config::default(), thms), mk_default_methods(Simprocs::default_nat()));

    let e = f(mk_nat_lit(3));
    let r = s.run(&e).unwrap();
    assert_eq!(r.expr, e);

    let r = s.run(&g(nat_add(mk_nat_lit(0), mk_nat_lit(0)))).unwrap();
    assert_eq!(r.expr, mk_nat_lit(7));
    let proof = r.proof.unwrap();
    assert!(!proof.has_mvar());
    assert_eq!(
        s.state.used_theorems.iter().cloned().collect::<Vec<_>>(),
        vec![Origin::Decl(Name::intern("guarded"))]
    );
}

#[test]
fn single_pass_stops_after_one_rewrite() {
    let mut env = env();
    let f = nat_fn(&mut env, "f");
    let g = nat_fn(&mut env, "g");
    let h = nat_fn(&mut env, "h");
    let f_g = axiom(&mut env, "f_g", pi("a", BinderInfo::Default, nat(), |a| nat_eq(f(a.clone()), g(a))));
    let g_h = axiom(&mut env, "g_h", pi("a", BinderInfo::Default, nat(), |a| nat_eq(g(a.clone()), h(a))));
    for single_pass in [true, false] {
        let mut meta = Meta::new(&env);
        let x = local(&mut meta, "x", nat());
        let thms = lemmas(&mut meta, &[&f_g, &g_h]);
        let config = Config::default().with_single_pass(single_pass);
        let mut s = Simp::new(meta, Context::new(config, thms), mk_default_methods(Simprocs::new()));
        let r = s.run(&f(x.clone())).unwrap();
        let expected = if single_pass { g(x) } else { h(x) };
        assert_eq!(r.expr, expected);
        assert!(r.proof.is_some());
    }
}
