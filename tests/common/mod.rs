#![allow(dead_code)]

use simp_core::env::Environment;
use simp_core::expr::{mk_app, mk_arrow, mk_const, BinderInfo, Expr, Name};
use simp_core::meta::Meta;
use simp_core::prelude::{self, nat};
use simp_core::simp::{SimpTheorems, DEFAULT_PRIORITY};

#[ctor::ctor]
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn env() -> Environment {
    prelude::mk_env().unwrap()
}

/// Declares an opaque unary function on `Nat`.
pub fn nat_fn(env: &mut Environment, name: &str) -> impl Fn(Expr) -> Expr {
    let name = Name::intern(name);
    env.add_opaque(name.clone(), vec![], mk_arrow(nat(), nat())).unwrap();
    move |a| mk_app(mk_const(name.clone(), vec![]), a)
}

pub fn axiom(env: &mut Environment, name: &str, ty: Expr) -> Name {
    let name = Name::intern(name);
    env.add_axiom(name.clone(), vec![], ty).unwrap();
    name
}

/// A lemma set holding the post lemmas `names`, in order.
pub fn lemmas(meta: &mut Meta, names: &[&Name]) -> SimpTheorems {
    let mut thms = SimpTheorems::new();
    for name in names {
        thms.add_const(meta, name, true, DEFAULT_PRIORITY).unwrap();
    }
    thms
}

pub fn local(meta: &mut Meta, name: &str, ty: Expr) -> Expr {
    meta.add_local_decl(Name::intern(name), BinderInfo::Default, ty)
}
