//! Names of the constants the simplifier refers to, and a small standard environment
//! declaring them.

use once_cell::sync::Lazy;

use crate::env::{Environment, InductiveDecl, MatcherInfo, ReducibilityStatus};
use crate::expr::{
    mk_app, mk_app_n, mk_arrow, mk_binding, mk_const, mk_fvar, mk_nat_lit, mk_prop, mk_sort,
    mk_type, Binder, BinderInfo, Expr, FVarId, Level, Name,
};

macro_rules! names {
    ($($id:ident => $s:literal,)*) => {
        $(pub static $id: Lazy<Name> = Lazy::new(|| Name::intern($s));)*
    };
}

names! {
    EQ => "Eq",
    EQ_REFL => "Eq.refl",
    EQ_SYMM => "Eq.symm",
    EQ_TRANS => "Eq.trans",
    EQ_NDREC => "Eq.ndrec",
    HEQ => "HEq",
    CONGR_ARG => "congrArg",
    CONGR_FUN => "congrFun",
    CONGR => "congr",
    TRUE => "True",
    TRUE_INTRO => "True.intro",
    FALSE => "False",
    NOT => "Not",
    EQ_SELF => "eq_self",
    EQ_TRUE => "eq_true",
    EQ_FALSE => "eq_false",
    EQ_FALSE_PRIME => "eq_false'",
    OF_EQ_TRUE => "of_eq_true",
    BOOL => "Bool",
    BOOL_TRUE => "Bool.true",
    BOOL_FALSE => "Bool.false",
    DECIDABLE => "Decidable",
    DECIDABLE_IS_TRUE => "Decidable.isTrue",
    DECIDABLE_IS_FALSE => "Decidable.isFalse",
    DECIDABLE_DECIDE => "Decidable.decide",
    EQ_TRUE_OF_DECIDE => "eq_true_of_decide",
    EQ_FALSE_OF_DECIDE => "eq_false_of_decide",
    NAT => "Nat",
    NAT_ZERO => "Nat.zero",
    NAT_SUCC => "Nat.succ",
    NAT_ADD => "Nat.add",
    NAT_SUB => "Nat.sub",
    NAT_MUL => "Nat.mul",
    NAT_DIV => "Nat.div",
    NAT_MOD => "Nat.mod",
    NAT_BEQ => "Nat.beq",
    NAT_BLE => "Nat.ble",
    NAT_LE => "Nat.le",
    NAT_LT => "Nat.lt",
    NAT_DEC_EQ => "Nat.decEq",
    NAT_DEC_LE => "Nat.decLe",
    NAT_NE_OF_BEQ_EQ_FALSE => "Nat.ne_of_beq_eq_false",
    NAT_LE_OF_BLE_EQ_TRUE => "Nat.le_of_ble_eq_true",
    NAT_NOT_LE_OF_BLE_EQ_FALSE => "Nat.not_le_of_ble_eq_false",
    NAT_LINEAR_IS_VALID => "Nat.Linear.isValid",
    NAT_LINEAR_IS_UNSAT => "Nat.Linear.isUnsat",
    NAT_LINEAR_EQ_TRUE_OF_CERT => "Nat.Linear.eq_true_of_cert",
    NAT_LINEAR_EQ_FALSE_OF_CERT => "Nat.Linear.eq_false_of_cert",
    OF_NAT => "OfNat",
    OF_NAT_OF_NAT => "OfNat.ofNat",
    INST_OF_NAT_NAT => "instOfNatNat",
    LIST => "List",
    LIST_NIL => "List.nil",
    LIST_CONS => "List.cons",
    LIST_LENGTH => "List.length",
    LIST_LENGTH_NIL => "List.length_nil",
    LIST_LENGTH_CONS => "List.length_cons",
    NAT_IS_ZERO => "Nat.isZero",
    NAT_IS_ZERO_MATCH_1 => "Nat.isZero.match_1",
    NAT_IS_ZERO_MATCH_1_EQ_1 => "Nat.isZero.match_1.eq_1",
    NAT_IS_ZERO_MATCH_1_EQ_2 => "Nat.isZero.match_1.eq_2",
}

/// `∀ (name : ty), body x`, with `x` a fresh local standing for the bound variable.
pub fn pi(name: &str, info: BinderInfo, ty: Expr, body: impl FnOnce(Expr) -> Expr) -> Expr {
    binding(false, name, info, ty, body)
}

/// `fun (name : ty) => body x`
pub fn lam(name: &str, info: BinderInfo, ty: Expr, body: impl FnOnce(Expr) -> Expr) -> Expr {
    binding(true, name, info, ty, body)
}

fn binding(
    is_lambda: bool,
    name: &str,
    info: BinderInfo,
    ty: Expr,
    body: impl FnOnce(Expr) -> Expr,
) -> Expr {
    let name = Name::intern(name);
    let fvar = FVarId::fresh_with_name(name.clone());
    let body = body(mk_fvar(fvar));
    mk_binding(
        is_lambda,
        &[Binder {
            fvar,
            name,
            ty,
            info,
        }],
        &body,
    )
}

pub fn cnst(name: &Name) -> Expr {
    mk_const(name.clone(), vec![])
}

pub fn nat() -> Expr {
    cnst(&NAT)
}

pub fn bool_ty() -> Expr {
    cnst(&BOOL)
}

pub fn true_prop() -> Expr {
    cnst(&TRUE)
}

pub fn false_prop() -> Expr {
    cnst(&FALSE)
}

pub fn not(p: Expr) -> Expr {
    mk_app(cnst(&NOT), p)
}

/// `@Eq.{u} α a b`, for callers that already know the universe of `α`.
pub fn eq_at(level: Level, ty: Expr, a: Expr, b: Expr) -> Expr {
    mk_app_n(mk_const(EQ.clone(), vec![level]), &[ty, a, b])
}

pub fn nat_eq(a: Expr, b: Expr) -> Expr {
    eq_at(Level::one(), nat(), a, b)
}

pub fn nat_add(a: Expr, b: Expr) -> Expr {
    mk_app_n(cnst(&NAT_ADD), &[a, b])
}

pub fn nat_mul(a: Expr, b: Expr) -> Expr {
    mk_app_n(cnst(&NAT_MUL), &[a, b])
}

pub fn nat_succ(a: Expr) -> Expr {
    mk_app(cnst(&NAT_SUCC), a)
}

pub fn nat_le(a: Expr, b: Expr) -> Expr {
    mk_app_n(cnst(&NAT_LE), &[a, b])
}

pub fn nat_lt(a: Expr, b: Expr) -> Expr {
    mk_app_n(cnst(&NAT_LT), &[a, b])
}

/// `@OfNat.ofNat Nat n (instOfNatNat n)`
pub fn of_nat(n: u64) -> Expr {
    mk_app_n(
        mk_const(OF_NAT_OF_NAT.clone(), vec![Level::zero()]),
        &[
            nat(),
            mk_nat_lit(n),
            mk_app(cnst(&INST_OF_NAT_NAT), mk_nat_lit(n)),
        ],
    )
}

/// `[a₁, ⋯, aₙ] : List.{level} ty`
pub fn list_lit(level: Level, ty: Expr, elems: &[Expr]) -> Expr {
    let mut list = mk_app(mk_const(LIST_NIL.clone(), vec![level.clone()]), ty.clone());
    for elem in elems.iter().rev() {
        list = mk_app_n(
            mk_const(LIST_CONS.clone(), vec![level.clone()]),
            &[ty.clone(), elem.clone(), list],
        );
    }
    list
}

pub fn list_length(level: Level, ty: Expr, list: Expr) -> Expr {
    mk_app_n(mk_const(LIST_LENGTH.clone(), vec![level]), &[ty, list])
}

/// Builds the standard environment: equality and its congruence axioms, the logical
/// connectives the simplifier produces, `Bool`, `Decidable`, `Nat` with native
/// arithmetic, `OfNat`, and `List` with `List.length`.
pub fn mk_env() -> anyhow::Result<Environment> {
    use BinderInfo::{Default as Ex, Implicit as Im, InstImplicit as Inst};

    let mut env = Environment::new();
    let u = Name::intern("u");
    let v = Name::intern("v");
    let lu = Level::param(u.clone());
    let lv = Level::param(v.clone());
    let sort_u = mk_sort(lu.clone());
    let sort_v = mk_sort(lv.clone());
    let eq_u = |ty: &Expr, a: Expr, b: Expr| eq_at(lu.clone(), ty.clone(), a, b);
    let prop_eq = |a: Expr, b: Expr| eq_at(Level::one(), mk_prop(), a, b);

    // equality
    env.add_opaque(
        EQ.clone(),
        vec![u.clone()],
        pi("α", Im, sort_u.clone(), |a| mk_arrow(a.clone(), mk_arrow(a, mk_prop()))),
    )?;
    env.add_axiom(
        EQ_REFL.clone(),
        vec![u.clone()],
        pi("α", Im, sort_u.clone(), |ty| {
            pi("a", Ex, ty.clone(), |a| eq_u(&ty, a.clone(), a))
        }),
    )?;
    env.add_axiom(
        EQ_SYMM.clone(),
        vec![u.clone()],
        pi("α", Im, sort_u.clone(), |ty| {
            pi("a", Im, ty.clone(), |a| {
                pi("b", Im, ty.clone(), |b| {
                    mk_arrow(eq_u(&ty, a.clone(), b.clone()), eq_u(&ty, b, a))
                })
            })
        }),
    )?;
    env.add_axiom(
        EQ_TRANS.clone(),
        vec![u.clone()],
        pi("α", Im, sort_u.clone(), |ty| {
            pi("a", Im, ty.clone(), |a| {
                pi("b", Im, ty.clone(), |b| {
                    pi("c", Im, ty.clone(), |c| {
                        mk_arrow(
                            eq_u(&ty, a.clone(), b.clone()),
                            mk_arrow(eq_u(&ty, b, c.clone()), eq_u(&ty, a, c)),
                        )
                    })
                })
            })
        }),
    )?;
    // Eq.ndrec.{u, v} {α : Sort v} {a : α} {motive : α → Sort u} (m : motive a) {b : α} (h : a = b) : motive b
    env.add_axiom(
        EQ_NDREC.clone(),
        vec![u.clone(), v.clone()],
        pi("α", Im, sort_v.clone(), |ty| {
            pi("a", Im, ty.clone(), |a| {
                pi("motive", Im, mk_arrow(ty.clone(), sort_u.clone()), |motive| {
                    mk_arrow(
                        mk_app(motive.clone(), a.clone()),
                        pi("b", Im, ty.clone(), |b| {
                            mk_arrow(
                                eq_at(lv.clone(), ty.clone(), a, b.clone()),
                                mk_app(motive, b),
                            )
                        }),
                    )
                })
            })
        }),
    )?;
    env.add_opaque(
        HEQ.clone(),
        vec![u.clone()],
        pi("α", Im, sort_u.clone(), |a| {
            mk_arrow(
                a,
                pi("β", Im, sort_u.clone(), |b| mk_arrow(b, mk_prop())),
            )
        }),
    )?;
    // congrArg.{u, v} {α : Sort u} {β : Sort v} {a₁ a₂ : α} (f : α → β) (h : a₁ = a₂) : f a₁ = f a₂
    env.add_axiom(
        CONGR_ARG.clone(),
        vec![u.clone(), v.clone()],
        pi("α", Im, sort_u.clone(), |a_ty| {
            pi("β", Im, sort_v.clone(), |b_ty| {
                pi("a₁", Im, a_ty.clone(), |a1| {
                    pi("a₂", Im, a_ty.clone(), |a2| {
                        pi("f", Ex, mk_arrow(a_ty.clone(), b_ty.clone()), |f| {
                            mk_arrow(
                                eq_u(&a_ty, a1.clone(), a2.clone()),
                                eq_at(lv.clone(), b_ty, mk_app(f.clone(), a1), mk_app(f, a2)),
                            )
                        })
                    })
                })
            })
        }),
    )?;
    // congrFun.{u, v} {α : Sort u} {β : α → Sort v} {f g : (x : α) → β x} (h : f = g) (a : α) : f a = g a
    env.add_axiom(
        CONGR_FUN.clone(),
        vec![u.clone(), v.clone()],
        pi("α", Im, sort_u.clone(), |a_ty| {
            pi("β", Im, mk_arrow(a_ty.clone(), sort_v.clone()), |b_ty| {
                let fn_ty = pi("x", Ex, a_ty.clone(), |x| mk_app(b_ty.clone(), x));
                let fn_level = Level::mk_imax(lu.clone(), lv.clone());
                pi("f", Im, fn_ty.clone(), |f| {
                    pi("g", Im, fn_ty.clone(), |g| {
                        mk_arrow(
                            eq_at(fn_level, fn_ty.clone(), f.clone(), g.clone()),
                            pi("a", Ex, a_ty.clone(), |a| {
                                eq_at(
                                    lv.clone(),
                                    mk_app(b_ty.clone(), a.clone()),
                                    mk_app(f, a.clone()),
                                    mk_app(g, a),
                                )
                            }),
                        )
                    })
                })
            })
        }),
    )?;
    // congr.{u, v} {α : Sort u} {β : Sort v} {f₁ f₂ : α → β} {a₁ a₂ : α} (h₁ : f₁ = f₂) (h₂ : a₁ = a₂) : f₁ a₁ = f₂ a₂
    env.add_axiom(
        CONGR.clone(),
        vec![u.clone(), v.clone()],
        pi("α", Im, sort_u.clone(), |a_ty| {
            pi("β", Im, sort_v.clone(), |b_ty| {
                let fn_ty = mk_arrow(a_ty.clone(), b_ty.clone());
                let fn_level = Level::mk_imax(lu.clone(), lv.clone());
                pi("f₁", Im, fn_ty.clone(), |f1| {
                    pi("f₂", Im, fn_ty.clone(), |f2| {
                        pi("a₁", Im, a_ty.clone(), |a1| {
                            pi("a₂", Im, a_ty.clone(), |a2| {
                                mk_arrow(
                                    eq_at(fn_level, fn_ty.clone(), f1.clone(), f2.clone()),
                                    mk_arrow(
                                        eq_u(&a_ty, a1.clone(), a2.clone()),
                                        eq_at(lv.clone(), b_ty, mk_app(f1, a1), mk_app(f2, a2)),
                                    ),
                                )
                            })
                        })
                    })
                })
            })
        }),
    )?;

    // logic
    env.add_inductive(InductiveDecl {
        name: TRUE.clone(),
        level_params: vec![],
        ty: mk_prop(),
        num_params: 0,
        ctors: vec![(TRUE_INTRO.clone(), true_prop())],
    })?;
    env.add_inductive(InductiveDecl {
        name: FALSE.clone(),
        level_params: vec![],
        ty: mk_prop(),
        num_params: 0,
        ctors: vec![],
    })?;
    env.add_definition(
        NOT.clone(),
        vec![],
        mk_arrow(mk_prop(), mk_prop()),
        lam("a", Ex, mk_prop(), |a| mk_arrow(a, false_prop())),
        ReducibilityStatus::Semireducible,
    )?;
    env.add_axiom(
        EQ_SELF.clone(),
        vec![u.clone()],
        pi("α", Im, sort_u.clone(), |ty| {
            pi("a", Ex, ty.clone(), |a| prop_eq(eq_u(&ty, a.clone(), a), true_prop()))
        }),
    )?;
    env.add_axiom(
        EQ_TRUE.clone(),
        vec![],
        pi("p", Im, mk_prop(), |p| mk_arrow(p.clone(), prop_eq(p, true_prop()))),
    )?;
    env.add_axiom(
        EQ_FALSE.clone(),
        vec![],
        pi("p", Im, mk_prop(), |p| mk_arrow(not(p.clone()), prop_eq(p, false_prop()))),
    )?;
    env.add_axiom(
        EQ_FALSE_PRIME.clone(),
        vec![],
        pi("p", Im, mk_prop(), |p| {
            mk_arrow(mk_arrow(p.clone(), false_prop()), prop_eq(p, false_prop()))
        }),
    )?;
    env.add_axiom(
        OF_EQ_TRUE.clone(),
        vec![],
        pi("p", Im, mk_prop(), |p| mk_arrow(prop_eq(p.clone(), true_prop()), p)),
    )?;

    // Bool and Decidable
    env.add_inductive(InductiveDecl {
        name: BOOL.clone(),
        level_params: vec![],
        ty: mk_type(),
        num_params: 0,
        ctors: vec![
            (BOOL_FALSE.clone(), bool_ty()),
            (BOOL_TRUE.clone(), bool_ty()),
        ],
    })?;
    let decidable = |p: Expr| mk_app(cnst(&DECIDABLE), p);
    env.add_inductive(InductiveDecl {
        name: DECIDABLE.clone(),
        level_params: vec![],
        ty: mk_arrow(mk_prop(), mk_type()),
        num_params: 1,
        ctors: vec![
            (
                DECIDABLE_IS_FALSE.clone(),
                pi("p", Im, mk_prop(), |p| pi("h", Ex, not(p.clone()), |_| decidable(p))),
            ),
            (
                DECIDABLE_IS_TRUE.clone(),
                pi("p", Im, mk_prop(), |p| pi("h", Ex, p.clone(), |_| decidable(p))),
            ),
        ],
    })?;
    env.add_class(DECIDABLE.clone())?;
    env.add_definition(
        DECIDABLE_DECIDE.clone(),
        vec![],
        pi("p", Ex, mk_prop(), |p| pi("h", Inst, decidable(p), |_| bool_ty())),
        lam("p", Ex, mk_prop(), |p| {
            lam("h", Inst, decidable(p.clone()), |h| {
                mk_app_n(
                    mk_const(DECIDABLE.extend("casesOn"), vec![Level::one()]),
                    &[
                        p.clone(),
                        lam("_", Ex, decidable(p.clone()), |_| bool_ty()),
                        h,
                        lam("h", Ex, not(p.clone()), |_| cnst(&BOOL_FALSE)),
                        lam("h", Ex, p, |_| cnst(&BOOL_TRUE)),
                    ],
                )
            })
        }),
        ReducibilityStatus::Semireducible,
    )?;
    let decide = |p: Expr, inst: Expr| mk_app_n(cnst(&DECIDABLE_DECIDE), &[p, inst]);
    let bool_eq = |a: Expr, b: Expr| eq_at(Level::one(), bool_ty(), a, b);
    env.add_axiom(
        EQ_TRUE_OF_DECIDE.clone(),
        vec![],
        pi("p", Im, mk_prop(), |p| {
            pi("inst", Inst, decidable(p.clone()), |inst| {
                mk_arrow(
                    bool_eq(decide(p.clone(), inst), cnst(&BOOL_TRUE)),
                    prop_eq(p, true_prop()),
                )
            })
        }),
    )?;
    env.add_axiom(
        EQ_FALSE_OF_DECIDE.clone(),
        vec![],
        pi("p", Im, mk_prop(), |p| {
            pi("inst", Inst, decidable(p.clone()), |inst| {
                mk_arrow(
                    bool_eq(decide(p.clone(), inst), cnst(&BOOL_FALSE)),
                    prop_eq(p, false_prop()),
                )
            })
        }),
    )?;

    // natural numbers; the arithmetic operators are evaluated natively on literals
    env.add_inductive(InductiveDecl {
        name: NAT.clone(),
        level_params: vec![],
        ty: mk_type(),
        num_params: 0,
        ctors: vec![
            (NAT_ZERO.clone(), nat()),
            (NAT_SUCC.clone(), pi("n", Ex, nat(), |_| nat())),
        ],
    })?;
    let binop = || mk_arrow(nat(), mk_arrow(nat(), nat()));
    for op in [&NAT_ADD, &NAT_SUB, &NAT_MUL, &NAT_DIV, &NAT_MOD] {
        env.add_opaque(Name::clone(op), vec![], binop())?;
    }
    for op in [&NAT_BEQ, &NAT_BLE] {
        env.add_opaque(Name::clone(op), vec![], mk_arrow(nat(), mk_arrow(nat(), bool_ty())))?;
    }
    for op in [&NAT_LE, &NAT_LT] {
        env.add_opaque(Name::clone(op), vec![], mk_arrow(nat(), mk_arrow(nat(), mk_prop())))?;
    }
    env.add_opaque(
        NAT_DEC_EQ.clone(),
        vec![],
        pi("n", Ex, nat(), |n| pi("m", Ex, nat(), |m| decidable(nat_eq(n, m)))),
    )?;
    env.add_instance(NAT_DEC_EQ.clone(), DECIDABLE.clone(), 1000)?;
    env.add_opaque(
        NAT_DEC_LE.clone(),
        vec![],
        pi("n", Ex, nat(), |n| pi("m", Ex, nat(), |m| decidable(nat_le(n, m)))),
    )?;
    env.add_instance(NAT_DEC_LE.clone(), DECIDABLE.clone(), 1000)?;
    let nat_bin_bool = |op: &Name, n: Expr, m: Expr| mk_app_n(cnst(op), &[n, m]);
    env.add_axiom(
        NAT_NE_OF_BEQ_EQ_FALSE.clone(),
        vec![],
        pi("n", Ex, nat(), |n| {
            pi("m", Ex, nat(), |m| {
                mk_arrow(
                    bool_eq(nat_bin_bool(&NAT_BEQ, n.clone(), m.clone()), cnst(&BOOL_FALSE)),
                    not(nat_eq(n, m)),
                )
            })
        }),
    )?;
    env.add_axiom(
        NAT_LE_OF_BLE_EQ_TRUE.clone(),
        vec![],
        pi("n", Ex, nat(), |n| {
            pi("m", Ex, nat(), |m| {
                mk_arrow(
                    bool_eq(nat_bin_bool(&NAT_BLE, n.clone(), m.clone()), cnst(&BOOL_TRUE)),
                    nat_le(n, m),
                )
            })
        }),
    )?;
    env.add_axiom(
        NAT_NOT_LE_OF_BLE_EQ_FALSE.clone(),
        vec![],
        pi("n", Ex, nat(), |n| {
            pi("m", Ex, nat(), |m| {
                mk_arrow(
                    bool_eq(nat_bin_bool(&NAT_BLE, n.clone(), m.clone()), cnst(&BOOL_FALSE)),
                    not(nat_le(n, m)),
                )
            })
        }),
    )?;
    // linear arithmetic certificates: `isValid`/`isUnsat` are evaluated natively by the
    // checker and are `Bool.false` on anything it cannot decide
    for checker in [&NAT_LINEAR_IS_VALID, &NAT_LINEAR_IS_UNSAT] {
        env.add_opaque(Name::clone(checker), vec![], mk_arrow(mk_prop(), bool_ty()))?;
    }
    let checked = |checker: &Name, p: Expr| bool_eq(mk_app(cnst(checker), p), cnst(&BOOL_TRUE));
    env.add_axiom(
        NAT_LINEAR_EQ_TRUE_OF_CERT.clone(),
        vec![],
        pi("p", Ex, mk_prop(), |p| {
            mk_arrow(checked(&NAT_LINEAR_IS_VALID, p.clone()), prop_eq(p, true_prop()))
        }),
    )?;
    env.add_axiom(
        NAT_LINEAR_EQ_FALSE_OF_CERT.clone(),
        vec![],
        pi("p", Ex, mk_prop(), |p| {
            mk_arrow(checked(&NAT_LINEAR_IS_UNSAT, p.clone()), prop_eq(p, false_prop()))
        }),
    )?;

    // numerals
    let type_u = mk_sort(Level::succ(lu.clone()));
    env.add_opaque(
        OF_NAT.clone(),
        vec![u.clone()],
        mk_arrow(type_u.clone(), mk_arrow(nat(), type_u.clone())),
    )?;
    env.add_class(OF_NAT.clone())?;
    env.add_opaque(
        OF_NAT_OF_NAT.clone(),
        vec![u.clone()],
        pi("α", Im, type_u.clone(), |a| {
            pi("n", Ex, nat(), |n| {
                pi(
                    "self",
                    Inst,
                    mk_app_n(mk_const(OF_NAT.clone(), vec![lu.clone()]), &[a.clone(), n]),
                    |_| a,
                )
            })
        }),
    )?;
    env.add_opaque(
        INST_OF_NAT_NAT.clone(),
        vec![],
        pi("n", Ex, nat(), |n| {
            mk_app_n(mk_const(OF_NAT.clone(), vec![Level::zero()]), &[nat(), n])
        }),
    )?;
    env.add_instance(INST_OF_NAT_NAT.clone(), OF_NAT.clone(), 100)?;

    // lists
    let list_u = |a: Expr| mk_app(mk_const(LIST.clone(), vec![lu.clone()]), a);
    env.add_inductive(InductiveDecl {
        name: LIST.clone(),
        level_params: vec![u.clone()],
        ty: pi("α", Ex, type_u.clone(), |_| type_u.clone()),
        num_params: 1,
        ctors: vec![
            (
                LIST_NIL.clone(),
                pi("α", Im, type_u.clone(), |a| list_u(a)),
            ),
            (
                LIST_CONS.clone(),
                pi("α", Im, type_u.clone(), |a| {
                    pi("head", Ex, a.clone(), |_| {
                        pi("tail", Ex, list_u(a.clone()), |_| list_u(a))
                    })
                }),
            ),
        ],
    })?;
    env.add_opaque(
        LIST_LENGTH.clone(),
        vec![u.clone()],
        pi("α", Im, type_u.clone(), |a| mk_arrow(list_u(a), nat())),
    )?;
    let length_u = |a: Expr, l: Expr| list_length(lu.clone(), a, l);
    env.add_theorem(
        LIST_LENGTH_NIL.clone(),
        vec![u.clone()],
        pi("α", Im, type_u.clone(), |a| {
            nat_eq(
                length_u(a.clone(), mk_app(mk_const(LIST_NIL.clone(), vec![lu.clone()]), a)),
                mk_nat_lit(0),
            )
        }),
        mk_const(EQ_REFL.clone(), vec![Level::one()]),
    )?;
    env.add_theorem(
        LIST_LENGTH_CONS.clone(),
        vec![u.clone()],
        pi("α", Im, type_u.clone(), |a| {
            pi("a", Ex, a.clone(), |x| {
                pi("as", Ex, list_u(a.clone()), |xs| {
                    let cons = mk_app_n(
                        mk_const(LIST_CONS.clone(), vec![lu.clone()]),
                        &[a.clone(), x, xs.clone()],
                    );
                    nat_eq(
                        length_u(a.clone(), cons),
                        nat_add(length_u(a, xs), mk_nat_lit(1)),
                    )
                })
            })
        }),
        mk_const(EQ_REFL.clone(), vec![Level::one()]),
    )?;
    env.add_eqns(
        LIST_LENGTH.clone(),
        vec![LIST_LENGTH_NIL.clone(), LIST_LENGTH_CONS.clone()],
    )?;

    // `Nat.isZero`, defined by a two-armed match with an overlapping wildcard arm
    let motive_ty = mk_arrow(nat(), sort_u.clone());
    let match_1 = |levels: Vec<Level>, args: &[Expr]| {
        mk_app_n(mk_const(NAT_IS_ZERO_MATCH_1.clone(), levels), args)
    };
    let alt_2_ty = |motive: &Expr| pi("x", Ex, nat(), |x| mk_app(motive.clone(), x));
    env.add_definition(
        NAT_IS_ZERO_MATCH_1.clone(),
        vec![u.clone()],
        pi("motive", Ex, motive_ty.clone(), |motive| {
            pi("n", Ex, nat(), |n| {
                pi("h_1", Ex, mk_app(motive.clone(), mk_nat_lit(0)), |_| {
                    pi("h_2", Ex, alt_2_ty(&motive), |_| mk_app(motive.clone(), n.clone()))
                })
            })
        }),
        lam("motive", Ex, motive_ty.clone(), |motive| {
            lam("n", Ex, nat(), |n| {
                lam("h_1", Ex, mk_app(motive.clone(), mk_nat_lit(0)), |h1| {
                    lam("h_2", Ex, alt_2_ty(&motive), |h2| {
                        mk_app_n(
                            mk_const(NAT.extend("casesOn"), vec![lu.clone()]),
                            &[
                                motive.clone(),
                                n,
                                h1,
                                lam("k", Ex, nat(), |k| mk_app(h2, nat_succ(k))),
                            ],
                        )
                    })
                })
            })
        }),
        ReducibilityStatus::Semireducible,
    )?;
    env.add_matcher(
        NAT_IS_ZERO_MATCH_1.clone(),
        MatcherInfo {
            num_params: 0,
            num_discrs: 1,
            alt_num_params: vec![0, 1],
        },
    )?;
    env.add_theorem(
        NAT_IS_ZERO_MATCH_1_EQ_1.clone(),
        vec![u.clone()],
        pi("motive", Ex, motive_ty.clone(), |motive| {
            let zero_ty = mk_app(motive.clone(), mk_nat_lit(0));
            pi("h_1", Ex, zero_ty.clone(), |h1| {
                pi("h_2", Ex, alt_2_ty(&motive), |h2| {
                    let lhs = match_1(vec![lu.clone()], &[motive.clone(), mk_nat_lit(0), h1.clone(), h2]);
                    eq_u(&zero_ty, lhs, h1)
                })
            })
        }),
        mk_const(EQ_REFL.clone(), vec![lu.clone()]),
    )?;
    env.add_axiom(
        NAT_IS_ZERO_MATCH_1_EQ_2.clone(),
        vec![u.clone()],
        pi("motive", Ex, motive_ty.clone(), |motive| {
            pi("x", Ex, nat(), |x| {
                pi("h_1", Ex, mk_app(motive.clone(), mk_nat_lit(0)), |h1| {
                    pi("h_2", Ex, alt_2_ty(&motive), |h2| {
                        let ne_zero = mk_arrow(nat_eq(x.clone(), mk_nat_lit(0)), false_prop());
                        mk_arrow(
                            ne_zero,
                            eq_u(
                                &mk_app(motive.clone(), x.clone()),
                                match_1(vec![lu.clone()], &[motive.clone(), x.clone(), h1, h2.clone()]),
                                mk_app(h2, x),
                            ),
                        )
                    })
                })
            })
        }),
    )?;
    env.add_eqns(
        NAT_IS_ZERO_MATCH_1.clone(),
        vec![NAT_IS_ZERO_MATCH_1_EQ_1.clone(), NAT_IS_ZERO_MATCH_1_EQ_2.clone()],
    )?;
    env.add_definition(
        NAT_IS_ZERO.clone(),
        vec![],
        mk_arrow(nat(), bool_ty()),
        lam("n", Ex, nat(), |n| {
            match_1(
                vec![Level::one()],
                &[
                    lam("_", Ex, nat(), |_| bool_ty()),
                    n,
                    cnst(&BOOL_TRUE),
                    lam("_", Ex, nat(), |_| cnst(&BOOL_FALSE)),
                ],
            )
        }),
        ReducibilityStatus::Semireducible,
    )?;

    Ok(env)
}
