//! Global declarations: constants, inductive types and the side tables the simplifier
//! consults (matchers, equation theorems, type-class instances).

use std::collections::{HashMap, HashSet};

use anyhow::{bail, ensure};

use crate::expr::{
    mk_app, mk_app_n, mk_arrow, mk_binding, mk_const, mk_fvar, mk_sort, Binder, BinderInfo, Expr,
    FVarId, Level, Name,
};
use crate::prelude::EQ;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReducibilityStatus {
    Reducible,
    #[default]
    Semireducible,
    Irreducible,
}

#[derive(Debug, Clone)]
pub struct ConstantInfo {
    pub name: Name,
    pub level_params: Vec<Name>,
    pub ty: Expr,
    pub kind: ConstantKind,
}

#[derive(Debug, Clone)]
pub enum ConstantKind {
    Axiom,
    Opaque,
    Theorem(Expr),
    Definition(DefinitionVal),
    Inductive(InductiveVal),
    Constructor(ConstructorVal),
    CasesOn(CasesOnVal),
}

#[derive(Debug, Clone)]
pub struct DefinitionVal {
    pub value: Expr,
    // equal to height(value)
    pub height: usize,
    pub reducibility: ReducibilityStatus,
}

#[derive(Debug, Clone)]
pub struct InductiveVal {
    pub num_params: usize,
    pub ctors: Vec<Name>,
}

#[derive(Debug, Clone)]
pub struct ConstructorVal {
    pub induct: Name,
    pub cidx: usize,
    pub num_params: usize,
    pub num_fields: usize,
}

#[derive(Debug, Clone)]
pub struct CasesOnVal {
    pub induct: Name,
    pub num_params: usize,
    pub num_minors: usize,
}

impl CasesOnVal {
    /// params, motive, major
    pub fn major_idx(&self) -> usize {
        self.num_params + 1
    }

    pub fn arity(&self) -> usize {
        self.major_idx() + 1 + self.num_minors
    }
}

/// Layout of an auxiliary pattern-matching definition:
/// `M params motive discrs alts`.
#[derive(Debug, Clone)]
pub struct MatcherInfo {
    pub num_params: usize,
    pub num_discrs: usize,
    pub alt_num_params: Vec<usize>,
}

impl MatcherInfo {
    pub fn first_discr_pos(&self) -> usize {
        self.num_params + 1
    }

    pub fn first_alt_pos(&self) -> usize {
        self.first_discr_pos() + self.num_discrs
    }

    pub fn num_alts(&self) -> usize {
        self.alt_num_params.len()
    }

    pub fn arity(&self) -> usize {
        self.first_alt_pos() + self.num_alts()
    }
}

#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub name: Name,
    pub class: Name,
    pub priority: u32,
}

/// Input to [Environment::add_inductive]. Indexed families are not supported: every
/// binder of `ty` is a parameter.
#[derive(Debug, Clone)]
pub struct InductiveDecl {
    pub name: Name,
    pub level_params: Vec<Name>,
    pub ty: Expr,
    pub num_params: usize,
    pub ctors: Vec<(Name, Expr)>,
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    const_table: HashMap<Name, ConstantInfo>,
    matcher_table: HashMap<Name, MatcherInfo>,
    eqn_table: HashMap<Name, Vec<Name>>,
    class_table: HashSet<Name>,
    instance_table: Vec<InstanceInfo>,
}

impl Environment {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn find(&self, name: &Name) -> Option<&ConstantInfo> {
        self.const_table.get(name)
    }

    pub fn get(&self, name: &Name) -> anyhow::Result<&ConstantInfo> {
        match self.const_table.get(name) {
            Some(info) => Ok(info),
            None => bail!("unknown constant: {name}"),
        }
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.const_table.contains_key(name)
    }

    fn add_constant(&mut self, info: ConstantInfo) -> anyhow::Result<()> {
        ensure!(
            !self.const_table.contains_key(&info.name),
            "already declared: {}",
            info.name
        );
        self.const_table.insert(info.name.clone(), info);
        Ok(())
    }

    pub fn add_axiom(&mut self, name: Name, level_params: Vec<Name>, ty: Expr) -> anyhow::Result<()> {
        self.add_constant(ConstantInfo {
            name,
            level_params,
            ty,
            kind: ConstantKind::Axiom,
        })
    }

    pub fn add_opaque(&mut self, name: Name, level_params: Vec<Name>, ty: Expr) -> anyhow::Result<()> {
        self.add_constant(ConstantInfo {
            name,
            level_params,
            ty,
            kind: ConstantKind::Opaque,
        })
    }

    pub fn add_theorem(
        &mut self,
        name: Name,
        level_params: Vec<Name>,
        ty: Expr,
        value: Expr,
    ) -> anyhow::Result<()> {
        self.add_constant(ConstantInfo {
            name,
            level_params,
            ty,
            kind: ConstantKind::Theorem(value),
        })
    }

    pub fn add_definition(
        &mut self,
        name: Name,
        level_params: Vec<Name>,
        ty: Expr,
        value: Expr,
        reducibility: ReducibilityStatus,
    ) -> anyhow::Result<()> {
        let height = self.height(&value) + 1;
        self.add_constant(ConstantInfo {
            name,
            level_params,
            ty,
            kind: ConstantKind::Definition(DefinitionVal {
                value,
                height,
                reducibility,
            }),
        })
    }

    /// Height of the tallest definition a term refers to.
    pub fn height(&self, e: &Expr) -> usize {
        let mut height = 0;
        e.for_each(&mut |e| {
            if let Expr::Const(inner) = e {
                if let Some(ConstantInfo {
                    kind: ConstantKind::Definition(def),
                    ..
                }) = self.const_table.get(&inner.name)
                {
                    height = height.max(def.height);
                }
            }
            true
        });
        height
    }

    /// Declares an inductive type together with its constructors, its `casesOn`
    /// eliminator and its `noConfusion` principle.
    pub fn add_inductive(&mut self, decl: InductiveDecl) -> anyhow::Result<()> {
        let InductiveDecl {
            name,
            level_params,
            ty,
            num_params,
            ctors,
        } = decl;
        ensure!(
            ty.forall_arity() == num_params,
            "indexed families are not supported: {name}"
        );
        let levels: Vec<Level> = level_params.iter().cloned().map(Level::param).collect();

        // open the parameter telescope once and build everything over those locals
        let mut params: Vec<Binder> = vec![];
        let mut param_fvars: Vec<Expr> = vec![];
        let mut t = ty.clone();
        while let Expr::ForallE(inner) = &t {
            let fvar = FVarId::fresh_with_name(inner.binder_name.clone());
            params.push(Binder {
                fvar,
                name: inner.binder_name.clone(),
                ty: inner.binder_type.clone(),
                info: BinderInfo::Implicit,
            });
            param_fvars.push(mk_fvar(fvar));
            t = inner.body.instantiate1(&mk_fvar(fvar));
        }
        let Expr::Sort(result_sort) = &t else {
            bail!("the type of an inductive must end in a sort: {name}");
        };
        let result_level = result_sort.level.clone();
        let self_app = mk_app_n(mk_const(name.clone(), levels.clone()), &param_fvars);

        self.add_constant(ConstantInfo {
            name: name.clone(),
            level_params: level_params.clone(),
            ty: ty.clone(),
            kind: ConstantKind::Inductive(InductiveVal {
                num_params,
                ctors: ctors.iter().map(|(n, _)| n.clone()).collect(),
            }),
        })?;

        let motive_level_name = Name::intern("u_motive");
        let motive_level = Level::param(motive_level_name.clone());
        let motive = Binder {
            fvar: FVarId::fresh_with_name(Name::intern("motive")),
            name: Name::intern("motive"),
            ty: mk_arrow(self_app.clone(), mk_sort(motive_level.clone())),
            info: BinderInfo::Implicit,
        };
        let major = Binder {
            fvar: FVarId::fresh_with_name(Name::intern("t")),
            name: Name::intern("t"),
            ty: self_app.clone(),
            info: BinderInfo::Default,
        };

        let mut minors = vec![];
        for (cidx, (ctor_name, ctor_ty)) in ctors.iter().enumerate() {
            let Some(mut t) = ctor_ty.instantiate_forall(&param_fvars) else {
                bail!("constructor {ctor_name} does not take the parameters of {name}");
            };
            let mut fields: Vec<Binder> = vec![];
            while let Expr::ForallE(inner) = &t {
                let fvar = FVarId::fresh_with_name(inner.binder_name.clone());
                fields.push(Binder {
                    fvar,
                    name: inner.binder_name.clone(),
                    ty: inner.binder_type.clone(),
                    info: BinderInfo::Default,
                });
                t = inner.body.instantiate1(&mk_fvar(fvar));
            }
            ensure!(
                t == self_app,
                "constructor {ctor_name} must return {self_app}, got {t}"
            );
            let ctor_app = mk_app_n(
                mk_app_n(mk_const(ctor_name.clone(), levels.clone()), &param_fvars),
                &fields.iter().map(|b| mk_fvar(b.fvar)).collect::<Vec<_>>(),
            );
            minors.push(Binder {
                fvar: FVarId::fresh(),
                name: Name::intern(ctor_name.last()),
                ty: mk_binding(false, &fields, &mk_app(mk_fvar(motive.fvar), ctor_app)),
                info: BinderInfo::Default,
            });
            self.add_constant(ConstantInfo {
                name: ctor_name.clone(),
                level_params: level_params.clone(),
                ty: ctor_ty.clone(),
                kind: ConstantKind::Constructor(ConstructorVal {
                    induct: name.clone(),
                    cidx,
                    num_params,
                    num_fields: fields.len(),
                }),
            })?;
        }

        let mut cases_binders = params.clone();
        cases_binders.push(motive.clone());
        cases_binders.push(major.clone());
        cases_binders.extend(minors.iter().cloned());
        let cases_ty = mk_binding(
            false,
            &cases_binders,
            &mk_app(mk_fvar(motive.fvar), mk_fvar(major.fvar)),
        );
        let mut cases_level_params = vec![motive_level_name.clone()];
        cases_level_params.extend(level_params.iter().cloned());
        self.add_constant(ConstantInfo {
            name: name.extend("casesOn"),
            level_params: cases_level_params.clone(),
            ty: cases_ty,
            kind: ConstantKind::CasesOn(CasesOnVal {
                induct: name.clone(),
                num_params,
                num_minors: ctors.len(),
            }),
        })?;

        // noConfusionType params P v₁ v₂ : Sort v, reduced natively by whnf
        let p = Binder {
            fvar: FVarId::fresh_with_name(Name::intern("P")),
            name: Name::intern("P"),
            ty: mk_sort(motive_level.clone()),
            info: BinderInfo::Implicit,
        };
        let v1 = Binder {
            fvar: FVarId::fresh_with_name(Name::intern("v1")),
            name: Name::intern("v1"),
            ty: self_app.clone(),
            info: BinderInfo::Implicit,
        };
        let v2 = Binder {
            fvar: FVarId::fresh_with_name(Name::intern("v2")),
            name: Name::intern("v2"),
            ty: self_app.clone(),
            info: BinderInfo::Implicit,
        };
        let mut nct_binders = params.clone();
        nct_binders.push(Binder {
            info: BinderInfo::Default,
            ..p.clone()
        });
        nct_binders.push(Binder {
            info: BinderInfo::Default,
            ..v1.clone()
        });
        nct_binders.push(Binder {
            info: BinderInfo::Default,
            ..v2.clone()
        });
        let nct_ty = mk_binding(false, &nct_binders, &mk_sort(motive_level.clone()));
        let nct_name = name.extend("noConfusionType");
        self.add_constant(ConstantInfo {
            name: nct_name.clone(),
            level_params: cases_level_params.clone(),
            ty: nct_ty,
            kind: ConstantKind::Opaque,
        })?;

        let cases_levels: Vec<Level> = cases_level_params.iter().cloned().map(Level::param).collect();
        let h = Binder {
            fvar: FVarId::fresh_with_name(Name::intern("h")),
            name: Name::intern("h"),
            ty: mk_app_n(
                mk_const(EQ.clone(), vec![result_level]),
                &[self_app, mk_fvar(v1.fvar), mk_fvar(v2.fvar)],
            ),
            info: BinderInfo::Default,
        };
        let mut nc_binders = params;
        nc_binders.extend([p.clone(), v1.clone(), v2.clone(), h]);
        let mut nct_args = param_fvars;
        nct_args.extend([mk_fvar(p.fvar), mk_fvar(v1.fvar), mk_fvar(v2.fvar)]);
        let nc_ty = mk_binding(
            false,
            &nc_binders,
            &mk_app_n(mk_const(nct_name, cases_levels), &nct_args),
        );
        self.add_constant(ConstantInfo {
            name: name.extend("noConfusion"),
            level_params: cases_level_params,
            ty: nc_ty,
            kind: ConstantKind::Axiom,
        })?;
        Ok(())
    }

    pub fn add_matcher(&mut self, name: Name, info: MatcherInfo) -> anyhow::Result<()> {
        ensure!(self.contains(&name), "unknown matcher definition: {name}");
        self.matcher_table.insert(name, info);
        Ok(())
    }

    pub fn add_eqns(&mut self, name: Name, eqns: Vec<Name>) -> anyhow::Result<()> {
        for eqn in &eqns {
            ensure!(self.contains(eqn), "unknown equation theorem: {eqn}");
        }
        self.eqn_table.insert(name, eqns);
        Ok(())
    }

    pub fn add_class(&mut self, name: Name) -> anyhow::Result<()> {
        ensure!(self.contains(&name), "unknown class: {name}");
        self.class_table.insert(name);
        Ok(())
    }

    pub fn add_instance(&mut self, name: Name, class: Name, priority: u32) -> anyhow::Result<()> {
        ensure!(self.contains(&name), "unknown instance: {name}");
        ensure!(self.class_table.contains(&class), "not a class: {class}");
        self.instance_table.push(InstanceInfo {
            name,
            class,
            priority,
        });
        Ok(())
    }

    pub fn matcher_info(&self, name: &Name) -> Option<&MatcherInfo> {
        self.matcher_table.get(name)
    }

    pub fn is_matcher(&self, name: &Name) -> bool {
        self.matcher_table.contains_key(name)
    }

    pub fn eqns(&self, name: &Name) -> Option<&[Name]> {
        self.eqn_table.get(name).map(Vec::as_slice)
    }

    pub fn is_class(&self, name: &Name) -> bool {
        self.class_table.contains(name)
    }

    pub fn is_instance(&self, name: &Name) -> bool {
        self.instance_table.iter().any(|i| &i.name == name)
    }

    /// Instances of `class`, highest priority first and, among equal priorities, the most
    /// recently declared first.
    pub fn instances_of(&self, class: &Name) -> Vec<&InstanceInfo> {
        let mut instances: Vec<&InstanceInfo> = self
            .instance_table
            .iter()
            .rev()
            .filter(|i| &i.class == class)
            .collect();
        instances.sort_by(|a, b| b.priority.cmp(&a.priority));
        instances
    }

    pub fn constructor_val(&self, name: &Name) -> Option<&ConstructorVal> {
        match self.find(name) {
            Some(ConstantInfo {
                kind: ConstantKind::Constructor(val),
                ..
            }) => Some(val),
            _ => None,
        }
    }

    pub fn inductive_val(&self, name: &Name) -> Option<&InductiveVal> {
        match self.find(name) {
            Some(ConstantInfo {
                kind: ConstantKind::Inductive(val),
                ..
            }) => Some(val),
            _ => None,
        }
    }

    pub fn definition_val(&self, name: &Name) -> Option<&DefinitionVal> {
        match self.find(name) {
            Some(ConstantInfo {
                kind: ConstantKind::Definition(val),
                ..
            }) => Some(val),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude;

    #[test]
    fn cases_on_is_generated() {
        let env = prelude::mk_env().unwrap();
        let cases = env.get(&Name::intern("List.casesOn")).unwrap();
        assert!(matches!(
            cases.kind,
            ConstantKind::CasesOn(CasesOnVal {
                num_params: 1,
                num_minors: 2,
                ..
            })
        ));
        insta::assert_snapshot!(cases.ty, @"∀ (α : Type u), ∀ (motive : List α → Sort u_motive), ∀ (t : List α), motive (List.nil α) → (∀ (head : α), ∀ (tail : List α), motive (List.cons α head tail)) → motive t");
        let cons = env.constructor_val(&Name::intern("List.cons")).unwrap();
        assert_eq!(cons.cidx, 1);
        assert_eq!(cons.num_fields, 2);
    }

    #[test]
    fn duplicate_declaration() {
        let mut env = prelude::mk_env().unwrap();
        let err = env
            .add_axiom(Name::intern("Nat"), vec![], crate::expr::mk_type())
            .unwrap_err();
        assert_eq!(err.to_string(), "already declared: Nat");
    }

    #[test]
    fn definition_height() {
        let env = prelude::mk_env().unwrap();
        let decide = env.definition_val(&Name::intern("Decidable.decide")).unwrap();
        assert_eq!(decide.height, 1);
    }
}
