//! Linear arithmetic over `Nat`: closes (in)equations that hold or fail for every value
//! of their atoms.

use indexmap::IndexMap;

use crate::app_builder::eq_parts;
use crate::expr::{mk_app_n, mk_const, Expr};
use crate::prelude::{
    false_prop, true_prop, BOOL_TRUE, NAT, NAT_ADD, NAT_LE, NAT_LINEAR_EQ_FALSE_OF_CERT,
    NAT_LINEAR_EQ_TRUE_OF_CERT, NAT_LT, NAT_MUL, NAT_SUCC,
};

use super::simprocs::nat_numeral;
use super::types::{Simp, SimpResult};

/// A decision procedure consulted by the simplifier on propositions.
pub trait ArithProcedure {
    fn simp(&self, s: &mut Simp<'_>, e: &Expr) -> anyhow::Result<Option<SimpResult>>;
}

/// `c + Σ kᵢ·xᵢ` with the atoms `xᵢ` in order of first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearCombo {
    pub constant: i128,
    pub coeffs: IndexMap<Expr, i128>,
}

impl LinearCombo {
    fn atom(e: &Expr) -> Self {
        let mut coeffs = IndexMap::new();
        coeffs.insert(e.clone(), 1);
        LinearCombo { constant: 0, coeffs }
    }

    fn constant(c: i128) -> Self {
        LinearCombo {
            constant: c,
            coeffs: IndexMap::new(),
        }
    }

    fn add_scaled(&mut self, other: &LinearCombo, k: i128) -> Option<()> {
        self.constant = self.constant.checked_add(k.checked_mul(other.constant)?)?;
        for (x, c) in &other.coeffs {
            let entry = self.coeffs.entry(x.clone()).or_insert(0);
            *entry = entry.checked_add(k.checked_mul(*c)?)?;
        }
        self.coeffs.retain(|_, c| *c != 0);
        Some(())
    }

    fn scale(&mut self, k: i128) -> Option<()> {
        self.constant = self.constant.checked_mul(k)?;
        for c in self.coeffs.values_mut() {
            *c = c.checked_mul(k)?;
        }
        self.coeffs.retain(|_, c| *c != 0);
        Some(())
    }

    /// Reads `e` as a linear expression; anything that is not a numeral, a sum, a
    /// successor or a product with a numeral becomes an atom. `None` when a coefficient
    /// overflows.
    pub fn of_expr(e: &Expr) -> Option<Self> {
        let e = e.consume_mdata();
        if let Some(n) = nat_numeral(e) {
            return Some(LinearCombo::constant(i128::from(n)));
        }
        if e.is_app_of(&NAT_SUCC, 1) {
            if let Some(a) = e.app_arg() {
                let mut r = LinearCombo::of_expr(a)?;
                r.constant = r.constant.checked_add(1)?;
                return Some(r);
            }
        }
        if e.is_app_of(&NAT_ADD, 2) {
            let args = e.get_app_args();
            let mut r = LinearCombo::of_expr(&args[0])?;
            r.add_scaled(&LinearCombo::of_expr(&args[1])?, 1)?;
            return Some(r);
        }
        if e.is_app_of(&NAT_MUL, 2) {
            let args = e.get_app_args();
            let scaled = match (nat_numeral(&args[0]), nat_numeral(&args[1])) {
                (Some(k), _) => Some((k, &args[1])),
                (_, Some(k)) => Some((k, &args[0])),
                _ => None,
            };
            if let Some((k, a)) = scaled {
                let mut r = LinearCombo::of_expr(a)?;
                r.scale(i128::from(k))?;
                return Some(r);
            }
        }
        Some(LinearCombo::atom(e))
    }

    /// `self - other`
    fn sub(mut self, other: &LinearCombo) -> Option<Self> {
        self.add_scaled(other, -1)?;
        Some(self)
    }

    fn all_coeffs(&self, p: impl Fn(i128) -> bool) -> bool {
        self.coeffs.values().all(|c| p(*c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Eq,
    Le,
}

/// Atoms range over the naturals. Decides `d = 0` or `d ≤ 0` when the answer does
/// not depend on the atoms.
fn decide(d: &LinearCombo, rel: Relation) -> Option<bool> {
    let k = d.constant;
    match rel {
        Relation::Eq => {
            if d.coeffs.is_empty() {
                Some(k == 0)
            } else if (k > 0 && d.all_coeffs(|c| c >= 0)) || (k < 0 && d.all_coeffs(|c| c <= 0)) {
                Some(false)
            } else {
                None
            }
        }
        Relation::Le => {
            if k <= 0 && d.all_coeffs(|c| c <= 0) {
                Some(true)
            } else if k > 0 && d.all_coeffs(|c| c >= 0) {
                Some(false)
            } else {
                None
            }
        }
    }
}

/// The default procedure: linear `=`, `≤` and `<` over `Nat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NatLinear;

impl NatLinear {
    fn classify(e: &Expr) -> Option<(LinearCombo, Relation)> {
        if let Some(eq) = eq_parts(e) {
            if !eq.ty.is_const_of(&NAT) {
                return None;
            }
            let d = LinearCombo::of_expr(&eq.lhs)?.sub(&LinearCombo::of_expr(&eq.rhs)?)?;
            return Some((d, Relation::Eq));
        }
        let e = e.consume_mdata();
        let strict = if e.is_app_of(&NAT_LE, 2) {
            false
        } else if e.is_app_of(&NAT_LT, 2) {
            true
        } else {
            return None;
        };
        let args = e.get_app_args();
        let mut d = LinearCombo::of_expr(&args[0])?.sub(&LinearCombo::of_expr(&args[1])?)?;
        if strict {
            d.constant = d.constant.checked_add(1)?;
        }
        Some((d, Relation::Le))
    }
}

/// `Some(true)` when `e` holds for every value of its atoms, `Some(false)` when it holds
/// for none, `None` when the answer depends on the atoms or `e` is not linear.
pub fn certify_linear(e: &Expr) -> Option<bool> {
    let (d, rel) = NatLinear::classify(e)?;
    decide(&d, rel)
}

impl ArithProcedure for NatLinear {
    fn simp(&self, s: &mut Simp<'_>, e: &Expr) -> anyhow::Result<Option<SimpResult>> {
        let e = s.meta.instantiate_mvars(e);
        let Some(holds) = certify_linear(&e) else {
            return Ok(None);
        };
        log::trace!(target: "simp::rewrite", "linear arithmetic: {e} is {holds}");
        let (cert, value) = if holds {
            (NAT_LINEAR_EQ_TRUE_OF_CERT.clone(), true_prop())
        } else {
            (NAT_LINEAR_EQ_FALSE_OF_CERT.clone(), false_prop())
        };
        // the checker reduces to `Bool.true` on `e`, so `Eq.refl` closes its premise
        let checked = s.meta.mk_eq_refl(&mk_const(BOOL_TRUE.clone(), vec![]))?;
        let proof = mk_app_n(mk_const(cert, vec![]), &[e, checked]);
        Ok(Some(SimpResult::with_proof(value, proof)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{mk_app, mk_fvar, mk_nat_lit, BinderInfo, FVarId, Name};
    use crate::meta::Meta;
    use crate::prelude::{
        self, cnst, nat, nat_add, nat_eq, nat_le, nat_lt, nat_mul, nat_succ, of_nat, BOOL_FALSE,
        NAT_LINEAR_IS_VALID,
    };

    fn x() -> Expr {
        mk_fvar(FVarId::fresh_with_name(Name::intern("x")))
    }

    #[test]
    fn normalizes_sums_and_scaling() {
        let x = x();
        let e = nat_add(nat_mul(mk_nat_lit(2), x.clone()), nat_succ(nat_add(x.clone(), of_nat(3))));
        let combo = LinearCombo::of_expr(&e).unwrap();
        assert_eq!(combo.constant, 4);
        assert_eq!(combo.coeffs.get(&x), Some(&3));
    }

    #[test]
    fn decides_when_atoms_do_not_matter() {
        let x = x();
        let cases = [
            (nat_le(x.clone(), nat_add(x.clone(), mk_nat_lit(1))), Some(true)),
            (nat_lt(nat_add(x.clone(), mk_nat_lit(1)), x.clone()), Some(false)),
            (nat_eq(nat_add(x.clone(), mk_nat_lit(1)), mk_nat_lit(0)), Some(false)),
            (nat_eq(nat_add(x.clone(), mk_nat_lit(1)), nat_succ(x.clone())), Some(true)),
            (nat_eq(x.clone(), mk_nat_lit(3)), None),
        ];
        for (e, expected) in cases {
            let got = NatLinear::classify(&e).and_then(|(d, rel)| decide(&d, rel));
            assert_eq!(got, expected, "{e}");
        }
    }

    #[test]
    fn overflowing_coefficients_give_no_answer() {
        let x = x();
        let big = || mk_nat_lit(u64::MAX);
        let e = nat_mul(big(), nat_mul(big(), nat_mul(big(), x.clone())));
        assert!(LinearCombo::of_expr(&e).is_none());
        assert_eq!(certify_linear(&nat_eq(e, mk_nat_lit(0))), None);
        // a single scaling still fits
        let once = LinearCombo::of_expr(&nat_mul(big(), x.clone())).unwrap();
        assert_eq!(once.coeffs.get(&x), Some(&i128::from(u64::MAX)));
    }

    #[test]
    fn certificates_are_checked() {
        let env = prelude::mk_env().unwrap();
        let mut meta = Meta::new(&env);
        let x = meta.add_local_decl(Name::intern("x"), BinderInfo::Default, nat());
        let is_valid = |p: &Expr| mk_app(cnst(&NAT_LINEAR_IS_VALID), p.clone());
        let refl = meta.mk_eq_refl(&cnst(&BOOL_TRUE)).unwrap();
        let refl_ty = meta.infer_type(&refl).unwrap();
        let premise = |meta: &mut Meta, p: &Expr| {
            let ty = meta.infer_type(&mk_app(cnst(&NAT_LINEAR_EQ_TRUE_OF_CERT), p.clone())).unwrap();
            match &ty {
                Expr::ForallE(binder) => binder.binder_type.clone(),
                _ => panic!("premise expected: {ty}"),
            }
        };

        let valid = nat_le(x.clone(), nat_add(x.clone(), mk_nat_lit(1)));
        assert_eq!(meta.whnf(&is_valid(&valid)).unwrap(), cnst(&BOOL_TRUE));
        let h = premise(&mut meta, &valid);
        assert!(meta.is_def_eq(&h, &refl_ty).unwrap());

        // neither an undecided proposition nor `False` can be certified
        for p in [nat_eq(x.clone(), mk_nat_lit(3)), false_prop()] {
            assert_eq!(meta.whnf(&is_valid(&p)).unwrap(), cnst(&BOOL_FALSE));
            let h = premise(&mut meta, &p);
            assert!(!meta.is_def_eq(&h, &refl_ty).unwrap());
        }
    }
}
