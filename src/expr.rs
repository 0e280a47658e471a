use std::collections::HashMap;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, Weak};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Hierarchical, dot-separated constant name. Interned: equality is pointer equality.
#[derive(Debug, Clone, Ord, PartialOrd)]
pub struct Name(Arc<String>);

static NAME_TABLE: Lazy<Mutex<HashMap<String, Weak<String>>>> = Lazy::new(Default::default);

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Cased_Letter}_][\p{Cased_Letter}\p{Number}_'!?₀-₉ₐ-ₜᵢ-ᵪ]*(\.([\p{Cased_Letter}\p{Number}_'!?₀-₉ₐ-ₜᵢ-ᵪ]+))*$")
        .unwrap()
});

#[derive(Debug, Clone, Error)]
#[error("invalid name: {name}")]
pub struct InvalidNameError {
    pub name: String,
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Name {
    type Err = InvalidNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if !NAME_RE.is_match(value) {
            return Err(InvalidNameError {
                name: value.to_owned(),
            });
        }
        Ok(Name::intern(value))
    }
}

impl Name {
    /// Interns `value` without validation. Used for names generated by the library itself.
    pub fn intern(value: &str) -> Name {
        let mut table = NAME_TABLE.lock().unwrap();
        if let Some(existing) = table.get(value).and_then(|weak| weak.upgrade()) {
            return Name(existing);
        }

        let owned = Arc::new(value.to_owned());
        table.insert(value.to_owned(), Arc::downgrade(&owned));
        Name(owned)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// `Name::intern("List").extend("casesOn") == Name::intern("List.casesOn")`
    pub fn extend(&self, suffix: impl AsRef<str>) -> Name {
        Name::intern(&format!("{}.{}", self.0, suffix.as_ref()))
    }

    pub fn prefix(&self) -> Option<Name> {
        self.0.rfind('.').map(|i| Name::intern(&self.0[..i]))
    }

    pub fn last(&self) -> &str {
        match self.0.rfind('.') {
            Some(i) => &self.0[i + 1..],
            None => self.0.as_str(),
        }
    }

    fn stable_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in self.0.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        h
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

static ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
static ID_NAME_REV_TABLE: Lazy<Mutex<HashMap<usize, Name>>> = Lazy::new(Default::default);

fn fresh_id() -> usize {
    ID_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
}

fn fresh_id_with_name(name: Name) -> usize {
    let id = fresh_id();
    ID_NAME_REV_TABLE.lock().unwrap().insert(id, name);
    id
}

fn id_name(id: usize) -> Option<Name> {
    ID_NAME_REV_TABLE.lock().unwrap().get(&id).cloned()
}

/// Identifier of a local hypothesis. Ids are allocated from a global monotone counter,
/// so comparing two ids compares creation order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FVarId(usize);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MVarId(usize);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LMVarId(usize);

impl FVarId {
    pub fn fresh() -> Self {
        FVarId(fresh_id())
    }

    pub fn fresh_with_name(name: Name) -> Self {
        FVarId(fresh_id_with_name(name))
    }

    pub fn name(&self) -> Option<Name> {
        id_name(self.0)
    }
}

impl MVarId {
    pub fn fresh() -> Self {
        MVarId(fresh_id())
    }
}

impl LMVarId {
    pub fn fresh() -> Self {
        LMVarId(fresh_id())
    }
}

impl Display for FVarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "_fvar.{}", self.0),
        }
    }
}

impl Display for MVarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "?m.{}", self.0)
    }
}

impl Display for LMVarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "?u.{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Zero,
    Succ(Arc<Level>),
    Max(Arc<Level>, Arc<Level>),
    IMax(Arc<Level>, Arc<Level>),
    Param(Name),
    MVar(LMVarId),
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(n) = self.to_nat() {
            return write!(f, "{n}");
        }
        match self {
            Level::Zero => write!(f, "0"),
            Level::Succ(l) => write!(f, "{l}+1"),
            Level::Max(a, b) => write!(f, "max ({a}) ({b})"),
            Level::IMax(a, b) => write!(f, "imax ({a}) ({b})"),
            Level::Param(name) => write!(f, "{name}"),
            Level::MVar(id) => write!(f, "{id}"),
        }
    }
}

impl Level {
    pub fn zero() -> Level {
        Level::Zero
    }

    pub fn one() -> Level {
        Level::succ(Level::Zero)
    }

    pub fn succ(l: Level) -> Level {
        Level::Succ(Arc::new(l))
    }

    pub fn param(name: Name) -> Level {
        Level::Param(name)
    }

    pub fn mk_max(a: Level, b: Level) -> Level {
        if a == b {
            return a;
        }
        if a.is_zero() {
            return b;
        }
        if b.is_zero() {
            return a;
        }
        if let (Some(x), Some(y)) = (a.to_nat(), b.to_nat()) {
            return if x >= y { a } else { b };
        }
        Level::Max(Arc::new(a), Arc::new(b))
    }

    pub fn mk_imax(a: Level, b: Level) -> Level {
        if b.is_never_zero() {
            return Level::mk_max(a, b);
        }
        if b.is_zero() {
            return b;
        }
        if a.is_zero() || a == Level::one() {
            return b;
        }
        if a == b {
            return a;
        }
        Level::IMax(Arc::new(a), Arc::new(b))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Level::Zero)
    }

    pub fn is_never_zero(&self) -> bool {
        match self {
            Level::Zero | Level::Param(_) | Level::MVar(_) => false,
            Level::Succ(_) => true,
            Level::Max(a, b) => a.is_never_zero() || b.is_never_zero(),
            Level::IMax(_, b) => b.is_never_zero(),
        }
    }

    pub fn to_nat(&self) -> Option<u32> {
        match self {
            Level::Zero => Some(0),
            Level::Succ(l) => l.to_nat().map(|n| n + 1),
            _ => None,
        }
    }

    pub fn has_mvar(&self) -> bool {
        match self {
            Level::Zero | Level::Param(_) => false,
            Level::MVar(_) => true,
            Level::Succ(l) => l.has_mvar(),
            Level::Max(a, b) | Level::IMax(a, b) => a.has_mvar() || b.has_mvar(),
        }
    }

    pub fn has_param(&self) -> bool {
        match self {
            Level::Zero | Level::MVar(_) => false,
            Level::Param(_) => true,
            Level::Succ(l) => l.has_param(),
            Level::Max(a, b) | Level::IMax(a, b) => a.has_param() || b.has_param(),
        }
    }

    pub fn occurs(&self, id: LMVarId) -> bool {
        match self {
            Level::Zero | Level::Param(_) => false,
            Level::MVar(m) => *m == id,
            Level::Succ(l) => l.occurs(id),
            Level::Max(a, b) | Level::IMax(a, b) => a.occurs(id) || b.occurs(id),
        }
    }

    /// Rebuilds the level bottom-up, simplifying `max`/`imax` on the way.
    pub fn replace(&self, f: &impl Fn(&Level) -> Option<Level>) -> Level {
        if let Some(l) = f(self) {
            return l;
        }
        match self {
            Level::Zero | Level::Param(_) | Level::MVar(_) => self.clone(),
            Level::Succ(l) => Level::succ(l.replace(f)),
            Level::Max(a, b) => Level::mk_max(a.replace(f), b.replace(f)),
            Level::IMax(a, b) => Level::mk_imax(a.replace(f), b.replace(f)),
        }
    }

    pub fn instantiate_params(&self, params: &[Name], levels: &[Level]) -> Level {
        if !self.has_param() {
            return self.clone();
        }
        self.replace(&|l| match l {
            Level::Param(name) => params
                .iter()
                .position(|p| p == name)
                .and_then(|i| levels.get(i))
                .cloned(),
            _ => None,
        })
    }

    pub fn normalize(&self) -> Level {
        self.replace(&|_| None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinderInfo {
    #[default]
    Default,
    Implicit,
    StrictImplicit,
    InstImplicit,
}

impl BinderInfo {
    pub fn is_explicit(&self) -> bool {
        matches!(self, BinderInfo::Default)
    }

    pub fn is_inst_implicit(&self) -> bool {
        matches!(self, BinderInfo::InstImplicit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Nat(u64),
    Str(String),
}

#[derive(Clone, Debug)]
pub struct ExprMetadata {
    pub hash: u64,
    pub loose_bvar_range: u32,
    pub has_fvar: bool,
    pub has_expr_mvar: bool,
    pub has_level_mvar: bool,
    pub has_level_param: bool,
}

impl ExprMetadata {
    fn leaf(hash: u64) -> ExprMetadata {
        ExprMetadata {
            hash,
            loose_bvar_range: 0,
            has_fvar: false,
            has_expr_mvar: false,
            has_level_mvar: false,
            has_level_param: false,
        }
    }

    fn join(tag: u64, children: &[&ExprMetadata]) -> ExprMetadata {
        let mut m = ExprMetadata::leaf(tag);
        for c in children {
            m.hash = mix(m.hash, c.hash);
            m.loose_bvar_range = m.loose_bvar_range.max(c.loose_bvar_range);
            m.has_fvar |= c.has_fvar;
            m.has_expr_mvar |= c.has_expr_mvar;
            m.has_level_mvar |= c.has_level_mvar;
            m.has_level_param |= c.has_level_param;
        }
        m
    }
}

fn mix(a: u64, b: u64) -> u64 {
    (a.rotate_left(5) ^ b).wrapping_mul(0x517cc1b727220a95)
}

fn hash_levels(seed: u64, levels: &[Level]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for l in levels {
        // level names hash by pointer, so hash their rendering instead
        l.to_string().hash(&mut hasher);
    }
    mix(seed, hasher.finish())
}

/// Locally nameless representation: bound variables are de Bruijn indices, free
/// variables and metavariables are global ids.
#[derive(Clone, Debug)]
pub enum Expr {
    BVar(Arc<ExprBVar>),
    FVar(Arc<ExprFVar>),
    MVar(Arc<ExprMVar>),
    Sort(Arc<ExprSort>),
    Const(Arc<ExprConst>),
    App(Arc<ExprApp>),
    Lam(Arc<ExprBinder>),
    ForallE(Arc<ExprBinder>),
    Lit(Arc<ExprLit>),
    MData(Arc<ExprMData>),
}

#[derive(Clone, Debug)]
pub struct ExprBVar {
    pub metadata: ExprMetadata,
    pub index: u32,
}

#[derive(Clone, Debug)]
pub struct ExprFVar {
    pub metadata: ExprMetadata,
    pub id: FVarId,
}

#[derive(Clone, Debug)]
pub struct ExprMVar {
    pub metadata: ExprMetadata,
    pub id: MVarId,
}

#[derive(Clone, Debug)]
pub struct ExprSort {
    pub metadata: ExprMetadata,
    pub level: Level,
}

#[derive(Clone, Debug)]
pub struct ExprConst {
    pub metadata: ExprMetadata,
    pub name: Name,
    pub levels: Vec<Level>,
}

#[derive(Clone, Debug)]
pub struct ExprApp {
    pub metadata: ExprMetadata,
    pub fun: Expr,
    pub arg: Expr,
}

#[derive(Clone, Debug)]
pub struct ExprBinder {
    pub metadata: ExprMetadata,
    // for pretty-printing
    pub binder_name: Name,
    pub binder_type: Expr,
    pub binder_info: BinderInfo,
    pub body: Expr,
}

#[derive(Clone, Debug)]
pub struct ExprLit {
    pub metadata: ExprMetadata,
    pub lit: Literal,
}

#[derive(Clone, Debug)]
pub struct ExprMData {
    pub metadata: ExprMetadata,
    pub data: Vec<(Name, String)>,
    pub expr: Expr,
}

pub fn mk_bvar(index: u32) -> Expr {
    let mut metadata = ExprMetadata::leaf(mix(1, index as u64));
    metadata.loose_bvar_range = index + 1;
    Expr::BVar(Arc::new(ExprBVar { metadata, index }))
}

pub fn mk_fvar(id: FVarId) -> Expr {
    let mut metadata = ExprMetadata::leaf(mix(2, id.0 as u64));
    metadata.has_fvar = true;
    Expr::FVar(Arc::new(ExprFVar { metadata, id }))
}

pub fn mk_mvar(id: MVarId) -> Expr {
    let mut metadata = ExprMetadata::leaf(mix(3, id.0 as u64));
    metadata.has_expr_mvar = true;
    Expr::MVar(Arc::new(ExprMVar { metadata, id }))
}

pub fn mk_sort(level: Level) -> Expr {
    let mut metadata = ExprMetadata::leaf(hash_levels(4, std::slice::from_ref(&level)));
    metadata.has_level_mvar = level.has_mvar();
    metadata.has_level_param = level.has_param();
    Expr::Sort(Arc::new(ExprSort { metadata, level }))
}

pub fn mk_prop() -> Expr {
    mk_sort(Level::zero())
}

pub fn mk_type() -> Expr {
    mk_sort(Level::one())
}

pub fn mk_const(name: Name, levels: Vec<Level>) -> Expr {
    let mut metadata = ExprMetadata::leaf(hash_levels(mix(5, name.stable_hash()), &levels));
    metadata.has_level_mvar = levels.iter().any(Level::has_mvar);
    metadata.has_level_param = levels.iter().any(Level::has_param);
    Expr::Const(Arc::new(ExprConst {
        metadata,
        name,
        levels,
    }))
}

pub fn mk_app(fun: Expr, arg: Expr) -> Expr {
    let metadata = ExprMetadata::join(6, &[fun.metadata(), arg.metadata()]);
    Expr::App(Arc::new(ExprApp { metadata, fun, arg }))
}

pub fn mk_app_n(fun: Expr, args: &[Expr]) -> Expr {
    let mut e = fun;
    for arg in args {
        e = mk_app(e, arg.clone());
    }
    e
}

fn binder_metadata(tag: u64, binder_type: &Expr, body: &Expr) -> ExprMetadata {
    let mut metadata = ExprMetadata::join(tag, &[binder_type.metadata(), body.metadata()]);
    metadata.loose_bvar_range = binder_type
        .metadata()
        .loose_bvar_range
        .max(body.metadata().loose_bvar_range.saturating_sub(1));
    metadata
}

pub fn mk_lambda(binder_name: Name, binder_info: BinderInfo, binder_type: Expr, body: Expr) -> Expr {
    let metadata = binder_metadata(7, &binder_type, &body);
    Expr::Lam(Arc::new(ExprBinder {
        metadata,
        binder_name,
        binder_type,
        binder_info,
        body,
    }))
}

pub fn mk_forall(binder_name: Name, binder_info: BinderInfo, binder_type: Expr, body: Expr) -> Expr {
    let metadata = binder_metadata(8, &binder_type, &body);
    Expr::ForallE(Arc::new(ExprBinder {
        metadata,
        binder_name,
        binder_type,
        binder_info,
        body,
    }))
}

/// Non-dependent arrow `dom → cod`.
pub fn mk_arrow(dom: Expr, cod: Expr) -> Expr {
    mk_forall(Name::intern("a"), BinderInfo::Default, dom, cod.lift_loose_bvars(0, 1))
}

pub fn mk_lit(lit: Literal) -> Expr {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    lit.hash(&mut hasher);
    let metadata = ExprMetadata::leaf(mix(9, hasher.finish()));
    Expr::Lit(Arc::new(ExprLit { metadata, lit }))
}

pub fn mk_nat_lit(n: u64) -> Expr {
    mk_lit(Literal::Nat(n))
}

pub fn mk_mdata(data: Vec<(Name, String)>, expr: Expr) -> Expr {
    let metadata = ExprMetadata::join(10, &[expr.metadata()]);
    Expr::MData(Arc::new(ExprMData {
        metadata,
        data,
        expr,
    }))
}

/// A local binder introduced while building a term with free variables, later abstracted
/// back into a `fun`/`∀` by [mk_binding].
#[derive(Debug, Clone)]
pub struct Binder {
    pub fvar: FVarId,
    pub name: Name,
    pub ty: Expr,
    pub info: BinderInfo,
}

/// Abstracts `binders` (outermost first) out of `body`, producing lambdas or foralls.
pub fn mk_binding(is_lambda: bool, binders: &[Binder], body: &Expr) -> Expr {
    let ids: Vec<FVarId> = binders.iter().map(|b| b.fvar).collect();
    let mut e = body.abstract_fvars(&ids);
    for (i, b) in binders.iter().enumerate().rev() {
        let ty = b.ty.abstract_fvars(&ids[..i]);
        e = if is_lambda {
            mk_lambda(b.name.clone(), b.info, ty, e)
        } else {
            mk_forall(b.name.clone(), b.info, ty, e)
        };
    }
    e
}

impl Default for Expr {
    fn default() -> Self {
        mk_prop()
    }
}

impl PartialEq for Expr {
    /// Structural equality up to binder names and metadata annotations' order.
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.metadata().hash != other.metadata().hash {
            return false;
        }
        match (self, other) {
            (Expr::BVar(a), Expr::BVar(b)) => a.index == b.index,
            (Expr::FVar(a), Expr::FVar(b)) => a.id == b.id,
            (Expr::MVar(a), Expr::MVar(b)) => a.id == b.id,
            (Expr::Sort(a), Expr::Sort(b)) => a.level == b.level,
            (Expr::Const(a), Expr::Const(b)) => a.name == b.name && a.levels == b.levels,
            (Expr::App(a), Expr::App(b)) => a.fun == b.fun && a.arg == b.arg,
            (Expr::Lam(a), Expr::Lam(b)) | (Expr::ForallE(a), Expr::ForallE(b)) => {
                a.binder_type == b.binder_type && a.body == b.body
            }
            (Expr::Lit(a), Expr::Lit(b)) => a.lit == b.lit,
            (Expr::MData(a), Expr::MData(b)) => a.data == b.data && a.expr == b.expr,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.metadata().hash.hash(state);
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const PREC_BINDER: u8 = 0;
        const PREC_ARROW: u8 = 1;
        const PREC_APP: u8 = 2;
        const PREC_ATOM: u8 = 3;

        fn fmt_expr(
            e: &Expr,
            f: &mut std::fmt::Formatter<'_>,
            prec: u8,
            names: &mut Vec<Name>,
        ) -> std::fmt::Result {
            match e {
                Expr::BVar(inner) => {
                    let i = inner.index as usize;
                    if i < names.len() {
                        write!(f, "{}", names[names.len() - 1 - i])
                    } else {
                        write!(f, "#{i}")
                    }
                }
                Expr::FVar(inner) => write!(f, "{}", inner.id),
                Expr::MVar(inner) => write!(f, "{}", inner.id),
                Expr::Sort(inner) => {
                    let (keyword, level) = match (&inner.level, inner.level.to_nat()) {
                        (_, Some(0)) => return write!(f, "Prop"),
                        (_, Some(1)) => return write!(f, "Type"),
                        (Level::Succ(l), _) => ("Type", l.as_ref()),
                        (l, _) => ("Sort", l),
                    };
                    if prec > PREC_APP {
                        write!(f, "({keyword} {level})")
                    } else {
                        write!(f, "{keyword} {level}")
                    }
                }
                Expr::Const(inner) => write!(f, "{}", inner.name),
                Expr::Lit(inner) => match &inner.lit {
                    Literal::Nat(n) => write!(f, "{n}"),
                    Literal::Str(s) => write!(f, "{s:?}"),
                },
                Expr::MData(inner) => fmt_expr(&inner.expr, f, prec, names),
                Expr::App(_) => {
                    if prec > PREC_APP {
                        write!(f, "(")?;
                    }
                    let (fun, args) = e.get_app_fn_args();
                    fmt_expr(fun, f, PREC_APP, names)?;
                    for arg in args {
                        write!(f, " ")?;
                        fmt_expr(arg, f, PREC_ATOM, names)?;
                    }
                    if prec > PREC_APP {
                        write!(f, ")")?;
                    }
                    Ok(())
                }
                Expr::Lam(inner) => {
                    if prec > PREC_BINDER {
                        write!(f, "(")?;
                    }
                    write!(f, "fun ({} : ", inner.binder_name)?;
                    fmt_expr(&inner.binder_type, f, PREC_BINDER, names)?;
                    write!(f, ") => ")?;
                    names.push(inner.binder_name.clone());
                    let r = fmt_expr(&inner.body, f, PREC_BINDER, names);
                    names.pop();
                    r?;
                    if prec > PREC_BINDER {
                        write!(f, ")")?;
                    }
                    Ok(())
                }
                Expr::ForallE(inner) => {
                    let dependent = inner.body.has_loose_bvar(0);
                    let my_prec = if dependent { PREC_BINDER } else { PREC_ARROW };
                    if prec > my_prec {
                        write!(f, "(")?;
                    }
                    if dependent {
                        write!(f, "∀ ({} : ", inner.binder_name)?;
                        fmt_expr(&inner.binder_type, f, PREC_BINDER, names)?;
                        write!(f, "), ")?;
                        names.push(inner.binder_name.clone());
                        let r = fmt_expr(&inner.body, f, PREC_BINDER, names);
                        names.pop();
                        r?;
                    } else {
                        fmt_expr(&inner.binder_type, f, PREC_APP, names)?;
                        write!(f, " → ")?;
                        names.push(inner.binder_name.clone());
                        let r = fmt_expr(&inner.body, f, PREC_ARROW, names);
                        names.pop();
                        r?;
                    }
                    if prec > my_prec {
                        write!(f, ")")?;
                    }
                    Ok(())
                }
            }
        }

        fmt_expr(self, f, PREC_BINDER, &mut vec![])
    }
}

impl Expr {
    #[inline]
    pub fn metadata(&self) -> &ExprMetadata {
        match self {
            Expr::BVar(inner) => &inner.metadata,
            Expr::FVar(inner) => &inner.metadata,
            Expr::MVar(inner) => &inner.metadata,
            Expr::Sort(inner) => &inner.metadata,
            Expr::Const(inner) => &inner.metadata,
            Expr::App(inner) => &inner.metadata,
            Expr::Lam(inner) => &inner.metadata,
            Expr::ForallE(inner) => &inner.metadata,
            Expr::Lit(inner) => &inner.metadata,
            Expr::MData(inner) => &inner.metadata,
        }
    }

    pub fn ptr_eq(&self, other: &Expr) -> bool {
        match (self, other) {
            (Expr::BVar(a), Expr::BVar(b)) => Arc::ptr_eq(a, b),
            (Expr::FVar(a), Expr::FVar(b)) => Arc::ptr_eq(a, b),
            (Expr::MVar(a), Expr::MVar(b)) => Arc::ptr_eq(a, b),
            (Expr::Sort(a), Expr::Sort(b)) => Arc::ptr_eq(a, b),
            (Expr::Const(a), Expr::Const(b)) => Arc::ptr_eq(a, b),
            (Expr::App(a), Expr::App(b)) => Arc::ptr_eq(a, b),
            (Expr::Lam(a), Expr::Lam(b)) => Arc::ptr_eq(a, b),
            (Expr::ForallE(a), Expr::ForallE(b)) => Arc::ptr_eq(a, b),
            (Expr::Lit(a), Expr::Lit(b)) => Arc::ptr_eq(a, b),
            (Expr::MData(a), Expr::MData(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn has_fvar(&self) -> bool {
        self.metadata().has_fvar
    }

    pub fn has_expr_mvar(&self) -> bool {
        self.metadata().has_expr_mvar
    }

    pub fn has_level_mvar(&self) -> bool {
        self.metadata().has_level_mvar
    }

    pub fn has_mvar(&self) -> bool {
        self.has_expr_mvar() || self.has_level_mvar()
    }

    pub fn has_loose_bvars(&self) -> bool {
        self.metadata().loose_bvar_range > 0
    }

    pub fn has_loose_bvar(&self, i: u32) -> bool {
        if self.metadata().loose_bvar_range <= i {
            return false;
        }
        match self {
            Expr::BVar(inner) => inner.index == i,
            Expr::App(inner) => inner.fun.has_loose_bvar(i) || inner.arg.has_loose_bvar(i),
            Expr::Lam(inner) | Expr::ForallE(inner) => {
                inner.binder_type.has_loose_bvar(i) || inner.body.has_loose_bvar(i + 1)
            }
            Expr::MData(inner) => inner.expr.has_loose_bvar(i),
            _ => false,
        }
    }

    pub fn is_mvar(&self) -> bool {
        matches!(self, Expr::MVar(_))
    }

    pub fn is_fvar(&self) -> bool {
        matches!(self, Expr::FVar(_))
    }

    pub fn is_lambda(&self) -> bool {
        matches!(self, Expr::Lam(_))
    }

    pub fn is_forall(&self) -> bool {
        matches!(self, Expr::ForallE(_))
    }

    pub fn is_app(&self) -> bool {
        matches!(self, Expr::App(_))
    }

    pub fn is_sort(&self) -> bool {
        matches!(self, Expr::Sort(_))
    }

    pub fn is_prop(&self) -> bool {
        matches!(self, Expr::Sort(inner) if inner.level.is_zero())
    }

    /// `∀ _ : α, β` where `β` does not mention the bound variable.
    pub fn is_arrow(&self) -> bool {
        match self {
            Expr::ForallE(inner) => !inner.body.has_loose_bvar(0),
            _ => false,
        }
    }

    pub fn fvar_id(&self) -> Option<FVarId> {
        match self {
            Expr::FVar(inner) => Some(inner.id),
            _ => None,
        }
    }

    pub fn mvar_id(&self) -> Option<MVarId> {
        match self {
            Expr::MVar(inner) => Some(inner.id),
            _ => None,
        }
    }

    pub fn const_name(&self) -> Option<&Name> {
        match self {
            Expr::Const(inner) => Some(&inner.name),
            _ => None,
        }
    }

    pub fn const_levels(&self) -> Option<&[Level]> {
        match self {
            Expr::Const(inner) => Some(&inner.levels),
            _ => None,
        }
    }

    pub fn nat_lit(&self) -> Option<u64> {
        match self {
            Expr::Lit(inner) => match inner.lit {
                Literal::Nat(n) => Some(n),
                Literal::Str(_) => None,
            },
            _ => None,
        }
    }

    pub fn is_const_of(&self, name: &Name) -> bool {
        matches!(self, Expr::Const(inner) if &inner.name == name)
    }

    pub fn consume_mdata(&self) -> &Expr {
        let mut e = self;
        while let Expr::MData(inner) = e {
            e = &inner.expr;
        }
        e
    }

    pub fn get_app_fn(&self) -> &Expr {
        let mut e = self;
        while let Expr::App(inner) = e {
            e = &inner.fun;
        }
        e
    }

    pub fn get_app_num_args(&self) -> usize {
        let mut e = self;
        let mut n = 0;
        while let Expr::App(inner) = e {
            e = &inner.fun;
            n += 1;
        }
        n
    }

    pub fn get_app_fn_args(&self) -> (&Expr, Vec<&Expr>) {
        let mut e = self;
        let mut args = vec![];
        while let Expr::App(inner) = e {
            e = &inner.fun;
            args.push(&inner.arg);
        }
        args.reverse();
        (e, args)
    }

    pub fn get_app_args(&self) -> Vec<Expr> {
        self.get_app_fn_args().1.into_iter().cloned().collect()
    }

    /// `f a₁ ⋯ aₙ` with head constant `name` and exactly `n` arguments.
    pub fn is_app_of(&self, name: &Name, n: usize) -> bool {
        self.get_app_fn().is_const_of(name) && self.get_app_num_args() == n
    }

    pub fn app_arg(&self) -> Option<&Expr> {
        match self {
            Expr::App(inner) => Some(&inner.arg),
            _ => None,
        }
    }

    pub fn app_fn(&self) -> Option<&Expr> {
        match self {
            Expr::App(inner) => Some(&inner.fun),
            _ => None,
        }
    }

    /// Drops the last `n` arguments of an application.
    pub fn strip_args(&self, n: usize) -> Expr {
        let mut e = self;
        for _ in 0..n {
            match e {
                Expr::App(inner) => e = &inner.fun,
                _ => break,
            }
        }
        e.clone()
    }

    pub fn binding_body(&self) -> Option<&Expr> {
        match self {
            Expr::Lam(inner) | Expr::ForallE(inner) => Some(&inner.body),
            _ => None,
        }
    }

    pub fn binding_domain(&self) -> Option<&Expr> {
        match self {
            Expr::Lam(inner) | Expr::ForallE(inner) => Some(&inner.binder_type),
            _ => None,
        }
    }

    /// Generic bottom-up rewriting. `f` receives each subterm with the number of binders
    /// it sits under; returning `Some` replaces the subterm without descending into it.
    pub fn replace(&self, f: &mut impl FnMut(&Expr, u32) -> Option<Expr>) -> Expr {
        fn go(e: &Expr, offset: u32, f: &mut impl FnMut(&Expr, u32) -> Option<Expr>) -> Expr {
            if let Some(r) = f(e, offset) {
                return r;
            }
            match e {
                Expr::App(inner) => {
                    let fun = go(&inner.fun, offset, f);
                    let arg = go(&inner.arg, offset, f);
                    if inner.fun.ptr_eq(&fun) && inner.arg.ptr_eq(&arg) {
                        e.clone()
                    } else {
                        mk_app(fun, arg)
                    }
                }
                Expr::Lam(inner) | Expr::ForallE(inner) => {
                    let binder_type = go(&inner.binder_type, offset, f);
                    let body = go(&inner.body, offset + 1, f);
                    if inner.binder_type.ptr_eq(&binder_type) && inner.body.ptr_eq(&body) {
                        e.clone()
                    } else if e.is_lambda() {
                        mk_lambda(inner.binder_name.clone(), inner.binder_info, binder_type, body)
                    } else {
                        mk_forall(inner.binder_name.clone(), inner.binder_info, binder_type, body)
                    }
                }
                Expr::MData(inner) => {
                    let expr = go(&inner.expr, offset, f);
                    if inner.expr.ptr_eq(&expr) {
                        e.clone()
                    } else {
                        mk_mdata(inner.data.clone(), expr)
                    }
                }
                _ => e.clone(),
            }
        }
        go(self, 0, f)
    }

    /// Read-only traversal; `f` returns `false` to stop descending into a subterm.
    pub fn for_each(&self, f: &mut impl FnMut(&Expr) -> bool) {
        if !f(self) {
            return;
        }
        match self {
            Expr::App(inner) => {
                inner.fun.for_each(f);
                inner.arg.for_each(f);
            }
            Expr::Lam(inner) | Expr::ForallE(inner) => {
                inner.binder_type.for_each(f);
                inner.body.for_each(f);
            }
            Expr::MData(inner) => inner.expr.for_each(f),
            _ => {}
        }
    }

    pub fn find(&self, p: &impl Fn(&Expr) -> bool) -> Option<Expr> {
        let mut found = None;
        self.for_each(&mut |e| {
            if found.is_some() {
                return false;
            }
            if p(e) {
                found = Some(e.clone());
                return false;
            }
            true
        });
        found
    }

    pub fn lift_loose_bvars(&self, start: u32, delta: u32) -> Expr {
        if delta == 0 || self.metadata().loose_bvar_range <= start {
            return self.clone();
        }
        self.replace(&mut |e, offset| {
            if e.metadata().loose_bvar_range <= start + offset {
                return Some(e.clone());
            }
            match e {
                Expr::BVar(inner) if inner.index >= start + offset => Some(mk_bvar(inner.index + delta)),
                _ => None,
            }
        })
    }

    /// Replaces loose `#i` with `subst[subst.len() - 1 - i]`, and lowers the remaining
    /// loose indices by `subst.len()`. Mirrors opening a telescope of binders.
    pub fn instantiate_rev(&self, subst: &[Expr]) -> Expr {
        if subst.is_empty() || !self.has_loose_bvars() {
            return self.clone();
        }
        let n = subst.len() as u32;
        self.replace(&mut |e, offset| {
            if e.metadata().loose_bvar_range <= offset {
                return Some(e.clone());
            }
            match e {
                Expr::BVar(inner) => {
                    let i = inner.index;
                    if i < offset {
                        Some(e.clone())
                    } else if i - offset < n {
                        let v = &subst[(n - 1 - (i - offset)) as usize];
                        Some(v.lift_loose_bvars(0, offset))
                    } else {
                        Some(mk_bvar(i - n))
                    }
                }
                _ => None,
            }
        })
    }

    pub fn instantiate1(&self, value: &Expr) -> Expr {
        self.instantiate_rev(std::slice::from_ref(value))
    }

    /// Inverse of [Expr::instantiate_rev] for free variables: `xs[j]` becomes the loose
    /// index `xs.len() - 1 - j`.
    pub fn abstract_fvars(&self, xs: &[FVarId]) -> Expr {
        if xs.is_empty() || !self.has_fvar() {
            return self.clone();
        }
        let n = xs.len() as u32;
        self.replace(&mut |e, offset| {
            if !e.has_fvar() {
                return Some(e.clone());
            }
            match e {
                Expr::FVar(inner) => xs
                    .iter()
                    .rposition(|x| *x == inner.id)
                    .map(|j| mk_bvar(offset + n - 1 - j as u32)),
                _ => None,
            }
        })
    }

    pub fn replace_fvar(&self, x: FVarId, value: &Expr) -> Expr {
        self.abstract_fvars(&[x]).instantiate1(value)
    }

    pub fn contains_fvar(&self, x: FVarId) -> bool {
        self.has_fvar() && self.find(&|e| e.fvar_id() == Some(x)).is_some()
    }

    pub fn contains_mvar(&self, m: MVarId) -> bool {
        self.has_expr_mvar() && self.find(&|e| e.mvar_id() == Some(m)).is_some()
    }

    pub fn collect_fvars(&self) -> Vec<FVarId> {
        let mut fvars = vec![];
        self.for_each(&mut |e| {
            if !e.has_fvar() {
                return false;
            }
            if let Expr::FVar(inner) = e {
                if !fvars.contains(&inner.id) {
                    fvars.push(inner.id);
                }
            }
            true
        });
        fvars
    }

    pub fn instantiate_level_params(&self, params: &[Name], levels: &[Level]) -> Expr {
        if params.is_empty() || !self.metadata().has_level_param {
            return self.clone();
        }
        self.replace_levels(&|l| l.instantiate_params(params, levels))
    }

    pub fn replace_levels(&self, f: &impl Fn(&Level) -> Level) -> Expr {
        self.replace(&mut |e, _| {
            if !e.metadata().has_level_param && !e.metadata().has_level_mvar {
                return Some(e.clone());
            }
            match e {
                Expr::Sort(inner) => Some(mk_sort(f(&inner.level))),
                Expr::Const(inner) => Some(mk_const(
                    inner.name.clone(),
                    inner.levels.iter().map(f).collect(),
                )),
                _ => None,
            }
        })
    }

    /// `(fun x₁ ⋯ xₙ => b) a₁ ⋯ aₘ`, consuming as many leading lambdas as there are
    /// arguments and reapplying the rest.
    pub fn beta(&self, args: &[Expr]) -> Expr {
        let mut e = self;
        let mut i = 0;
        while let Expr::Lam(inner) = e {
            if i == args.len() {
                break;
            }
            e = &inner.body;
            i += 1;
        }
        let r = e.instantiate_rev(&args[..i]);
        if i < args.len() && r.is_lambda() {
            return r.beta(&args[i..]);
        }
        mk_app_n(r, &args[i..])
    }

    pub fn head_beta(&self) -> Expr {
        if !self.is_app() || !self.get_app_fn().is_lambda() {
            return self.clone();
        }
        let (f, args) = self.get_app_fn_args();
        let args: Vec<Expr> = args.into_iter().cloned().collect();
        f.beta(&args)
    }

    /// Eta-reduces `fun x => f x` to `f` when `x` does not occur in `f`.
    pub fn eta(&self) -> Expr {
        if let Expr::Lam(inner) = self {
            let body = inner.body.eta();
            if let Expr::App(app) = &body {
                if matches!(&app.arg, Expr::BVar(b) if b.index == 0) && !app.fun.has_loose_bvar(0) {
                    return app.fun.lift_loose_bvars_down();
                }
            }
        }
        self.clone()
    }

    fn lift_loose_bvars_down(&self) -> Expr {
        self.instantiate1(&mk_bvar(0))
    }

    /// `∀ x₁ ⋯ xₙ, b` ↦ `b[args]`, for up to `args.len()` binders.
    pub fn instantiate_forall(&self, args: &[Expr]) -> Option<Expr> {
        let mut e = self;
        for _ in args {
            match e {
                Expr::ForallE(inner) => e = &inner.body,
                _ => return None,
            }
        }
        Some(e.instantiate_rev(args))
    }

    /// Number of leading syntactic foralls.
    pub fn forall_arity(&self) -> usize {
        let mut e = self;
        let mut n = 0;
        while let Expr::ForallE(inner) = e {
            e = &inner.body;
            n += 1;
        }
        n
    }

    pub fn approx_depth(&self) -> usize {
        match self {
            Expr::App(inner) => 1 + inner.fun.approx_depth().max(inner.arg.approx_depth()),
            Expr::Lam(inner) | Expr::ForallE(inner) => {
                1 + inner.binder_type.approx_depth().max(inner.body.approx_depth())
            }
            Expr::MData(inner) => inner.expr.approx_depth(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(name: &str) -> Expr {
        mk_const(Name::intern(name), vec![])
    }

    #[test]
    fn name_validation() {
        assert!("List.length_cons".parse::<Name>().is_ok());
        assert!("Nat.add₂".parse::<Name>().is_ok());
        assert!("1abc".parse::<Name>().is_err());
        assert!("a..b".parse::<Name>().is_err());
        let n: Name = "Foo.bar".parse().unwrap();
        assert_eq!(n, Name::intern("Foo.bar"));
        assert_eq!(n.prefix(), Some(Name::intern("Foo")));
        assert_eq!(n.last(), "bar");
    }

    #[test]
    fn instantiate_and_abstract() {
        let x = FVarId::fresh_with_name(Name::intern("x"));
        let y = FVarId::fresh_with_name(Name::intern("y"));
        let body = mk_app_n(c("f"), &[mk_fvar(x), mk_fvar(y)]);
        let abs = body.abstract_fvars(&[x, y]);
        assert_eq!(abs, mk_app_n(c("f"), &[mk_bvar(1), mk_bvar(0)]));
        assert_eq!(abs.instantiate_rev(&[mk_fvar(x), mk_fvar(y)]), body);
        assert!(!abs.has_fvar());
        assert_eq!(abs.metadata().loose_bvar_range, 2);
    }

    #[test]
    fn beta_partial() {
        let lam = mk_lambda(
            Name::intern("x"),
            BinderInfo::Default,
            c("Nat"),
            mk_lambda(
                Name::intern("y"),
                BinderInfo::Default,
                c("Nat"),
                mk_app_n(c("f"), &[mk_bvar(1), mk_bvar(0)]),
            ),
        );
        let r = lam.beta(&[c("a"), c("b"), c("d")]);
        assert_eq!(r, mk_app_n(c("f"), &[c("a"), c("b"), c("d")]));
        let r = lam.beta(&[c("a")]);
        assert!(r.is_lambda());
        assert_eq!(r.beta(&[c("b")]), mk_app_n(c("f"), &[c("a"), c("b")]));
    }

    #[test]
    fn equality_ignores_binder_names() {
        let a = mk_lambda(Name::intern("x"), BinderInfo::Default, c("Nat"), mk_bvar(0));
        let b = mk_lambda(Name::intern("y"), BinderInfo::Default, c("Nat"), mk_bvar(0));
        assert_eq!(a, b);
        assert_ne!(a, mk_lambda(Name::intern("x"), BinderInfo::Default, c("Bool"), mk_bvar(0)));
    }

    #[test]
    fn arrow_is_non_dependent() {
        let t = mk_arrow(c("Nat"), c("Bool"));
        assert!(t.is_arrow());
        assert_eq!(t.to_string(), "Nat → Bool");
        let dep = mk_forall(Name::intern("n"), BinderInfo::Default, c("Nat"), mk_app(c("P"), mk_bvar(0)));
        assert!(!dep.is_arrow());
        assert_eq!(dep.to_string(), "∀ (n : Nat), P n");
    }

    #[test]
    fn level_simplification() {
        let u = Level::param(Name::intern("u"));
        assert_eq!(Level::mk_max(Level::zero(), u.clone()), u);
        assert_eq!(Level::mk_imax(u.clone(), Level::zero()), Level::zero());
        assert_eq!(Level::mk_imax(u.clone(), Level::one()), Level::mk_max(u, Level::one()));
        assert_eq!(Level::succ(Level::one()).to_nat(), Some(2));
    }
}
