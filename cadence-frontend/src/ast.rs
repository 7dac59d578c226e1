//! Abstract Syntax Tree for normalized dataflow programs.
//!
//! The tree is produced by an external front end after parsing, type
//! inference and clock inference: every variable declaration already carries
//! its concrete type and clock. Programs are exchanged as JSON.
use cadence_utils::{CadenceResult, Error, GetName, Id};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Concrete types of streams.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Bool,
    Int,
    Real,
    /// A user-defined enumerated type.
    Enum(Id),
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Real => write!(f, "real"),
            Type::Enum(name) => write!(f, "{name}"),
        }
    }
}

/// A floating point literal. Equality and hashing are bitwise so that
/// literals can be compared structurally.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Real(pub f64);

impl PartialEq for Real {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Real {}

impl Hash for Real {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state)
    }
}

/// Literal values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Const {
    Bool(bool),
    Int(i64),
    Real(Real),
    /// Constructor `tag` of the enumerated type `ty`.
    Enum { ty: Id, tag: Id },
}

impl Const {
    pub fn ty(&self) -> Type {
        match self {
            Const::Bool(_) => Type::Bool,
            Const::Int(_) => Type::Int,
            Const::Real(_) => Type::Real,
            Const::Enum { ty, .. } => Type::Enum(*ty),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Const::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for Const {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Const::Bool(b) => write!(f, "{b}"),
            Const::Int(n) => write!(f, "{n}"),
            Const::Real(r) => write!(f, "{:?}", r.0),
            Const::Enum { tag, .. } => write!(f, "{tag}"),
        }
    }
}

/// Clocks: the activation condition of a stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clock {
    /// The base clock of the node: active at every step.
    #[default]
    Base,
    /// Active when `parent` is active and `var` is equal to `polarity`.
    On {
        parent: Box<Clock>,
        var: Id,
        polarity: bool,
    },
}

impl Clock {
    pub fn on(parent: Clock, var: Id, polarity: bool) -> Self {
        Clock::On {
            parent: Box::new(parent),
            var,
            polarity,
        }
    }

    /// The sampling conditions of this clock, outermost first.
    pub fn conditions(&self) -> Vec<(Id, bool)> {
        let mut conds = Vec::new();
        let mut ck = self;
        while let Clock::On {
            parent,
            var,
            polarity,
        } = ck
        {
            conds.push((*var, *polarity));
            ck = parent;
        }
        conds.reverse();
        conds
    }

    /// Variables this clock samples on.
    pub fn vars(&self) -> Vec<Id> {
        self.conditions().into_iter().map(|(v, _)| v).collect()
    }

    /// Rename the sampling variables according to `map`.
    pub fn renamed(&self, map: &HashMap<Id, Id>) -> Clock {
        match self {
            Clock::Base => Clock::Base,
            Clock::On {
                parent,
                var,
                polarity,
            } => Clock::on(
                parent.renamed(map),
                map.get(var).copied().unwrap_or(*var),
                *polarity,
            ),
        }
    }
}

impl std::fmt::Display for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "base")?;
        for (var, polarity) in self.conditions() {
            if polarity {
                write!(f, " on {var}")?;
            } else {
                write!(f, " on not {var}")?;
            }
        }
        Ok(())
    }
}

/// A typed and clocked variable declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: Id,
    pub ty: Type,
    #[serde(default)]
    pub clock: Clock,
}

impl VarDecl {
    /// A variable on the base clock.
    pub fn new<S: Into<Id>>(name: S, ty: Type) -> Self {
        VarDecl {
            name: name.into(),
            ty,
            clock: Clock::Base,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

impl GetName for VarDecl {
    fn name(&self) -> Id {
        self.name
    }
}

/// The role a variable plays in its node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Input,
    Output,
    Local,
    Memory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnOp {
    Neg,
    Not,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "not "),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "mod",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// Basic expressions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Const(Const),
    /// A node variable or a global constant.
    Var(Id),
    Unop {
        op: UnOp,
        arg: Box<Expr>,
    },
    Binop {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Sample `expr` on the instants where `var` equals `polarity`.
    When {
        expr: Box<Expr>,
        var: Id,
        polarity: bool,
    },
    /// Previous value of a stream. Normalization turns these into memories.
    Pre(Box<Expr>),
    /// Initialization operator. Normalization turns these into memories.
    Arrow { first: Box<Expr>, then: Box<Expr> },
    /// Node application nested in an expression. Normalization turns these
    /// into call equations.
    App { node: Id, args: Vec<Expr> },
}

impl Expr {
    pub fn var<S: Into<Id>>(name: S) -> Self {
        Expr::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        Expr::Const(Const::Int(n))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Const(Const::Bool(b))
    }

    pub fn real(r: f64) -> Self {
        Expr::Const(Const::Real(Real(r)))
    }

    pub fn unop(op: UnOp, arg: Expr) -> Self {
        Expr::Unop {
            op,
            arg: Box::new(arg),
        }
    }

    pub fn binop(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binop {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn when<S: Into<Id>>(expr: Expr, var: S, polarity: bool) -> Self {
        Expr::When {
            expr: Box::new(expr),
            var: var.into(),
            polarity,
        }
    }

    /// Names read at the current instant. Names under `pre` refer to the
    /// previous instant and are not reported.
    pub fn reads(&self, out: &mut Vec<Id>) {
        match self {
            Expr::Const(_) => (),
            Expr::Var(v) => out.push(*v),
            Expr::Unop { arg, .. } => arg.reads(out),
            Expr::Binop { lhs, rhs, .. } => {
                lhs.reads(out);
                rhs.reads(out);
            }
            Expr::When { expr, var, .. } => {
                expr.reads(out);
                out.push(*var);
            }
            Expr::Pre(_) => (),
            Expr::Arrow { first, then } => {
                first.reads(out);
                then.reads(out);
            }
            Expr::App { args, .. } => args.iter().for_each(|a| a.reads(out)),
        }
    }

    /// Replace reads of `from` with reads of `to`.
    pub fn rename(&mut self, from: Id, to: Id) {
        match self {
            Expr::Const(_) => (),
            Expr::Var(v) => {
                if *v == from {
                    *v = to
                }
            }
            Expr::Unop { arg, .. } => arg.rename(from, to),
            Expr::Binop { lhs, rhs, .. } => {
                lhs.rename(from, to);
                rhs.rename(from, to);
            }
            Expr::When { expr, var, .. } => {
                expr.rename(from, to);
                if *var == from {
                    *var = to
                }
            }
            Expr::Pre(e) => e.rename(from, to),
            Expr::Arrow { first, then } => {
                first.rename(from, to);
                then.rename(from, to);
            }
            Expr::App { args, .. } => {
                args.iter_mut().for_each(|a| a.rename(from, to))
            }
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Var(v) => write!(f, "{v}"),
            Expr::Unop { op, arg } => write!(f, "({op}{arg})"),
            Expr::Binop { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::When {
                expr,
                var,
                polarity,
            } => {
                if *polarity {
                    write!(f, "({expr} when {var})")
                } else {
                    write!(f, "({expr} when not {var})")
                }
            }
            Expr::Pre(e) => write!(f, "(pre {e})"),
            Expr::Arrow { first, then } => write!(f, "({first} -> {then})"),
            Expr::App { node, args } => {
                write!(f, "{node}({})", args.iter().join(", "))
            }
        }
    }
}

/// Control expressions: the right-hand side of a definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CExpr {
    /// Combine two complementary streams sampled on `var`.
    Merge {
        var: Id,
        on_true: Box<CExpr>,
        on_false: Box<CExpr>,
    },
    If {
        cond: Expr,
        then: Box<CExpr>,
        els: Box<CExpr>,
    },
    Exp(Expr),
}

impl CExpr {
    pub fn merge<S: Into<Id>>(var: S, on_true: CExpr, on_false: CExpr) -> Self {
        CExpr::Merge {
            var: var.into(),
            on_true: Box::new(on_true),
            on_false: Box::new(on_false),
        }
    }

    pub fn ite(cond: Expr, then: CExpr, els: CExpr) -> Self {
        CExpr::If {
            cond,
            then: Box::new(then),
            els: Box::new(els),
        }
    }

    pub fn reads(&self, out: &mut Vec<Id>) {
        match self {
            CExpr::Merge {
                var,
                on_true,
                on_false,
            } => {
                out.push(*var);
                on_true.reads(out);
                on_false.reads(out);
            }
            CExpr::If { cond, then, els } => {
                cond.reads(out);
                then.reads(out);
                els.reads(out);
            }
            CExpr::Exp(e) => e.reads(out),
        }
    }

    pub fn rename(&mut self, from: Id, to: Id) {
        match self {
            CExpr::Merge {
                var,
                on_true,
                on_false,
            } => {
                if *var == from {
                    *var = to;
                }
                on_true.rename(from, to);
                on_false.rename(from, to);
            }
            CExpr::If { cond, then, els } => {
                cond.rename(from, to);
                then.rename(from, to);
                els.rename(from, to);
            }
            CExpr::Exp(e) => e.rename(from, to),
        }
    }
}

impl From<Expr> for CExpr {
    fn from(e: Expr) -> Self {
        CExpr::Exp(e)
    }
}

impl std::fmt::Display for CExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CExpr::Merge {
                var,
                on_true,
                on_false,
            } => write!(
                f,
                "merge {var} (true -> {on_true}) (false -> {on_false})"
            ),
            CExpr::If { cond, then, els } => {
                write!(f, "if {cond} then {then} else {els}")
            }
            CExpr::Exp(e) => write!(f, "{e}"),
        }
    }
}

/// Normalized equations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Equation {
    /// `lhs = rhs`, on the clock of `lhs`.
    Def { lhs: Id, rhs: CExpr },
    /// `lhs = init fby rhs`: `lhs` is a memory. A missing `init` stands for
    /// the default value of the memory's type.
    Fby {
        lhs: Id,
        #[serde(default)]
        init: Option<Const>,
        rhs: Expr,
    },
    /// `(lhs, ...) = node(args) every reset`, activated on `clock`.
    Call {
        lhs: Vec<Id>,
        node: Id,
        args: Vec<Expr>,
        #[serde(default)]
        clock: Clock,
        #[serde(default)]
        reset: Option<Id>,
    },
}

impl Equation {
    pub fn def<S: Into<Id>, E: Into<CExpr>>(lhs: S, rhs: E) -> Self {
        Equation::Def {
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    pub fn fby<S: Into<Id>>(lhs: S, init: Option<Const>, rhs: Expr) -> Self {
        Equation::Fby {
            lhs: lhs.into(),
            init,
            rhs,
        }
    }

    pub fn call<S: Into<Id>>(lhs: Vec<Id>, node: S, args: Vec<Expr>) -> Self {
        Equation::Call {
            lhs,
            node: node.into(),
            args,
            clock: Clock::Base,
            reset: None,
        }
    }

    /// Variables defined by this equation.
    pub fn defs(&self) -> Vec<Id> {
        match self {
            Equation::Def { lhs, .. } | Equation::Fby { lhs, .. } => vec![*lhs],
            Equation::Call { lhs, .. } => lhs.clone(),
        }
    }

    /// Names read by the right-hand side, in order of occurrence.
    pub fn reads(&self) -> Vec<Id> {
        let mut out = Vec::new();
        match self {
            Equation::Def { rhs, .. } => rhs.reads(&mut out),
            Equation::Fby { rhs, .. } => rhs.reads(&mut out),
            Equation::Call {
                args, clock, reset, ..
            } => {
                out.extend(clock.vars());
                args.iter().for_each(|a| a.reads(&mut out));
                out.extend(reset.iter().copied());
            }
        }
        out
    }

    pub fn is_fby(&self) -> bool {
        matches!(self, Equation::Fby { .. })
    }

    /// Replace reads of `from` with reads of `to` in the right-hand side.
    pub fn rename_reads(&mut self, from: Id, to: Id) {
        match self {
            Equation::Def { rhs, .. } => rhs.rename(from, to),
            Equation::Fby { rhs, .. } => rhs.rename(from, to),
            Equation::Call {
                args, clock, reset, ..
            } => {
                args.iter_mut().for_each(|a| a.rename(from, to));
                *clock = clock.renamed(&HashMap::from([(from, to)]));
                if *reset == Some(from) {
                    *reset = Some(to);
                }
            }
        }
    }
}

impl std::fmt::Display for Equation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Equation::Def { lhs, rhs } => write!(f, "{lhs} = {rhs}"),
            Equation::Fby {
                lhs,
                init: Some(init),
                rhs,
            } => write!(f, "{lhs} = {init} fby {rhs}"),
            Equation::Fby {
                lhs,
                init: None,
                rhs,
            } => write!(f, "{lhs} = pre {rhs}"),
            Equation::Call {
                lhs, node, args, ..
            } => write!(
                f,
                "({}) = {node}({})",
                lhs.iter().join(", "),
                args.iter().join(", ")
            ),
        }
    }
}

/// Externally visible interface of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSignature {
    pub name: Id,
    pub inputs: Vec<VarDecl>,
    pub outputs: Vec<VarDecl>,
}

impl GetName for NodeSignature {
    fn name(&self) -> Id {
        self.name
    }
}

impl std::fmt::Display for NodeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let vars = |vs: &[VarDecl]| {
            vs.iter()
                .map(|v| format!("{}: {} :: {}", v.name, v.ty, v.clock))
                .join("; ")
        };
        write!(
            f,
            "node {}({}) returns ({})",
            self.name,
            vars(&self.inputs),
            vars(&self.outputs)
        )
    }
}

/// A node definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: Id,
    pub inputs: Vec<VarDecl>,
    pub outputs: Vec<VarDecl>,
    #[serde(default)]
    pub locals: Vec<VarDecl>,
    /// State variables, each defined by exactly one `fby` equation.
    #[serde(default)]
    pub memories: Vec<VarDecl>,
    pub equations: Vec<Equation>,
    #[serde(default)]
    pub asserts: Vec<Expr>,
}

impl GetName for Node {
    fn name(&self) -> Id {
        self.name
    }
}

impl Node {
    pub fn new<S: Into<Id>>(name: S) -> Self {
        Node {
            name: name.into(),
            inputs: vec![],
            outputs: vec![],
            locals: vec![],
            memories: vec![],
            equations: vec![],
            asserts: vec![],
        }
    }

    /// All declared variables with their roles, in declaration order:
    /// inputs, outputs, locals, then memories.
    pub fn vars(&self) -> impl Iterator<Item = (&VarDecl, Role)> {
        self.inputs
            .iter()
            .map(|v| (v, Role::Input))
            .chain(self.outputs.iter().map(|v| (v, Role::Output)))
            .chain(self.locals.iter().map(|v| (v, Role::Local)))
            .chain(self.memories.iter().map(|v| (v, Role::Memory)))
    }

    pub fn find_var(&self, name: Id) -> Option<(&VarDecl, Role)> {
        self.vars().find(|(v, _)| v.name == name)
    }

    pub fn role(&self, name: Id) -> Option<Role> {
        self.find_var(name).map(|(_, r)| r)
    }

    pub fn is_memory(&self, name: Id) -> bool {
        self.memories.iter().any(|m| m.name == name)
    }

    pub fn signature(&self) -> NodeSignature {
        NodeSignature {
            name: self.name,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }

    /// Check the definition invariants expected from the front end:
    /// * variable names are unique,
    /// * inputs are never defined,
    /// * outputs and locals are defined by exactly one non-`fby` equation,
    /// * memories are defined by exactly one `fby` equation.
    pub fn check_definitions(&self) -> CadenceResult<()> {
        let mut roles: HashMap<Id, Role> = HashMap::new();
        for (var, role) in self.vars() {
            if roles.insert(var.name, role).is_some() {
                return Err(Error::malformed(format!(
                    "variable `{}' is declared more than once in node `{}'",
                    var.name, self.name
                )));
            }
        }

        let mut defined: HashMap<Id, usize> = HashMap::new();
        for eq in &self.equations {
            for var in eq.defs() {
                let Some(role) = roles.get(&var) else {
                    return Err(Error::undefined(var, "variable"));
                };
                let ok = match role {
                    Role::Input => false,
                    Role::Memory => eq.is_fby(),
                    Role::Output | Role::Local => !eq.is_fby(),
                };
                if !ok {
                    return Err(Error::malformed(format!(
                        "{role:?} `{var}' of node `{}' cannot be defined \
                         by `{eq}'",
                        self.name
                    )));
                }
                *defined.entry(var).or_default() += 1;
            }
        }

        for (var, role) in self.vars() {
            if role == Role::Input {
                continue;
            }
            match defined.get(&var.name).copied().unwrap_or(0) {
                1 => (),
                0 => {
                    return Err(Error::malformed(format!(
                        "{role:?} `{}' of node `{}' is never defined",
                        var.name, self.name
                    )))
                }
                n => {
                    return Err(Error::malformed(format!(
                        "{role:?} `{}' of node `{}' is defined {n} times",
                        var.name, self.name
                    )))
                }
            }
        }
        Ok(())
    }
}

/// An enumerated type declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: Id,
    pub ctors: Vec<Id>,
}

/// A global constant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstDecl {
    pub name: Id,
    pub ty: Type,
    pub value: Const,
}

/// Top-level declarations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decl", rename_all = "snake_case")]
pub enum Decl {
    Node(Node),
    Type(TypeDecl),
    Const(ConstDecl),
    /// Import the exported declarations of a separately compiled module.
    Import { module: Id },
}

/// A compilation unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Module base name.
    pub name: Id,
    pub decls: Vec<Decl>,
}

impl Program {
    pub fn new<S: Into<Id>>(name: S) -> Self {
        Program {
            name: name.into(),
            decls: vec![],
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Node(n) => Some(n),
            _ => None,
        })
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Type(t) => Some(t),
            _ => None,
        })
    }

    pub fn consts(&self) -> impl Iterator<Item = &ConstDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Const(c) => Some(c),
            _ => None,
        })
    }

    pub fn imports(&self) -> impl Iterator<Item = Id> + '_ {
        self.decls.iter().filter_map(|d| match d {
            Decl::Import { module } => Some(*module),
            _ => None,
        })
    }

    /// Signatures of every node defined in this module.
    pub fn signatures(&self) -> Vec<NodeSignature> {
        self.nodes().map(Node::signature).collect()
    }
}
