//! Abstract representation of one generated program.
//!
//! The synthesizer builds this tree once; the reducer clones and rewrites
//! it. All cross references (types, callees) are by id or name, never by
//! pointer, so subtrees can be moved freely between clones.

use crate::{ty::TypeId, universe::TypeUniverse, HashMap};

pub type FuncId = usize;

/// Name of the class holding statics, the entry point and static methods.
pub const PRIMARY_CLASS: &str = "Program";
/// Name of the runtime object interface provided by the execution server.
pub const RUNTIME_INTERFACE: &str = "IRuntime";
/// Name of the static field holding the injected runtime object.
pub const RUNTIME_FIELD: &str = "s_rt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Plus,
    Neg,
    BitNot,
    Not,
}

impl UnOp {
    pub fn token(&self) -> &'static str {
        match self {
            UnOp::Plus => "+",
            UnOp::Neg => "-",
            UnOp::BitNot => "~",
            UnOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogAnd,
    LogOr,
}

impl BinOp {
    pub fn token(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::LogAnd => "&&",
            BinOp::LogOr => "||",
        }
    }

    #[inline]
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    #[inline]
    pub fn is_shift(&self) -> bool {
        matches!(self, BinOp::Shl | BinOp::Shr)
    }

    #[inline]
    pub fn is_div_rem(&self) -> bool {
        matches!(self, BinOp::Div | BinOp::Rem)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl AssignOp {
    pub fn token(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::And => "&=",
            AssignOp::Or => "|=",
            AssignOp::Xor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
        }
    }

    #[inline]
    pub fn is_div_rem(&self) -> bool {
        matches!(self, AssignOp::Div | AssignOp::Rem)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LitKind {
    Bool(bool),
    /// Integral payload; always within the kind's representable range.
    Int(i128),
    Float(f64),
    Char(u16),
    /// `default(T)`, used by the reducer's declaration lifting.
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lit {
    pub ty: TypeId,
    pub kind: LitKind,
}

/// Receiver of a call expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Receiver {
    /// Bare name; only valid inside the primary class.
    None,
    /// Qualified with the primary class name.
    PrimaryClass,
    /// Instance receiver expression.
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Box<str>,
    pub receiver: Receiver,
    /// By-ref arguments are wrapped in [`Expr::Ref`].
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Lit),
    /// A local variable or parameter.
    Var(Box<str>),
    /// A static field of the primary class.
    StaticRef(Box<str>),
    /// Receiver of the enclosing instance method.
    This,
    Field(Box<Expr>, Box<str>),
    Index(Box<Expr>, Vec<Expr>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Cast(TypeId, Box<Expr>),
    Call(CallExpr),
    /// Aggregate construction with one argument per field.
    New(TypeId, Vec<Expr>),
    /// Array creation with an explicit initializer.
    NewArray(TypeId, Vec<Expr>),
    IncDec {
        target: Box<Expr>,
        inc: bool,
        prefix: bool,
    },
    /// `ref lvalue`: by-ref argument, ref initializer, or ref return value.
    Ref(Box<Expr>),
    /// Instrumentation call recording (site id, value).
    Checksum {
        site: Box<str>,
        value: Box<Expr>,
    },
    /// What checksum calls become after runtime simplification.
    ConsoleWrite(Box<Expr>),
}

impl Expr {
    #[inline]
    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Lit(_))
    }

    /// Whether this tree contains any call expression.
    pub fn has_call(&self) -> bool {
        let mut found = false;
        self.for_each(&mut |e| {
            if matches!(e, Expr::Call(_)) {
                found = true;
            }
        });
        found
    }

    /// Preorder walk over this expression and all subexpressions.
    pub fn for_each(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Lit(_) | Expr::Var(_) | Expr::StaticRef(_) | Expr::This => {}
            Expr::Field(base, _) => base.for_each(f),
            Expr::Index(base, idxs) => {
                base.for_each(f);
                for i in idxs {
                    i.for_each(f);
                }
            }
            Expr::Unary(_, e) | Expr::Cast(_, e) | Expr::Ref(e) | Expr::ConsoleWrite(e) => {
                e.for_each(f)
            }
            Expr::Binary(_, l, r) => {
                l.for_each(f);
                r.for_each(f);
            }
            Expr::Call(call) => {
                if let Receiver::Expr(recv) = &call.receiver {
                    recv.for_each(f);
                }
                for a in &call.args {
                    a.for_each(f);
                }
            }
            Expr::New(_, args) | Expr::NewArray(_, args) => {
                for a in args {
                    a.for_each(f);
                }
            }
            Expr::IncDec { target, .. } => target.for_each(f),
            Expr::Checksum { value, .. } => value.for_each(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclStmt {
    pub name: Box<str>,
    /// May be a by-ref type, in which case `init` is an [`Expr::Ref`].
    pub ty: TypeId,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub lhs: Expr,
    pub op: AssignOp,
    /// An [`Expr::Ref`] here rebinds a ref l-value.
    pub rhs: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then: Vec<Stmt>,
    pub els: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Vec<Stmt>,
    pub finally: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopStmt {
    pub var: Box<str>,
    pub bound: u8,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block(Vec<Stmt>),
    Decl(DeclStmt),
    Assign(AssignStmt),
    /// Expression statement: a call, an increment/decrement, or a
    /// checksum/console-write site.
    Expr(Expr),
    If(IfStmt),
    Return(Option<Expr>),
    TryFinally(TryStmt),
    Loop(LoopStmt),
}

impl Stmt {
    /// Immediate child statement lists of this statement.
    pub fn child_blocks(&self) -> Vec<&Vec<Stmt>> {
        match self {
            Stmt::Block(stmts) => vec![stmts],
            Stmt::If(i) => {
                let mut v = vec![&i.then];
                if let Some(e) = &i.els {
                    v.push(e);
                }
                v
            }
            Stmt::TryFinally(t) => vec![&t.body, &t.finally],
            Stmt::Loop(l) => vec![&l.body],
            _ => Vec::new(),
        }
    }

    pub fn child_blocks_mut(&mut self) -> Vec<&mut Vec<Stmt>> {
        match self {
            Stmt::Block(stmts) => vec![stmts],
            Stmt::If(i) => {
                let mut v = vec![&mut i.then];
                if let Some(e) = &mut i.els {
                    v.push(e);
                }
                v
            }
            Stmt::TryFinally(t) => vec![&mut t.body, &mut t.finally],
            Stmt::Loop(l) => vec![&mut l.body],
            _ => Vec::new(),
        }
    }

    /// Number of statements in this subtree, this one included.
    pub fn descendants(&self) -> usize {
        1 + self
            .child_blocks()
            .into_iter()
            .flatten()
            .map(|s| s.descendants())
            .sum::<usize>()
    }
}

/// A named storage location together with its lifetime rank.
///
/// `ref_escape_scope` bounds where a by-ref taken of this variable may
/// escape: statics are `i32::MAX`, locals at scope depth d are `-d`,
/// ordinary parameters 0, by-ref parameters 1.
#[derive(Debug, Clone, PartialEq)]
pub struct VarIdent {
    pub name: Box<str>,
    pub ty: TypeId,
    pub ref_escape_scope: i32,
    pub read_only: bool,
}

impl VarIdent {
    pub fn new<T: Into<String>>(name: T, ty: TypeId, ref_escape_scope: i32) -> Self {
        Self {
            name: name.into().into_boxed_str(),
            ty,
            ref_escape_scope,
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticField {
    pub var: VarIdent,
    pub init: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FuncKind {
    /// Static method of the primary class.
    Static,
    /// Instance method of an aggregate; `iface` is set when the method
    /// implements an interface-declared signature.
    Instance { on: TypeId, iface: Option<TypeId> },
}

#[derive(Debug, Clone)]
pub struct Func {
    pub name: Box<str>,
    /// `None` is void; the id may point at a by-ref type.
    pub ret: Option<TypeId>,
    pub params: Vec<VarIdent>,
    pub body: Vec<Stmt>,
    pub kind: FuncKind,
    /// Transitive invocation counts: how many calls one invocation of this
    /// function performs, per reachable callee.
    pub call_counts: HashMap<FuncId, u64>,
    pub is_entry: bool,
}

impl Func {
    pub fn total_calls(&self) -> u64 {
        self.call_counts.values().sum()
    }

    pub fn descendants(&self) -> usize {
        self.body.iter().map(|s| s.descendants()).sum()
    }
}

/// A method signature declared on an interface; every implementer of the
/// interface carries a [`Func`] with a matching name and signature.
#[derive(Debug, Clone)]
pub struct InterfaceMethod {
    pub iface: TypeId,
    pub name: Box<str>,
    pub ret: Option<TypeId>,
    pub params: Vec<VarIdent>,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub universe: TypeUniverse,
    pub statics: Vec<StaticField>,
    pub funcs: Vec<Func>,
    pub interface_methods: Vec<InterfaceMethod>,
    pub seed: u64,
    /// Whether checksum instrumentation (and with it the runtime object
    /// static and the entry point parameter) is present.
    pub uses_runtime: bool,
}

impl Program {
    pub fn func(&self, name: &str) -> Option<&Func> {
        self.funcs.iter().find(|f| &*f.name == name)
    }

    pub fn func_mut(&mut self, name: &str) -> Option<&mut Func> {
        self.funcs.iter_mut().find(|f| &*f.name == name)
    }

    pub fn entry(&self) -> &Func {
        self.funcs.iter().find(|f| f.is_entry).unwrap()
    }

    pub fn static_field(&self, name: &str) -> Option<&StaticField> {
        self.statics.iter().find(|s| &*s.var.name == name)
    }

    /// Total statement count over all function bodies.
    pub fn stmt_count(&self) -> usize {
        self.funcs.iter().map(|f| f.descendants()).sum()
    }
}
