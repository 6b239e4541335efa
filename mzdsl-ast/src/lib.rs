#![forbid(unsafe_code)]

use miette::SourceSpan;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

/// Smallest span covering both `a` and `b`.
pub fn join(a: Span, b: Span) -> Span {
    let a0: usize = a.offset();
    let b0: usize = b.offset();
    let start = a0.min(b0);
    let end = (a0 + a.len()).max(b0 + b.len());
    span_between(start, end)
}

pub type Ident = Spanned<String>;

/// A parsed DSL source file.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Assign(AssignStmt),
    AnnAssign(AnnAssignStmt),
    AugAssign(AugAssignStmt),
    For(ForStmt),
    If(IfStmt),
    Assert(AssertStmt),
    Return(ReturnStmt),
    FunctionDef(FunctionDef),
    Objective(ObjectiveStmt),
    Pass(Span),
    ExprStmt(Expr),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Assign(s) => s.span,
            Stmt::AnnAssign(s) => s.span,
            Stmt::AugAssign(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::Assert(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::FunctionDef(s) => s.span,
            Stmt::Objective(s) => s.span,
            Stmt::Pass(span) => *span,
            Stmt::ExprStmt(e) => e.span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

/// `target = value`. The target is a name, a subscript, a field access, or a
/// tuple of names.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignStmt {
    pub span: Span,
    pub target: Expr,
    pub value: Expr,
}

/// `name : annotation [= value]`
#[derive(Clone, Debug, PartialEq)]
pub struct AnnAssignStmt {
    pub span: Span,
    pub target: Ident,
    pub annotation: Expr,
    pub value: Option<Expr>,
}

/// `target op= value`
#[derive(Clone, Debug, PartialEq)]
pub struct AugAssignStmt {
    pub span: Span,
    pub target: Expr,
    pub op: BinOp,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForStmt {
    pub span: Span,
    /// One name, or several for tuple unpacking (`for i, w in enumerate(W)`).
    pub targets: Vec<Ident>,
    pub iter: Expr,
    pub body: Block,
}

/// `elif` chains are represented as an `else` block holding a nested `If`.
#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub span: Span,
    pub cond: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssertStmt {
    pub span: Span,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub span: Span,
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub span: Span,
    pub name: Ident,
    pub params: Vec<Param>,
    pub ret: Option<Expr>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub span: Span,
    pub name: Ident,
    pub annotation: Option<Expr>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Minimize,
    Maximize,
}

/// `minimize(expr)` / `maximize(expr)`
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectiveStmt {
    pub span: Span,
    pub direction: Direction,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self { span, kind }
    }

    /// The identifier when this expression is a bare name.
    pub fn as_name(&self) -> Option<&Ident> {
        match &self.kind {
            ExprKind::Name(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Name(Ident),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    /// `{key: value, ...}`; keys are expected to be string literals.
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// `a < b <= c` keeps every operator; `rest` is never empty.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    /// `a and b and c`; `values` has at least two operands.
    BoolOp {
        op: BoolOp,
        values: Vec<Expr>,
    },
    /// `then if cond else otherwise`
    IfExp {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        callee: Ident,
        args: Vec<CallArg>,
    },
    Attribute {
        base: Box<Expr>,
        field: Ident,
    },
    /// `base[i]` or `base[i, j]`.
    Index {
        base: Box<Expr>,
        indices: Vec<Expr>,
    },
    /// `elt for x in iter if cond`, as a parenthesized generator or a list
    /// comprehension.
    Comprehension(Box<Comprehension>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComprehensionKind {
    Generator,
    List,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comprehension {
    pub kind: ComprehensionKind,
    pub elt: Expr,
    pub targets: Vec<Ident>,
    pub iter: Expr,
    pub filters: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CallArg {
    Positional(Expr),
    Named { name: Ident, value: Expr },
}

impl CallArg {
    pub fn value(&self) -> &Expr {
        match self {
            CallArg::Positional(e) => e,
            CallArg::Named { value, .. } => value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}
