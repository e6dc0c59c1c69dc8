use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    Typeof,
}

/// `=` or a compound assignment carrying its binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member { object: Box<Expr>, property: String, optional: bool },
    Index { object: Box<Expr>, index: Box<Expr>, optional: bool },
    Call { callee: Box<Expr>, args: Vec<Expr>, optional: bool },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Logical { op: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
    Assign { op: AssignOp, target: Box<Expr>, value: Box<Expr> },
    Update { increment: bool, prefix: bool, target: Box<Expr> },
    Arrow(Rc<FunctionDef>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub params: Vec<String>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForHead {
    /// `for (let x of items)`
    Of,
    /// `for (let key in object)`
    In,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Empty,
    Expr(Expr),
    Decl { kind: DeclKind, bindings: Vec<(String, Option<Expr>)> },
    Block(Vec<Stmt>),
    If { test: Expr, consequent: Box<Stmt>, alternate: Option<Box<Stmt>> },
    ForEach {
        head: ForHead,
        decl: Option<DeclKind>,
        binding: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    For { init: Option<Box<Stmt>>, test: Option<Expr>, update: Option<Expr>, body: Box<Stmt> },
    While { test: Expr, body: Box<Stmt> },
    Break,
    Continue,
    Return(Option<Expr>),
    Throw(Expr),
    /// Resolves free identifiers against `object` for the duration of `body`.
    With { object: Expr, strict: bool, body: Vec<Stmt> },
}

/// A parsed routine: formal parameters and a statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}
