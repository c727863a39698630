//! The closed AST representation the propagation visitor walks (§10.6).
//!
//! Stands in for the host's parsed AST: a sum-type-per-kind enum, not an
//! open visitor-class hierarchy (Design Notes §9). Every syntactic position
//! named in §4.3 has a variant; anything else falls through to `Other`,
//! which the visitor always treats as [`crate::triple::Triple::inapplicable`].

/// Binary operators, grouped the way §4.3's "binary op" rule needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `.`/string concatenation and any comparison involving interpolation:
    /// preserves all categories present in either operand.
    Concat,
    /// `+` when statically known to operate on arrays: routed to `array_plus`.
    ArrayPlus,
    /// Pure numeric arithmetic (`+ - * / % ** `on numbers): kills taint.
    Arithmetic,
    /// Bitwise/logical/comparison ops that coerce to bool/int: kills taint.
    Coercing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Bitwise-NOT and the error-silencing `@` operator: preserve taint.
    Preserving,
    /// Boolean negation, numeric unary `+`/`-`: kill taint.
    Coercing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// Cast to string/array/object: preserves taint but collapses shape.
    Preserving,
    /// Cast to int/bool/float etc: kills taint.
    Coercing,
}

/// One arm of a `match` expression.
#[derive(Debug, Clone)]
pub struct MatchArm {
    pub body: Expr,
    /// `true` if this arm unconditionally diverges (`throw`, `exit`) and so
    /// is excluded from the merge (§4.3 "Match expression").
    pub diverges: bool,
}

/// One element of an array literal.
#[derive(Debug, Clone)]
pub struct ArrayItem {
    /// `None` means an implicit, auto-incrementing numeric key.
    pub key: Option<Expr>,
    pub value: Expr,
    pub by_ref: bool,
}

/// One argument at a call site.
#[derive(Debug, Clone)]
pub struct Argument {
    pub value: Expr,
    /// Spread (`...$args`) is treated as feeding the variadic slot.
    pub spread: bool,
}

/// A callee: statically named, or resolved dynamically (variable holding a
/// callable, `$obj->{$name}()`, etc).
#[derive(Debug, Clone)]
pub enum Callee {
    Named(String),
    Dynamic(Box<Expr>),
}

/// The security-sensitive operations the sink protocol (§4.4) runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Echo,
    ShellExec,
    EvalOrInclude,
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntLit(i64),
    StrLit(String),
    BoolLit(bool),
    NullLit,
    /// `Foo::BAR`, `Foo::class`, magic constants (`__LINE__`, …): safe.
    ClassConstant,
    /// `isset($x)`, `empty($x)`, `instanceof`: safe regardless of operand.
    BooleanProbe(Box<Expr>),

    Variable {
        name: String,
        line: u32,
    },
    Subscript {
        base: Box<Expr>,
        /// `None` models a non-scalar or unresolvable key.
        key: Option<Box<Expr>>,
        line: u32,
    },
    Property {
        object: Box<Expr>,
        name: String,
        /// The static type of `object` could be more than one class, or
        /// `stdClass`-like — OR the object's own taint into the result.
        dynamic_object: bool,
        line: u32,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: u32,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        line: u32,
    },
    Cast {
        kind: CastKind,
        operand: Box<Expr>,
        line: u32,
    },
    IncDec {
        operand: Box<Expr>,
        line: u32,
    },
    Conditional {
        cond: Box<Expr>,
        /// `None` models the elvis operator `a ?: c`, where `a` itself is
        /// also the "then" value.
        then_branch: Option<Box<Expr>>,
        else_branch: Box<Expr>,
        line: u32,
    },
    Match {
        arms: Vec<MatchArm>,
        line: u32,
    },
    ArrayLiteral {
        items: Vec<ArrayItem>,
        line: u32,
    },
    Interpolation {
        parts: Vec<Expr>,
        line: u32,
    },
    Clone {
        operand: Box<Expr>,
        line: u32,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        /// `Some(op)` for augmented assignment (`+=`, `.=`, …); `None` for plain `=`.
        augmented_op: Option<BinaryOp>,
        line: u32,
    },
    Sink {
        kind: SinkKind,
        arg: Option<Box<Expr>>,
        line: u32,
    },
    Call {
        callee: Callee,
        args: Vec<Argument>,
        line: u32,
    },
    New {
        class: Option<Box<Expr>>,
        args: Vec<Argument>,
        /// Candidate `__toString` methods on the constructed class (union of
        /// possible dynamic types), per §4.3 "New".
        to_string_methods: Vec<String>,
        line: u32,
    },
    /// Anything else: declarations, type expressions, parameter lists.
    Other,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Return {
        value: Option<Expr>,
        line: u32,
    },
    Global {
        names: Vec<String>,
        line: u32,
    },
    Static {
        name: String,
        init: Option<Expr>,
        line: u32,
    },
    /// A closure/function/method declaration nested in the current scope.
    FunctionDecl {
        name: String,
        body: Vec<Stmt>,
    },
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_block: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        body: Vec<Stmt>,
    },
    Switch {
        subject: Expr,
        cases: Vec<Vec<Stmt>>,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<Vec<Stmt>>,
        finally: Vec<Stmt>,
    },
    Throw(Expr),
    /// Declarations, type hints, parameter lists considered on their own.
    Other,
}
