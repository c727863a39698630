//! # sentinel-taint
//!
//! The analyzer core: the taint lattice (C1/C2), the method-parameter link
//! graph (C3) and cause-trail (C4), per-function contracts (C5), the
//! symbol side-table (C6), the propagation visitor (C7), the assignment
//! (C8) and call (C9) handlers, and loop/branch widening (C10).
//!
//! Everything here operates over the closed [`ast::Expr`]/[`ast::Stmt`]
//! representation; a host embeds this crate by translating its own AST into
//! that shape and driving [`Analyzer::analyze_function`]/
//! [`Analyzer::analyze_program`].

pub mod analyzer;
pub mod assign;
pub mod ast;
pub mod builtins;
pub mod calls;
pub mod config;
pub mod contracts;
pub mod diagnostics;
pub mod docblock;
pub mod flags;
pub mod lattice;
pub mod loops;
pub mod superglobals;
pub mod symbols;
pub mod triple;
pub mod visitor;

pub use analyzer::Analyzer;
pub use ast::{Argument, ArrayItem, BinaryOp, Callee, CastKind, Expr, MatchArm, SinkKind, Stmt, UnaryOp};
pub use builtins::BuiltinSignature;
pub use config::{Configuration, CustomSlot};
pub use contracts::{FunctionContract, PreservedTaintedness};
pub use diagnostics::{Diagnostic, SinkFinding};
pub use docblock::{parse_param_taint, parse_return_taint, ParsedAnnotation};
pub use flags::{Category, FlagSet};
pub use lattice::{CausedByLines, Key, MethodLinks, Taintedness};
pub use symbols::{FunctionDef, ParamDef, Scope, SymbolTable};
pub use triple::Triple;
