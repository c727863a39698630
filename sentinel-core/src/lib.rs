//! # sentinel-core
//!
//! Foundation crate for the taint analyzer.
//! Defines error types, identifier interning, hash-map aliases and tracing
//! setup shared by every other crate in the workspace.

pub mod errors;
pub mod tracing_setup;
pub mod types;

pub use errors::error_code::ErrorCode;
pub use errors::AnalysisError;
pub use types::collections::{FxHashMap, FxHashSet};
pub use types::identifiers::{FunctionId, SymbolId};
