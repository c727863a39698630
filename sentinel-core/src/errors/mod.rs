//! Setup-time failures the host must be told about before a pass starts.
//!
//! Per-node analysis failures (symbol resolution, absent contracts) are
//! *not* represented here — those downgrade to sentinel taint values inline
//! (see `sentinel_taint::lattice`) and never abort the host's pass. This
//! enum only covers configuration and annotation-syntax failures.

pub mod error_code;

use error_code::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("malformed docblock taint annotation: {message}")]
    MalformedAnnotation { message: String },

    #[error("custom taint category '{name}' is already registered as {existing}")]
    DuplicateCustomCategory { name: String, existing: &'static str },

    #[error("false-positive hook panicked while judging a sink finding: {message}")]
    HookPanicked { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl ErrorCode for AnalysisError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedAnnotation { .. } => "TAINT_MALFORMED_ANNOTATION",
            Self::DuplicateCustomCategory { .. } => "TAINT_DUPLICATE_CUSTOM_CATEGORY",
            Self::HookPanicked { .. } => "TAINT_HOOK_PANICKED",
            Self::Config { .. } => "TAINT_CONFIG_ERROR",
        }
    }
}
