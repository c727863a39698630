//! Stable machine-readable error codes, independent of the `Display` text.

/// Implemented by every error enum in the workspace so the host can branch
/// on a stable code instead of matching on formatted messages.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;
}
