/// Crate-wide error taxonomy for the warchest HUD service.
///
/// Kinds mirror the propagation policy in SPEC_FULL.md §7: everything except the
/// startup preconditions in `service::run` is recovered locally and surfaced as a
/// log line plus, where relevant, a HUD alert. `Fatal` is the only kind that
/// should ever reach `main` and flip the process exit code.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarchestError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl WarchestError {
    /// Machine-readable code, mirroring the `ETIMEDOUT` convention called out in §7.
    pub fn code(&self) -> &'static str {
        match self {
            WarchestError::InvalidArgument(_) => "EINVAL",
            WarchestError::NotFound(_) => "ENOTFOUND",
            WarchestError::Conflict(_) => "ECONFLICT",
            WarchestError::Unavailable(_) => "EUNAVAILABLE",
            WarchestError::Timeout(_) => "ETIMEDOUT",
            WarchestError::Integrity(_) => "EINTEGRITY",
            WarchestError::Fatal(_) => "EFATAL",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, WarchestError::Fatal(_))
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        WarchestError::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        WarchestError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        WarchestError::Conflict(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        WarchestError::Unavailable(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        WarchestError::Integrity(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        WarchestError::Fatal(msg.into())
    }
}


pub type WarchestResult<T> = Result<T, WarchestError>;
