use serde::{Deserialize, Serialize};

/// Why a tool invocation failed. Every failure crossing the tool boundary
/// carries one of these so callers can route on it without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Required credentials or settings are missing or invalid.
    Configuration,
    /// An upstream call failed. Trips the owning tool's breaker.
    Dependency,
    /// Malformed tool arguments. Surfaced to the caller, never retried.
    Validation,
    /// A referenced record or entity does not exist.
    NotFound,
    /// A caller-imposed deadline expired before the tool settled.
    Timeout,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Configuration => "configuration",
            FailureKind::Dependency => "dependency",
            FailureKind::Validation => "validation",
            FailureKind::NotFound => "not_found",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("fatal stage `{stage}` failed: {message}")]
    FatalStage { stage: String, message: String },
}
