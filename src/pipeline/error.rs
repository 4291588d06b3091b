//! Selector error types.

use thiserror::Error;

/// Errors raised by rule-set construction and pipeline selection.
///
/// None of these are retryable: they describe a configuration or input
/// defect and are surfaced to the build driver as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// No rule matched and passthrough is disabled.
    #[error("no asset rule matches `{path}` and passthrough is disabled")]
    UnresolvedAsset { path: String },

    /// A mode string outside `development` / `production`.
    #[error("invalid build mode `{0}` (expected `development` or `production`)")]
    InvalidMode(String),

    /// A rule whose pattern, pipeline or output template cannot be used.
    #[error("malformed rule `{rule}`: {reason}")]
    MalformedRule { rule: String, reason: String },
}

impl PipelineError {
    pub fn malformed(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    pub fn unresolved(path: &std::path::Path) -> Self {
        Self::UnresolvedAsset {
            path: path.display().to_string(),
        }
    }
}
