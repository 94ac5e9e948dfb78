//! Error types for rawflow pipelines.
//!
//! Definition problems are always reported at assembly time. Everything that
//! goes wrong while loading or caching a stage surfaces as one of the
//! [`RawflowError`] variants; nothing is swallowed internally.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = RawflowError> = std::result::Result<T, E>;

/// The main error type for rawflow operations.
#[derive(Debug, Error)]
pub enum RawflowError {
    /// The pipeline definition is malformed.
    #[error("{0}")]
    Definition(#[from] DefinitionError),

    /// A required upstream file does not exist.
    #[error("{0}")]
    MissingInputFile(#[from] MissingInputFile),

    /// A persisted decomposition no longer matches the data it should correct.
    #[error("{0}")]
    StaleArtifact(#[from] StaleArtifact),

    /// A parameter value or combination is not acceptable.
    #[error("{0}")]
    InvalidParameter(#[from] InvalidParameter),

    /// The operator aborted an interactive decision.
    #[error("Aborted: {0}")]
    Aborted(String),

    /// An internal invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The external signal processor failed.
    #[error("Signal processing failed: {0:#}")]
    Processor(#[from] anyhow::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Diagnostic metadata attached to definition errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "DEFINITION-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline definition cannot be assembled.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DefinitionError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional diagnostic info.
    pub error_info: Option<ErrorInfo>,
}

impl DefinitionError {
    /// Creates a new definition error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Shorthand for an error with a code and a single stage.
    #[must_use]
    pub fn coded(code: &str, stage: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(message.clone())
            .with_stages(vec![stage.into()])
            .with_error_info(ErrorInfo::new(code, message))
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when the parent links of a pipeline form a cycle.
#[derive(Debug, Clone, Error)]
#[error("Circular dependency in preprocessing pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle, first stage repeated at the end.
    pub cycle_path: Vec<String>,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ErrorInfo::new(
            "DEFINITION-CYCLE",
            format!("Unable to resolve source for {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Every chain of 'source' references has to end at 'raw'.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl From<CycleDetectedError> for DefinitionError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            stages: err.cycle_path.clone(),
            error_info: Some(err.error_info),
        }
    }
}

impl From<CycleDetectedError> for RawflowError {
    fn from(err: CycleDetectedError) -> Self {
        Self::Definition(err.into())
    }
}

/// Error raised when a file needed by an operation is absent.
#[derive(Debug, Clone, Error)]
#[error("{message} (expected at {})", path.display())]
pub struct MissingInputFile {
    /// The missing path.
    pub path: PathBuf,
    /// What the file is and how to create it.
    pub message: String,
}

impl MissingInputFile {
    /// Creates a new missing-input error.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a decomposition was fitted on a different channel set.
#[derive(Debug, Clone, Error)]
#[error(
    "Raw {stage}, ICA for {subject} outdated due to change in bad channels. \
     Reset bad channels or re-run make_ica()."
)]
pub struct StaleArtifact {
    /// The decomposition stage.
    pub stage: String,
    /// The subject.
    pub subject: String,
    /// Channels the decomposition was fitted on.
    pub fitted: Vec<String>,
    /// Channels currently available for correction.
    pub current: Vec<String>,
}

/// Error raised for a malformed parameter.
#[derive(Debug, Clone, Error)]
#[error("Invalid {parameter}: {message}")]
pub struct InvalidParameter {
    /// The parameter name.
    pub parameter: String,
    /// What is wrong with it.
    pub message: String,
}

impl InvalidParameter {
    /// Creates a new invalid-parameter error.
    #[must_use]
    pub fn new(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_creation() {
        let info = ErrorInfo::new("DEFINITION-CYCLE", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "DEFINITION-CYCLE");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert!(err.to_string().contains("a -> b -> a"));

        let def: DefinitionError = err.into();
        assert_eq!(def.code(), Some("DEFINITION-CYCLE"));
        assert_eq!(def.stages.len(), 3);
    }

    #[test]
    fn test_coded_definition_error() {
        let err = DefinitionError::coded("DEFINITION-UNKNOWN-TYPE", "x", "Raw 'x': unknown type 'foo'");
        assert_eq!(err.code(), Some("DEFINITION-UNKNOWN-TYPE"));
        assert_eq!(err.stages, vec!["x".to_string()]);
    }

    #[test]
    fn test_missing_input_message_contains_path() {
        let err = MissingInputFile::new("/data/a-raw.fif", "Raw input file for a/b does not exist");
        let text = RawflowError::from(err).to_string();
        assert!(text.contains("/data/a-raw.fif"));
    }

    #[test]
    fn test_stale_artifact_message() {
        let err = StaleArtifact {
            stage: "ica".into(),
            subject: "R0001".into(),
            fitted: vec!["C1".into()],
            current: vec![],
        };
        assert!(err.to_string().contains("re-run make_ica()"));
    }
}
