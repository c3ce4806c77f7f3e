// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types shared by every backend

use std::time::Duration;
use thiserror::Error;

/// Result type alias for version-control operations
pub type VcResult<T> = std::result::Result<T, VcError>;

/// Errors that can occur while querying a version-control backend
#[derive(Debug, Error)]
pub enum VcError {
    /// The external binary could not be started at all
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {status:?}: {output}")]
    CommandFailed {
        program: String,
        status: Option<i32>,
        output: String,
    },

    #[error("{program} did not finish within {after:?}")]
    Timeout { program: String, after: Duration },

    /// The tool produced output whose shape we do not understand
    #[error("failed to parse {tool} output: {message}")]
    Parse { tool: &'static str, message: String },

    #[error("unexpected output: {0}")]
    UnexpectedOutput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid revision number: {0}")]
    InvalidRevision(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("file is locked: {0}")]
    LockConflict(String),

    #[error("no changes to check in: {0}")]
    UnchangedFile(String),

    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl VcError {
    pub fn parse(tool: &'static str, message: impl Into<String>) -> Self {
        VcError::Parse {
            tool,
            message: message.into(),
        }
    }

    /// Absence of a file or revision is an expected outcome for browsing
    /// callers, not a failure worth a stack of context.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VcError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = VcError::Unsupported {
            backend: "rcs",
            operation: "annotate",
        };
        assert_eq!(
            err.to_string(),
            "annotate is not supported by the rcs backend"
        );

        let err = VcError::parse("rlog", "missing date line");
        assert_eq!(
            err.to_string(),
            "failed to parse rlog output: missing date line"
        );
    }

    #[test]
    fn test_not_found_classification() {
        assert!(VcError::NotFound("foo.c".into()).is_not_found());
        assert!(!VcError::InvalidRevision("1.x".into()).is_not_found());
    }
}
