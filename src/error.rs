//! Error types for contract resolution, schema loading and response validation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while fetching or parsing a schema or contract document.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot fetch {url}: built without the `remote` feature")]
    RemoteDisabled { url: String },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid contract document: {message}")]
    InvalidContract { message: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. }
            | LoadError::ReadError { .. }
            | LoadError::RemoteDisabled { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Everything an assertion evaluation can report besides a pass.
#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("Failed to find matching path for [{path}] in Swagger definition")]
    RouteNotFound { path: String },

    #[error("Failed to find {method} method for path [{path}] in Swagger definition")]
    OperationNotFound { method: String, path: String },

    #[error("Missing response for a {status} response from {method} {path} in Swagger definition")]
    ResponseSpecNotFound {
        status: String,
        method: String,
        path: String,
    },

    #[error("Failed to load definition from [{source_ref}]: {cause}")]
    SchemaLoad {
        source_ref: String,
        #[source]
        cause: LoadError,
    },

    /// The validation engine itself failed, as opposed to the instance
    /// not conforming.
    #[error("Compliance validation failed; [{message}]")]
    ValidationFailure { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Conformance { errors: Vec<ValidationError> },

    #[error("Compliance check failed; [{message}]")]
    Unexpected { message: String },
}

impl ComplianceError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ComplianceError::Conformance { .. } => 1,
            ComplianceError::SchemaLoad { cause, .. } => cause.exit_code(),
            _ => 2,
        }
    }

    /// True when the instance was checked and found non-conforming.
    pub fn is_conformance(&self) -> bool {
        matches!(self, ComplianceError::Conformance { .. })
    }

    /// Messages to surface to the host: every conformance finding, or a
    /// single descriptive message for anything else.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ComplianceError::Conformance { errors } => {
                errors.iter().map(|e| e.message.clone()).collect()
            }
            other => vec![other.to_string()],
        }
    }
}

/// Single non-conformance finding with path context.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationError {
    /// JSON Pointer (RFC 6901) to the offending value in the instance.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}
