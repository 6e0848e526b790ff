//! Error types for Stevedore
//!
//! Uses `thiserror` for library errors; the binary wraps these with `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Stevedore operations
pub type StevedoreResult<T> = Result<T, StevedoreError>;

/// Main error type for Stevedore operations
///
/// Every directive error is fatal: synthesis either produces a complete,
/// well-formed artifact or fails before anything is written.
#[derive(Error, Debug)]
pub enum StevedoreError {
    /// Directive name not recognized by the aggregator
    #[error("unsupported directive '{name}'")]
    UnsupportedDirective { name: String },

    /// Recognized directive invoked with an argument shape it cannot interpret
    #[error("malformed '{directive}' directive: {message}")]
    MalformedDirective { directive: String, message: String },

    /// A directive referenced external content that cannot be resolved
    #[error("cannot resolve referenced file {path}: {source}")]
    UnresolvedReference {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Finalize invoked with no accumulated command lines
    #[error("no directive produced any command lines - refusing to emit an empty RUN block")]
    EmptyFinalization,

    /// Document root is not a YAML mapping
    #[error("document root in {path} is not a mapping")]
    NotAMapping { path: PathBuf },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl StevedoreError {
    /// Helper for shape errors raised while dispatching document tags
    pub fn malformed(directive: impl Into<String>, message: impl Into<String>) -> Self {
        StevedoreError::MalformedDirective {
            directive: directive.into(),
            message: message.into(),
        }
    }
}
