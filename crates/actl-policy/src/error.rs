// error.rs — Error types for the policy subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, merging, or exporting policies.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy document is not well-formed YAML, or does not match the schema.
    #[error("failed to parse policy document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A policy mode string other than "allow" or "deny".
    #[error("invalid policy mode '{value}', must be 'allow' or 'deny'")]
    InvalidMode { value: String },

    /// Reading or writing a policy file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The policy could not be rendered back to YAML.
    #[error("failed to serialize policy: {0}")]
    Serialize(serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
