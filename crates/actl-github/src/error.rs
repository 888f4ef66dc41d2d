// error.rs — Error types for repository content providers.

use thiserror::Error;

/// Errors raised while fetching repository data.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A repository name that is not `owner/repo`.
    #[error("invalid repository '{value}': expected 'owner/repo'")]
    InvalidRepoName { value: String },

    /// The token contains characters that cannot go in an HTTP header.
    #[error("GitHub token is not a valid header value")]
    InvalidToken,

    /// The configured API base URL cannot be used to build endpoints.
    #[error("invalid API URL '{0}'")]
    InvalidUrl(String),

    /// The request never produced a usable response (connect, timeout, body).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("GitHub API returned {status} for {url}")]
    Http { status: u16, url: String },

    #[error("organization '{org}' not found")]
    OrganizationNotFound { org: String },

    /// File content arrived in a form we cannot decode.
    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    /// A workflow file is not valid YAML or does not match the workflow shape.
    #[error("failed to parse workflow {file}: {source}")]
    Workflow {
        file: String,
        source: serde_yaml::Error,
    },
}

pub type Result<T> = std::result::Result<T, SourceError>;
