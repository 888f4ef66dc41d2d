//! # actl-github
//!
//! Where observed action usage comes from.
//!
//! The [`ContentProvider`] trait is the seam between the policy engine and
//! the source-hosting service. It exposes three primitives (list an
//! organization's repositories, list a directory, read a file) and builds the
//! two things the engine needs on top of them:
//!
//! - [`ContentProvider::workflow_actions`]: every `uses:` reference in a
//!   repository's `.github/workflows/*.yml|yaml` files.
//! - [`ContentProvider::policy_override`]: the repository's own policy file,
//!   if it has one.
//!
//! Implementations:
//! - [`GitHubClient`]: the GitHub REST API over a blocking `reqwest` client.
//! - [`MemoryProvider`]: in-memory repositories and files.

pub mod client;
pub mod error;
pub mod memory;
pub mod provider;
pub mod repo;
pub mod workflow;

pub use client::{ClientConfig, GitHubClient, RetryPolicy, DEFAULT_API_URL};
pub use error::{Result, SourceError};
pub use memory::MemoryProvider;
pub use provider::{ContentProvider, DirEntry, EntryKind, WORKFLOWS_DIR};
pub use repo::{RepoName, Repository};
pub use workflow::extract_actions;
