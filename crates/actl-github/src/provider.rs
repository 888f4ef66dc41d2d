//! Content provider trait and the operations built on it

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use actl_policy::{ObservedAction, REPO_POLICY_PATH};

use crate::error::Result;
use crate::repo::{RepoName, Repository};
use crate::workflow::{extract_actions, is_workflow_file};

/// Directory holding a repository's workflow definitions.
pub const WORKFLOWS_DIR: &str = ".github/workflows";

/// Kind of a directory entry, as reported by the contents API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EntryKind::File,
        }
    }
}

/// Source of repository listings and file contents
///
/// Implementations only supply the three primitives; workflow scanning and
/// override lookup are provided on top of them so every source behaves the
/// same way.
pub trait ContentProvider: Send + Sync {
    /// Every repository in `org`, across all pages.
    fn list_repositories(&self, org: &str) -> Result<Vec<Repository>>;

    /// Entries of `path` in `repo`, or `None` if the path does not exist.
    fn list_directory(&self, repo: &RepoName, path: &str) -> Result<Option<Vec<DirEntry>>>;

    /// Raw bytes of the file at `path`, or `None` if it does not exist.
    fn file_content(&self, repo: &RepoName, path: &str) -> Result<Option<Vec<u8>>>;

    /// Provider display name (for logs)
    fn name(&self) -> &str;

    /// All action references in `repo`'s workflow files, file by file in
    /// listing order.
    ///
    /// A repository without a workflows directory has no actions. A workflow
    /// file that cannot be fetched or parsed is skipped with a warning; the
    /// remaining files still count.
    fn workflow_actions(&self, repo: &RepoName) -> Result<Vec<ObservedAction>> {
        let Some(entries) = self.list_directory(repo, WORKFLOWS_DIR)? else {
            debug!(repo = %repo, "no workflows directory");
            return Ok(Vec::new());
        };

        let mut actions = Vec::new();
        for entry in entries {
            if entry.kind != EntryKind::File || !is_workflow_file(&entry.name) {
                continue;
            }
            let content = match self.file_content(repo, &entry.path) {
                Ok(Some(content)) => content,
                Ok(None) => {
                    warn!(repo = %repo, file = %entry.path, "workflow file disappeared, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(repo = %repo, file = %entry.path, error = %e, "failed to fetch workflow, skipping");
                    continue;
                }
            };
            match extract_actions(&content, &entry.name) {
                Ok(found) => {
                    debug!(repo = %repo, file = %entry.name, actions = found.len(), "parsed workflow");
                    actions.extend(found);
                }
                Err(e) => {
                    warn!(repo = %repo, error = %e, "skipping malformed workflow");
                }
            }
        }
        Ok(actions)
    }

    /// The repository's own policy file, if it has one.
    fn policy_override(&self, repo: &RepoName) -> Result<Option<Vec<u8>>> {
        self.file_content(repo, REPO_POLICY_PATH)
    }
}
