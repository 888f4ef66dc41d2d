//! In-memory content provider
//!
//! Holds repositories and files in ordered maps. Directory listings are
//! derived from file paths, so adding `.github/workflows/ci.yml` makes both
//! `.github` and `.github/workflows` appear. Used by tests and for evaluating
//! policies against a fixed set of workflows without network access.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SourceError};
use crate::provider::{ContentProvider, DirEntry, EntryKind, WORKFLOWS_DIR};
use crate::repo::{RepoName, Repository};

#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    /// org → repository names
    orgs: BTreeMap<String, BTreeSet<String>>,
    /// (owner/repo, path) → content
    files: BTreeMap<(String, String), Vec<u8>>,
    /// Repositories whose every access fails.
    failing: BTreeSet<String>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty repository under `org`.
    pub fn with_repository(mut self, org: &str, name: &str) -> Self {
        self.orgs
            .entry(org.to_string())
            .or_default()
            .insert(name.to_string());
        self
    }

    /// Add a file to `full_name` (`owner/repo`), registering the repository.
    pub fn with_file(mut self, full_name: &str, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.register(full_name);
        self.files
            .insert((full_name.to_string(), path.to_string()), content.into());
        self
    }

    /// Add a workflow definition under `.github/workflows/`.
    pub fn with_workflow(self, full_name: &str, file_name: &str, content: &str) -> Self {
        let path = format!("{WORKFLOWS_DIR}/{file_name}");
        self.with_file(full_name, &path, content)
    }

    /// Make every request for `full_name` fail as a server error would.
    pub fn failing_repo(mut self, full_name: &str) -> Self {
        self.register(full_name);
        self.failing.insert(full_name.to_string());
        self
    }

    fn register(&mut self, full_name: &str) {
        if let Some((org, name)) = full_name.split_once('/') {
            self.orgs
                .entry(org.to_string())
                .or_default()
                .insert(name.to_string());
        }
    }

    fn check_available(&self, repo: &RepoName, path: &str) -> Result<String> {
        let full_name = repo.full_name();
        if self.failing.contains(&full_name) {
            return Err(SourceError::Http {
                status: 503,
                url: format!("memory://{full_name}/{path}"),
            });
        }
        Ok(full_name)
    }
}

impl ContentProvider for MemoryProvider {
    fn list_repositories(&self, org: &str) -> Result<Vec<Repository>> {
        let names = self
            .orgs
            .get(org)
            .ok_or_else(|| SourceError::OrganizationNotFound {
                org: org.to_string(),
            })?;
        Ok(names
            .iter()
            .map(|name| Repository::named(&format!("{org}/{name}")))
            .collect())
    }

    fn list_directory(&self, repo: &RepoName, path: &str) -> Result<Option<Vec<DirEntry>>> {
        let full_name = self.check_available(repo, path)?;
        let dir = path.trim_end_matches('/');
        let prefix = format!("{dir}/");

        let mut entries: Vec<DirEntry> = Vec::new();
        let mut seen_dirs = BTreeSet::new();
        for (owner_repo, file_path) in self.files.keys() {
            if *owner_repo != full_name {
                continue;
            }
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    if seen_dirs.insert(child.to_string()) {
                        entries.push(DirEntry {
                            name: child.to_string(),
                            path: format!("{dir}/{child}"),
                            kind: EntryKind::Dir,
                        });
                    }
                }
                None => entries.push(DirEntry::file(rest, file_path.clone())),
            }
        }

        if entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(entries))
        }
    }

    fn file_content(&self, repo: &RepoName, path: &str) -> Result<Option<Vec<u8>>> {
        let full_name = self.check_available(repo, path)?;
        Ok(self.files.get(&(full_name, path.to_string())).cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_registered_repositories() {
        let provider = MemoryProvider::new()
            .with_repository("org", "b")
            .with_workflow("org/a", "ci.yml", "name: CI\n")
            .with_repository("other", "c");

        let names: Vec<String> = provider
            .list_repositories("org")
            .unwrap()
            .into_iter()
            .map(|r| r.full_name)
            .collect();
        assert_eq!(names, vec!["org/a", "org/b"]);
    }

    #[test]
    fn unknown_org_is_not_found() {
        let err = MemoryProvider::new().list_repositories("nope").unwrap_err();
        assert!(matches!(err, SourceError::OrganizationNotFound { .. }));
    }

    #[test]
    fn directory_listing_shows_direct_children() {
        let provider = MemoryProvider::new()
            .with_workflow("org/a", "ci.yml", "")
            .with_file("org/a", ".github/workflows/shared/x.yml", "");
        let repo: RepoName = "org/a".parse().unwrap();

        let entries = provider.list_directory(&repo, WORKFLOWS_DIR).unwrap().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "ci.yml");
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[1].name, "shared");
        assert_eq!(entries[1].kind, EntryKind::Dir);

        let github = provider.list_directory(&repo, ".github").unwrap().unwrap();
        assert_eq!(github, vec![DirEntry {
            name: "workflows".into(),
            path: ".github/workflows".into(),
            kind: EntryKind::Dir,
        }]);

        assert!(provider.list_directory(&repo, "src").unwrap().is_none());
    }

    #[test]
    fn failing_repo_errors_on_every_call() {
        let provider = MemoryProvider::new().failing_repo("org/down");
        let repo: RepoName = "org/down".parse().unwrap();
        assert!(matches!(
            provider.file_content(&repo, "x").unwrap_err(),
            SourceError::Http { status: 503, .. }
        ));
        assert!(provider.workflow_actions(&repo).is_err());
        // Still listed under its organization.
        assert_eq!(provider.list_repositories("org").unwrap().len(), 1);
    }
}
