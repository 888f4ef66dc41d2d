// export.rs — Synthesize a baseline policy from observed action usage.
//
// The exporter turns `repository → observed actions` into a policy document:
// a global, deduplicated, sorted list in the field matching the chosen mode,
// plus (optionally) one custom rule per repository with that repository's own
// action set. Versions are stripped unless `include_versions` is set.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::action::{normalize_action, ObservedAction};
use crate::error::{PolicyError, Result};
use crate::model::{Policy, PolicyConfig, PolicyMode};

/// Comment block written above every exported policy.
const HEADER: &str = "\
# GitHub Action Control Policy
# Generated automatically by action-control
#
# This file defines policy for GitHub Actions in your repositories.
#
# Policy can work in two modes:
#   - allow: Only listed actions are allowed (default)
#   - deny: All actions are allowed except listed ones
#
# allowed_actions: Actions explicitly allowed (used in allow mode)
# denied_actions: Actions explicitly denied (used in deny mode)
# policy_mode: Which mode to use (\"allow\" or \"deny\")
# excluded_repos: Repositories excluded from policy enforcement
# custom_rules: Repository-specific action rules
";

/// Exporter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub policy_mode: PolicyMode,
    /// Keep the `@version` suffix on exported entries.
    pub include_versions: bool,
    /// Emit one custom rule per repository in addition to the global list.
    pub include_custom: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            policy_mode: PolicyMode::Allow,
            include_versions: false,
            include_custom: false,
        }
    }
}

impl ExportOptions {
    /// Build options from a user-supplied mode string.
    ///
    /// Fails with [`PolicyError::InvalidMode`] for anything but allow/deny, so
    /// callers can validate before fetching anything.
    pub fn new(policy_mode: &str, include_versions: bool, include_custom: bool) -> Result<Self> {
        Ok(Self {
            policy_mode: policy_mode.parse()?,
            include_versions,
            include_custom,
        })
    }
}

/// Counts reported after an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub policy_mode: PolicyMode,
    pub action_count: usize,
    /// Every scanned repository, including ones with no workflows. A single
    /// repository with no actions still counts as one.
    pub repository_count: usize,
}

/// Generates and writes policy documents from observed usage.
#[derive(Debug, Clone, Default)]
pub struct PolicyExporter {
    options: ExportOptions,
}

impl PolicyExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    fn export_name<'a>(&self, uses: &'a str) -> &'a str {
        if self.options.include_versions {
            uses
        } else {
            normalize_action(uses)
        }
    }

    /// Build a policy from `actions_by_repo`.
    pub fn generate(
        &self,
        actions_by_repo: &BTreeMap<String, Vec<ObservedAction>>,
    ) -> PolicyConfig {
        let mode = self.options.policy_mode;
        let mut all = BTreeSet::new();
        let mut custom_rules = BTreeMap::new();

        for (repo, actions) in actions_by_repo {
            let repo_set: BTreeSet<String> = actions
                .iter()
                .map(|a| self.export_name(&a.uses).to_string())
                .collect();
            all.extend(repo_set.iter().cloned());

            if self.options.include_custom {
                custom_rules.insert(repo.clone(), policy_with(mode, repo_set.into_iter().collect()));
            }
        }

        let global = policy_with(mode, all.into_iter().collect());
        debug!(
            %mode,
            actions = global.actions_for(mode).len(),
            custom_rules = custom_rules.len(),
            "generated policy"
        );

        PolicyConfig {
            policy_mode: Some(mode),
            allowed_actions: global.allowed_actions,
            denied_actions: global.denied_actions,
            excluded_repos: Vec::new(),
            custom_rules,
        }
    }

    /// Render `policy` as a complete document: header comment plus YAML.
    pub fn render(&self, policy: &PolicyConfig) -> Result<String> {
        let body = policy.to_yaml()?;
        Ok(format!(
            "{HEADER}# Generated at: {}\n\n{body}",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        ))
    }

    /// Write `policy` to `path`, creating parent directories.
    ///
    /// The document is written to a temporary file in the destination
    /// directory and renamed into place, so readers never see a partial file.
    pub fn write(&self, policy: &PolicyConfig, path: &Path) -> Result<()> {
        let content = self.render(policy)?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let io_err = |source: std::io::Error| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(dir).map_err(|source| PolicyError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut temp = NamedTempFile::new_in(dir).map_err(io_err)?;
        temp.write_all(content.as_bytes()).map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        let file = temp.persist(path).map_err(|e| io_err(e.error))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(io_err)?;
        }
        #[cfg(not(unix))]
        drop(file);

        info!(path = %path.display(), "wrote policy file");
        Ok(())
    }

    /// Counts for the closing summary line.
    pub fn summarize(
        &self,
        policy: &PolicyConfig,
        actions_by_repo: &BTreeMap<String, Vec<ObservedAction>>,
    ) -> ExportSummary {
        let mode = self.options.policy_mode;
        ExportSummary {
            policy_mode: mode,
            action_count: policy.actions_for(mode).len(),
            repository_count: actions_by_repo.len(),
        }
    }
}

fn policy_with(mode: PolicyMode, actions: Vec<String>) -> Policy {
    match mode {
        PolicyMode::Allow => Policy {
            policy_mode: Some(mode),
            allowed_actions: actions,
            denied_actions: Vec::new(),
        },
        PolicyMode::Deny => Policy {
            policy_mode: Some(mode),
            allowed_actions: Vec::new(),
            denied_actions: actions,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::load_policy;

    fn sample() -> BTreeMap<String, Vec<ObservedAction>> {
        let mut map = BTreeMap::new();
        map.insert(
            "org/r1".to_string(),
            vec![
                ObservedAction::new("Checkout", "actions/checkout@v3"),
                ObservedAction::new("Node", "actions/setup-node@v2"),
            ],
        );
        map.insert(
            "org/r2".to_string(),
            vec![
                ObservedAction::new("Checkout", "actions/checkout@v4"),
                ObservedAction::new("", "custom/action@v1"),
            ],
        );
        map
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = ExportOptions::new("maybe", false, false).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidMode { .. }));
        for mode in ["ALLOW", " deny ", "Deny"] {
            assert!(ExportOptions::new(mode, false, false).is_err(), "{mode:?}");
        }
    }

    #[test]
    fn allow_export_strips_versions_and_dedups() {
        let exporter = PolicyExporter::new(ExportOptions::default());
        let policy = exporter.generate(&sample());
        assert_eq!(policy.policy_mode, Some(PolicyMode::Allow));
        assert_eq!(
            policy.allowed_actions,
            vec!["actions/checkout", "actions/setup-node", "custom/action"]
        );
        assert!(policy.denied_actions.is_empty());
        assert!(policy.custom_rules.is_empty());
    }

    #[test]
    fn deny_export_fills_denied_list() {
        let exporter = PolicyExporter::new(ExportOptions::new("deny", false, false).unwrap());
        let policy = exporter.generate(&sample());
        assert_eq!(policy.policy_mode, Some(PolicyMode::Deny));
        assert!(policy.allowed_actions.is_empty());
        assert_eq!(policy.denied_actions.len(), 3);
    }

    #[test]
    fn include_versions_keeps_suffix() {
        let exporter = PolicyExporter::new(ExportOptions::new("allow", true, false).unwrap());
        let policy = exporter.generate(&sample());
        assert_eq!(
            policy.allowed_actions,
            vec![
                "actions/checkout@v3",
                "actions/checkout@v4",
                "actions/setup-node@v2",
                "custom/action@v1",
            ]
        );
    }

    #[test]
    fn include_custom_emits_rule_per_repo() {
        let mut actions = sample();
        actions.insert("org/empty".to_string(), Vec::new());
        let exporter = PolicyExporter::new(ExportOptions::new("deny", false, true).unwrap());
        let policy = exporter.generate(&actions);

        assert_eq!(policy.custom_rules.len(), 3);
        let r1 = &policy.custom_rules["org/r1"];
        assert_eq!(r1.policy_mode, Some(PolicyMode::Deny));
        assert_eq!(r1.denied_actions, vec!["actions/checkout", "actions/setup-node"]);
        assert!(r1.allowed_actions.is_empty());
        assert!(policy.custom_rules["org/empty"].denied_actions.is_empty());
    }

    #[test]
    fn rendered_document_has_header_and_loads_back() {
        let exporter = PolicyExporter::new(ExportOptions::new("allow", false, true).unwrap());
        let policy = exporter.generate(&sample());
        let text = exporter.render(&policy).unwrap();
        assert!(text.starts_with("# GitHub Action Control Policy"));
        assert!(text.contains("policy_mode: allow"));

        let loaded = load_policy(text.as_bytes()).unwrap();
        assert_eq!(loaded, policy);
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/policy.yaml");
        let exporter = PolicyExporter::default();
        let policy = exporter.generate(&sample());
        exporter.write(&policy, &path).unwrap();

        let loaded = PolicyConfig::load(&path).unwrap();
        assert_eq!(loaded.allowed_actions, policy.allowed_actions);
        // Only the destination file is left behind.
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        fs::write(&path, "stale: true\n").unwrap();
        let exporter = PolicyExporter::default();
        exporter.write(&exporter.generate(&sample()), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale"));
    }

    #[test]
    fn summary_counts_actions_and_repos() {
        let exporter = PolicyExporter::default();
        let actions = sample();
        let policy = exporter.generate(&actions);
        let summary = exporter.summarize(&policy, &actions);
        assert_eq!(summary.action_count, 3);
        assert_eq!(summary.repository_count, 2);
        assert_eq!(summary.policy_mode, PolicyMode::Allow);
    }
}
