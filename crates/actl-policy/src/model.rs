// model.rs — Policy document types and the loader.
//
// A policy document is YAML:
//
//   policy_mode: allow            # optional, inferred when absent
//   allowed_actions: [...]
//   denied_actions: [...]
//   excluded_repos: [...]
//   custom_rules:
//     "owner/repo":
//       policy_mode: deny         # optional, inherits the document mode
//       allowed_actions: [...]
//       denied_actions: [...]
//
// Only the document-level mode is inferred on load. Custom rules keep an
// unset mode so the checker can apply inheritance from the global policy.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PolicyError, Result};

/// Policy stance for a document or a custom rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Only listed actions are permitted; everything else is a violation.
    Allow,
    /// Only listed actions are forbidden; everything else is permitted.
    Deny,
}

impl PolicyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyMode::Allow => "allow",
            PolicyMode::Deny => "deny",
        }
    }

    /// Infer a mode from which list is populated. Allow wins when both are.
    pub fn infer(allowed: &[String], denied: &[String]) -> Option<PolicyMode> {
        if !allowed.is_empty() {
            Some(PolicyMode::Allow)
        } else if !denied.is_empty() {
            Some(PolicyMode::Deny)
        } else {
            None
        }
    }
}

impl FromStr for PolicyMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "allow" => Ok(PolicyMode::Allow),
            "deny" => Ok(PolicyMode::Deny),
            _ => Err(PolicyError::InvalidMode {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PolicyMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A blank `policy_mode: ""` counts as absent.
fn optional_mode<'de, D>(deserializer: D) -> std::result::Result<Option<PolicyMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// A bare `allowed_actions:` with no items is an empty list, not an error.
fn optional_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn optional_rules<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Policy>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, Policy>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A repository-scoped policy fragment, keyed by `owner/repo` in `custom_rules`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(
        default,
        deserialize_with = "optional_mode",
        skip_serializing_if = "Option::is_none"
    )]
    pub policy_mode: Option<PolicyMode>,

    #[serde(default, deserialize_with = "optional_list")]
    pub allowed_actions: Vec<String>,

    #[serde(default, deserialize_with = "optional_list")]
    pub denied_actions: Vec<String>,
}

impl Policy {
    /// The list that is authoritative under `mode`.
    pub fn actions_for(&self, mode: PolicyMode) -> &[String] {
        match mode {
            PolicyMode::Allow => &self.allowed_actions,
            PolicyMode::Deny => &self.denied_actions,
        }
    }

    fn normalize_lists(&mut self) {
        dedup_preserving_order(&mut self.allowed_actions);
        dedup_preserving_order(&mut self.denied_actions);
    }
}

/// The global (document-level) policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(
        default,
        deserialize_with = "optional_mode",
        skip_serializing_if = "Option::is_none"
    )]
    pub policy_mode: Option<PolicyMode>,

    #[serde(default, deserialize_with = "optional_list")]
    pub allowed_actions: Vec<String>,

    #[serde(default, deserialize_with = "optional_list")]
    pub denied_actions: Vec<String>,

    /// Repositories exempt from enforcement regardless of mode.
    #[serde(default, deserialize_with = "optional_list")]
    pub excluded_repos: Vec<String>,

    /// Per-repository overrides. `BTreeMap` keeps serialized output stable.
    #[serde(default, deserialize_with = "optional_rules")]
    pub custom_rules: BTreeMap<String, Policy>,
}

impl PolicyConfig {
    /// Parse a document as written, without inferring a missing mode.
    ///
    /// Used for repository override files, where "no explicit mode" must stay
    /// distinguishable from "mode inferred from the lists".
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        Self::from_value(value)
    }

    /// Byte-slice variant of [`PolicyConfig::from_yaml_str`].
    pub fn from_slice(content: &[u8]) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_slice(content)?;
        Self::from_value(value)
    }

    fn from_value(value: serde_yaml::Value) -> Result<Self> {
        // An empty (or comment-only) document is an empty policy.
        if value.is_null() {
            return Ok(Self::default());
        }
        let mut config: PolicyConfig = serde_yaml::from_value(value)?;
        dedup_preserving_order(&mut config.allowed_actions);
        dedup_preserving_order(&mut config.denied_actions);
        dedup_preserving_order(&mut config.excluded_repos);
        for rule in config.custom_rules.values_mut() {
            rule.normalize_lists();
        }
        Ok(config)
    }

    /// Load a policy file from disk and infer its mode.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        load_policy(&data)
    }

    /// Fill in a missing document mode: Allow if `allowed_actions` is
    /// populated (or neither list is), Deny if only `denied_actions` is.
    pub fn resolve_mode(&mut self) {
        if self.policy_mode.is_none() {
            self.policy_mode = Some(self.mode());
        }
    }

    /// The document mode, inferred when unset.
    pub fn mode(&self) -> PolicyMode {
        self.policy_mode
            .or_else(|| PolicyMode::infer(&self.allowed_actions, &self.denied_actions))
            .unwrap_or(PolicyMode::Allow)
    }

    /// The global list that is authoritative under `mode`.
    pub fn actions_for(&self, mode: PolicyMode) -> &[String] {
        match mode {
            PolicyMode::Allow => &self.allowed_actions,
            PolicyMode::Deny => &self.denied_actions,
        }
    }

    /// Exact-match membership in `excluded_repos`.
    pub fn is_excluded(&self, repo: &str) -> bool {
        self.excluded_repos.iter().any(|r| r == repo)
    }

    /// Render as a YAML document (no header).
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(PolicyError::Serialize)
    }
}

/// Parse a policy document and infer its mode when absent.
///
/// Action references are not validated; any non-empty string is accepted.
pub fn load_policy(content: &[u8]) -> Result<PolicyConfig> {
    let mut config = PolicyConfig::from_slice(content)?;
    config.resolve_mode();
    tracing::debug!(
        mode = %config.mode(),
        allowed = config.allowed_actions.len(),
        denied = config.denied_actions.len(),
        excluded = config.excluded_repos.len(),
        custom_rules = config.custom_rules.len(),
        "loaded policy"
    );
    Ok(config)
}

/// Drop blank entries and later duplicates, keeping first-seen order.
fn dedup_preserving_order(list: &mut Vec<String>) {
    let mut seen = HashSet::new();
    list.retain(|item| !item.trim().is_empty() && seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let yaml = r#"
policy_mode: deny
allowed_actions:
  - actions/checkout
denied_actions:
  - unsafe/action
excluded_repos:
  - org/legacy
custom_rules:
  org/special:
    policy_mode: allow
    allowed_actions:
      - actions/setup-go
"#;
        let config = load_policy(yaml.as_bytes()).unwrap();
        assert_eq!(config.policy_mode, Some(PolicyMode::Deny));
        assert_eq!(config.allowed_actions, vec!["actions/checkout"]);
        assert_eq!(config.denied_actions, vec!["unsafe/action"]);
        assert!(config.is_excluded("org/legacy"));
        let rule = &config.custom_rules["org/special"];
        assert_eq!(rule.policy_mode, Some(PolicyMode::Allow));
        assert_eq!(rule.allowed_actions, vec!["actions/setup-go"]);
        assert!(rule.denied_actions.is_empty());
    }

    #[test]
    fn infers_allow_from_allowed_list() {
        let config = load_policy(b"allowed_actions: [actions/checkout]").unwrap();
        assert_eq!(config.policy_mode, Some(PolicyMode::Allow));
    }

    #[test]
    fn infers_deny_from_denied_list() {
        let config = load_policy(b"denied_actions: [bad/action]").unwrap();
        assert_eq!(config.policy_mode, Some(PolicyMode::Deny));
    }

    #[test]
    fn prefers_allow_when_both_lists_populated() {
        let config =
            load_policy(b"allowed_actions: [a/b]\ndenied_actions: [c/d]\n").unwrap();
        assert_eq!(config.policy_mode, Some(PolicyMode::Allow));
    }

    #[test]
    fn defaults_to_allow_when_both_lists_empty() {
        let config = load_policy(b"excluded_repos: [org/a]").unwrap();
        assert_eq!(config.policy_mode, Some(PolicyMode::Allow));
    }

    #[test]
    fn blank_mode_is_inferred() {
        let config = load_policy(b"policy_mode: \"\"\ndenied_actions: [x/y]\n").unwrap();
        assert_eq!(config.policy_mode, Some(PolicyMode::Deny));
    }

    #[test]
    fn custom_rule_mode_is_not_inferred_on_load() {
        let yaml = "custom_rules:\n  org/r1:\n    denied_actions: [x/y]\n";
        let config = load_policy(yaml.as_bytes()).unwrap();
        assert_eq!(config.custom_rules["org/r1"].policy_mode, None);
    }

    #[test]
    fn raw_parse_keeps_mode_unset() {
        let config = PolicyConfig::from_yaml_str("allowed_actions: [a/b]").unwrap();
        assert_eq!(config.policy_mode, None);
        assert_eq!(config.mode(), PolicyMode::Allow);
    }

    #[test]
    fn empty_document_is_empty_policy() {
        let config = load_policy(b"").unwrap();
        assert_eq!(config.policy_mode, Some(PolicyMode::Allow));
        assert!(config.allowed_actions.is_empty());
        assert!(config.custom_rules.is_empty());

        let commented = load_policy(b"# nothing here yet\n").unwrap();
        assert!(commented.allowed_actions.is_empty());
    }

    #[test]
    fn null_lists_are_empty() {
        let config = load_policy(b"allowed_actions:\ncustom_rules:\n").unwrap();
        assert!(config.allowed_actions.is_empty());
        assert!(config.custom_rules.is_empty());
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = load_policy(b"allowed_actions: [unclosed").unwrap_err();
        assert!(matches!(err, PolicyError::Parse(_)));
    }

    #[test]
    fn wrong_shape_is_parse_error() {
        let err = load_policy(b"allowed_actions: 42").unwrap_err();
        assert!(matches!(err, PolicyError::Parse(_)));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = load_policy(b"policy_mode: permit").unwrap_err();
        assert!(err.to_string().contains("permit"));
    }

    #[test]
    fn duplicate_entries_are_collapsed() {
        let config =
            load_policy(b"allowed_actions: [a/b, c/d, a/b, \"\"]\n").unwrap();
        assert_eq!(config.allowed_actions, vec!["a/b", "c/d"]);
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("allow".parse::<PolicyMode>().unwrap(), PolicyMode::Allow);
        assert_eq!("deny".parse::<PolicyMode>().unwrap(), PolicyMode::Deny);
        assert!(matches!(
            "block".parse::<PolicyMode>(),
            Err(PolicyError::InvalidMode { .. })
        ));
        assert_eq!(PolicyMode::Deny.to_string(), "deny");
    }

    #[test]
    fn mode_is_matched_exactly() {
        for raw in ["ALLOW", "Deny", " deny ", "allow\n"] {
            assert!(
                matches!(raw.parse::<PolicyMode>(), Err(PolicyError::InvalidMode { .. })),
                "{raw:?} should be rejected"
            );
        }
        assert!(PolicyConfig::from_yaml_str("policy_mode: DENY\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        fs::write(&path, "denied_actions: [x/y]\n").unwrap();
        let config = PolicyConfig::load(&path).unwrap();
        assert_eq!(config.mode(), PolicyMode::Deny);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PolicyConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, PolicyError::Io { .. }));
    }
}
