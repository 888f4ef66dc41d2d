// merge.rs — Combine the global policy with a repository's own override file.
//
// Repository override files come in two shapes:
//
// 1. Nested: the multi-repo document format, with a `custom_rules` entry keyed
//    by the repository's own full name. That entry replaces any existing
//    custom rule for the repository.
// 2. Flat: top-level `allowed_actions` / `denied_actions` that apply to the
//    repository that holds the file, without naming it.
//
// The nested form wins when both are present. Global lists, the global mode,
// excluded repos and other repositories' rules always pass through untouched.

use tracing::debug;

use crate::error::Result;
use crate::model::{Policy, PolicyConfig, PolicyMode};

/// Path of the override file inside a repository.
pub const REPO_POLICY_PATH: &str = ".github/action-control-policy.yaml";

/// Merge `override_doc` (the raw contents of a repository's override file)
/// into a copy of `global`, scoped to `repo`.
///
/// A malformed override document is returned as an error. Falling back to the
/// unmerged global policy is the caller's decision.
pub fn merge_repo_policy(
    global: &PolicyConfig,
    override_doc: &[u8],
    repo: &str,
) -> Result<PolicyConfig> {
    let mut merged = global.clone();
    let mut repo_doc = PolicyConfig::from_slice(override_doc)?;

    if let Some(rule) = repo_doc.custom_rules.remove(repo) {
        debug!(repo, "override file replaces custom rule");
        merged.custom_rules.insert(repo.to_string(), rule);
        return Ok(merged);
    }

    if !repo_doc.allowed_actions.is_empty() || !repo_doc.denied_actions.is_empty() {
        let mode = repo_doc
            .policy_mode
            .or_else(|| PolicyMode::infer(&repo_doc.allowed_actions, &repo_doc.denied_actions))
            .unwrap_or_else(|| global.mode());
        debug!(repo, %mode, "flat override file becomes custom rule");
        merged.custom_rules.insert(
            repo.to_string(),
            Policy {
                policy_mode: Some(mode),
                allowed_actions: repo_doc.allowed_actions,
                denied_actions: repo_doc.denied_actions,
            },
        );
    }

    Ok(merged)
}

impl PolicyConfig {
    /// Method form of [`merge_repo_policy`].
    pub fn merged_with(&self, override_doc: &[u8], repo: &str) -> Result<PolicyConfig> {
        merge_repo_policy(self, override_doc, repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;
    use crate::model::load_policy;

    fn global() -> PolicyConfig {
        load_policy(
            br#"
policy_mode: allow
allowed_actions: [actions/checkout]
excluded_repos: [org/legacy]
custom_rules:
  org/r1:
    allowed_actions: [actions/setup-node]
  org/other:
    denied_actions: [x/y]
"#,
        )
        .unwrap()
    }

    #[test]
    fn nested_rule_replaces_existing_entry() {
        let doc = b"custom_rules:\n  org/r1:\n    policy_mode: deny\n    denied_actions: [bad/one]\n";
        let merged = merge_repo_policy(&global(), doc, "org/r1").unwrap();
        let rule = &merged.custom_rules["org/r1"];
        assert_eq!(rule.policy_mode, Some(PolicyMode::Deny));
        assert_eq!(rule.denied_actions, vec!["bad/one"]);
        // Replaced wholesale, not merged field by field.
        assert!(rule.allowed_actions.is_empty());
    }

    #[test]
    fn nested_rules_for_other_repos_are_ignored() {
        let doc = b"custom_rules:\n  org/other:\n    allowed_actions: [evil/thing]\n";
        let merged = merge_repo_policy(&global(), doc, "org/r1").unwrap();
        assert_eq!(merged, global());
    }

    #[test]
    fn flat_document_becomes_custom_rule() {
        let doc = b"allowed_actions: [actions/cache]\n";
        let merged = merge_repo_policy(&global(), doc, "org/new").unwrap();
        let rule = &merged.custom_rules["org/new"];
        assert_eq!(rule.policy_mode, Some(PolicyMode::Allow));
        assert_eq!(rule.allowed_actions, vec!["actions/cache"]);
    }

    #[test]
    fn flat_document_mode_inferred_from_denied_list() {
        let doc = b"denied_actions: [bad/one]\n";
        let merged = merge_repo_policy(&global(), doc, "org/new").unwrap();
        assert_eq!(
            merged.custom_rules["org/new"].policy_mode,
            Some(PolicyMode::Deny)
        );
    }

    #[test]
    fn flat_document_explicit_mode_wins() {
        let doc = b"policy_mode: deny\nallowed_actions: [a/b]\ndenied_actions: [c/d]\n";
        let merged = merge_repo_policy(&global(), doc, "org/new").unwrap();
        assert_eq!(
            merged.custom_rules["org/new"].policy_mode,
            Some(PolicyMode::Deny)
        );
    }

    #[test]
    fn nested_form_takes_precedence_over_flat() {
        let doc = b"allowed_actions: [flat/one]\ncustom_rules:\n  org/r1:\n    allowed_actions: [nested/one]\n";
        let merged = merge_repo_policy(&global(), doc, "org/r1").unwrap();
        assert_eq!(
            merged.custom_rules["org/r1"].allowed_actions,
            vec!["nested/one"]
        );
    }

    #[test]
    fn global_lists_pass_through_unchanged() {
        let doc = b"policy_mode: deny\ndenied_actions: [bad/one]\nexcluded_repos: [org/r9]\n";
        let base = global();
        let merged = merge_repo_policy(&base, doc, "org/r1").unwrap();
        assert_eq!(merged.policy_mode, base.policy_mode);
        assert_eq!(merged.allowed_actions, base.allowed_actions);
        assert_eq!(merged.excluded_repos, base.excluded_repos);
        assert_eq!(merged.custom_rules["org/other"], base.custom_rules["org/other"]);
    }

    #[test]
    fn empty_override_leaves_policy_unchanged() {
        let merged = merge_repo_policy(&global(), b"", "org/r1").unwrap();
        assert_eq!(merged, global());

        let merged = merge_repo_policy(&global(), b"excluded_repos: [org/r1]\n", "org/r1").unwrap();
        assert_eq!(merged, global());
    }

    #[test]
    fn malformed_override_is_surfaced() {
        let err = merge_repo_policy(&global(), b"custom_rules: [", "org/r1").unwrap_err();
        assert!(matches!(err, PolicyError::Parse(_)));
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let doc = b"denied_actions: [bad/one]\n";
        let once = merge_repo_policy(&global(), doc, "org/r1").unwrap();
        let twice = merge_repo_policy(&once, doc, "org/r1").unwrap();
        assert_eq!(once, twice);
    }
}
