// compliance.rs — Check observed action references against a policy.
//
// Evaluation order for one repository:
//
// 1. Listed in `excluded_repos`? → compliant, nothing else is consulted.
// 2. Resolve the effective rule:
//    - custom rule present → its mode, else the global mode;
//      its list for that mode, else (when empty) the global list for that mode.
//    - no custom rule → global mode and global list.
//    A mode still unset after inheritance is inferred from the lists.
// 3. For each observed reference, compare both the raw string and its
//    normalized form (version stripped) against the effective list:
//    - Allow: violation unless either form is listed.
//    - Deny: violation if either form is listed.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::action::normalize_action;
use crate::model::{PolicyConfig, PolicyMode};

/// Where the effective list of an [`EffectivePolicy`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    /// No custom rule for the repository; the global policy applies.
    Global,
    /// The repository's custom rule supplied its own list.
    CustomRule,
    /// The custom rule had an empty list for its mode; the global list was inherited.
    Inherited,
}

/// The fully resolved mode and list for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePolicy<'a> {
    pub mode: PolicyMode,
    pub actions: &'a [String],
    pub source: RuleSource,
}

/// Outcome of a compliance check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    /// Offending references, in the order they were observed.
    pub violations: Vec<String>,
    /// True iff `violations` is empty.
    pub compliant: bool,
}

impl ComplianceReport {
    fn from_violations(violations: Vec<String>) -> Self {
        let compliant = violations.is_empty();
        Self {
            violations,
            compliant,
        }
    }
}

impl PolicyConfig {
    /// Resolve the mode and list that govern `repo`.
    ///
    /// Returns `None` when the repository is excluded from enforcement.
    pub fn effective_policy(&self, repo: &str) -> Option<EffectivePolicy<'_>> {
        if self.is_excluded(repo) {
            return None;
        }

        let Some(rule) = self.custom_rules.get(repo) else {
            let mode = self.mode();
            return Some(EffectivePolicy {
                mode,
                actions: self.actions_for(mode),
                source: RuleSource::Global,
            });
        };

        let mode = rule
            .policy_mode
            .or(self.policy_mode)
            .or_else(|| PolicyMode::infer(&rule.allowed_actions, &rule.denied_actions))
            .or_else(|| PolicyMode::infer(&self.allowed_actions, &self.denied_actions))
            .unwrap_or(PolicyMode::Allow);

        let own = rule.actions_for(mode);
        if own.is_empty() {
            Some(EffectivePolicy {
                mode,
                actions: self.actions_for(mode),
                source: RuleSource::Inherited,
            })
        } else {
            Some(EffectivePolicy {
                mode,
                actions: own,
                source: RuleSource::CustomRule,
            })
        }
    }
}

impl EffectivePolicy<'_> {
    /// Return the offending references from `observed`, preserving order.
    pub fn violations<S: AsRef<str>>(&self, observed: &[S]) -> Vec<String> {
        let listed: HashSet<&str> = self.actions.iter().map(String::as_str).collect();
        observed
            .iter()
            .map(|s| -> &str { s.as_ref() })
            .filter(|raw| {
                let hit = listed.contains(normalize_action(raw)) || listed.contains(raw);
                match self.mode {
                    PolicyMode::Allow => !hit,
                    PolicyMode::Deny => hit,
                }
            })
            .map(str::to_string)
            .collect()
    }
}

/// Check the actions observed in `repo` against `policy`.
pub fn check_compliance<S: AsRef<str>>(
    policy: &PolicyConfig,
    repo: &str,
    observed: &[S],
) -> ComplianceReport {
    let Some(effective) = policy.effective_policy(repo) else {
        debug!(repo, "repository excluded from enforcement");
        return ComplianceReport::from_violations(Vec::new());
    };

    let violations = effective.violations(observed);
    debug!(
        repo,
        mode = %effective.mode,
        source = ?effective.source,
        observed = observed.len(),
        violations = violations.len(),
        "checked repository"
    );
    ComplianceReport::from_violations(violations)
}
