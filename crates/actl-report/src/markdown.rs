//! markdown.rs — Markdown renderer, the default human-readable output.

use std::fmt::Write as _;

use actl_policy::PolicyMode;

use crate::error::Result;
use crate::{offending, top_actions, ReportRenderer, UsageByRepo, ViolationsByRepo, TOP_ACTIONS_LIMIT};

/// Shown instead of a violation report when nothing was flagged.
pub const ALL_COMPLIANT: &str = "✅ All repositories comply with the action policy.";

#[derive(Default)]
pub struct MarkdownRenderer {}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {}
    }
}

impl ReportRenderer for MarkdownRenderer {
    fn render_usage(&self, usage: &UsageByRepo) -> Result<String> {
        let mut out = String::new();
        out.push_str("# GitHub Actions Usage Report\n\n");

        out.push_str("## Actions by Repository\n\n");
        for (repo, actions) in usage {
            if actions.is_empty() {
                continue;
            }
            let _ = writeln!(out, "### {repo}\n");
            out.push_str("| Action Name | Action Reference |\n");
            out.push_str("|------------|------------------|\n");
            for action in actions {
                let name = if action.name.is_empty() {
                    "_Unnamed_"
                } else {
                    action.name.as_str()
                };
                let _ = writeln!(out, "| {} | `{}` |", escape_cell(name), action.uses);
            }
            out.push('\n');
        }

        out.push_str("## Most Used Actions\n\n");
        out.push_str("| Action | Usage Count |\n");
        out.push_str("|--------|------------|\n");
        for (uses, count) in top_actions(usage, TOP_ACTIONS_LIMIT) {
            let _ = writeln!(out, "| `{uses}` | {count} |");
        }

        Ok(out)
    }

    fn render_violations(&self, violations: &ViolationsByRepo, mode: PolicyMode) -> Result<String> {
        let repos: Vec<_> = offending(violations).collect();
        if repos.is_empty() {
            return Ok(ALL_COMPLIANT.to_string());
        }

        let (heading, intro, closing) = match mode {
            PolicyMode::Deny => (
                "## ❌ Denied Actions Found",
                "The following denied actions were found:",
                "repositories using denied actions",
            ),
            PolicyMode::Allow => (
                "## ❌ Policy Violations",
                "The following actions are not allowed by policy:",
                "repositories with policy violations",
            ),
        };

        let mut out = String::new();
        out.push_str("# Policy Violation Report\n\n");
        let _ = writeln!(out, "{heading}\n");
        for (repo, list) in &repos {
            let _ = writeln!(out, "### {repo}\n");
            let _ = writeln!(out, "{intro}\n");
            for action in list.iter() {
                let _ = writeln!(out, "- `{action}`");
            }
            out.push('\n');
        }
        let _ = writeln!(out, "\nFound {} {closing}.", repos.len());

        Ok(out)
    }

    fn name(&self) -> &str {
        "markdown"
    }
}

/// Step names are free text; a `|` would split the table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
