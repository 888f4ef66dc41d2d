//! # actl-report
//!
//! Renderers for the two things action-control prints:
//!
//! - a **usage report**: every action reference found, per repository, plus
//!   the most used references across all of them;
//! - a **violation report**: the offending references per repository after
//!   a policy check.
//!
//! Each output format implements [`ReportRenderer`]; [`renderer_for`] picks
//! one from an [`OutputFormat`].

use std::collections::BTreeMap;

use actl_policy::{ObservedAction, PolicyMode};

pub mod error;
pub mod json;
pub mod markdown;

pub use error::{ReportError, Result};
pub use json::JsonRenderer;
pub use markdown::MarkdownRenderer;

/// Observed actions keyed by `owner/repo`.
pub type UsageByRepo = BTreeMap<String, Vec<ObservedAction>>;

/// Offending references keyed by `owner/repo`.
pub type ViolationsByRepo = BTreeMap<String, Vec<String>>;

/// Number of entries in the "most used" table.
pub const TOP_ACTIONS_LIMIT: usize = 20;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Invalid output format: '{}'. Valid formats: markdown, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Turns scan results into printable text.
pub trait ReportRenderer {
    /// Render the actions found in each repository.
    fn render_usage(&self, usage: &UsageByRepo) -> Result<String>;

    /// Render the result of a policy check. Repositories with an empty list
    /// are treated as compliant.
    fn render_violations(&self, violations: &ViolationsByRepo, mode: PolicyMode) -> Result<String>;

    /// Renderer name (for logging/debugging).
    fn name(&self) -> &str;
}

/// Get a renderer for the given format.
pub fn renderer_for(format: OutputFormat) -> Box<dyn ReportRenderer> {
    match format {
        OutputFormat::Markdown => Box::new(MarkdownRenderer::new()),
        OutputFormat::Json => Box::new(JsonRenderer::new()),
    }
}

/// Reference counts across all repositories, most used first.
///
/// Ties are broken by reference so the order is stable. At most `limit`
/// entries are returned.
pub fn top_actions(usage: &UsageByRepo, limit: usize) -> Vec<(&str, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for action in usage.values().flatten() {
        *counts.entry(action.uses.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // BTreeMap order is by name; a stable sort by count keeps ties alphabetical.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);
    ranked
}

/// Repositories that actually have violations.
fn offending(violations: &ViolationsByRepo) -> impl Iterator<Item = (&String, &Vec<String>)> {
    violations.iter().filter(|(_, list)| !list.is_empty())
}
