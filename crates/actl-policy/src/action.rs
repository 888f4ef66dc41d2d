// action.rs — Observed action references and version normalization.

use serde::{Deserialize, Serialize};

/// One `uses:` reference found in a repository's workflow definitions.
///
/// `name` is the step name (or a synthesized label for job-level reusable
/// workflow calls); `uses` is the raw reference, e.g. `actions/checkout@v4`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedAction {
    pub name: String,
    pub uses: String,
}

impl ObservedAction {
    pub fn new(name: impl Into<String>, uses: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uses: uses.into(),
        }
    }
}

/// Strip the trailing `@version` suffix from an action reference.
///
/// Splits on the last `@`, so `org/repo/.github/workflows/ci.yml@main`
/// becomes `org/repo/.github/workflows/ci.yml`. Case is preserved: GitHub
/// identifiers are compared exactly.
pub fn normalize_action(action: &str) -> &str {
    match action.rfind('@') {
        Some(idx) => &action[..idx],
        None => action,
    }
}
