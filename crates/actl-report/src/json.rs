//! json.rs — JSON renderer for machine-readable output.

use std::collections::BTreeMap;

use serde::Serialize;

use actl_policy::PolicyMode;

use crate::error::Result;
use crate::{offending, ReportRenderer, UsageByRepo, ViolationsByRepo};

#[derive(Serialize)]
struct ViolationDocument<'a> {
    policy_mode: PolicyMode,
    compliant: bool,
    violations: BTreeMap<&'a str, &'a [String]>,
}

#[derive(Default)]
pub struct JsonRenderer {}

impl JsonRenderer {
    pub fn new() -> Self {
        Self {}
    }
}

impl ReportRenderer for JsonRenderer {
    fn render_usage(&self, usage: &UsageByRepo) -> Result<String> {
        Ok(serde_json::to_string_pretty(usage)?)
    }

    fn render_violations(&self, violations: &ViolationsByRepo, mode: PolicyMode) -> Result<String> {
        let violations: BTreeMap<&str, &[String]> = offending(violations)
            .map(|(repo, list)| (repo.as_str(), list.as_slice()))
            .collect();
        let doc = ViolationDocument {
            policy_mode: mode,
            compliant: violations.is_empty(),
            violations,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    fn name(&self) -> &str {
        "json"
    }
}
