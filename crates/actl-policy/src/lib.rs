//! # actl-policy
//!
//! Allow/deny policy engine for GitHub Actions usage.
//!
//! A [`PolicyConfig`] declares which action references a repository may use.
//! The engine has four parts:
//!
//! - **Loader** ([`load_policy`], [`PolicyConfig::load`]): parse a YAML policy
//!   document and infer its mode when none is given.
//! - **Merge** ([`merge_repo_policy`]): combine the global policy with a
//!   repository's own override file into a policy scoped to that repository.
//! - **Compliance** ([`check_compliance`]): reconcile observed action
//!   references against the effective policy and list the violations.
//! - **Export** ([`PolicyExporter`]): synthesize a baseline policy from the
//!   actions observed across many repositories.
//!
//! ## Key invariants
//!
//! - **Excluded repos are always compliant**: membership in `excluded_repos`
//!   short-circuits before any mode or list is consulted.
//! - **Allow mode is default deny**: an empty effective allow list flags every
//!   observed action.
//! - **Deny mode is default allow**: an empty effective deny list flags nothing.
//! - **Normalization is one-sided and case-sensitive**: the `@version` suffix is
//!   stripped from the observed reference only, never from policy entries.

pub mod action;
pub mod compliance;
pub mod error;
pub mod export;
pub mod merge;
pub mod model;

pub use action::{normalize_action, ObservedAction};
pub use compliance::{check_compliance, ComplianceReport, EffectivePolicy, RuleSource};
pub use error::{PolicyError, Result};
pub use export::{ExportOptions, ExportSummary, PolicyExporter};
pub use merge::{merge_repo_policy, REPO_POLICY_PATH};
pub use model::{load_policy, Policy, PolicyConfig, PolicyMode};
