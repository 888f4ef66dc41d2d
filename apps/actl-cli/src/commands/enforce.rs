// enforce.rs — `action-control enforce`: check every repository against a policy.

use anyhow::Context;
use clap::Args;
use tracing::{info, warn};

use actl_github::ContentProvider;
use actl_policy::{load_policy, PolicyConfig};
use actl_report::{renderer_for, ViolationsByRepo};

use crate::commands::{github_client, require_target};
use crate::config::{AppConfig, ConfigLayer, POLICY_CONTENT_ENV};
use crate::driver::{Driver, EnforceOptions, Target};

#[derive(Args, Debug, Clone, Default)]
pub struct EnforceArgs {
    /// Path to policy configuration file (defaults to policy.yaml).
    #[arg(long)]
    pub policy: Option<std::path::PathBuf>,

    /// Ignore repository policy files and only use the provided policy.
    #[arg(long, hide = true)]
    pub ignore_local_policy: bool,
}

impl EnforceArgs {
    pub fn apply_to(&self, layer: &mut ConfigLayer) {
        if let Some(policy) = &self.policy {
            layer.policy_file = Some(policy.clone());
        }
        if self.ignore_local_policy {
            layer.ignore_local_policy = Some(true);
        }
    }
}

/// The global policy: inline content when local policies are ignored and
/// content was supplied, otherwise the policy file.
pub fn load_global_policy(
    config: &AppConfig,
    inline_content: Option<&str>,
) -> anyhow::Result<PolicyConfig> {
    match inline_content.filter(|c| !c.trim().is_empty()) {
        Some(content) if config.ignore_local_policy => {
            info!("Using policy from {POLICY_CONTENT_ENV}");
            load_policy(content.as_bytes())
                .context("Error loading policy from environment variable")
        }
        _ => {
            let path = &config.policy_file;
            PolicyConfig::load(path)
                .with_context(|| format!("Error loading policy file {}", path.display()))
        }
    }
}

/// Returns `true` when at least one repository violates the policy.
pub fn execute(config: &AppConfig) -> anyhow::Result<bool> {
    let (token, _) = require_target(config)?;
    let inline = std::env::var(POLICY_CONTENT_ENV).ok();
    let policy = load_global_policy(config, inline.as_deref())?;
    let client = github_client(config, token)?;
    run(config, &client, &policy)
}

/// Check the configured target through `provider` and print the violation
/// report. Skipped repositories and rejected override files never count as
/// violations.
pub fn run(
    config: &AppConfig,
    provider: &dyn ContentProvider,
    policy: &PolicyConfig,
) -> anyhow::Result<bool> {
    let target = Target::from_options(
        config.organization.as_deref(),
        config.repository.as_deref(),
    )?;

    info!("Scanning {target} and enforcing policy...");
    let outcome = Driver::new(provider, config.workers).enforce(
        &target,
        EnforceOptions {
            policy,
            ignore_local_policy: config.ignore_local_policy,
        },
    )?;
    outcome.warn_skipped();
    let rejected = outcome
        .results
        .values()
        .filter(|check| check.override_rejected)
        .count();
    if rejected > 0 {
        warn!("{rejected} repositories have a policy file that could not be parsed; the global policy was used for them");
    }

    let violations: ViolationsByRepo = outcome
        .results
        .into_iter()
        .filter(|(_, check)| !check.violations.is_empty())
        .map(|(repo, check)| (repo, check.violations))
        .collect();

    let rendered =
        renderer_for(config.output_format).render_violations(&violations, policy.mode())?;
    println!("{rendered}");

    Ok(!violations.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actl_github::MemoryProvider;
    use actl_policy::PolicyMode;
    use std::fs;

    const CI: &str = "name: CI\njobs:\n  build:\n    steps:\n      - uses: actions/checkout@v4\n      - uses: evil/miner@v1\n";

    fn org_config() -> AppConfig {
        AppConfig {
            organization: Some("octo-org".to_string()),
            workers: 2,
            ..AppConfig::default()
        }
    }

    fn allow_checkout() -> PolicyConfig {
        load_policy(b"policy_mode: allow\nallowed_actions: [actions/checkout]\n").unwrap()
    }

    #[test]
    fn loads_policy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        fs::write(&path, "denied_actions: [bad/action]\n").unwrap();
        let config = AppConfig {
            policy_file: path,
            ..AppConfig::default()
        };
        let policy = load_global_policy(&config, None).unwrap();
        assert_eq!(policy.mode(), PolicyMode::Deny);
    }

    #[test]
    fn missing_policy_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            policy_file: dir.path().join("absent.yaml"),
            ..AppConfig::default()
        };
        let err = load_global_policy(&config, None).unwrap_err();
        assert!(err.to_string().contains("Error loading policy file"));
    }

    #[test]
    fn inline_content_needs_ignore_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        fs::write(&path, "policy_mode: allow\n").unwrap();
        let inline = "policy_mode: deny\n";

        let mut config = AppConfig {
            policy_file: path,
            ..AppConfig::default()
        };
        let from_file = load_global_policy(&config, Some(inline)).unwrap();
        assert_eq!(from_file.mode(), PolicyMode::Allow);

        config.ignore_local_policy = true;
        let from_env = load_global_policy(&config, Some(inline)).unwrap();
        assert_eq!(from_env.mode(), PolicyMode::Deny);

        // Blank content falls back to the file.
        let blank = load_global_policy(&config, Some("  \n")).unwrap();
        assert_eq!(blank.mode(), PolicyMode::Allow);
    }

    #[test]
    fn args_only_override_what_is_set() {
        let mut layer = ConfigLayer::default();
        EnforceArgs::default().apply_to(&mut layer);
        assert_eq!(layer, ConfigLayer::default());

        EnforceArgs {
            policy: Some("custom.yaml".into()),
            ignore_local_policy: true,
        }
        .apply_to(&mut layer);
        assert_eq!(layer.policy_file, Some("custom.yaml".into()));
        assert_eq!(layer.ignore_local_policy, Some(true));
    }

    #[test]
    fn violations_report_failure() {
        let provider = MemoryProvider::new()
            .with_workflow("octo-org/app", "ci.yml", CI)
            .with_repository("octo-org", "docs");
        assert!(run(&org_config(), &provider, &allow_checkout()).unwrap());
    }

    #[test]
    fn compliant_organization_passes() {
        let policy =
            load_policy(b"allowed_actions: [actions/checkout, evil/miner]\n").unwrap();
        let provider = MemoryProvider::new().with_workflow("octo-org/app", "ci.yml", CI);
        assert!(!run(&org_config(), &provider, &policy).unwrap());
    }

    #[test]
    fn skipped_repository_does_not_fail_the_run() {
        let provider = MemoryProvider::new()
            .failing_repo("octo-org/down")
            .with_repository("octo-org", "docs");
        assert!(!run(&org_config(), &provider, &allow_checkout()).unwrap());
    }

    #[test]
    fn rejected_override_falls_back_without_failing() {
        let provider = MemoryProvider::new()
            .with_workflow("octo-org/app", "ci.yml", "jobs:\n  b:\n    steps:\n      - uses: actions/checkout@v4\n")
            .with_file("octo-org/app", actl_policy::REPO_POLICY_PATH, "allowed_actions: [\n");
        assert!(!run(&org_config(), &provider, &allow_checkout()).unwrap());
    }

    #[test]
    fn override_can_allow_what_the_global_policy_rejects() {
        let provider = MemoryProvider::new()
            .with_workflow("octo-org/app", "ci.yml", CI)
            .with_file(
                "octo-org/app",
                actl_policy::REPO_POLICY_PATH,
                "allowed_actions: [actions/checkout, evil/miner]\n",
            );
        assert!(!run(&org_config(), &provider, &allow_checkout()).unwrap());

        let ignoring = AppConfig {
            ignore_local_policy: true,
            ..org_config()
        };
        assert!(run(&ignoring, &provider, &allow_checkout()).unwrap());
    }
}
