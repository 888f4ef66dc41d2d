// export.rs — `action-control export`: write a baseline policy from observed usage.

use anyhow::Context;
use clap::Args;
use tracing::info;

use actl_policy::{ExportOptions, ExportSummary, PolicyExporter, PolicyMode};

use crate::commands::{github_client, require_target};
use crate::config::{AppConfig, ConfigLayer};
use crate::driver::Driver;

#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// Output file path for generated policy (defaults to policy.yaml).
    #[arg(long)]
    pub file: Option<std::path::PathBuf>,

    /// Policy mode: allow or deny (defaults to allow).
    #[arg(long)]
    pub policy_mode: Option<String>,

    /// Include version tags in action references.
    #[arg(long)]
    pub include_versions: bool,

    /// Generate custom rules for each repository.
    #[arg(long)]
    pub include_custom: bool,
}

impl ExportArgs {
    pub fn apply_to(&self, layer: &mut ConfigLayer) {
        if let Some(file) = &self.file {
            layer.export_file = Some(file.clone());
        }
        if let Some(mode) = &self.policy_mode {
            layer.policy_mode = Some(mode.clone());
        }
        if self.include_versions {
            layer.include_versions = Some(true);
        }
        if self.include_custom {
            layer.include_custom = Some(true);
        }
    }
}

/// Exporter settings from the resolved configuration.
pub fn export_options(config: &AppConfig) -> anyhow::Result<ExportOptions> {
    ExportOptions::new(
        config.policy_mode.trim(),
        config.include_versions,
        config.include_custom,
    )
    .context("Invalid export settings")
}

/// The closing summary line.
pub fn summary_line(summary: &ExportSummary) -> String {
    let kind = match summary.policy_mode {
        PolicyMode::Allow => "allowed",
        PolicyMode::Deny => "denied",
    };
    format!(
        "Found {} {kind} actions across {} repositories",
        summary.action_count, summary.repository_count
    )
}

pub fn execute(config: &AppConfig) -> anyhow::Result<()> {
    let (token, target) = require_target(config)?;
    let options = export_options(config)?;
    let client = github_client(config, token)?;

    info!("Scanning {target} for actions...");
    let outcome = Driver::new(&client, config.workers).collect_actions(&target)?;

    let exporter = PolicyExporter::new(options);
    let policy = exporter.generate(&outcome.results);
    let path = &config.export_file;
    exporter
        .write(&policy, path)
        .with_context(|| format!("Error writing policy file {}", path.display()))?;

    let summary = exporter.summarize(&policy, &outcome.results);
    println!(
        "Successfully exported {}-mode policy file to {}",
        summary.policy_mode,
        path.display()
    );
    println!("{}", summary_line(&summary));

    outcome.warn_skipped();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_validate_mode() {
        let config = AppConfig {
            policy_mode: "deny".into(),
            include_custom: true,
            ..AppConfig::default()
        };
        let options = export_options(&config).unwrap();
        assert_eq!(options.policy_mode, PolicyMode::Deny);
        assert!(options.include_custom);
        assert!(!options.include_versions);

        let bad = AppConfig {
            policy_mode: "block".into(),
            ..AppConfig::default()
        };
        let err = export_options(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("invalid policy mode 'block'"));
    }

    #[test]
    fn summary_wording_follows_mode() {
        let summary = ExportSummary {
            policy_mode: PolicyMode::Deny,
            action_count: 4,
            repository_count: 2,
        };
        assert_eq!(
            summary_line(&summary),
            "Found 4 denied actions across 2 repositories"
        );
    }

    #[test]
    fn args_map_to_layer() {
        let mut layer = ConfigLayer::default();
        ExportArgs {
            file: Some("out/policy.yaml".into()),
            policy_mode: Some("deny".into()),
            include_versions: true,
            include_custom: false,
        }
        .apply_to(&mut layer);
        assert_eq!(layer.export_file, Some("out/policy.yaml".into()));
        assert_eq!(layer.policy_mode.as_deref(), Some("deny"));
        assert_eq!(layer.include_versions, Some(true));
        assert_eq!(layer.include_custom, None);
    }
}
