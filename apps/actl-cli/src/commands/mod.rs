pub mod enforce;
pub mod export;
pub mod report;

use anyhow::Context;

use actl_github::GitHubClient;

use crate::config::AppConfig;
use crate::driver::Target;

/// Token and target, checked before anything touches the network.
pub fn require_target(config: &AppConfig) -> anyhow::Result<(&str, Target)> {
    let token = config.require_token()?;
    let target = Target::from_options(
        config.organization.as_deref(),
        config.repository.as_deref(),
    )?;
    Ok((token, target))
}

pub fn github_client(config: &AppConfig, token: &str) -> anyhow::Result<GitHubClient> {
    GitHubClient::new(config.client_config(token)).context("Failed to create GitHub client")
}
