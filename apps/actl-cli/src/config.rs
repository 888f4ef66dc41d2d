// config.rs — Layered CLI configuration.
//
// AppConfig is built once at startup and passed down by reference. Layers,
// lowest to highest precedence:
//
//   1. built-in defaults
//   2. config file (--config, else ./config.yaml, ~/.config/action-control/config.yaml, ~/config.yaml)
//   3. environment (ACTION_CONTROL_<KEY>, plus GITHUB_TOKEN as a token fallback)
//   4. command-line flags
//
// Every layer is a ConfigLayer of optional values; applying a layer only
// overwrites the keys it actually sets.

use std::path::{Path, PathBuf};
use std::time::Duration;

use actl_github::{ClientConfig, RetryPolicy, DEFAULT_API_URL};
use actl_report::OutputFormat;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Prefix for every environment override.
pub const ENV_PREFIX: &str = "ACTION_CONTROL_";

/// Policy document supplied inline, used with `--ignore-local-policy`.
pub const POLICY_CONTENT_ENV: &str = "ACTION_CONTROL_POLICY_CONTENT";

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolved configuration for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub github_token: Option<String>,
    pub organization: Option<String>,
    pub repository: Option<String>,
    pub output_format: OutputFormat,
    pub api_url: String,
    pub policy_file: PathBuf,
    pub ignore_local_policy: bool,
    pub export_file: PathBuf,
    pub include_versions: bool,
    pub include_custom: bool,
    pub policy_mode: String,
    /// Upper bound on concurrent repository fetches.
    pub workers: usize,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            organization: None,
            repository: None,
            output_format: OutputFormat::Markdown,
            api_url: DEFAULT_API_URL.to_string(),
            policy_file: PathBuf::from("policy.yaml"),
            ignore_local_policy: false,
            export_file: PathBuf::from("policy.yaml"),
            include_versions: false,
            include_custom: false,
            policy_mode: "allow".to_string(),
            workers: 8,
            request_timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

/// One layer of optional overrides. Keys match the config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub github_token: Option<String>,
    pub organization: Option<String>,
    pub repository: Option<String>,
    pub output_format: Option<String>,
    pub api_url: Option<String>,
    pub policy_file: Option<PathBuf>,
    pub ignore_local_policy: Option<bool>,
    pub export_file: Option<PathBuf>,
    pub include_versions: Option<bool>,
    pub include_custom: Option<bool>,
    pub policy_mode: Option<String>,
    pub workers: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

impl ConfigLayer {
    /// Read overrides from the environment through `lookup`.
    ///
    /// Values that fail to parse are ignored with a warning. Empty values
    /// count as unset.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(&format!("{ENV_PREFIX}{}", key.to_uppercase()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            github_token: get("github_token").or_else(|| {
                lookup("GITHUB_TOKEN")
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            }),
            organization: get("organization"),
            repository: get("repository"),
            output_format: get("output_format"),
            api_url: get("api_url"),
            policy_file: get("policy_file").map(PathBuf::from),
            ignore_local_policy: parse_env("ignore_local_policy", get("ignore_local_policy")),
            export_file: get("export_file").map(PathBuf::from),
            include_versions: parse_env("include_versions", get("include_versions")),
            include_custom: parse_env("include_custom", get("include_custom")),
            policy_mode: get("policy_mode"),
            workers: parse_env("workers", get("workers")),
            request_timeout_secs: parse_env("request_timeout_secs", get("request_timeout_secs")),
            max_attempts: parse_env("max_attempts", get("max_attempts")),
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Parse a config file; `.toml` files as TOML, everything else as YAML.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let layer = if is_toml {
            toml::from_str(&content)?
        } else if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(layer)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key = %format!("{ENV_PREFIX}{}", key.to_uppercase()), %value, "ignoring unparseable environment value");
            None
        }
    }
}

impl AppConfig {
    /// Overwrite every key `layer` sets.
    pub fn apply(&mut self, layer: ConfigLayer) {
        if let Some(v) = layer.github_token {
            self.github_token = Some(v);
        }
        if let Some(v) = layer.organization {
            self.organization = Some(v);
        }
        if let Some(v) = layer.repository {
            self.repository = Some(v);
        }
        if let Some(v) = layer.output_format {
            match v.parse() {
                Ok(format) => self.output_format = format,
                Err(e) => warn!("{e}; keeping {}", self.output_format),
            }
        }
        if let Some(v) = layer.api_url {
            self.api_url = v;
        }
        if let Some(v) = layer.policy_file {
            self.policy_file = v;
        }
        if let Some(v) = layer.ignore_local_policy {
            self.ignore_local_policy = v;
        }
        if let Some(v) = layer.export_file {
            self.export_file = v;
        }
        if let Some(v) = layer.include_versions {
            self.include_versions = v;
        }
        if let Some(v) = layer.include_custom {
            self.include_custom = v;
        }
        if let Some(v) = layer.policy_mode {
            self.policy_mode = v;
        }
        if let Some(v) = layer.workers {
            self.workers = v;
        }
        if let Some(v) = layer.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = layer.max_attempts {
            self.max_attempts = v;
        }
    }

    /// Build the full configuration: defaults, file, environment, then `cli`.
    pub fn load(explicit_file: Option<&Path>, cli: ConfigLayer) -> Self {
        let mut config = Self::default();

        match find_config_file(explicit_file, dirs::home_dir().as_deref()) {
            Some(path) => match ConfigLayer::from_file(&path) {
                Ok(layer) => {
                    info!(path = %path.display(), "using config file");
                    config.apply(layer);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "error reading config file"),
            },
            None => debug!("no configuration file found, using defaults and environment"),
        }

        config.apply(ConfigLayer::from_env());
        config.apply(cli);
        config
    }

    /// The GitHub token, or an error telling the user where to set it.
    pub fn require_token(&self) -> anyhow::Result<&str> {
        match self.github_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => anyhow::bail!(
                "GitHub token not provided. Set github_token in config.yaml or the GITHUB_TOKEN environment variable."
            ),
        }
    }

    pub fn client_config(&self, token: &str) -> ClientConfig {
        let mut client = ClientConfig::new(token);
        client.api_url = self.api_url.clone();
        client.timeout = Duration::from_secs(self.request_timeout_secs.max(1));
        client.retry = RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            ..RetryPolicy::default()
        };
        client
    }
}

/// Candidate config file locations, highest priority first.
pub fn config_search_paths(home: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home) = home {
        paths.push(home.join(".config/action-control").join(CONFIG_FILE_NAME));
        paths.push(home.join(CONFIG_FILE_NAME));
    }
    paths
}

/// The explicit file if given, otherwise the first search path that exists.
pub fn find_config_file(explicit: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    config_search_paths(home).into_iter().find(|p| p.is_file())
}
