// client.rs — GitHub REST API content provider.
//
// Blocking reqwest client; every repository fetch runs on a worker thread of
// the driver's pool, so there is no async runtime to thread through.
//
// Requests that fail in transit, or come back 5xx / 429, are retried up to
// `RetryPolicy::max_attempts` times with a linearly growing pause. A 404 is
// not an error at this layer: it maps to `None` so callers can tell "absent"
// apart from "unreachable".

use std::thread::sleep;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, SourceError};
use crate::provider::{ContentProvider, DirEntry};
use crate::repo::{RepoName, Repository};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Pause before the attempt following attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Connection settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub token: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            user_agent: concat!("action-control/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Payload of the contents endpoint: an array for directories, an object for files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Contents {
    Listing(Vec<DirEntry>),
    File(FileContent),
}

#[derive(Debug, Deserialize)]
struct FileContent {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

pub struct GitHubClient {
    http: Client,
    base: Url,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.api_url)
            .map_err(|_| SourceError::InvalidUrl(config.api_url.clone()))?;
        if base.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl(config.api_url));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| SourceError::InvalidToken)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|source| SourceError::Transport {
                url: config.api_url.clone(),
                source,
            })?;

        Ok(Self {
            http,
            base,
            retry: config.retry,
        })
    }

    /// `base` joined with `segments`; each segment is percent-encoded.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn contents_url(&self, repo: &RepoName, path: &str) -> Result<Url> {
        let segments = ["repos", repo.owner(), repo.name(), "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        self.endpoint(segments)
    }

    /// GET with retries. `Ok(None)` on 404.
    fn get(&self, url: &Url) -> Result<Option<Response>> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.http.get(url.clone()).send() {
                Ok(resp) if resp.status().is_success() => return Ok(Some(resp)),
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    debug!(%url, "not found");
                    return Ok(None);
                }
                Ok(resp) => {
                    let status = resp.status();
                    if !is_retryable(status) || attempt >= max_attempts {
                        return Err(SourceError::Http {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                    warn!(%url, %status, attempt, "retrying request");
                }
                Err(source) => {
                    if attempt >= max_attempts {
                        return Err(SourceError::Transport {
                            url: url.to_string(),
                            source,
                        });
                    }
                    warn!(%url, error = %source, attempt, "retrying request");
                }
            }
            sleep(self.retry.delay(attempt));
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<Option<T>> {
        let Some(resp) = self.get(url)? else {
            return Ok(None);
        };
        resp.json::<T>()
            .map(Some)
            .map_err(|source| SourceError::Transport {
                url: url.to_string(),
                source,
            })
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Decode a contents-API file body. The API wraps base64 at 60 columns.
fn decode_content(path: &str, content: Option<&str>, encoding: Option<&str>) -> Result<Vec<u8>> {
    let decode_err = |reason: String| SourceError::Decode {
        path: path.to_string(),
        reason,
    };
    match encoding {
        Some("base64") => {
            let compact: String = content
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            STANDARD
                .decode(compact)
                .map_err(|e| decode_err(e.to_string()))
        }
        Some(other) => Err(decode_err(format!("unsupported encoding '{other}'"))),
        None => Err(decode_err("missing encoding".to_string())),
    }
}

impl ContentProvider for GitHubClient {
    fn list_repositories(&self, org: &str) -> Result<Vec<Repository>> {
        let mut repos = Vec::new();
        let mut page = 1usize;
        loop {
            let mut url = self.endpoint(["orgs", org, "repos"])?;
            url.query_pairs_mut()
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let Some(batch) = self.get_json::<Vec<Repository>>(&url)? else {
                return Err(SourceError::OrganizationNotFound {
                    org: org.to_string(),
                });
            };
            let count = batch.len();
            repos.extend(batch);
            debug!(org, page, count, "listed repositories");
            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(repos)
    }

    fn list_directory(&self, repo: &RepoName, path: &str) -> Result<Option<Vec<DirEntry>>> {
        let url = self.contents_url(repo, path)?;
        match self.get_json::<Contents>(&url)? {
            None => Ok(None),
            Some(Contents::Listing(entries)) => Ok(Some(entries)),
            Some(Contents::File(_)) => Err(SourceError::Decode {
                path: format!("{repo}/{path}"),
                reason: "expected a directory, found a file".to_string(),
            }),
        }
    }

    fn file_content(&self, repo: &RepoName, path: &str) -> Result<Option<Vec<u8>>> {
        let url = self.contents_url(repo, path)?;
        match self.get_json::<Contents>(&url)? {
            None => Ok(None),
            Some(Contents::Listing(_)) => Err(SourceError::Decode {
                path: format!("{repo}/{path}"),
                reason: "expected a file, found a directory".to_string(),
            }),
            Some(Contents::File(file)) => decode_content(
                &format!("{repo}/{path}"),
                file.content.as_deref(),
                file.encoding.as_deref(),
            )
            .map(Some),
        }
    }

    fn name(&self) -> &str {
        "github"
    }
}
