// driver.rs — Per-repository fan-out over a content provider.
//
// A scan resolves the target to a list of repositories, then runs one job per
// repository on a fixed pool of scoped threads draining a shared queue. Each
// worker collects its own results; they are merged into ordered maps after
// every worker has joined, so no map is shared between threads.
//
// Failures are isolated to the repository they happen in. A repository whose
// fetch fails is recorded in `skipped` and left out of the results. For a
// single `owner/repo` target there is nothing left to report, so the failure
// is returned as an error instead.

use std::collections::{BTreeMap, VecDeque};
use std::panic;
use std::sync::{Mutex, PoisonError};

use anyhow::{bail, Context};
use tracing::{debug, info, warn};

use actl_github::{ContentProvider, RepoName, SourceError};
use actl_policy::{check_compliance, merge_repo_policy, ObservedAction, PolicyConfig};

/// What to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Organization(String),
    Repository(RepoName),
}

impl Target {
    /// `repository` wins over `organization` when both are set.
    pub fn from_options(organization: Option<&str>, repository: Option<&str>) -> anyhow::Result<Self> {
        match (non_empty(organization), non_empty(repository)) {
            (_, Some(repo)) => {
                let name = repo
                    .parse::<RepoName>()
                    .context("Invalid repository format. Use 'owner/repo' format.")?;
                Ok(Target::Repository(name))
            }
            (Some(org), None) => Ok(Target::Organization(org.to_string())),
            (None, None) => {
                bail!("Either organization (--org) or specific repository (--repo) must be provided.")
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Organization(org) => write!(f, "{org} organization"),
            Target::Repository(repo) => write!(f, "repository {repo}"),
        }
    }
}

/// A repository left out of the results, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRepo {
    pub repo: String,
    pub reason: String,
}

/// Results of a scan, keyed by `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome<T> {
    pub results: BTreeMap<String, T>,
    pub skipped: Vec<SkippedRepo>,
}

impl<T> Default for ScanOutcome<T> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> ScanOutcome<T> {
    /// Log the repositories that could not be scanned.
    ///
    /// Skipped repositories are absent from every report, so without this a
    /// repository that could not be read looks the same as a clean one.
    pub fn warn_skipped(&self) {
        if self.skipped.is_empty() {
            return;
        }
        for s in &self.skipped {
            debug!(repo = %s.repo, reason = %s.reason, "skipped repository");
        }
        let names: Vec<&str> = self.skipped.iter().map(|s| s.repo.as_str()).collect();
        warn!(
            count = self.skipped.len(),
            "{} repositories could not be scanned and are not included: {}",
            names.len(),
            names.join(", ")
        );
    }
}

/// Result of checking one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCheck {
    pub violations: Vec<String>,
    /// The repository's override file was present but could not be applied.
    pub override_rejected: bool,
}

/// Enforce-specific inputs.
#[derive(Debug, Clone, Copy)]
pub struct EnforceOptions<'a> {
    pub policy: &'a PolicyConfig,
    /// Skip fetching repository override files.
    pub ignore_local_policy: bool,
}

pub struct Driver<'a> {
    provider: &'a dyn ContentProvider,
    workers: usize,
}

impl<'a> Driver<'a> {
    pub fn new(provider: &'a dyn ContentProvider, workers: usize) -> Self {
        Self {
            provider,
            workers: workers.max(1),
        }
    }

    /// Every repository name under `target`.
    fn repositories(&self, target: &Target) -> anyhow::Result<Vec<String>> {
        match target {
            Target::Repository(repo) => Ok(vec![repo.full_name()]),
            Target::Organization(org) => {
                let repos = self
                    .provider
                    .list_repositories(org)
                    .with_context(|| format!("Error retrieving repositories for {org}"))?;
                info!(org = %org, count = repos.len(), provider = self.provider.name(), "listed repositories");
                Ok(repos.into_iter().map(|r| r.full_name).collect())
            }
        }
    }

    /// Run `job` for every repository under `target`.
    fn scan<T, F>(&self, target: &Target, job: F) -> anyhow::Result<ScanOutcome<T>>
    where
        T: Send,
        F: Fn(&RepoName) -> Result<T, SourceError> + Sync,
    {
        let repos = self.repositories(target)?;
        let outcome = run_pool(repos, self.workers, |full_name| {
            let repo: RepoName = full_name.parse()?;
            job(&repo)
        });

        if let (Target::Repository(repo), Some(skipped)) = (target, outcome.skipped.first()) {
            bail!(
                "Error retrieving actions from repository {repo}: {}",
                skipped.reason
            );
        }
        Ok(outcome)
    }

    /// Observed actions of every repository under `target`.
    pub fn collect_actions(
        &self,
        target: &Target,
    ) -> anyhow::Result<ScanOutcome<Vec<ObservedAction>>> {
        self.scan(target, |repo| {
            let actions = self.provider.workflow_actions(repo)?;
            debug!(repo = %repo, actions = actions.len(), "collected actions");
            Ok(actions)
        })
    }

    /// Check every repository under `target` against `options.policy`,
    /// merged with the repository's own override file unless ignored.
    pub fn enforce(
        &self,
        target: &Target,
        options: EnforceOptions<'_>,
    ) -> anyhow::Result<ScanOutcome<RepoCheck>> {
        self.scan(target, |repo| {
            let actions = self.provider.workflow_actions(repo)?;
            let full_name = repo.full_name();
            let (policy, override_rejected) = if options.ignore_local_policy {
                (None, false)
            } else {
                self.repo_policy(repo, options.policy)
            };
            let effective = policy.as_ref().unwrap_or(options.policy);

            let uses: Vec<&str> = actions.iter().map(|a| a.uses.as_str()).collect();
            let report = check_compliance(effective, &full_name, &uses);
            Ok(RepoCheck {
                violations: report.violations,
                override_rejected,
            })
        })
    }

    /// The global policy merged with `repo`'s override file, if it has one.
    ///
    /// Returns `None` when the global policy applies unchanged. An override
    /// that cannot be fetched or parsed is logged and ignored.
    fn repo_policy(&self, repo: &RepoName, global: &PolicyConfig) -> (Option<PolicyConfig>, bool) {
        let content = match self.provider.policy_override(repo) {
            Ok(Some(content)) if !content.is_empty() => content,
            Ok(_) => return (None, false),
            Err(e) => {
                warn!(repo = %repo, error = %e, "could not fetch repository policy file, using global policy");
                return (None, false);
            }
        };
        match merge_repo_policy(global, &content, &repo.full_name()) {
            Ok(merged) => {
                debug!(repo = %repo, "applied repository policy file");
                (Some(merged), false)
            }
            Err(e) => {
                warn!(repo = %repo, error = %e, "Could not parse policy file in repository, using global policy");
                (None, true)
            }
        }
    }
}

/// Run `job` over `repos` on up to `workers` scoped threads.
fn run_pool<T, F>(repos: Vec<String>, workers: usize, job: F) -> ScanOutcome<T>
where
    T: Send,
    F: Fn(&str) -> Result<T, SourceError> + Sync,
{
    let workers = workers.min(repos.len());
    let mut outcome = ScanOutcome::default();
    if workers == 0 {
        return outcome;
    }

    let queue = Mutex::new(VecDeque::from(repos));
    let (queue, job) = (&queue, &job);
    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(scope.spawn(move || {
                let mut local = Vec::new();
                loop {
                    let next = {
                        let mut guard = queue.lock().unwrap_or_else(PoisonError::into_inner);
                        guard.pop_front()
                    };
                    match next {
                        Some(repo) => {
                            let result = job(&repo);
                            local.push((repo, result));
                        }
                        None => break,
                    }
                }
                local
            }));
        }
        for handle in handles {
            match handle.join() {
                Ok(local) => {
                    for (repo, result) in local {
                        match result {
                            Ok(value) => {
                                outcome.results.insert(repo, value);
                            }
                            Err(e) => {
                                warn!(repo = %repo, error = %e, "skipping repository");
                                outcome.skipped.push(SkippedRepo {
                                    repo,
                                    reason: e.to_string(),
                                });
                            }
                        }
                    }
                }
                Err(err) => panic::resume_unwind(err),
            }
        }
    });

    outcome.skipped.sort_by(|a, b| a.repo.cmp(&b.repo));
    outcome
}
