// workflow.rs — Extract `uses:` references from a workflow definition.
//
// Two places reference actions in a workflow:
//   jobs.<id>.uses          a reusable workflow call (job level)
//   jobs.<id>.steps[].uses  an action used by a step
//
// Only the fields we read are modelled; everything else in the file is
// ignored. A file whose jobs/steps don't have the expected shape is rejected
// as a whole so a broken workflow is reported rather than half-read.

use serde::Deserialize;

use actl_policy::ObservedAction;

use crate::error::{Result, SourceError};

#[derive(Debug, Deserialize)]
struct Workflow {
    #[serde(default)]
    name: Option<String>,
    /// Kept as a mapping so jobs are visited in document order.
    #[serde(default)]
    jobs: Option<serde_yaml::Mapping>,
}

#[derive(Debug, Deserialize)]
struct Job {
    #[serde(default)]
    uses: Option<String>,
    #[serde(default)]
    steps: Option<Vec<Step>>,
}

#[derive(Debug, Deserialize)]
struct Step {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    uses: Option<String>,
}

/// Parse one workflow file and return its action references in document order.
///
/// Job-level calls are labelled `"<workflow name> (job: <job id>)"`; step
/// references carry the step's `name`, or an empty string.
pub fn extract_actions(content: &[u8], file_name: &str) -> Result<Vec<ObservedAction>> {
    let parse_err = |source| SourceError::Workflow {
        file: file_name.to_string(),
        source,
    };

    let value: serde_yaml::Value = serde_yaml::from_slice(content).map_err(parse_err)?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    let workflow: Workflow = serde_yaml::from_value(value).map_err(parse_err)?;
    let workflow_name = workflow.name.unwrap_or_default();

    let mut actions = Vec::new();
    for (job_id, job_value) in workflow.jobs.unwrap_or_default() {
        if job_value.is_null() {
            continue;
        }
        let job_id = match &job_id {
            serde_yaml::Value::String(s) => s.clone(),
            other => serde_yaml::to_string(other)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        };
        let job: Job = serde_yaml::from_value(job_value).map_err(parse_err)?;

        if let Some(uses) = job.uses {
            actions.push(ObservedAction::new(
                format!("{workflow_name} (job: {job_id})"),
                uses,
            ));
        }
        for step in job.steps.unwrap_or_default() {
            if let Some(uses) = step.uses {
                actions.push(ObservedAction::new(step.name.unwrap_or_default(), uses));
            }
        }
    }

    Ok(actions)
}

/// Whether a directory entry looks like a workflow definition.
pub fn is_workflow_file(file_name: &str) -> bool {
    file_name.ends_with(".yml") || file_name.ends_with(".yaml")
}
