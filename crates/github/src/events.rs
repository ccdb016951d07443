use gha_annotations_core::models::{Repository, Run};
use serde::Deserialize;
use time::OffsetDateTime;

/// The `workflow_job` object of a `workflow_job` webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJob {
    /// Also the ID of the check run holding the job's annotations.
    pub id: u64,
    pub run_id: u64,
    #[serde(default = "default_run_attempt")]
    pub run_attempt: u32,
    #[serde(default)]
    pub run_url: String,
    #[serde(default)]
    pub html_url: Option<String>,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub workflow_name: Option<String>,
    pub name: String,
}

fn default_run_attempt() -> u32 { 1 }

impl From<&WorkflowJob> for Run {
    fn from(job: &WorkflowJob) -> Self {
        Self {
            id: job.run_id,
            run_attempt: job.run_attempt,
            run_started_at: job.started_at,
            url: job.run_url.clone(),
            status: job.status.clone(),
            conclusion: job.conclusion.clone().unwrap_or_default(),
            created_at: job.created_at.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            completed_at: job.completed_at.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            head_branch: job.head_branch.clone().unwrap_or_default(),
        }
    }
}

/// Map the event's repository. Returns `None` if the owner is missing.
pub fn repository_from_event(repository: &octocrab::models::Repository) -> Option<Repository> {
    let org = repository.owner.as_ref()?.login.clone();
    let full_name =
        repository.full_name.clone().unwrap_or_else(|| format!("{}/{}", org, repository.name));
    Some(Repository { full_name, org, name: repository.name.clone() })
}
