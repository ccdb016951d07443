use time::OffsetDateTime;

/// Repository that owns a workflow run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Repository {
    /// `owner/name`
    pub full_name: String,
    pub org: String,
    pub name: String,
}

/// A single attempt of a workflow run, as reported by a `workflow_job` event.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Run {
    pub id: u64,
    pub run_attempt: u32,
    pub run_started_at: OffsetDateTime,
    pub url: String,
    pub status: String,
    /// Empty until the job has completed.
    pub conclusion: String,
    pub created_at: OffsetDateTime,
    /// Unix epoch if the payload carried no completion time.
    pub completed_at: OffsetDateTime,
    pub head_branch: String,
}
