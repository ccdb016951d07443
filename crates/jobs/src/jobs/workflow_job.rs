use anyhow::{Result, bail};
use gha_annotations_core::{
    models::{Repository, Run},
    util::service_name,
};
use gha_annotations_github::events::WorkflowJob;
use gha_annotations_logs::{assemble, deliver};
use tracing::Instrument;

use crate::JobContext;

/// Name reported on delivery spans.
pub const PIPELINE: &str = "github_actions";

/// Job to convert the annotations of a completed workflow job into logs.
#[derive(Debug, Clone)]
pub struct ProcessWorkflowJob {
    pub repository: Repository,
    pub run: Run,
    /// The workflow job ID, which doubles as its check run ID.
    pub job_id: u64,
    pub job_name: String,
    pub workflow_name: String,
}

impl ProcessWorkflowJob {
    pub fn new(job: &WorkflowJob, repository: Repository) -> Self {
        Self {
            repository,
            run: Run::from(job),
            job_id: job.id,
            job_name: job.name.clone(),
            workflow_name: job.workflow_name.clone().unwrap_or_default(),
        }
    }
}

/// Fetch, convert and deliver the annotations of one workflow job.
///
/// Returns the number of delivered log records. A job without annotations delivers
/// nothing. Fetch failures and every unsuccessful delivery outcome are errors.
pub async fn process_workflow_job(job: ProcessWorkflowJob, ctx: JobContext) -> Result<usize> {
    let span = tracing::info_span!(
        "workflow_job",
        repository = %job.repository.full_name,
        run_id = job.run.id,
        run_attempt = job.run.run_attempt,
        workflow = %job.workflow_name,
        job = %job.job_name,
    );
    run(job, ctx).instrument(span).await
}

async fn run(job: ProcessWorkflowJob, ctx: JobContext) -> Result<usize> {
    tracing::info!("Processing workflow job {}", job.job_id);

    let ProcessWorkflowJob { repository, run, job_id, .. } = job;
    let annotations = tokio::select! {
        result = ctx.annotations.fetch(&repository.org, &repository.name, job_id) => result?,
        _ = ctx.shutdown.wait() => bail!("Annotation fetch for job {job_id} cancelled by shutdown"),
    };

    let service_name = service_name(&ctx.config.service_name, &repository.full_name);
    let Some(logs) = assemble(&annotations, &repository, &run, &service_name) else {
        tracing::info!("No annotations for job {}", job_id);
        return Ok(0);
    };

    let delivered =
        deliver(ctx.consumer.as_ref(), logs, &ctx.config.retry, ctx.shutdown.wait(), PIPELINE)
            .await
            .into_result()?;
    tracing::info!("Delivered {} annotations for job {}", delivered, job_id);
    Ok(delivered)
}
