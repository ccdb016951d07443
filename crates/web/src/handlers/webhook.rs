use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gha_annotations_core::AppError;
use gha_annotations_github::{
    events::{WorkflowJob, repository_from_event},
    webhook::GitHubEvent,
};
use gha_annotations_jobs::{JobContext, ProcessWorkflowJob, spawn_workflow_job};
use octocrab::models::webhook_events::{
    WebhookEventPayload, payload::WorkflowJobWebhookEventAction,
};

/// Webhook handler that runs the annotation pipeline for completed workflow jobs.
///
/// The pipeline runs on its own task so a disconnecting client does not cancel it; the
/// response is only sent once it finishes.
pub async fn webhook(
    State(jobs): State<JobContext>,
    GitHubEvent { event }: GitHubEvent,
) -> Result<Response, AppError> {
    let WebhookEventPayload::WorkflowJob(inner) = &event.specific else {
        tracing::debug!("Ignoring webhook event {:?}", event.kind);
        return Ok((StatusCode::OK, "Event ignored").into_response());
    };
    if inner.action != WorkflowJobWebhookEventAction::Completed {
        tracing::debug!("Ignoring workflow_job event with action {:?}", inner.action);
        return Ok((StatusCode::OK, "Event ignored").into_response());
    }

    let workflow_job: WorkflowJob = match serde_json::from_value(inner.workflow_job.clone()) {
        Ok(workflow_job) => workflow_job,
        Err(e) => {
            tracing::debug!("Invalid workflow_job payload: {e}");
            return Err(AppError::Rejected(StatusCode::BAD_REQUEST, "Invalid workflow job"));
        }
    };
    let Some(repository) = event.repository.as_ref().and_then(repository_from_event) else {
        return Err(AppError::Rejected(StatusCode::BAD_REQUEST, "Missing repository"));
    };
    tracing::info!(
        "Received completed workflow job {} (run {} attempt {}) from repository {}",
        workflow_job.id,
        workflow_job.run_id,
        workflow_job.run_attempt,
        repository.full_name
    );

    let job = ProcessWorkflowJob::new(&workflow_job, repository);
    let delivered =
        spawn_workflow_job(job, jobs).await.context("Workflow job pipeline panicked")??;
    Ok((StatusCode::OK, format!("Delivered {delivered} annotations")).into_response())
}
