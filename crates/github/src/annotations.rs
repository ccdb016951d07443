use anyhow::{Context, Result};
use async_trait::async_trait;
pub use octocrab::params::checks::CheckRunAnnotation;
use octocrab::Page;
use serde::Serialize;

use crate::GitHub;

/// Source of the annotations attached to a workflow job.
#[async_trait]
pub trait AnnotationSource: Send + Sync {
    /// Fetch every annotation for the job, in API order. Fails if any page fails.
    async fn fetch(&self, owner: &str, repo: &str, job_id: u64)
    -> Result<Vec<CheckRunAnnotation>>;
}

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
}

#[async_trait]
impl AnnotationSource for GitHub {
    async fn fetch(
        &self,
        owner: &str,
        repo: &str,
        job_id: u64,
    ) -> Result<Vec<CheckRunAnnotation>> {
        let route = format!("/repos/{owner}/{repo}/check-runs/{job_id}/annotations");
        let mut page: Page<CheckRunAnnotation> = self
            .client
            .get(&route, Some(&PageParams { per_page: 100 }))
            .await
            .with_context(|| format!("Failed to fetch annotations for job {job_id}"))?;
        let mut annotations = page.take_items();
        let mut page_number = 1;
        while page.next.is_some() {
            page_number += 1;
            let next = self.client.get_page::<CheckRunAnnotation>(&page.next).await;
            let Some(mut next) = next.with_context(|| {
                format!("Failed to fetch annotations for job {job_id} (page {page_number})")
            })?
            else {
                break;
            };
            annotations.extend(next.take_items());
            page = next;
        }
        tracing::debug!(
            "Fetched {} annotations for {}/{} job {} ({} pages)",
            annotations.len(),
            owner,
            repo,
            job_id,
            page_number
        );
        Ok(annotations)
    }
}
