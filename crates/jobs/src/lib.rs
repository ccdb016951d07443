mod jobs;

use std::sync::Arc;

use anyhow::Result;
use gha_annotations_core::config::Config;
use gha_annotations_github::AnnotationSource;
use gha_annotations_logs::LogsConsumer;
pub use jobs::{PIPELINE, ProcessWorkflowJob, process_workflow_job};
use tokio::{sync::watch, task::JoinHandle};

/// Shared context available to all pipeline runs.
#[derive(Clone)]
pub struct JobContext {
    pub config: Arc<Config>,
    pub annotations: Arc<dyn AnnotationSource>,
    pub consumer: Arc<dyn LogsConsumer>,
    pub shutdown: Shutdown,
}

/// Process-wide shutdown signal. Clones observe the same signal.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self { Self::new() }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn trigger(&self) { self.tx.send_replace(true); }

    pub fn is_triggered(&self) -> bool { *self.rx.borrow() }

    /// Resolves once [`trigger`](Self::trigger) has been called on any clone.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this can't fail.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

/// Run the pipeline for `job` on its own task.
///
/// The task is detached from the caller: dropping the handle does not cancel it. Only the
/// context's [`Shutdown`] can cut it short.
pub fn spawn_workflow_job(job: ProcessWorkflowJob, ctx: JobContext) -> JoinHandle<Result<usize>> {
    tokio::spawn(process_workflow_job(job, ctx))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_shutdown() {
        let shutdown = Shutdown::new();
        let clone = shutdown.clone();
        assert!(!clone.is_triggered());
        let waiter = tokio::spawn(async move { clone.wait().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        shutdown.trigger();
        waiter.await.unwrap();
        assert!(shutdown.is_triggered());
        // Waiting after the fact resolves immediately.
        shutdown.wait().await;
    }
}
