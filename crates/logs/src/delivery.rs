use std::time::Duration;

use backoff::backoff::Backoff;
use gha_annotations_core::config::RetryConfig;
use opentelemetry_proto::tonic::logs::v1::LogsData;
use thiserror::Error;
use tracing::{Instrument, field};

use crate::{
    consumer::{ConsumerError, LogsConsumer},
    model::LogsDataExt,
    retry::exponential_backoff,
};

#[derive(Debug, Error)]
pub enum Cancelled {
    /// Shutdown arrived while waiting to retry. Wraps the last delivery error.
    #[error("interrupted due to shutdown: {0}")]
    Waiting(#[source] ConsumerError),
    #[error("interrupted due to shutdown during a delivery attempt")]
    InFlight,
}

#[derive(Debug)]
pub enum DeliveryOutcome {
    Succeeded { delivered: usize, attempts: u32 },
    PermanentlyFailed { dropped: usize, attempts: u32, error: ConsumerError },
    Exhausted { dropped: usize, attempts: u32, error: ConsumerError },
    Cancelled { dropped: usize, attempts: u32, error: Cancelled },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::PermanentlyFailed { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool { matches!(self, Self::Succeeded { .. }) }

    /// Delivered record count, or the terminal error.
    pub fn into_result(self) -> anyhow::Result<usize> {
        match self {
            Self::Succeeded { delivered, .. } => Ok(delivered),
            Self::PermanentlyFailed { dropped, error, .. } => Err(anyhow::Error::new(error)
                .context(format!("Not retrying permanent error, dropped {dropped} log records"))),
            Self::Exhausted { dropped, attempts, error } => Err(anyhow::Error::new(error)
                .context(format!(
                    "No more retries left after {attempts} attempts, dropped {dropped} log records"
                ))),
            Self::Cancelled { dropped, error, .. } => Err(anyhow::Error::new(error)
                .context(format!("Delivery cancelled, dropped {dropped} log records"))),
        }
    }

    fn records(&self) -> usize {
        match self {
            Self::Succeeded { delivered: n, .. }
            | Self::PermanentlyFailed { dropped: n, .. }
            | Self::Exhausted { dropped: n, .. }
            | Self::Cancelled { dropped: n, .. } => *n,
        }
    }

    fn error(&self) -> Option<String> {
        match self {
            Self::Succeeded { .. } => None,
            Self::PermanentlyFailed { error, .. } | Self::Exhausted { error, .. } => {
                Some(error.to_string())
            }
            Self::Cancelled { error, .. } => Some(error.to_string()),
        }
    }
}

enum State {
    Attempting,
    Retrying { delay: Duration, error: ConsumerError },
    Done(DeliveryOutcome),
}

/// Push `logs` to `consumer`, retrying transient failures with exponential backoff.
///
/// Only `shutdown` can interrupt a delivery attempt or a backoff wait. Retryable errors
/// never escape; the terminal state is reported as a [`DeliveryOutcome`].
pub async fn deliver<F>(
    consumer: &dyn LogsConsumer,
    logs: LogsData,
    retry: &RetryConfig,
    shutdown: F,
    pipeline: &str,
) -> DeliveryOutcome
where
    F: Future<Output = ()>,
{
    let span = tracing::info_span!(
        "deliver",
        pipeline,
        records = logs.log_record_count(),
        error = field::Empty
    );
    let outcome = run(consumer, logs, retry, shutdown).instrument(span.clone()).await;
    span.record("records", outcome.records());
    if let Some(error) = outcome.error() {
        span.record("error", error.as_str());
    }
    outcome
}

async fn run<F>(
    consumer: &dyn LogsConsumer,
    mut logs: LogsData,
    retry: &RetryConfig,
    shutdown: F,
) -> DeliveryOutcome
where
    F: Future<Output = ()>,
{
    let mut shutdown = std::pin::pin!(shutdown);
    let mut backoff = exponential_backoff(retry);
    let total = logs.log_record_count();
    let mut attempts = 0;
    let mut state = State::Attempting;
    loop {
        state = match state {
            State::Attempting => {
                attempts += 1;
                tokio::select! {
                    result = consumer.consume(&logs) => match result {
                        Ok(()) => {
                            tracing::debug!(attempts, records = total, "Delivered log records");
                            State::Done(DeliveryOutcome::Succeeded { delivered: total, attempts })
                        }
                        Err(mut error) if error.is_permanent() => {
                            let dropped = error
                                .take_residue()
                                .map_or_else(|| logs.log_record_count(), |r| r.log_record_count());
                            tracing::error!(%error, dropped, "Not retrying permanent error");
                            let outcome =
                                DeliveryOutcome::PermanentlyFailed { dropped, attempts, error };
                            State::Done(outcome)
                        }
                        Err(mut error) => {
                            if let Some(residue) = error.take_residue() {
                                logs = residue;
                            }
                            match backoff.next_backoff() {
                                Some(delay) => State::Retrying { delay, error },
                                None => {
                                    let dropped = logs.log_record_count();
                                    tracing::error!(
                                        %error,
                                        attempts,
                                        dropped,
                                        "No more retries left"
                                    );
                                    let outcome =
                                        DeliveryOutcome::Exhausted { dropped, attempts, error };
                                    State::Done(outcome)
                                }
                            }
                        }
                    },
                    _ = shutdown.as_mut() => {
                        let dropped = logs.log_record_count();
                        tracing::warn!(dropped, "Delivery attempt interrupted by shutdown");
                        State::Done(DeliveryOutcome::Cancelled {
                            dropped,
                            attempts,
                            error: Cancelled::InFlight,
                        })
                    }
                }
            }
            State::Retrying { delay, error } => {
                tracing::warn!(
                    %error,
                    attempts,
                    interval = ?delay,
                    "Delivery failed, will retry"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => State::Attempting,
                    _ = shutdown.as_mut() => {
                        let dropped = logs.log_record_count();
                        tracing::warn!(dropped, "Retry wait interrupted by shutdown");
                        State::Done(DeliveryOutcome::Cancelled {
                            dropped,
                            attempts,
                            error: Cancelled::Waiting(error),
                        })
                    }
                }
            }
            State::Done(outcome) => return outcome,
        };
    }
}
