use async_trait::async_trait;
use opentelemetry_proto::tonic::logs::v1::LogsData;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Downstream receiver of log batches.
#[async_trait]
pub trait LogsConsumer: Send + Sync {
    async fn consume(&self, logs: &LogsData) -> Result<(), ConsumerError>;
}

/// `residue` holds the records that were not accepted when only part of the batch
/// failed; `None` means the whole batch.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The data can never be accepted and must be dropped.
    #[error("permanent error: {source}")]
    Permanent {
        #[source]
        source: BoxError,
        residue: Option<LogsData>,
    },
    /// A later attempt may succeed.
    #[error("{source}")]
    Transient {
        #[source]
        source: BoxError,
        residue: Option<LogsData>,
    },
}

impl ConsumerError {
    pub fn permanent(source: impl Into<BoxError>) -> Self {
        Self::Permanent { source: source.into(), residue: None }
    }

    pub fn transient(source: impl Into<BoxError>) -> Self {
        Self::Transient { source: source.into(), residue: None }
    }

    /// Transient failure of part of a batch. Only `residue` needs to be sent again.
    pub fn partial(source: impl Into<BoxError>, residue: LogsData) -> Self {
        Self::Transient { source: source.into(), residue: Some(residue) }
    }

    /// Permanent failure of part of a batch. Only `residue` was rejected.
    pub fn partial_permanent(source: impl Into<BoxError>, residue: LogsData) -> Self {
        Self::Permanent { source: source.into(), residue: Some(residue) }
    }

    pub fn is_permanent(&self) -> bool { matches!(self, Self::Permanent { .. }) }

    /// Detach the unaccepted residue, if any.
    pub fn take_residue(&mut self) -> Option<LogsData> {
        match self {
            Self::Transient { residue, .. } | Self::Permanent { residue, .. } => residue.take(),
        }
    }
}
