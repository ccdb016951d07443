//! Conversion of workflow annotations into OTLP logs, and their delivery.

pub mod batch;
pub mod consumer;
pub mod delivery;
pub mod exporter;
pub mod mapper;
pub mod model;
pub mod retry;
pub mod trace;

pub use crate::{
    batch::assemble,
    consumer::{ConsumerError, LogsConsumer},
    delivery::{DeliveryOutcome, deliver},
    exporter::OtlpHttpExporter,
    model::LogsDataExt,
    trace::{TraceId, derive_trace_id},
};
pub use opentelemetry_proto::tonic::logs::v1::LogsData;
