use gha_annotations_core::models::{Repository, Run};
use gha_annotations_github::CheckRunAnnotation;
use opentelemetry_proto::tonic::{
    common::v1::InstrumentationScope,
    logs::v1::{LogsData, ResourceLogs, ScopeLogs},
    resource::v1::Resource,
};

use crate::{mapper::map_annotation, model::string_attribute};

pub const EVENT_DATASET: &str = "github.annotations";

/// Package the annotations of one run into a single batch.
///
/// Returns `None` when there are no annotations, in which case nothing should be sent.
pub fn assemble(
    annotations: &[CheckRunAnnotation],
    repository: &Repository,
    run: &Run,
    service_name: &str,
) -> Option<LogsData> {
    if annotations.is_empty() {
        return None;
    }
    let log_records =
        annotations.iter().map(|a| map_annotation(a, run, repository)).collect::<Vec<_>>();
    Some(LogsData {
        resource_logs: vec![ResourceLogs {
            resource: Some(Resource {
                attributes: vec![
                    string_attribute("service.name", service_name),
                    string_attribute("event.dataset", EVENT_DATASET),
                ],
                ..Default::default()
            }),
            scope_logs: vec![ScopeLogs {
                scope: Some(InstrumentationScope {
                    name: env!("CARGO_PKG_NAME").to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    ..Default::default()
                }),
                log_records,
                ..Default::default()
            }],
            ..Default::default()
        }],
    })
}
