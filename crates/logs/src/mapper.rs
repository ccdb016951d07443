use gha_annotations_core::models::{Repository, Run};
use gha_annotations_github::CheckRunAnnotation;
use opentelemetry_proto::tonic::{
    common::v1::KeyValue,
    logs::v1::{LogRecord, SeverityNumber},
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    model::{int_attribute, string_attribute, string_value},
    trace::derive_trace_id,
};

/// Normalized form of one annotation before it is attached to a log record.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LogLine {
    pub body: String,
    pub timestamp: OffsetDateTime,
    pub severity_number: SeverityNumber,
    pub severity_text: String,
}

/// Normalize an annotation. Annotations carry no timestamp of their own, so the run's
/// completion time is used.
///
/// The severity number is always left unspecified; the annotation level is kept as the
/// severity text.
pub fn parse_annotation_to_log_line(
    completed_at: OffsetDateTime,
    annotation: &CheckRunAnnotation,
) -> LogLine {
    LogLine {
        body: annotation.message.clone().unwrap_or_default(),
        timestamp: completed_at,
        severity_number: SeverityNumber::Unspecified,
        severity_text: annotation.annotation_level.clone().unwrap_or_default(),
    }
}

/// Build the log record for one annotation of `run`.
pub fn map_annotation(
    annotation: &CheckRunAnnotation,
    run: &Run,
    repository: &Repository,
) -> LogRecord {
    let log_line = parse_annotation_to_log_line(run.completed_at, annotation);
    attach_data(log_line, run, repository, OffsetDateTime::now_utc())
}

pub fn attach_data(
    log_line: LogLine,
    run: &Run,
    repository: &Repository,
    observed_at: OffsetDateTime,
) -> LogRecord {
    let mut attributes = Vec::with_capacity(10);
    attributes.push(string_attribute("github.repository", &repository.full_name));
    attach_run_attributes(&mut attributes, run);
    LogRecord {
        time_unix_nano: unix_nanos(log_line.timestamp),
        observed_time_unix_nano: unix_nanos(observed_at),
        severity_number: log_line.severity_number as i32,
        severity_text: log_line.severity_text,
        body: Some(string_value(log_line.body)),
        attributes,
        trace_id: derive_trace_id(run.id, run.run_attempt).to_vec(),
        ..Default::default()
    }
}

fn attach_run_attributes(attributes: &mut Vec<KeyValue>, run: &Run) {
    attributes.extend([
        int_attribute("github.workflow_run.id", run.id as i64),
        int_attribute("github.workflow_run.run_attempt", run.run_attempt.into()),
        string_attribute("github.workflow_run.conclusion", &run.conclusion),
        string_attribute("github.workflow_run.status", &run.status),
        string_attribute("github.workflow_run.run_started_at", rfc3339(run.run_started_at)),
        string_attribute("github.workflow_run.created_at", rfc3339(run.created_at)),
        string_attribute("github.workflow_run.completed_at", rfc3339(run.completed_at)),
        string_attribute("github.workflow_run.head_branch", &run.head_branch),
        string_attribute("github.workflow_run.html_url", &run.url),
    ]);
}

fn unix_nanos(t: OffsetDateTime) -> u64 { u64::try_from(t.unix_timestamp_nanos()).unwrap_or(0) }

fn rfc3339(t: OffsetDateTime) -> String { t.format(&Rfc3339).unwrap_or_default() }
