//! Helpers over the generated OTLP log types.

use opentelemetry_proto::tonic::{
    common::v1::{AnyValue, KeyValue, any_value::Value},
    logs::v1::{LogRecord, LogsData, ResourceLogs, ScopeLogs},
};

pub fn string_value(value: impl Into<String>) -> AnyValue {
    AnyValue { value: Some(Value::StringValue(value.into())) }
}

pub fn string_attribute(key: &str, value: impl Into<String>) -> KeyValue {
    KeyValue { key: key.to_string(), value: Some(string_value(value)) }
}

pub fn int_attribute(key: &str, value: i64) -> KeyValue {
    KeyValue { key: key.to_string(), value: Some(AnyValue { value: Some(Value::IntValue(value)) }) }
}

/// Look up an attribute by key.
pub fn attribute<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a Value> {
    attributes.iter().find(|kv| kv.key == key)?.value.as_ref()?.value.as_ref()
}

pub trait LogsDataExt: Sized {
    fn log_record_count(&self) -> usize;

    fn log_records(&self) -> impl Iterator<Item = &LogRecord>;

    /// Split into consecutive batches of at most `max_records` records each, keeping
    /// the resource and scope of every record. Record order is preserved.
    fn split(self, max_records: usize) -> Vec<Self>;

    /// Concatenate batches, merging records that share a resource and scope.
    fn merge(batches: impl IntoIterator<Item = Self>) -> Self;
}

impl LogsDataExt for LogsData {
    fn log_record_count(&self) -> usize {
        self.resource_logs
            .iter()
            .flat_map(|r| &r.scope_logs)
            .map(|s| s.log_records.len())
            .sum()
    }

    fn log_records(&self) -> impl Iterator<Item = &LogRecord> {
        self.resource_logs.iter().flat_map(|r| &r.scope_logs).flat_map(|s| &s.log_records)
    }

    fn split(self, max_records: usize) -> Vec<LogsData> {
        let max_records = max_records.max(1);
        let mut out = Vec::new();
        let mut current = LogsData::default();
        let mut count = 0;
        for mut resource_logs in self.resource_logs {
            for mut scope_logs in std::mem::take(&mut resource_logs.scope_logs) {
                let records = std::mem::take(&mut scope_logs.log_records);
                let mut records = records.into_iter().peekable();
                while records.peek().is_some() {
                    if count == max_records {
                        out.push(std::mem::take(&mut current));
                        count = 0;
                    }
                    let chunk =
                        records.by_ref().take(max_records - count).collect::<Vec<LogRecord>>();
                    count += chunk.len();
                    push(&mut current, &resource_logs, &scope_logs, chunk);
                }
            }
        }
        if count > 0 {
            out.push(current);
        }
        out
    }

    fn merge(batches: impl IntoIterator<Item = LogsData>) -> LogsData {
        let mut out = LogsData::default();
        for batch in batches {
            for mut resource_logs in batch.resource_logs {
                for mut scope_logs in std::mem::take(&mut resource_logs.scope_logs) {
                    let records = std::mem::take(&mut scope_logs.log_records);
                    push(&mut out, &resource_logs, &scope_logs, records);
                }
            }
        }
        out
    }
}

/// Append `records` under the resource and scope of the given (emptied) headers, reusing
/// the trailing entries when they match.
fn push(out: &mut LogsData, resource: &ResourceLogs, scope: &ScopeLogs, records: Vec<LogRecord>) {
    let Some(last) = out.resource_logs.last_mut().filter(|last| {
        last.resource == resource.resource && last.schema_url == resource.schema_url
    }) else {
        out.resource_logs.push(ResourceLogs {
            scope_logs: vec![ScopeLogs { log_records: records, ..scope.clone() }],
            ..resource.clone()
        });
        return;
    };
    match last
        .scope_logs
        .last_mut()
        .filter(|s| s.scope == scope.scope && s.schema_url == scope.schema_url)
    {
        Some(existing) => existing.log_records.extend(records),
        None => last.scope_logs.push(ScopeLogs { log_records: records, ..scope.clone() }),
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry_proto::tonic::{
        common::v1::InstrumentationScope, logs::v1::SeverityNumber, resource::v1::Resource,
    };

    use super::*;

    fn record(body: &str) -> LogRecord {
        LogRecord {
            time_unix_nano: 1_700_000_000_000_000_000,
            observed_time_unix_nano: 1_700_000_000_000_000_001,
            severity_number: SeverityNumber::Unspecified as i32,
            severity_text: "warning".to_string(),
            body: Some(string_value(body)),
            attributes: vec![int_attribute("github.workflow_run.id", 42)],
            trace_id: vec![0xab; 16],
            ..Default::default()
        }
    }

    fn logs(resources: &[(&str, &[&str])]) -> LogsData {
        LogsData {
            resource_logs: resources
                .iter()
                .map(|(service, bodies)| ResourceLogs {
                    resource: Some(Resource {
                        attributes: vec![string_attribute("service.name", *service)],
                        ..Default::default()
                    }),
                    scope_logs: vec![ScopeLogs {
                        scope: Some(InstrumentationScope {
                            name: "annotations".to_string(),
                            ..Default::default()
                        }),
                        log_records: bodies.iter().map(|b| record(b)).collect(),
                        ..Default::default()
                    }],
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn bodies(logs: &LogsData) -> Vec<&str> {
        logs.log_records()
            .filter_map(|r| match r.body.as_ref()?.value.as_ref()? {
                Value::StringValue(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_split() {
        let batch = logs(&[("a", &["1", "2", "3"]), ("b", &["4", "5"])]);
        let chunks = batch.clone().split(2);
        assert_eq!(chunks.iter().map(bodies).collect::<Vec<_>>(), [
            vec!["1", "2"],
            vec!["3", "4"],
            vec!["5"]
        ]);
        // The middle chunk spans both resources.
        assert_eq!(chunks[1].resource_logs.len(), 2);
        assert_eq!(LogsData::merge(chunks), batch);
    }

    #[test]
    fn test_split_larger_than_batch() {
        let batch = logs(&[("a", &["1", "2"])]);
        let chunks = batch.clone().split(10);
        assert_eq!(chunks, [batch]);
        assert!(LogsData::default().split(10).is_empty());
    }

    #[test]
    fn test_attribute() {
        let attributes =
            [string_attribute("github.repository", "acme/widgets"), int_attribute("id", 7)];
        assert_eq!(
            attribute(&attributes, "github.repository"),
            Some(&Value::StringValue("acme/widgets".to_string()))
        );
        assert_eq!(attribute(&attributes, "id"), Some(&Value::IntValue(7)));
        assert_eq!(attribute(&attributes, "missing"), None);
    }

    #[test]
    fn test_json_encoding() {
        let value = serde_json::to_value(logs(&[("a", &["hello"])])).unwrap();
        let record = &value["resourceLogs"][0]["scopeLogs"][0]["logRecords"][0];
        assert_eq!(record["timeUnixNano"], "1700000000000000000");
        assert_eq!(record["severityText"], "warning");
        assert_eq!(record["body"]["stringValue"], "hello");
        assert_eq!(record["traceId"], "abababababababababababababababab");
        assert_eq!(
            value["resourceLogs"][0]["resource"]["attributes"][0]["value"]["stringValue"],
            "a"
        );
    }
}
