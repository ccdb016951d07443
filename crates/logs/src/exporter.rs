use anyhow::{Context, Result};
use async_trait::async_trait;
use gha_annotations_core::config::ExporterConfig;
use opentelemetry_proto::tonic::logs::v1::LogsData;
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue},
};

use crate::{
    consumer::{ConsumerError, LogsConsumer},
    model::LogsDataExt,
};

/// Sends batches to an OTLP/HTTP collector using the JSON encoding.
#[derive(Debug, Clone)]
pub struct OtlpHttpExporter {
    client: reqwest::Client,
    url: String,
    batch_size: usize,
}

impl OtlpHttpExporter {
    pub fn new(config: &ExporterConfig, batch_size: usize) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid exporter header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for exporter header {name}"))?;
            headers.insert(name, value);
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build exporter HTTP client")?;
        Ok(Self {
            client,
            url: format!("{}/v1/logs", config.endpoint.trim_end_matches('/')),
            batch_size: batch_size.max(1),
        })
    }

    pub fn url(&self) -> &str { &self.url }

    async fn send(&self, logs: &LogsData) -> Result<(), ConsumerError> {
        let response =
            self.client.post(&self.url).json(logs).send().await.map_err(ConsumerError::transient)?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(records = logs.log_record_count(), "Exported log records");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let message = format!("collector responded with {status}: {}", body.trim());
        if is_retryable(status) {
            Err(ConsumerError::transient(message))
        } else {
            Err(ConsumerError::permanent(message))
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[async_trait]
impl LogsConsumer for OtlpHttpExporter {
    async fn consume(&self, logs: &LogsData) -> Result<(), ConsumerError> {
        if logs.log_record_count() <= self.batch_size {
            return self.send(logs).await;
        }
        let mut chunks = logs.clone().split(self.batch_size).into_iter();
        let mut sent = 0;
        while let Some(chunk) = chunks.next() {
            let Err(error) = self.send(&chunk).await else {
                sent += 1;
                continue;
            };
            if sent == 0 {
                return Err(error);
            }
            // Earlier chunks were accepted, report only the remainder.
            let residue = LogsData::merge(std::iter::once(chunk).chain(chunks));
            tracing::debug!(sent, remaining = residue.log_record_count(), "Partial export failure");
            return Err(match error {
                ConsumerError::Transient { source, .. } => ConsumerError::partial(source, residue),
                ConsumerError::Permanent { source, .. } => {
                    ConsumerError::partial_permanent(source, residue)
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeMap, VecDeque},
        net::{Ipv4Addr, SocketAddr},
        sync::{Arc, Mutex},
        time::Duration,
    };

    use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
    use opentelemetry_proto::tonic::{
        common::v1::any_value::Value,
        logs::v1::{LogRecord, ResourceLogs, ScopeLogs},
    };
    use tokio::net::TcpListener;

    use super::*;
    use crate::model::string_value;

    #[derive(Clone, Default)]
    struct Collector {
        statuses: Arc<Mutex<VecDeque<StatusCode>>>,
        received: Arc<Mutex<Vec<usize>>>,
        api_keys: Arc<Mutex<Vec<String>>>,
    }

    async fn receive(
        State(collector): State<Collector>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        let records = body["resourceLogs"]
            .as_array()
            .into_iter()
            .flatten()
            .flat_map(|r| r["scopeLogs"].as_array().into_iter().flatten())
            .map(|s| s["logRecords"].as_array().map_or(0, Vec::len))
            .sum();
        collector.received.lock().unwrap().push(records);
        if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
            collector.api_keys.lock().unwrap().push(key.to_string());
        }
        collector.statuses.lock().unwrap().pop_front().unwrap_or(StatusCode::OK)
    }

    async fn serve(statuses: impl IntoIterator<Item = StatusCode>) -> (ExporterConfig, Collector) {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let collector = Collector {
            statuses: Arc::new(Mutex::new(statuses.into_iter().collect())),
            ..Default::default()
        };
        let router = Router::new().route("/v1/logs", post(receive)).with_state(collector.clone());
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        let config = ExporterConfig {
            endpoint: format!("http://{addr}/"),
            timeout: Duration::from_secs(5),
            headers: BTreeMap::from([("x-api-key".to_string(), "secret".to_string())]),
        };
        (config, collector)
    }

    fn logs(count: usize) -> LogsData {
        LogsData {
            resource_logs: vec![ResourceLogs {
                scope_logs: vec![ScopeLogs {
                    log_records: (0..count)
                        .map(|i| LogRecord {
                            time_unix_nano: 1,
                            observed_time_unix_nano: 2,
                            body: Some(string_value(i.to_string())),
                            trace_id: vec![7; 16],
                            ..Default::default()
                        })
                        .collect(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_export() {
        let (config, collector) = serve([]).await;
        let exporter = OtlpHttpExporter::new(&config, 100).unwrap();
        assert_eq!(exporter.url(), format!("{}v1/logs", config.endpoint));
        exporter.consume(&logs(3)).await.unwrap();
        assert_eq!(*collector.received.lock().unwrap(), [3]);
        assert_eq!(*collector.api_keys.lock().unwrap(), ["secret"]);
    }

    #[tokio::test]
    async fn test_chunked_export() {
        let (config, collector) = serve([]).await;
        let exporter = OtlpHttpExporter::new(&config, 2).unwrap();
        exporter.consume(&logs(5)).await.unwrap();
        assert_eq!(*collector.received.lock().unwrap(), [2, 2, 1]);
    }

    #[tokio::test]
    async fn test_error_classification() {
        let (config, _) = serve([
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_REQUEST,
        ])
        .await;
        let exporter = OtlpHttpExporter::new(&config, 100).unwrap();
        let err = exporter.consume(&logs(1)).await.unwrap_err();
        assert!(!err.is_permanent(), "{err}");
        let err = exporter.consume(&logs(1)).await.unwrap_err();
        assert!(!err.is_permanent(), "{err}");
        let err = exporter.consume(&logs(1)).await.unwrap_err();
        assert!(err.is_permanent(), "{err}");
        assert!(err.to_string().contains("400 Bad Request"), "{err}");
    }

    fn bodies(logs: &LogsData) -> Vec<&str> {
        logs.log_records()
            .filter_map(|r| match r.body.as_ref()?.value.as_ref()? {
                Value::StringValue(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_partial_failure_residue() {
        let (config, collector) = serve([StatusCode::OK, StatusCode::BAD_GATEWAY]).await;
        let exporter = OtlpHttpExporter::new(&config, 2).unwrap();
        let mut err = exporter.consume(&logs(5)).await.unwrap_err();
        assert!(!err.is_permanent());
        let residue = err.take_residue().unwrap();
        assert_eq!(bodies(&residue), ["2", "3", "4"]);
        assert_eq!(*collector.received.lock().unwrap(), [2, 2]);
    }

    #[tokio::test]
    async fn test_partial_permanent_failure_residue() {
        let (config, collector) = serve([StatusCode::OK, StatusCode::BAD_REQUEST]).await;
        let exporter = OtlpHttpExporter::new(&config, 2).unwrap();
        let mut err = exporter.consume(&logs(5)).await.unwrap_err();
        assert!(err.is_permanent(), "{err}");
        let residue = err.take_residue().unwrap();
        assert_eq!(bodies(&residue), ["2", "3", "4"]);
        // The chunk after the rejected one is never sent.
        assert_eq!(*collector.received.lock().unwrap(), [2, 2]);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let config = ExporterConfig { endpoint: format!("http://{addr}"), ..Default::default() };
        let exporter = OtlpHttpExporter::new(&config, 100).unwrap();
        let mut err = exporter.consume(&logs(1)).await.unwrap_err();
        assert!(!err.is_permanent());
        assert!(err.take_residue().is_none());
    }

    #[test]
    fn test_invalid_header() {
        let config = ExporterConfig {
            headers: BTreeMap::from([("bad header".to_string(), "x".to_string())]),
            ..Default::default()
        };
        let err = OtlpHttpExporter::new(&config, 1).unwrap_err();
        assert_eq!(err.to_string(), "Invalid exporter header name \"bad header\"");
    }
}
