use std::{
    collections::BTreeMap,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::util::duration_str;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Upper bound on the number of records sent downstream per request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub service_name: ServiceNameConfig,
    #[serde(default)]
    pub exporter: ExporterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: SocketAddr,
    /// Route the webhook is served on.
    #[serde(default = "default_path")]
    pub path: String,
    /// Shared secret used to verify `X-Hub-Signature-256`. Verification is skipped when unset.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// Either a personal access token or GitHub App installation credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GitHubConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub app_id: Option<u64>,
    #[serde(default)]
    pub installation_id: Option<u64>,
    /// PEM encoded RSA key, optionally base64 encoded.
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_interval", with = "duration_str")]
    pub initial_interval: Duration,
    #[serde(default = "default_max_interval", with = "duration_str")]
    pub max_interval: Duration,
    #[serde(default = "default_max_elapsed_time", with = "duration_str")]
    pub max_elapsed_time: Duration,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceNameConfig {
    /// Used verbatim, ignoring prefix and suffix.
    #[serde(default)]
    pub custom: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExporterConfig {
    /// Base URL of an OTLP/HTTP collector, without the `/v1/logs` suffix.
    #[serde(default = "default_exporter_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_exporter_timeout", with = "duration_str")]
    pub timeout: Duration,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_address() -> SocketAddr { SocketAddr::from((Ipv4Addr::UNSPECIFIED, 19418)) }

fn default_path() -> String { "/events".to_string() }

fn default_batch_size() -> usize { 10000 }

fn default_initial_interval() -> Duration { Duration::from_secs(5) }

fn default_max_interval() -> Duration { Duration::from_secs(30) }

fn default_max_elapsed_time() -> Duration { Duration::from_secs(300) }

fn default_exporter_endpoint() -> String { "http://localhost:4318".to_string() }

fn default_exporter_timeout() -> Duration { Duration::from_secs(10) }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: default_address(), path: default_path(), webhook_secret: None }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval: default_initial_interval(),
            max_interval: default_max_interval(),
            max_elapsed_time: default_max_elapsed_time(),
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            endpoint: default_exporter_endpoint(),
            timeout: default_exporter_timeout(),
            headers: BTreeMap::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            github: GitHubConfig::default(),
            retry: RetryConfig::default(),
            batch_size: default_batch_size(),
            service_name: ServiceNameConfig::default(),
            exporter: ExporterConfig::default(),
        }
    }
}

impl Config {
    /// Check the configuration for errors, reporting all of them at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if let Err(e) = validate_path(&self.server.path) {
            errors.push(e);
        }
        errors.extend(self.github.validate());
        if self.retry.initial_interval.is_zero() || self.retry.max_interval.is_zero() {
            errors.push("retry intervals must be greater than zero".to_string());
        } else if self.retry.initial_interval > self.retry.max_interval {
            errors.push("retry.initial_interval must not exceed retry.max_interval".to_string());
        }
        if self.batch_size == 0 {
            errors.push("batch_size must be greater than zero".to_string());
        }
        if errors.is_empty() { Ok(()) } else { Err(anyhow!(errors.join("; "))) }
    }
}

impl GitHubConfig {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match (self.token.as_deref(), self.app_id) {
            (None | Some(""), None) => {
                errors.push("either github.token or github.app_id must be set".to_string());
            }
            (_, Some(_)) => {
                if self.installation_id.is_none() {
                    errors.push(
                        "github.installation_id must be set if github.app_id is set".to_string(),
                    );
                }
                if self.private_key.is_none() && self.private_key_path.is_none() {
                    errors.push(
                        "either github.private_key or github.private_key_path must be set if \
                         github.app_id is set"
                            .to_string(),
                    );
                }
            }
            _ => {}
        }
        errors
    }
}

fn validate_path(path: &str) -> Result<(), String> {
    let uri = path
        .parse::<http::Uri>()
        .map_err(|e| format!("path must be a valid URL: parse {path:?}: {e}"))?;
    if uri.scheme().is_some() || uri.authority().is_some() || !path.starts_with('/') {
        return Err(r#"path must be a relative URL. e.g. "/events""#.to_string());
    }
    Ok(())
}
