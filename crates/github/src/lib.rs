pub mod annotations;
pub mod events;
pub mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use gha_annotations_core::config::GitHubConfig;
use octocrab::{Octocrab, models::RateLimit};
use time::OffsetDateTime;

pub use crate::annotations::{AnnotationSource, CheckRunAnnotation};

#[derive(Clone)]
pub struct GitHub {
    pub client: Octocrab,
}

impl GitHub {
    /// Create a client authenticated either with a personal access token or as a
    /// GitHub App installation.
    pub async fn new(config: &GitHubConfig) -> Result<Arc<Self>> {
        let client = if let Some(app_id) = config.app_id {
            let private_key = load_private_key(config).await?;
            let key = jsonwebtoken::EncodingKey::from_rsa_pem(&private_key)
                .context("Failed to parse private key")?;
            let app_client = Octocrab::builder()
                .app(app_id.into(), key)
                .build()
                .context("Failed to create GitHub app client")?;
            let installation_id =
                config.installation_id.context("github.installation_id is not set")?;
            app_client
                .installation(installation_id.into())
                .context("Failed to create GitHub installation client")?
        } else {
            let token = config.token.clone().context("github.token is not set")?;
            Octocrab::builder()
                .personal_token(token)
                .build()
                .context("Failed to create GitHub client")?
        };
        Ok(Arc::new(Self { client }))
    }

    /// Query the API once and log the current rate limit.
    pub async fn log_rate_limit(&self) -> Result<()> {
        let RateLimit { resources, .. } =
            self.client.ratelimit().get().await.context("Failed to fetch rate limit")?;
        let core = resources.core;
        let reset = i64::try_from(core.reset)
            .ok()
            .and_then(|reset| OffsetDateTime::from_unix_timestamp(reset).ok())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        tracing::info!(
            limit = core.limit,
            remaining = core.remaining,
            reset = %reset,
            "GitHub API rate limit"
        );
        Ok(())
    }
}

/// The configured key may be base64 encoded PEM, plain PEM, or a path to a PEM file.
async fn load_private_key(config: &GitHubConfig) -> Result<Vec<u8>> {
    if let Some(private_key) = config.private_key.as_deref().filter(|k| !k.is_empty()) {
        return Ok(STANDARD
            .decode(private_key.trim())
            .unwrap_or_else(|_| private_key.as_bytes().to_vec()));
    }
    let path = config.private_key_path.as_ref().context("github.private_key is not set")?;
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read private key {}", path.display()))
}
