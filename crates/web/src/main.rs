mod handlers;

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::FromRef,
    http::{Request, header},
};
use gha_annotations_core::config::Config;
use gha_annotations_github::GitHub;
use gha_annotations_jobs::{JobContext, Shutdown};
use gha_annotations_logs::OtlpHttpExporter;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt,
    trace::{DefaultOnResponse, MakeSpan, TraceLayer},
};
use tracing::{Level, Span};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use crate::handlers::build_router;

#[derive(Clone, FromRef)]
pub struct AppState {
    config: Arc<Config>,
    jobs: JobContext,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config_path =
        std::env::args_os().nth(1).map(PathBuf::from).unwrap_or_else(|| "config.yml".into());
    let config = Arc::new(load_config(&config_path)?);

    let github = GitHub::new(&config.github).await.context("Failed to create GitHub client")?;
    github.log_rate_limit().await?;
    if config.server.webhook_secret.is_none() {
        tracing::warn!("No webhook secret configured, webhook signatures will not be verified");
    }
    let exporter = OtlpHttpExporter::new(&config.exporter, config.batch_size)?;
    tracing::info!("Exporting logs to {}", exporter.url());

    let shutdown = Shutdown::new();
    let state = AppState {
        config: config.clone(),
        jobs: JobContext {
            config: config.clone(),
            annotations: github,
            consumer: Arc::new(exporter),
            shutdown: shutdown.clone(),
        },
    };

    let listener = TcpListener::bind(config.server.address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.address))?;
    tracing::info!("Web server: Listening on {}{}", config.server.address, config.server.path);

    let signal = shutdown.clone();
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Abort retry waits so in-flight handlers can finish.
            signal.trigger();
        })
        .await
        .context("Web server error")?;
    tracing::info!("Shut down gracefully");
    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    let file = File::open(path)
        .map(BufReader::new)
        .with_context(|| format!("Failed to open config file {}", path.display()))?;
    let config: Config = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn app(state: AppState) -> Router {
    let sensitive_headers: Arc<[_]> = vec![header::AUTHORIZATION].into();
    let middleware = ServiceBuilder::new()
        .sensitive_request_headers(sensitive_headers)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(RequestSpan)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );
    build_router(&state.config.server.path).with_state(state).layer(middleware)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => {},
            _ = terminate => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
    tracing::info!("Shutdown signal received");
}

#[derive(Debug, Clone)]
struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let event = request
            .headers()
            .get(gha_annotations_github::webhook::EVENT_TYPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("[none]");
        let delivery =
            request.headers().get("X-GitHub-Delivery").and_then(|v| v.to_str().ok()).unwrap_or("");
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            event = %event,
            delivery = %delivery,
        )
    }
}
