//! # gh-mirror service
//!
//! The deployable binary: loads configuration (defaults → file →
//! environment), initializes tracing, wires the pipeline over the
//! in-memory store and the tokio scheduler, spawns the retry and
//! dead-letter sweeps, and serves the HTTP API with graceful shutdown.

use ghmirror_api::{create_router, AppState, ConfigError, ServiceConfig, WebhookSecret};
use ghmirror_core::ingest::EventProcessor;
use ghmirror_core::services::{Services, SystemClock};
use ghmirror_core::store::MemoryStore;
use ghmirror_github::{
    AccessToken, InMemoryTokenResolver, RestGithub, StaticTokenResolver, TokenResolver,
};
use ghmirror_store::{TaskSink, TokioScheduler};
use ghmirror_workflow::{InMemoryWorkflowEngine, StepRetryPolicy};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

pub mod sink;

pub use sink::MirrorTaskSink;

/// Load configuration: serde defaults, then an optional TOML file, then
/// `GHMIRROR__`-prefixed environment variables.
pub fn load_config(file: Option<&str>) -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(file) = file {
        builder = builder.add_source(config::File::with_name(file).required(true));
    } else {
        builder = builder.add_source(config::File::with_name("ghmirror").required(false));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("GHMIRROR")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })?
        .try_deserialize::<ServiceConfig>()
        .map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })?;
    config.validate()?;
    Ok(config)
}

/// Initialize the tracing subscriber from the logging config.
pub fn init_tracing(config: &ServiceConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Build the application state and the scheduler worker for a config.
///
/// Split from [`run`] so tests can wire the service without binding a
/// socket.
pub fn build_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let store = Arc::new(MemoryStore::new());
    let (scheduler, receiver) = TokioScheduler::new();

    let base_url = Url::parse(&ensure_trailing_slash(&config.mirror.github_api_base_url))?;
    let github = Arc::new(RestGithub::new(base_url)?);

    let tokens: Arc<dyn TokenResolver> = match &config.github_token {
        Some(token) => Arc::new(StaticTokenResolver::new(AccessToken::new(token.clone()))),
        None => {
            warn!("no github_token configured; token resolution starts empty");
            Arc::new(InMemoryTokenResolver::new())
        }
    };

    let services = Services {
        store,
        scheduler: Arc::new(scheduler),
        github,
        tokens,
        clock: Arc::new(SystemClock),
        config: config.mirror.clone(),
    };

    let engine = Arc::new(InMemoryWorkflowEngine::new(StepRetryPolicy::default()));
    let state = AppState::new(
        services,
        engine,
        WebhookSecret::new(config.webhook.secret.clone()),
    );

    let task_sink: Arc<dyn TaskSink> = Arc::new(MirrorTaskSink::new(&state));
    TokioScheduler::spawn_worker(receiver, task_sink);

    Ok(state)
}

fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// Spawn the periodic sweeps: retry promotion every 30s, dead-letter
/// graduation every 60s.
pub fn spawn_sweeps(processor: Arc<EventProcessor>) {
    let retry_processor = processor.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            if let Err(err) = retry_processor.run_retry_sweep().await {
                error!(error = %err, "retry sweep failed");
            }
        }
    });
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            if let Err(err) = processor.run_dead_letter_sweep().await {
                error!(error = %err, "dead-letter sweep failed");
            }
        }
    });
}

/// Run the service until shutdown.
pub async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    spawn_sweeps(state.processor.clone());

    let router = create_router(state);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gh-mirror listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("ctrl-c received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
