//! Article Service
//!
//! Serves a single article over HTTP and traces every request with
//! OpenTelemetry.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                   ARTICLE SERVICE                    │
//!                     │                                                      │
//!   Client Request    │  ┌──────────┐   ┌───────────┐   ┌────────────────┐   │
//!   ──────────────────┼─▶│ request  │──▶│ root span │──▶│ axum routing   │   │
//!                     │  │ id + log │   │ middleware│   │ / and /articles│   │
//!                     │  └──────────┘   └─────┬─────┘   └───────┬────────┘   │
//!                     │                       │ context         │ child span │
//!                     │                       ▼                 ▼            │
//!                     │               ┌───────────────────────────────┐      │
//!                     │               │  tracer provider (batching)   │──────┼──▶ OTLP/HTTP
//!                     │               └───────────────────────────────┘      │    collector
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use opentelemetry_sdk::trace::SdkTracer;

use article_service::config::{load_config, validate_config, ConfigError, ServiceConfig};
use article_service::lifecycle::{self, signals::wait_for_signal, Shutdown, StartupError};
use article_service::observability::logging::init_logging;
use article_service::Telemetry;

#[derive(Parser, Debug)]
#[command(name = "article-service")]
#[command(about = "Article API with OpenTelemetry tracing", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listener address, overrides `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Collector `host:port`, overrides `tracing.endpoint`.
    #[arg(long)]
    otlp_endpoint: Option<String>,

    /// Export spans over HTTPS.
    #[arg(long)]
    otlp_tls: bool,
}

fn load(cli: &Cli) -> Result<ServiceConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(endpoint) = &cli.otlp_endpoint {
        config.tracing.endpoint = endpoint.clone();
    }
    if cli.otlp_tls {
        config.tracing.insecure = false;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    init_logging(&config.logging)?;
    tracing::info!("article-service v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        service = %config.tracing.service_name,
        collector = %config.tracing.endpoint,
        "Configuration loaded"
    );

    // No traffic is served unless tracing is fully installed.
    let mut telemetry = Telemetry::init(&config.tracing).inspect_err(|e| {
        tracing::error!(error = %e, "Tracing initialization failed");
    })?;
    let flush_deadline = Duration::from_secs(config.tracing.shutdown_timeout_secs);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(run(config, telemetry.tracer()));
    drop(runtime);

    if let Err(e) = telemetry.shutdown(flush_deadline) {
        tracing::error!(error = %e, "Span flush at shutdown failed");
    }

    served.inspect_err(|e| tracing::error!(error = %e, "Server failed"))?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run(config: ServiceConfig, tracer: SdkTracer) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    let server = lifecycle::serve(config, tracer, &shutdown);
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        signal = wait_for_signal() => {
            if let Err(e) = signal {
                tracing::error!(error = %e, "Signal handler failed, shutting down");
            }
        }
    }

    shutdown.trigger();
    server.await
}
