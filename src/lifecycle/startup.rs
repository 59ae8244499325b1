//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last, once tracing is ready (traffic only when ready)

use std::net::SocketAddr;

use opentelemetry_sdk::trace::SdkTracer;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::tls::{load_tls_config, TlsError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid bind address {0:?}")]
    Address(String),

    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Bind the configured listener and serve until `shutdown` triggers.
pub async fn serve(
    config: ServiceConfig,
    tracer: SdkTracer,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    let addr: SocketAddr = config
        .listener
        .bind_address
        .parse()
        .map_err(|_| StartupError::Address(config.listener.bind_address.clone()))?;
    let tls = config.listener.tls.clone();
    let server = HttpServer::new(config, tracer);

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            server
                .run_tls(addr, rustls, shutdown.subscribe())
                .await
                .map_err(StartupError::Serve)
        }
        None => {
            let listener = TcpListener::bind(addr).await.map_err(StartupError::Bind)?;
            server
                .run(listener, shutdown.subscribe())
                .await
                .map_err(StartupError::Serve)
        }
    }
}
