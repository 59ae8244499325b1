//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, access log, root span, timeout, panics),
//!   outermost first
//! - Serve plain HTTP or TLS until the shutdown signal, then drain

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Extension, Router};
use axum_server::tls_rustls::RustlsConfig;
use opentelemetry_sdk::trace::SdkTracer;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::http::articles::{get_article, welcome};
use crate::observability::{root_span_middleware, RootSpanState, TransportSecurity};

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub tracer: SdkTracer,
}

/// HTTP server for the article service.
pub struct HttpServer {
    config: ServiceConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server whose spans come from `tracer`.
    pub fn new(config: ServiceConfig, tracer: SdkTracer) -> Self {
        Self {
            config,
            state: AppState { tracer },
        }
    }

    /// Router for connections with the given transport security.
    pub fn router(&self, security: TransportSecurity) -> Router {
        let routes = Router::new()
            .route("/", get(welcome))
            .route("/articles", get(get_article));
        Self::build_router(routes, &self.config, self.state.clone(), security)
    }

    /// Wrap `routes` in all middleware layers.
    fn build_router(
        routes: Router<AppState>,
        config: &ServiceConfig,
        state: AppState,
        security: TransportSecurity,
    ) -> Router {
        let root_span = RootSpanState::new(state.tracer.clone());

        routes.with_state(state).layer(
            ServiceBuilder::new()
                .layer(Extension(security))
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(from_fn_with_state(root_span, root_span_middleware))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(config.timeouts.request_secs),
                ))
                .layer(CatchPanicLayer::new()),
        )
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    ///
    /// In-flight requests get `timeouts.drain_secs` to finish.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let drain = Duration::from_secs(self.config.timeouts.drain_secs);
        let draining = Arc::new(Notify::new());
        let app = self.router(TransportSecurity::Plain);

        let server = axum::serve(listener, app).with_graceful_shutdown({
            let draining = draining.clone();
            async move {
                wait_for_trigger(shutdown).await;
                draining.notify_one();
            }
        });

        tokio::select! {
            result = server.into_future() => result?,
            _ = async {
                draining.notified().await;
                tokio::time::sleep(drain).await;
            } => {
                tracing::warn!(drain = ?drain, "Drain period elapsed with requests in flight");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let drain = Duration::from_secs(self.config.timeouts.drain_secs);
        let handle = axum_server::Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                let _ = shutdown.recv().await;
                handle.graceful_shutdown(Some(drain));
            }
        });

        let app = self.router(TransportSecurity::Tls);
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

async fn wait_for_trigger(mut shutdown: broadcast::Receiver<()>) {
    // A closed channel means the coordinator is gone; stop as well.
    let _ = shutdown.recv().await;
}
