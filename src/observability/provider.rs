//! Tracer provider lifecycle.
//!
//! # Responsibilities
//! - Build the OTLP/HTTP span exporter and the batching pipeline
//! - Tag every exported span with the service identity resource
//! - Install the provider as the process-wide default, once
//! - Flush and shut down within a deadline
//!
//! # Design Decisions
//! - The provider is owned by [`Telemetry`] and handed down explicitly; the
//!   global installation only serves code that calls
//!   `opentelemetry::global::tracer`
//! - Reinstalling the global provider is rejected, not supported
//! - Shutdown blocks on a dedicated thread so a stuck collector cannot hold
//!   the caller past its deadline
//! - Spans still open when shutdown starts are not waited for

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{ExporterBuildError, Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::error::OTelSdkError;
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, SdkTracer, SdkTracerProvider,
};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use thiserror::Error;

use crate::config::TracingConfig;

static GLOBAL_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Startup failures. None of them leave a provider installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid collector endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("failed to build span exporter: {0}")]
    Exporter(#[from] ExporterBuildError),

    #[error("a global tracer provider is already installed")]
    AlreadyInstalled,
}

/// Failures while flushing buffered spans at shutdown.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("span flush did not complete within {0:?}")]
    Timeout(Duration),

    #[error("span flush failed: {0}")]
    Flush(#[source] OTelSdkError),

    #[error("could not start shutdown thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("shutdown thread exited without reporting")]
    Aborted,
}

/// Whether a global tracer provider has been installed by this process.
pub fn is_installed() -> bool {
    GLOBAL_INSTALLED.load(Ordering::SeqCst)
}

/// Resource attached to every span exported by this service.
pub fn service_resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attribute(KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")))
        .build()
}

/// Owner of the tracer provider.
///
/// Dropping a `Telemetry` that was never shut down shuts the provider down,
/// so early returns from startup still release the export pipeline.
#[derive(Debug)]
pub struct Telemetry {
    provider: SdkTracerProvider,
    service_name: String,
    shut_down: bool,
}

impl Telemetry {
    /// Build the export pipeline and install it as the global provider.
    pub fn init(config: &TracingConfig) -> Result<Self, TelemetryError> {
        if is_installed() {
            return Err(TelemetryError::AlreadyInstalled);
        }
        let telemetry = Self::build(config)?;
        telemetry.install_global()?;
        Ok(telemetry)
    }

    /// Build the export pipeline without touching global state.
    pub fn build(config: &TracingConfig) -> Result<Self, TelemetryError> {
        let service_name = config.service_name.trim();
        if service_name.is_empty() {
            return Err(TelemetryError::EmptyServiceName);
        }

        let url = config
            .traces_url()
            .map_err(|source| TelemetryError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                source,
            })?;

        let exporter = SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(url.as_str())
            .with_timeout(Duration::from_secs(config.export_timeout_secs))
            .build()?;

        let batch = BatchConfigBuilder::default()
            .with_max_queue_size(config.batch.max_queue_size)
            .with_max_export_batch_size(config.batch.max_export_batch_size)
            .with_scheduled_delay(Duration::from_millis(config.batch.scheduled_delay_ms))
            .build();
        let processor = BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch)
            .build();

        let provider = SdkTracerProvider::builder()
            .with_span_processor(processor)
            .with_resource(service_resource(service_name))
            .build();

        tracing::info!(
            service = service_name,
            endpoint = %url,
            "Span exporter configured"
        );

        Ok(Self::from_provider(provider, service_name))
    }

    /// Wrap an already built provider.
    pub fn from_provider(provider: SdkTracerProvider, service_name: impl Into<String>) -> Self {
        Self {
            provider,
            service_name: service_name.into(),
            shut_down: false,
        }
    }

    /// Install the provider as the process-wide default.
    ///
    /// Only the first installation in a process succeeds.
    pub fn install_global(&self) -> Result<(), TelemetryError> {
        GLOBAL_INSTALLED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| TelemetryError::AlreadyInstalled)?;
        global::set_tracer_provider(self.provider.clone());
        tracing::debug!(service = %self.service_name, "Global tracer provider installed");
        Ok(())
    }

    /// A tracer scoped to the service name.
    pub fn tracer(&self) -> SdkTracer {
        self.provider.tracer(self.service_name.clone())
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Flush buffered spans and release the exporter, waiting at most `deadline`.
    ///
    /// Calling this again after it returned is a no-op. On timeout the flush
    /// keeps running in the background but the caller is released.
    pub fn shutdown(&mut self, deadline: Duration) -> Result<(), ShutdownError> {
        if std::mem::replace(&mut self.shut_down, true) {
            return Ok(());
        }

        let provider = self.provider.clone();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("tracer-shutdown".into())
            .spawn(move || {
                let _ = tx.send(provider.shutdown());
            })
            .map_err(ShutdownError::Spawn)?;

        match rx.recv_timeout(deadline) {
            Ok(Ok(())) => {
                tracing::info!(service = %self.service_name, "Tracer provider shut down");
                Ok(())
            }
            Ok(Err(e)) => Err(ShutdownError::Flush(e)),
            Err(RecvTimeoutError::Timeout) => Err(ShutdownError::Timeout(deadline)),
            Err(RecvTimeoutError::Disconnected) => Err(ShutdownError::Aborted),
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        tracing::warn!(service = %self.service_name, "Telemetry dropped without shutdown");
        self.shut_down = true;
        if let Err(e) = self.provider.shutdown() {
            tracing::error!(error = %e, "Tracer provider shutdown failed");
        }
    }
}
