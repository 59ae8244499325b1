//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration for the article service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Span export settings.
    pub tracing: TracingConfig,

    /// Local log output settings.
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Maximum time to produce a response.
    pub request_secs: u64,

    /// Grace period for in-flight requests once shutdown starts.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            drain_secs: 10,
        }
    }
}

/// OTLP span export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Logical service name, exported as the `service.name` resource attribute.
    pub service_name: String,

    /// Collector endpoint as `host:port`. A full URL is accepted too.
    pub endpoint: String,

    /// Use plain HTTP instead of HTTPS towards the collector.
    pub insecure: bool,

    /// Timeout for a single export request.
    pub export_timeout_secs: u64,

    /// Upper bound for flushing buffered spans at shutdown.
    pub shutdown_timeout_secs: u64,

    /// Batch span processor tuning.
    pub batch: BatchConfig,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "article-service".to_string(),
            endpoint: "localhost:4318".to_string(),
            insecure: true,
            export_timeout_secs: 10,
            shutdown_timeout_secs: 5,
            batch: BatchConfig::default(),
        }
    }
}

impl TracingConfig {
    /// OTLP/HTTP traces URL derived from `endpoint` and `insecure`.
    ///
    /// `localhost:4318` becomes `http://localhost:4318/v1/traces` when
    /// insecure. An endpoint that already carries a scheme keeps it, and an
    /// explicit path other than `/` is left alone.
    pub fn traces_url(&self) -> Result<Url, url::ParseError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(url::ParseError::EmptyHost);
        }

        let raw = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            let scheme = if self.insecure { "http" } else { "https" };
            format!("{scheme}://{endpoint}")
        };

        let mut url = Url::parse(&raw)?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(url::ParseError::EmptyHost);
        }
        if url.path().is_empty() || url.path() == "/" {
            url.set_path("/v1/traces");
        }
        Ok(url)
    }
}

/// Batch span processor settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Spans buffered before new ones are dropped.
    pub max_queue_size: usize,

    /// Spans sent per export request.
    pub max_export_batch_size: usize,

    /// Delay between two scheduled exports.
    pub scheduled_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay_ms: 5000,
        }
    }
}

/// Local log output.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "article_service=info,tower_http=debug".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, one line per event.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}
