//! Process-wide installation of the tracer provider.
//!
//! Kept in its own test binary with a single test: the global provider can
//! be installed once per process.

use std::time::Duration;

use article_service::config::TracingConfig;
use article_service::observability::provider::is_installed;
use article_service::observability::{Telemetry, TelemetryError};
use opentelemetry::global;
use opentelemetry::trace::{Span as _, Tracer as _};

mod common;

#[test]
fn test_global_provider_is_installed_once() {
    let invalid = TracingConfig {
        endpoint: "localhost:notaport".into(),
        ..TracingConfig::default()
    };
    let err = Telemetry::init(&invalid).unwrap_err();
    assert!(matches!(err, TelemetryError::InvalidEndpoint { .. }));
    assert!(!is_installed(), "failed init must not install anything");

    let collector = common::MockCollector::start();
    let config = common::tracing_config(collector.addr());
    let mut telemetry = Telemetry::init(&config).unwrap();
    assert!(is_installed());

    assert!(matches!(
        Telemetry::init(&config),
        Err(TelemetryError::AlreadyInstalled)
    ));
    assert!(matches!(
        telemetry.install_global(),
        Err(TelemetryError::AlreadyInstalled)
    ));

    let mut span = global::tracer("probe").start("probe");
    assert!(span.span_context().is_valid());
    span.end();

    telemetry.shutdown(Duration::from_secs(10)).unwrap();
    assert!(!collector.requests().is_empty());
}
