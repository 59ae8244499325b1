//! Configuration validation.
//!
//! Serde handles syntax; this module checks values that parse but cannot
//! work: unparsable addresses, zero timeouts, inconsistent batch sizes.
//! All problems are reported at once rather than stopping at the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// A single semantic configuration problem.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("tracing.service_name must not be empty")]
    EmptyServiceName,

    #[error("tracing.endpoint {endpoint:?} is invalid: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("tracing.batch.max_export_batch_size ({batch}) exceeds max_queue_size ({queue})")]
    BatchLargerThanQueue { batch: usize, queue: usize },
}

/// Check a parsed configuration, returning every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    let tracing = &config.tracing;
    if tracing.service_name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }
    if let Err(e) = tracing.traces_url() {
        errors.push(ValidationError::Endpoint {
            endpoint: tracing.endpoint.clone(),
            reason: e.to_string(),
        });
    }
    if tracing.export_timeout_secs == 0 {
        errors.push(ValidationError::Zero("tracing.export_timeout_secs"));
    }
    if tracing.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::Zero("tracing.shutdown_timeout_secs"));
    }

    let batch = &tracing.batch;
    if batch.max_queue_size == 0 {
        errors.push(ValidationError::Zero("tracing.batch.max_queue_size"));
    }
    if batch.max_export_batch_size == 0 {
        errors.push(ValidationError::Zero("tracing.batch.max_export_batch_size"));
    }
    if batch.scheduled_delay_ms == 0 {
        errors.push(ValidationError::Zero("tracing.batch.scheduled_delay_ms"));
    }
    if batch.max_export_batch_size > batch.max_queue_size {
        errors.push(ValidationError::BatchLargerThanQueue {
            batch: batch.max_export_batch_size,
            queue: batch.max_queue_size,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
