//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → middleware.rs (root span opened, stored in the request context)
//!     → context.rs (handlers look up the root span, open child spans)
//!     → provider.rs (ended spans batched and exported over OTLP/HTTP)
//!
//! logging.rs → local structured log lines (stdout)
//! ```
//!
//! # Design Decisions
//! - Tracer is passed down explicitly; the global provider exists for
//!   code outside the request path
//! - Root span travels in request extensions, never in thread-locals
//! - Ending a span only enqueues it; export happens on the batch thread

pub mod context;
pub mod logging;
pub mod middleware;
pub mod provider;

pub use context::{current_root_span, RequestContext};
pub use middleware::{root_span_middleware, RootSpanState, TransportSecurity};
pub use provider::{ShutdownError, Telemetry, TelemetryError};
