//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Logging → Telemetry → Runtime → startup.rs binds listener
//!
//! Shutdown:
//!     signals.rs (SIGTERM/SIGINT) → shutdown.rs broadcast → server drains
//!     → tracer provider flushed with a deadline
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then tracing, then listeners
//! - Ordered shutdown: stop accept, drain, flush spans
//! - Every shutdown step has a timeout

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{serve, StartupError};
