//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → observability::middleware (root span)
//!     → articles.rs (handlers)
//!     → Send to client
//! ```

pub mod articles;
pub mod server;

pub use articles::Article;
pub use server::{AppState, HttpServer};
