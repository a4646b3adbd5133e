//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (correlation id, request context scope)
//!     → security::auth (authorization guard)
//!     → handlers.rs (demo operations, logging interceptor)
//!     → response.rs (error bodies)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{CorrelationSettings, RequestId, RequestIdExt, X_CORRELATION_ID, X_REQUEST_ID};
pub use response::{ApiError, ErrorBody};
pub use server::PipelineServer;
