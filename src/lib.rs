//! Tenant request pipeline library.
//!
//! Request-scoped context, authorization and observability for HTTP
//! services built on Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request
//!   ───────────────▶ correlation ──▶ trace ──▶ timeout ──▶ authorization ──▶ handler
//!                    (request id,                          guard             │
//!                     context scope)                       │                 ▼
//!                                                          │        logging interceptor
//!                                                          │         (sanitize → sink)
//!                                                          ▼                 │
//!                                     ┌──────────────────────────────────────┘
//!                                     ▼
//!                        ┌───────────────────────────┐
//!                        │ context::ContextStore     │  request id, user id
//!                        │ routing::MetadataHandle   │  public / log / sanitize
//!                        └───────────────────────────┘        ▲
//!                                                             │ hot reload
//!                                                      config::ConfigWatcher
//! ```

// Core subsystems
pub mod config;
pub mod context;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::PipelineConfig;
pub use context::{ContextPatch, ContextStore, RequestContext};
pub use http::PipelineServer;
pub use lifecycle::Shutdown;
