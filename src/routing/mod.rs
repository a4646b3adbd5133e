//! Operation metadata subsystem.
//!
//! # Data Flow
//! ```text
//! Declarations (at startup):
//!     code (http::handlers::declarations)
//!     → config file [[groups]] / [[operations]] / [[sanitize.rules]]
//!     → Metadata (registry + sanitize rules)
//!     → MetadataHandle (ArcSwap, shared by guard and interceptor)
//!
//! Per request:
//!     guard: (method, matched route) → OperationId → is_public
//!     interceptor: OperationId → LogDirective, shape → SanitizeRule
//! ```
//!
//! # Design Decisions
//! - Explicit registry instead of attributes read at runtime
//! - Operation-level declarations override group-level ones
//! - Deterministic: same declarations always resolve the same way
//! - Reloads swap the whole snapshot; nothing is mutated in place

pub mod metadata;
pub mod registry;

pub use metadata::{Metadata, MetadataHandle};
pub use registry::{Declaration, LogDirective, OperationId, OperationRegistry};
