//! Request-scoped context subsystem.
//!
//! # Data Flow
//! ```text
//! correlation middleware
//!     → ContextStore::run(RequestContext { request_id, user_id: None }, ..)
//!     → authorization guard: ContextStore::set(ContextPatch { user_id })
//!     → handler / logging interceptor: ContextStore::get()
//!     → scope dropped when the request future completes
//! ```
//!
//! # Design Decisions
//! - Backed by a tokio task-local, so the scope is re-established on every
//!   poll of the wrapped future no matter what ran in between
//! - Fan-out goes through `ContextStore::fork` / `ContextStore::spawn`,
//!   which hand each branch its own snapshot
//! - Reads and writes outside a scope are tolerated, never errors

pub mod store;

pub use store::{ContextPatch, ContextStore, RequestContext};
