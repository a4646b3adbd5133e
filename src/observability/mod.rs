//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Intercepted operation:
//!     → interceptor.rs (directive check, timing, context read)
//!     → value.rs (arguments/result as LogValue trees)
//!     → sanitize.rs (rule-driven masking, placeholders)
//!     → record.rs (LogRecord → LogSink)
//!
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all records via the context store
//! - Nothing reaches a sink before it has been sanitized
//! - Metrics are cheap (atomic increments)

pub mod interceptor;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod sanitize;
pub mod value;

pub use interceptor::LoggingInterceptor;
pub use record::{Classify, ErrorSummary, LogRecord, LogSink, LogStatus, MemorySink, TracingSink};
pub use sanitize::{SanitizationEngine, SanitizeRule, SanitizeRules};
pub use value::{Binary, LogValue, Loggable};
