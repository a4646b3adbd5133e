//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PipelineConfig (validated, immutable)
//!     → overlaid on the declarations made in code (routing::Metadata)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the metadata snapshot atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only declarations (groups, operations, sanitize rules) are hot
//!   reloaded; listener and auth changes need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::{
    AuthConfig, CorrelationConfig, GroupConfig, LogFormat, LoggingConfig, OperationConfig,
    PipelineConfig, SanitizeConfig, SanitizeRuleConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
