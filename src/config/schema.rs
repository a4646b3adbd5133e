//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pipeline.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the request pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Correlation id header handling.
    pub correlation: CorrelationConfig,

    /// Credential verification settings.
    pub auth: AuthConfig,

    /// Diagnostic log output.
    pub logging: LoggingConfig,

    /// Metrics exposition.
    pub observability: ObservabilityConfig,

    /// Masking rules applied to logged arguments and results.
    pub sanitize: SanitizeConfig,

    /// Group-level declarations (public flag, log directive).
    pub groups: Vec<GroupConfig>,

    /// Operation-level declarations, overriding their group.
    pub operations: Vec<OperationConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Correlation id headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Primary header, read first and always written back.
    pub header: String,

    /// Alias accepted when the primary header is absent.
    pub fallback_header: String,

    /// Optional cap; inbound ids longer than this are replaced with a
    /// generated one. Unset means any non-empty id is kept.
    pub max_len: Option<usize>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            header: "x-request-id".to_string(),
            fallback_header: "x-correlation-id".to_string(),
            max_len: None,
        }
    }
}

/// Bearer token verification.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for HS256 tokens.
    pub jwt_secret: String,

    /// Expected `iss` claim, if any.
    pub issuer: Option<String>,

    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: None,
            leeway_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Diagnostic logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,

    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "tenant_pipeline=info,operation_log=info,tower_http=info".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Sanitization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Nesting depth after which values are replaced by a placeholder.
    pub max_depth: usize,

    /// Field rules, layered over the ones declared in code.
    pub rules: Vec<SanitizeRuleConfig>,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            rules: Vec::new(),
        }
    }
}

/// One masking rule for a field of a declared data shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SanitizeRuleConfig {
    /// Shape name, as declared with `loggable_shape!`.
    pub shape: String,

    /// Field of that shape.
    pub field: String,

    #[serde(default = "default_pattern")]
    pub pattern: String,

    #[serde(default)]
    pub show_first: usize,

    #[serde(default)]
    pub show_last: usize,
}

pub(crate) fn default_pattern() -> String {
    "****".to_string()
}

/// Declarations shared by every operation of a group.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupConfig {
    pub name: String,

    #[serde(default)]
    pub public: Option<bool>,

    /// Enable the logging interceptor for the group.
    #[serde(default)]
    pub log: Option<bool>,

    /// Display name used in log records.
    #[serde(default)]
    pub log_name: Option<String>,
}

/// Declarations for one operation and the route serving it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperationConfig {
    pub group: String,

    pub name: String,

    /// HTTP method of the route (e.g., "GET").
    #[serde(default)]
    pub method: Option<String>,

    /// Route pattern as registered with the router (e.g., "/test-cases/{id}").
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub public: Option<bool>,

    #[serde(default)]
    pub log: Option<bool>,

    #[serde(default)]
    pub log_name: Option<String>,
}
