//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (operations reference declared groups)
//! - Validate value ranges and header names
//! - Detect duplicate operations and routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use axum::http::{HeaderName, Method};

use crate::config::schema::PipelineConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address must not be empty")]
    EmptyBindAddress,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("correlation header {0:?} is not a valid header name")]
    InvalidHeaderName(String),

    #[error("correlation.header and correlation.fallback_header must differ")]
    DuplicateCorrelationHeader,

    #[error("correlation.max_len must be greater than zero")]
    ZeroCorrelationLength,

    #[error("auth.jwt_secret must be set")]
    MissingJwtSecret,

    #[error("sanitize.max_depth must be greater than zero")]
    ZeroSanitizeDepth,

    #[error("sanitize rule {shape}.{field} has an empty pattern")]
    EmptyPattern { shape: String, field: String },

    #[error("sanitize rule for {shape}.{field} is declared twice")]
    DuplicateRule { shape: String, field: String },

    #[error("group {0:?} is declared twice")]
    DuplicateGroup(String),

    #[error("operation {group}.{name} references an undeclared group")]
    UnknownGroup { group: String, name: String },

    #[error("operation {group}.{name} is declared twice")]
    DuplicateOperation { group: String, name: String },

    #[error("operation {group}.{name} must set both method and path, or neither")]
    IncompleteRoute { group: String, name: String },

    #[error("operation {group}.{name} has invalid method {method:?}")]
    InvalidMethod {
        group: String,
        name: String,
        method: String,
    },

    #[error("route {method} {path} is bound to more than one operation")]
    DuplicateRoute { method: String, path: String },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::EmptyBindAddress);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let correlation = &config.correlation;
    for header in [&correlation.header, &correlation.fallback_header] {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(header.clone()));
        }
    }
    if correlation.header.eq_ignore_ascii_case(&correlation.fallback_header) {
        errors.push(ValidationError::DuplicateCorrelationHeader);
    }
    if correlation.max_len == Some(0) {
        errors.push(ValidationError::ZeroCorrelationLength);
    }

    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::MissingJwtSecret);
    }

    if config.sanitize.max_depth == 0 {
        errors.push(ValidationError::ZeroSanitizeDepth);
    }
    let mut rules = HashSet::new();
    for rule in &config.sanitize.rules {
        if rule.pattern.is_empty() {
            errors.push(ValidationError::EmptyPattern {
                shape: rule.shape.clone(),
                field: rule.field.clone(),
            });
        }
        if !rules.insert((rule.shape.as_str(), rule.field.as_str())) {
            errors.push(ValidationError::DuplicateRule {
                shape: rule.shape.clone(),
                field: rule.field.clone(),
            });
        }
    }

    let mut groups = HashSet::new();
    for group in &config.groups {
        if !groups.insert(group.name.as_str()) {
            errors.push(ValidationError::DuplicateGroup(group.name.clone()));
        }
    }

    let mut operations = HashSet::new();
    let mut routes = HashSet::new();
    for op in &config.operations {
        if !groups.contains(op.group.as_str()) {
            errors.push(ValidationError::UnknownGroup {
                group: op.group.clone(),
                name: op.name.clone(),
            });
        }
        if !operations.insert((op.group.as_str(), op.name.as_str())) {
            errors.push(ValidationError::DuplicateOperation {
                group: op.group.clone(),
                name: op.name.clone(),
            });
        }
        match (&op.method, &op.path) {
            (Some(method), Some(path)) => match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
                Ok(parsed) => {
                    if !routes.insert((parsed.clone(), path.as_str())) {
                        errors.push(ValidationError::DuplicateRoute {
                            method: parsed.to_string(),
                            path: path.clone(),
                        });
                    }
                }
                Err(_) => errors.push(ValidationError::InvalidMethod {
                    group: op.group.clone(),
                    name: op.name.clone(),
                    method: method.clone(),
                }),
            },
            (None, None) => {}
            _ => errors.push(ValidationError::IncompleteRoute {
                group: op.group.clone(),
                name: op.name.clone(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
