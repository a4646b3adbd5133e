//! Operation declarations and route lookup.
//!
//! # Responsibilities
//! - Store group-level and operation-level declarations
//! - Resolve the effective public flag and log directive of an operation
//! - Map (method, route pattern) to the operation serving it
//!
//! # Design Decisions
//! - Operation-level value wins over group-level; absent both, defaults apply
//!   (private, not logged)
//! - Built once at startup, looked up by identifier at call time
//! - Exact pattern lookup, no matching logic: axum already matched the route

use std::collections::HashMap;
use std::fmt;

use axum::http::Method;

use crate::config::schema::{GroupConfig, OperationConfig};

/// Identifies an operation within its group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId {
    pub group: String,
    pub name: String,
}

impl OperationId {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Declares that invocations should produce a log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirective {
    pub enabled: bool,
    pub custom_name: Option<String>,
}

impl LogDirective {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            custom_name: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            custom_name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    fn from_config(log: Option<bool>, log_name: Option<&String>) -> Option<Self> {
        match (log, log_name) {
            (None, None) => None,
            (enabled, name) => Some(Self {
                enabled: enabled.unwrap_or(true),
                custom_name: name.cloned(),
            }),
        }
    }
}

/// Declarations attached to a group or an operation. `None` means "inherit".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declaration {
    pub public: Option<bool>,
    pub log: Option<LogDirective>,
}

impl Declaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = Some(public);
        self
    }

    pub fn log(mut self, directive: LogDirective) -> Self {
        self.log = Some(directive);
        self
    }

    /// Replace the fields that `other` declares.
    fn overlay(&mut self, other: Declaration) {
        if other.public.is_some() {
            self.public = other.public;
        }
        if other.log.is_some() {
            self.log = other.log;
        }
    }
}

/// Registry of groups, operations and the routes bound to them.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    groups: HashMap<String, Declaration>,
    operations: HashMap<OperationId, Declaration>,
    routes: HashMap<Method, HashMap<String, OperationId>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a group, merging with an existing declaration.
    pub fn group(&mut self, name: impl Into<String>, declaration: Declaration) -> &mut Self {
        self.groups.entry(name.into()).or_default().overlay(declaration);
        self
    }

    /// Declare an operation, merging with an existing declaration.
    pub fn operation(&mut self, id: OperationId, declaration: Declaration) -> &mut Self {
        self.operations.entry(id).or_default().overlay(declaration);
        self
    }

    /// Bind a route pattern to an operation, declaring the operation if needed.
    pub fn route(&mut self, method: Method, path: impl Into<String>, id: OperationId) -> &mut Self {
        self.operations.entry(id.clone()).or_default();
        self.routes.entry(method).or_default().insert(path.into(), id);
        self
    }

    /// Layer config-file declarations over the ones made in code.
    pub fn overlay_config(&mut self, groups: &[GroupConfig], operations: &[OperationConfig]) {
        for group in groups {
            self.group(
                group.name.clone(),
                Declaration {
                    public: group.public,
                    log: LogDirective::from_config(group.log, group.log_name.as_ref()),
                },
            );
        }

        for op in operations {
            let id = OperationId::new(op.group.clone(), op.name.clone());
            self.operation(
                id.clone(),
                Declaration {
                    public: op.public,
                    log: LogDirective::from_config(op.log, op.log_name.as_ref()),
                },
            );
            if let (Some(method), Some(path)) = (&op.method, &op.path) {
                match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
                    Ok(method) => {
                        self.route(method, path.clone(), id);
                    }
                    Err(_) => {
                        tracing::warn!(operation = %id, method = %method, "Ignoring route with invalid method");
                    }
                }
            }
        }
    }

    /// Operation served by `method` + route `pattern`.
    ///
    /// `HEAD` without its own binding resolves to the `GET` binding, matching
    /// how axum dispatches it.
    pub fn resolve_route(&self, method: &Method, pattern: &str) -> Option<&OperationId> {
        let exact = self.routes.get(method).and_then(|paths| paths.get(pattern));
        if exact.is_none() && *method == Method::HEAD {
            return self.routes.get(&Method::GET).and_then(|paths| paths.get(pattern));
        }
        exact
    }

    /// Effective public flag: operation, then group, then `false`.
    pub fn is_public(&self, id: &OperationId) -> bool {
        self.operations
            .get(id)
            .and_then(|decl| decl.public)
            .or_else(|| self.groups.get(&id.group).and_then(|decl| decl.public))
            .unwrap_or(false)
    }

    /// Effective log directive, only when it is enabled.
    pub fn log_directive(&self, id: &OperationId) -> Option<&LogDirective> {
        self.operations
            .get(id)
            .and_then(|decl| decl.log.as_ref())
            .or_else(|| self.groups.get(&id.group).and_then(|decl| decl.log.as_ref()))
            .filter(|directive| directive.enabled)
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationId> {
        self.operations.keys()
    }
}
