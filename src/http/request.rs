//! Correlation id assignment.
//!
//! # Responsibilities
//! - Reuse the caller's correlation id when it is usable, generate one otherwise
//! - Normalize the request onto the primary header
//! - Open the request context scope around the rest of the stack
//! - Echo the id on the response
//!
//! # Design Decisions
//! - Runs outermost, so every later layer (trace span, guard, handlers)
//!   sees the final id
//! - A usable inbound id is kept byte-for-byte, never trimmed or rewritten
//! - Only blank, non-text or (when capped) oversized ids are replaced

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::HeaderName, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::config::schema::CorrelationConfig;
use crate::context::{ContextStore, RequestContext};

/// Default primary correlation header.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Default fallback correlation header.
pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// Correlation id of the request, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Convenience accessor for the [`RequestId`] extension.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for axum::http::Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.extensions().get::<RequestId>().map(RequestId::as_str)
    }
}

/// Resolved correlation header settings.
#[derive(Debug, Clone)]
pub struct CorrelationSettings {
    header: HeaderName,
    fallback_header: HeaderName,
    max_len: Option<usize>,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(X_REQUEST_ID),
            fallback_header: HeaderName::from_static(X_CORRELATION_ID),
            max_len: None,
        }
    }
}

impl CorrelationSettings {
    /// Build settings from config. Unparseable header names keep their default.
    pub fn from_config(config: &CorrelationConfig) -> Self {
        let defaults = Self::default();
        Self {
            header: parse_header(&config.header).unwrap_or(defaults.header),
            fallback_header: parse_header(&config.fallback_header)
                .unwrap_or(defaults.fallback_header),
            max_len: config.max_len.map(|max| max.max(1)),
        }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Pick the inbound id (primary header first) or generate a fresh one.
    ///
    /// Returns the id and the header value to write back. An inbound value
    /// is returned as received.
    pub fn resolve(&self, headers: &HeaderMap) -> (String, Option<HeaderValue>) {
        [&self.header, &self.fallback_header]
            .into_iter()
            .filter_map(|name| headers.get(name))
            .find_map(|value| {
                let id = value.to_str().ok()?;
                self.is_usable(id).then(|| (id.to_owned(), Some(value.clone())))
            })
            .unwrap_or_else(|| {
                let id = Uuid::new_v4().to_string();
                let value = HeaderValue::from_str(&id).ok();
                (id, value)
            })
    }

    fn is_usable(&self, id: &str) -> bool {
        !id.trim().is_empty() && self.max_len.map_or(true, |max| id.len() <= max)
    }
}

fn parse_header(name: &str) -> Option<HeaderName> {
    match HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()) {
        Ok(name) => Some(name),
        Err(_) => {
            tracing::warn!(header = %name, "Invalid correlation header name, using default");
            None
        }
    }
}

/// Assign the correlation id and run the request inside its context scope.
pub async fn correlation_middleware(
    State(settings): State<Arc<CorrelationSettings>>,
    mut request: Request,
    next: Next,
) -> Response {
    let (request_id, header_value) = settings.resolve(request.headers());

    let headers = request.headers_mut();
    headers.remove(&settings.fallback_header);
    if let Some(value) = &header_value {
        headers.insert(settings.header.clone(), value.clone());
    }
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = ContextStore::run(RequestContext::new(request_id), next.run(request)).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(settings.header.clone(), value);
    }
    response
}
