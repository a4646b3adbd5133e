//! Authorization guard.
//!
//! Per request: UNVERIFIED → PUBLIC_ALLOWED | VERIFIED | REJECTED.
//! The public flag is resolved before the `Authorization` header is looked
//! at, so public routes never pay for (or fail on) credential parsing.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::context::{ContextPatch, ContextStore};
use crate::http::response::error_response;
use crate::observability::metrics;
use crate::observability::record::Classify;
use crate::routing::MetadataHandle;
use crate::security::credentials::{CredentialVerifier, Identity, VerificationError};

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthenticationError {
    #[error("missing bearer credentials")]
    MissingCredentials,

    #[error("authorization header must use the bearer scheme")]
    InvalidScheme,

    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl AuthenticationError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthenticationError::MissingCredentials => "missing_credentials",
            AuthenticationError::InvalidScheme => "invalid_scheme",
            AuthenticationError::Verification(e) => e.code(),
        }
    }
}

impl Classify for AuthenticationError {
    fn classification(&self) -> &'static str {
        self.code()
    }
}

impl IntoResponse for AuthenticationError {
    fn into_response(self) -> Response {
        let mut response = error_response(StatusCode::UNAUTHORIZED, self.code(), self.to_string());
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

/// Outcome of a successful guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    PublicAllowed,
    Verified(Identity),
}

/// Combines route metadata with credential verification.
#[derive(Clone)]
pub struct AuthorizationGuard {
    metadata: MetadataHandle,
    verifier: Arc<dyn CredentialVerifier>,
}

impl AuthorizationGuard {
    pub fn new(metadata: MetadataHandle, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { metadata, verifier }
    }

    /// Decide whether the operation behind `method` + `route` may run.
    ///
    /// On success for a private route the user id is written into the active
    /// request context. Unregistered routes are treated as private.
    pub async fn can_activate(
        &self,
        method: &Method,
        route: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<GuardDecision, AuthenticationError> {
        let public = {
            let metadata = self.metadata.load();
            route
                .and_then(|route| metadata.operations.resolve_route(method, route))
                .is_some_and(|op| metadata.operations.is_public(op))
        };
        if public {
            metrics::record_auth_decision("public");
            return Ok(GuardDecision::PublicAllowed);
        }

        let verified = match bearer_token(headers) {
            Ok(token) => self.verifier.verify(token).await.map_err(AuthenticationError::from),
            Err(e) => Err(e),
        };

        match verified {
            Ok(identity) => {
                ContextStore::set(ContextPatch::user_id(identity.user_id));
                metrics::record_auth_decision("verified");
                Ok(GuardDecision::Verified(identity))
            }
            Err(e) => {
                metrics::record_auth_decision("rejected");
                Err(e)
            }
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthenticationError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthenticationError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthenticationError::InvalidScheme)?
        .trim();

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthenticationError::InvalidScheme)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthenticationError::InvalidScheme);
    }
    Ok(token)
}

/// Middleware running the guard in front of every route.
pub async fn authorization_middleware(
    State(guard): State<AuthorizationGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned());

    match guard
        .can_activate(request.method(), route.as_deref(), request.headers())
        .await
    {
        Ok(GuardDecision::PublicAllowed) => next.run(request).await,
        Ok(GuardDecision::Verified(identity)) => {
            tracing::debug!(user_id = identity.user_id, route = ?route, "Request authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                request_id = ?ContextStore::request_id(),
                route = ?route,
                reason = e.code(),
                "Request rejected"
            );
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::observability::sanitize::SanitizeRules;
    use crate::routing::{Declaration, Metadata, OperationId, OperationRegistry};
    use crate::security::credentials::StaticVerifier;

    fn guard(verifier: Arc<StaticVerifier>) -> AuthorizationGuard {
        let mut registry = OperationRegistry::new();
        registry
            .group("system", Declaration::new().public(true))
            .group("cases", Declaration::new())
            .operation(OperationId::new("cases", "list"), Declaration::new().public(true))
            .route(Method::GET, "/health", OperationId::new("system", "health"))
            .route(Method::GET, "/cases", OperationId::new("cases", "list"))
            .route(Method::POST, "/cases", OperationId::new("cases", "create"));
        AuthorizationGuard::new(
            MetadataHandle::new(Metadata::new(registry, SanitizeRules::new())),
            verifier,
        )
    }

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Ok("abc"));
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err(AuthenticationError::MissingCredentials)
        );
        assert_eq!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthenticationError::InvalidScheme)
        );
        assert_eq!(
            bearer_token(&headers("Bearer")),
            Err(AuthenticationError::InvalidScheme)
        );
    }

    #[tokio::test]
    async fn test_public_route_skips_verification() {
        let verifier = Arc::new(StaticVerifier::new());
        let guard = guard(verifier.clone());

        let group_public = guard
            .can_activate(&Method::GET, Some("/health"), &headers("garbage"))
            .await;
        let op_public = guard
            .can_activate(&Method::GET, Some("/cases"), &HeaderMap::new())
            .await;

        assert_eq!(group_public, Ok(GuardDecision::PublicAllowed));
        assert_eq!(op_public, Ok(GuardDecision::PublicAllowed));
        assert_eq!(verifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_private_route_sets_user_id() {
        let verifier = Arc::new(StaticVerifier::new().accept("t1", Identity::new(11)));
        let guard = guard(verifier.clone());

        let (decision, context) = ContextStore::run(RequestContext::new("req-a"), async {
            let decision = guard
                .can_activate(&Method::POST, Some("/cases"), &headers("Bearer t1"))
                .await;
            (decision, ContextStore::get())
        })
        .await;

        assert_eq!(decision, Ok(GuardDecision::Verified(Identity::new(11))));
        assert_eq!(context.unwrap().user_id, Some(11));
        assert_eq!(verifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_rejections_propagate() {
        let verifier = Arc::new(StaticVerifier::new().reject("old", VerificationError::Expired));
        let guard = guard(verifier.clone());

        let missing = guard
            .can_activate(&Method::POST, Some("/cases"), &HeaderMap::new())
            .await;
        let expired = guard
            .can_activate(&Method::POST, Some("/cases"), &headers("Bearer old"))
            .await;
        let unrouted = guard
            .can_activate(&Method::GET, None, &HeaderMap::new())
            .await;

        assert_eq!(missing, Err(AuthenticationError::MissingCredentials));
        assert_eq!(
            expired,
            Err(AuthenticationError::Verification(VerificationError::Expired))
        );
        assert_eq!(unrouted, Err(AuthenticationError::MissingCredentials));
        assert_eq!(verifier.calls(), 1);
    }

    #[test]
    fn test_rejection_response() {
        let response = AuthenticationError::Verification(VerificationError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
