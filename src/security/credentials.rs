//! Credential verification collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::schema::AuthConfig;

/// Identity established by a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: i64,
    pub subject: String,
    pub tenant: Option<String>,
}

impl Identity {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            subject: user_id.to_string(),
            tenant: None,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }
}

/// Why a credential was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("credential has expired")]
    Expired,

    #[error("credential is malformed")]
    Malformed,

    #[error("credential signature is invalid")]
    InvalidSignature,

    #[error("credential subject is unknown")]
    UnknownSubject,
}

impl VerificationError {
    pub fn code(self) -> &'static str {
        match self {
            VerificationError::Expired => "token_expired",
            VerificationError::Malformed => "token_malformed",
            VerificationError::InvalidSignature => "invalid_signature",
            VerificationError::UnknownSubject => "unknown_subject",
        }
    }
}

/// Verifies a bearer credential and returns the identity it carries.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, VerificationError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    tenant: Option<String>,
}

/// HS256 JWT verifier. `sub` must be the numeric user id.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8], issuer: Option<&str>, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            config.issuer.as_deref(),
            config.leeway_secs,
        )
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, VerificationError> {
        let decoded = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => VerificationError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    VerificationError::InvalidSignature
                }
                ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience | ErrorKind::InvalidSubject => {
                    VerificationError::UnknownSubject
                }
                _ => VerificationError::Malformed,
            }
        })?;

        let claims = decoded.claims;
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| VerificationError::UnknownSubject)?;

        Ok(Identity {
            user_id,
            subject: claims.sub,
            tenant: claims.tenant,
        })
    }
}

/// Fixed token table, for tests and local runs.
#[derive(Debug, Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, Result<Identity, VerificationError>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), Ok(identity));
        self
    }

    pub fn reject(mut self, token: impl Into<String>, error: VerificationError) -> Self {
        self.tokens.insert(token.into(), Err(error));
        self
    }

    /// Sleep this long inside every verification, yielding to other tasks.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of verifications performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, VerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.tokens
            .get(token)
            .cloned()
            .unwrap_or(Err(VerificationError::InvalidSignature))
    }
}
