//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (correlation id already assigned):
//!     → auth.rs (resolve public flag for the matched route)
//!         public  → pass to handler, credentials never read
//!         private → bearer token → credentials.rs (CredentialVerifier)
//!                     ok  → user id into request context, Identity into extensions
//!                     err → 401 + WWW-Authenticate
//! ```
//!
//! # Design Decisions
//! - Fail closed: unregistered routes are private
//! - Verification is a trait so deployments can plug their own issuer
//! - No trust in client input

pub mod auth;
pub mod credentials;

pub use auth::{authorization_middleware, bearer_token, AuthenticationError, AuthorizationGuard, GuardDecision};
pub use credentials::{CredentialVerifier, Identity, JwtVerifier, StaticVerifier, VerificationError};
