//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use tenant_pipeline::config::PipelineConfig;
use tenant_pipeline::observability::MemorySink;
use tenant_pipeline::security::{Identity, StaticVerifier, VerificationError};
use tenant_pipeline::PipelineServer;

pub const ALICE: &str = "token-alice";
pub const BOB: &str = "token-bob";
pub const EXPIRED: &str = "token-expired";

/// Config accepted by validation, listening on an ephemeral port.
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.auth.jwt_secret = "integration-secret".into();
    config
}

pub fn verifier() -> StaticVerifier {
    StaticVerifier::new()
        .accept(ALICE, Identity::new(42).with_tenant("acme"))
        .accept(BOB, Identity::new(7).with_tenant("globex"))
        .reject(EXPIRED, VerificationError::Expired)
}

/// Server wired to an in-memory sink and the fixed token table.
pub struct Harness {
    pub server: PipelineServer,
    pub sink: MemorySink,
    pub verifier: Arc<StaticVerifier>,
}

pub fn harness() -> Harness {
    harness_with(test_config(), verifier())
}

pub fn harness_with(config: PipelineConfig, verifier: StaticVerifier) -> Harness {
    let sink = MemorySink::new();
    let verifier = Arc::new(verifier);
    let server = PipelineServer::new(config, verifier.clone(), Arc::new(sink.clone()));
    Harness {
        server,
        sink,
        verifier,
    }
}

/// Verifier whose every call sleeps, forcing requests to interleave.
pub fn slow_verifier(latency: Duration) -> StaticVerifier {
    verifier().with_latency(latency)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn authed(method: &str, uri: &str, token: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
