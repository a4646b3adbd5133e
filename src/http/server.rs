//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (correlation, tracing, timeout, authorization)
//! - Apply declaration reloads to the shared metadata snapshot
//! - Bind server to listener and shut down gracefully
//!
//! # Middleware order (outermost first)
//! ```text
//! correlation → trace → timeout → authorization guard → handler
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::PipelineConfig;
use crate::http::handlers::{self, AppState, TestCaseBook};
use crate::http::request::{correlation_middleware, CorrelationSettings, RequestIdExt};
use crate::http::response::ApiError;
use crate::observability::interceptor::LoggingInterceptor;
use crate::observability::record::LogSink;
use crate::observability::sanitize::SanitizationEngine;
use crate::routing::{Metadata, MetadataHandle};
use crate::security::auth::{authorization_middleware, AuthorizationGuard};
use crate::security::credentials::CredentialVerifier;

/// HTTP server for the request pipeline.
pub struct PipelineServer {
    router: Router,
    config: PipelineConfig,
    declared: Arc<Metadata>,
    metadata: MetadataHandle,
}

impl PipelineServer {
    /// Assemble the pipeline around the demo handlers.
    pub fn new(
        config: PipelineConfig,
        verifier: Arc<dyn CredentialVerifier>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let declared = Arc::new(handlers::declarations());
        let metadata = MetadataHandle::new(declared.with_config(&config));

        let state = AppState {
            interceptor: LoggingInterceptor::new(
                metadata.clone(),
                SanitizationEngine::new(config.sanitize.max_depth),
                sink,
            ),
            book: Arc::new(TestCaseBook::new()),
        };
        let guard = AuthorizationGuard::new(metadata.clone(), verifier);
        let correlation = Arc::new(CorrelationSettings::from_config(&config.correlation));

        let router = Self::build_router(&config, state, guard, correlation);
        Self {
            router,
            config,
            declared,
            metadata,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &PipelineConfig,
        state: AppState,
        guard: AuthorizationGuard,
        correlation: Arc<CorrelationSettings>,
    ) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/me", get(handlers::me))
            .route(
                "/test-cases",
                get(handlers::list_test_cases).post(handlers::create_test_case),
            )
            .route("/test-cases/{id}/run", post(handlers::run_test_case))
            .fallback(|| async { ApiError::NotFound("route".into()) })
            .with_state(state)
            .layer(middleware::from_fn_with_state(guard, authorization_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = request.request_id().unwrap_or("-"),
                    )
                }),
            )
            .layer(middleware::from_fn_with_state(correlation, correlation_middleware))
    }

    /// Router with the full middleware stack, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared metadata snapshot consulted by the guard and interceptor.
    pub fn metadata(&self) -> &MetadataHandle {
        &self.metadata
    }

    /// Re-apply declarations from a reloaded config.
    pub fn reload(&self, config: &PipelineConfig) {
        apply_reload(&self.declared, &self.metadata, config);
    }

    /// Run the server until `shutdown` resolves.
    ///
    /// Configs received on `updates` replace the group, operation and
    /// sanitize declarations while requests keep flowing.
    pub async fn run<F>(
        self,
        listener: TcpListener,
        updates: Option<mpsc::UnboundedReceiver<PipelineConfig>>,
        shutdown: F,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        if let Some(mut updates) = updates {
            let declared = self.declared.clone();
            let metadata = self.metadata.clone();
            tokio::spawn(async move {
                while let Some(config) = updates.recv().await {
                    apply_reload(&declared, &metadata, &config);
                }
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

fn apply_reload(declared: &Metadata, metadata: &MetadataHandle, config: &PipelineConfig) {
    metadata.store(declared.with_config(config));
    tracing::info!(
        groups = config.groups.len(),
        operations = config.operations.len(),
        sanitize_rules = config.sanitize.rules.len(),
        "Declarations reloaded"
    );
}

/// Wait for Ctrl+C.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
