//! Logging interceptor for designated operations.
//!
//! # Responsibilities
//! - Check the operation's effective log directive
//! - Time the invocation and read the request context
//! - Sanitize arguments and result, emit exactly one record
//! - Hand the outcome back untouched, panics included
//!
//! # Design Decisions
//! - Without an enabled directive the wrapped future is awaited directly
//! - The interceptor observes failures, it never handles them

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use futures_util::FutureExt;

use crate::context::ContextStore;
use crate::observability::metrics;
use crate::observability::record::{Classify, ErrorSummary, LogRecord, LogSink, LogStatus};
use crate::observability::sanitize::SanitizationEngine;
use crate::observability::value::Loggable;
use crate::routing::{MetadataHandle, OperationId};

/// Wraps operation invocations with sanitized start/end logging.
#[derive(Clone)]
pub struct LoggingInterceptor {
    metadata: MetadataHandle,
    engine: SanitizationEngine,
    sink: Arc<dyn LogSink>,
}

impl LoggingInterceptor {
    pub fn new(metadata: MetadataHandle, engine: SanitizationEngine, sink: Arc<dyn LogSink>) -> Self {
        Self {
            metadata,
            engine,
            sink,
        }
    }

    /// Invoke `call` as operation `operation` with arguments `args`.
    ///
    /// The returned value, error or panic is exactly what `call` produced.
    pub async fn intercept<A, T, E, Fut>(&self, operation: &OperationId, args: &A, call: Fut) -> Result<T, E>
    where
        A: Loggable + ?Sized,
        T: Loggable,
        E: Classify,
        Fut: Future<Output = Result<T, E>>,
    {
        let metadata = self.metadata.load();
        let Some(directive) = metadata.operations.log_directive(operation) else {
            return call.await;
        };
        let display_name = directive
            .custom_name
            .clone()
            .unwrap_or_else(|| operation.name.clone());

        let context = ContextStore::get();
        let started_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        let started = Instant::now();

        let outcome = AssertUnwindSafe(call).catch_unwind().await;
        let elapsed = started.elapsed();

        let (status, result, error) = match &outcome {
            Ok(Ok(value)) => (
                LogStatus::Success,
                Some(self.engine.sanitize(&value.to_log_value(), &metadata.sanitize)),
                None,
            ),
            Ok(Err(err)) => (
                LogStatus::Failure,
                None,
                Some(ErrorSummary {
                    kind: err.classification().to_string(),
                    message: err.to_string(),
                }),
            ),
            Err(payload) => (
                LogStatus::Failure,
                None,
                Some(ErrorSummary {
                    kind: "panic".to_string(),
                    message: panic_message(&**payload),
                }),
            ),
        };

        let (request_id, user_id) = match context {
            Some(ctx) => (Some(ctx.request_id), ctx.user_id),
            None => (None, None),
        };

        metrics::record_operation(&display_name, status.as_str(), elapsed);
        self.sink.emit(LogRecord {
            request_id,
            user_id,
            operation: operation.name.clone(),
            context: operation.group.clone(),
            display_name,
            started_at_ms,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            status,
            args: self.engine.sanitize(&args.to_log_value(), &metadata.sanitize),
            result,
            error,
        });

        match outcome {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextPatch, RequestContext};
    use crate::loggable_shape;
    use crate::observability::record::MemorySink;
    use crate::observability::sanitize::{SanitizeRule, SanitizeRules};
    use crate::observability::value::LogValue;
    use crate::routing::{Declaration, LogDirective, Metadata, OperationRegistry};
    use std::fmt;
    use std::time::Duration;

    struct Login {
        username: String,
        password: String,
    }

    loggable_shape!(Login { username, password });

    #[derive(Debug, PartialEq)]
    struct Denied(&'static str);

    impl fmt::Display for Denied {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "denied: {}", self.0)
        }
    }

    impl Classify for Denied {}

    fn interceptor() -> (LoggingInterceptor, MemorySink) {
        let mut registry = OperationRegistry::new();
        registry
            .group("auth", Declaration::new().log(LogDirective::enabled()))
            .operation(
                OperationId::new("auth", "login"),
                Declaration::new().log(LogDirective::enabled().named("sign-in")),
            )
            .group("quiet", Declaration::new());
        let mut rules = SanitizeRules::new();
        rules.rule("Login", "password", SanitizeRule::default());

        let sink = MemorySink::new();
        let interceptor = LoggingInterceptor::new(
            MetadataHandle::new(Metadata::new(registry, rules)),
            SanitizationEngine::default(),
            Arc::new(sink.clone()),
        );
        (interceptor, sink)
    }

    fn login() -> Login {
        Login {
            username: "dana".into(),
            password: "hunter2".into(),
        }
    }

    #[tokio::test]
    async fn test_success_record() {
        let (interceptor, sink) = interceptor();
        let op = OperationId::new("auth", "login");

        let result = ContextStore::run(RequestContext::new("req-7"), async {
            ContextStore::set(ContextPatch::user_id(3));
            interceptor
                .intercept(&op, &login(), async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok::<_, Denied>(42u32)
                })
                .await
        })
        .await;

        assert_eq!(result, Ok(42));
        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.request_id.as_deref(), Some("req-7"));
        assert_eq!(record.user_id, Some(3));
        assert_eq!(record.display_name, "sign-in");
        assert_eq!(record.context, "auth");
        assert_eq!(record.status, LogStatus::Success);
        assert!(record.duration_ms >= 4);
        assert_eq!(record.result, Some(LogValue::Int(42)));
        assert_eq!(
            record.args.to_json(),
            serde_json::json!({"username": "dana", "password": "****"})
        );
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_propagated() {
        let (interceptor, sink) = interceptor();
        let op = OperationId::new("auth", "logout");

        let result: Result<(), Denied> = interceptor
            .intercept(&op, &(), async { Err(Denied("locked")) })
            .await;

        assert_eq!(result, Err(Denied("locked")));
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, LogStatus::Failure);
        assert_eq!(records[0].display_name, "logout");
        assert_eq!(records[0].request_id, None);
        assert_eq!(
            records[0].error,
            Some(ErrorSummary {
                kind: "Denied".into(),
                message: "denied: locked".into(),
            })
        );
        assert_eq!(records[0].result, None);
    }

    #[tokio::test]
    async fn test_without_directive_is_pass_through() {
        let (interceptor, sink) = interceptor();
        let op = OperationId::new("quiet", "ping");

        let result = interceptor
            .intercept(&op, "arg", async { Ok::<_, Denied>("pong".to_string()) })
            .await;

        assert_eq!(result.unwrap(), "pong");
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_panic_is_recorded_and_resumed() {
        let (interceptor, sink) = interceptor();
        let op = OperationId::new("auth", "login");

        let outcome = AssertUnwindSafe(interceptor.intercept(&op, &login(), async {
            if sink.records().is_empty() {
                panic!("handler exploded");
            }
            Ok::<u32, Denied>(0)
        }))
        .catch_unwind()
        .await;

        let payload = outcome.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"handler exploded"));
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error.as_ref().unwrap().kind, "panic");
        assert_eq!(records[0].error.as_ref().unwrap().message, "handler exploded");
    }
}
