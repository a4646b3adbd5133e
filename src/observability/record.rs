//! Operation log records and their sink.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::observability::value::LogValue;

/// Outcome of an intercepted invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failure,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failure => "failure",
        }
    }
}

/// Message and classification of a failed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSummary {
    pub kind: String,
    pub message: String,
}

/// One record per intercepted invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub request_id: Option<String>,
    pub user_id: Option<i64>,
    /// Operation name as registered.
    pub operation: String,
    /// Group the operation belongs to.
    pub context: String,
    /// Custom name from the log directive, or the operation name.
    pub display_name: String,
    /// Wall-clock start, milliseconds since the Unix epoch.
    pub started_at_ms: u64,
    pub duration_ms: u64,
    pub status: LogStatus,
    pub args: LogValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<LogValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSummary>,
}

/// Destination of log records.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: LogRecord);
}

/// Emits each record as one structured `tracing` event on target `operation_log`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: LogRecord) {
        let rendered = serde_json::to_string(&record)
            .unwrap_or_else(|e| render_failure(&record.operation, &e));
        let request_id = record.request_id.as_deref().unwrap_or("-");

        match record.status {
            LogStatus::Success => tracing::info!(
                target: "operation_log",
                request_id,
                user_id = record.user_id,
                operation = %record.display_name,
                context = %record.context,
                duration_ms = record.duration_ms,
                record = %rendered,
                "Operation succeeded"
            ),
            LogStatus::Failure => tracing::warn!(
                target: "operation_log",
                request_id,
                user_id = record.user_id,
                operation = %record.display_name,
                context = %record.context,
                duration_ms = record.duration_ms,
                error_kind = record.error.as_ref().map(|e| e.kind.as_str()),
                record = %rendered,
                "Operation failed"
            ),
        }
    }
}

/// Placeholder emitted when a record cannot be serialized.
fn render_failure(operation: &str, error: &dyn fmt::Display) -> String {
    serde_json::json!({
        "operation": operation,
        "render_error": error.to_string(),
    })
    .to_string()
}

/// Keeps records in memory; useful for tests and local inspection.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record emitted so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: LogRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

/// Stable classification of a failure, reported as `ErrorSummary::kind`.
pub trait Classify: fmt::Display {
    fn classification(&self) -> &'static str {
        short_type_name::<Self>()
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl Classify for std::io::Error {}

impl Classify for String {
    fn classification(&self) -> &'static str {
        "error"
    }
}

impl Classify for &'static str {
    fn classification(&self) -> &'static str {
        "error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct QuotaExceeded;

    impl fmt::Display for QuotaExceeded {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("quota exceeded")
        }
    }

    impl Classify for QuotaExceeded {}

    #[test]
    fn test_default_classification_is_type_name() {
        assert_eq!(QuotaExceeded.classification(), "QuotaExceeded");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn test_record_serialization_omits_absent_parts() {
        let record = LogRecord {
            request_id: Some("req-1".into()),
            user_id: None,
            operation: "create".into(),
            context: "test-cases".into(),
            display_name: "create".into(),
            started_at_ms: 1,
            duration_ms: 2,
            status: LogStatus::Failure,
            args: LogValue::Null,
            result: None,
            error: Some(ErrorSummary {
                kind: "NotFound".into(),
                message: "missing".into(),
            }),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error"]["kind"], "NotFound");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_render_failure_escapes_text() {
        let rendered = render_failure(r#"say "hi"\now"#, &"bad \"key\"\n");
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(json["operation"], r#"say "hi"\now"#);
        assert_eq!(json["render_error"], "bad \"key\"\n");
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        let record = LogRecord {
            request_id: None,
            user_id: None,
            operation: "op".into(),
            context: "group".into(),
            display_name: "op".into(),
            started_at_ms: 0,
            duration_ms: 0,
            status: LogStatus::Success,
            args: LogValue::Null,
            result: Some(LogValue::Int(1)),
            error: None,
        };
        sink.emit(record.clone());
        TracingSink.emit(record.clone());
        assert_eq!(sink.records(), vec![record]);
    }
}
