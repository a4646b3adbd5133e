//! Demo endpoints and the declarations they are served under.
//!
//! | Route                        | Operation            | Access  | Logged |
//! |------------------------------|----------------------|---------|--------|
//! | `GET /health`                | `system.health`      | public  | no     |
//! | `GET /me`                    | `users.me`           | private | no     |
//! | `GET /test-cases`            | `test-cases.list`    | public  | no     |
//! | `POST /test-cases`           | `test-cases.create`  | private | yes    |
//! | `POST /test-cases/{id}/run`  | `test-cases.run`     | private | yes    |

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::context::ContextStore;
use crate::http::response::ApiError;
use crate::loggable_shape;
use crate::observability::interceptor::LoggingInterceptor;
use crate::observability::sanitize::{SanitizeRule, SanitizeRules};
use crate::routing::{Declaration, LogDirective, Metadata, OperationId, OperationRegistry};
use crate::security::credentials::Identity;

pub const SYSTEM: &str = "system";
pub const USERS: &str = "users";
pub const TEST_CASES: &str = "test-cases";

/// Declarations made in code; config overlays are applied on top.
pub fn declarations() -> Metadata {
    let mut operations = OperationRegistry::new();
    operations
        .group(SYSTEM, Declaration::new().public(true))
        .group(USERS, Declaration::new())
        .group(TEST_CASES, Declaration::new().log(LogDirective::enabled()))
        .operation(
            OperationId::new(TEST_CASES, "list"),
            Declaration::new().public(true).log(LogDirective::disabled()),
        )
        .operation(
            OperationId::new(TEST_CASES, "create"),
            Declaration::new().log(LogDirective::enabled().named("create-test-case")),
        )
        .route(Method::GET, "/health", OperationId::new(SYSTEM, "health"))
        .route(Method::GET, "/me", OperationId::new(USERS, "me"))
        .route(Method::GET, "/test-cases", OperationId::new(TEST_CASES, "list"))
        .route(Method::POST, "/test-cases", OperationId::new(TEST_CASES, "create"))
        .route(
            Method::POST,
            "/test-cases/{id}/run",
            OperationId::new(TEST_CASES, "run"),
        );

    let mut sanitize = SanitizeRules::new();
    sanitize
        .rule("CreateTestCase", "api_key", SanitizeRule::default().show_last(4))
        .rule("CreateTestCase", "owner_email", SanitizeRule::default().show_first(2))
        .rule("TestCase", "owner_email", SanitizeRule::default().show_first(2));

    Metadata::new(operations, sanitize)
}

/// State shared by the handlers.
#[derive(Clone)]
pub struct AppState {
    pub interceptor: LoggingInterceptor,
    pub book: Arc<TestCaseBook>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTestCase {
    pub title: String,
    pub owner_email: String,
    pub api_key: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

loggable_shape!(CreateTestCase { title, owner_email, api_key, steps });

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    pub id: u64,
    pub title: String,
    pub owner_email: String,
    pub steps: Vec<String>,
    pub created_by: Option<i64>,
}

loggable_shape!(TestCase { id, title, owner_email, steps, created_by });

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub test_case_id: u64,
    pub run_id: Option<String>,
    pub executed_by: Option<i64>,
    pub steps_executed: usize,
}

loggable_shape!(RunReport { test_case_id, run_id, executed_by, steps_executed });

/// In-memory test case storage.
#[derive(Debug, Default)]
pub struct TestCaseBook {
    cases: Mutex<BTreeMap<u64, TestCase>>,
}

impl TestCaseBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, input: &CreateTestCase, created_by: Option<i64>) -> Result<TestCase, ApiError> {
        if input.title.trim().is_empty() {
            return Err(ApiError::BadRequest("title must not be empty".into()));
        }
        let mut cases = self
            .cases
            .lock()
            .map_err(|_| ApiError::Internal("test case book lock poisoned".into()))?;
        let id = cases.keys().next_back().map_or(1, |last| last + 1);
        let case = TestCase {
            id,
            title: input.title.clone(),
            owner_email: input.owner_email.clone(),
            steps: input.steps.clone(),
            created_by,
        };
        cases.insert(id, case.clone());
        Ok(case)
    }

    pub fn get(&self, id: u64) -> Result<TestCase, ApiError> {
        self.cases
            .lock()
            .map_err(|_| ApiError::Internal("test case book lock poisoned".into()))?
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("test case {id}")))
    }

    pub fn list(&self) -> Result<Vec<TestCase>, ApiError> {
        Ok(self
            .cases
            .lock()
            .map_err(|_| ApiError::Internal("test case book lock poisoned".into()))?
            .values()
            .cloned()
            .collect())
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn me(Extension(identity): Extension<Identity>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "user_id": identity.user_id,
        "subject": identity.subject,
        "tenant": identity.tenant,
        "request_id": ContextStore::request_id(),
    }))
}

pub async fn list_test_cases(State(state): State<AppState>) -> Result<Json<Vec<TestCase>>, ApiError> {
    let op = OperationId::new(TEST_CASES, "list");
    let cases = state
        .interceptor
        .intercept(&op, &(), async { state.book.list() })
        .await?;
    Ok(Json(cases))
}

pub async fn create_test_case(
    State(state): State<AppState>,
    Json(input): Json<CreateTestCase>,
) -> Result<(StatusCode, Json<TestCase>), ApiError> {
    let op = OperationId::new(TEST_CASES, "create");
    let created = state
        .interceptor
        .intercept(&op, &input, async {
            state.book.create(&input, ContextStore::user_id())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn run_test_case(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<RunReport>, ApiError> {
    let op = OperationId::new(TEST_CASES, "run");
    let report = state
        .interceptor
        .intercept(&op, &id, async {
            let case = state.book.get(id)?;
            // Steps execute on a separate task; the context travels with them.
            let executed_by = ContextStore::spawn(async { ContextStore::user_id() })
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok::<_, ApiError>(RunReport {
                test_case_id: case.id,
                run_id: ContextStore::request_id(),
                executed_by,
                steps_executed: case.steps.len(),
            })
        })
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str) -> CreateTestCase {
        CreateTestCase {
            title: title.into(),
            owner_email: "qa@example.com".into(),
            api_key: "sk-live-123456".into(),
            steps: vec!["open".into(), "submit".into()],
        }
    }

    #[test]
    fn test_book_assigns_sequential_ids() {
        let book = TestCaseBook::new();
        let first = book.create(&input("login"), Some(1)).unwrap();
        let second = book.create(&input("logout"), None).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(book.get(1).unwrap().created_by, Some(1));
        assert_eq!(book.list().unwrap().len(), 2);
    }

    #[test]
    fn test_book_errors() {
        let book = TestCaseBook::new();
        assert!(matches!(book.create(&input("  "), None), Err(ApiError::BadRequest(_))));
        assert!(matches!(book.get(9), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_declarations() {
        let metadata = declarations();
        let ops = &metadata.operations;

        let list = ops.resolve_route(&Method::GET, "/test-cases").unwrap();
        let create = ops.resolve_route(&Method::POST, "/test-cases").unwrap();
        let run = ops.resolve_route(&Method::POST, "/test-cases/{id}/run").unwrap();

        assert!(ops.is_public(list));
        assert!(ops.log_directive(list).is_none());
        assert!(!ops.is_public(create));
        assert_eq!(
            ops.log_directive(create).and_then(|d| d.custom_name.as_deref()),
            Some("create-test-case")
        );
        assert!(ops.log_directive(run).is_some());
        assert!(!ops.is_public(&OperationId::new(USERS, "me")));
        assert!(metadata.sanitize.get("CreateTestCase", "api_key").is_some());
    }
}
