//! Task-local storage for per-request context.

use std::cell::RefCell;
use std::future::Future;

use tokio::task::JoinHandle;

tokio::task_local! {
    static ACTIVE_CONTEXT: RefCell<RequestContext>;
}

/// Values visible to every continuation of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Correlation id, assigned once when the request enters the pipeline.
    pub request_id: String,
    /// Authenticated user, absent until the guard verifies a credential.
    pub user_id: Option<i64>,
}

impl RequestContext {
    /// Context for a request that has not been authenticated yet.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            user_id: None,
        }
    }
}

/// Partial update applied to the active scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextPatch {
    pub user_id: Option<i64>,
}

impl ContextPatch {
    pub fn user_id(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

/// Process-wide accessor for the request scope of the calling task.
///
/// There is no instance state: the storage lives in a task-local slot that
/// `run` installs around a future. Every poll of that future (and of anything
/// it awaits inline) sees the same slot, while other requests multiplexed on
/// the same worker thread see their own.
pub struct ContextStore;

impl ContextStore {
    /// Execute `fut` inside a fresh scope holding `initial`.
    ///
    /// The scope ends when `fut` completes or is dropped.
    pub async fn run<F>(initial: RequestContext, fut: F) -> F::Output
    where
        F: Future,
    {
        ACTIVE_CONTEXT.scope(RefCell::new(initial), fut).await
    }

    /// Snapshot of the active scope, or `None` outside any scope.
    pub fn get() -> Option<RequestContext> {
        ACTIVE_CONTEXT.try_with(|ctx| ctx.borrow().clone()).ok()
    }

    /// Apply `patch` to the active scope in place.
    ///
    /// Returns `false` when there is no active scope or nothing changed.
    /// `user_id` is write-once: a different id on an already authenticated
    /// scope is refused.
    pub fn set(patch: ContextPatch) -> bool {
        ACTIVE_CONTEXT
            .try_with(|ctx| {
                let mut ctx = ctx.borrow_mut();
                match (ctx.user_id, patch.user_id) {
                    (_, None) => false,
                    (None, Some(user_id)) => {
                        ctx.user_id = Some(user_id);
                        true
                    }
                    (Some(current), Some(user_id)) => {
                        if current != user_id {
                            tracing::warn!(
                                request_id = %ctx.request_id,
                                current,
                                attempted = user_id,
                                "Refusing to overwrite authenticated user in request context"
                            );
                        }
                        false
                    }
                }
            })
            .unwrap_or(false)
    }

    /// Correlation id of the active scope.
    pub fn request_id() -> Option<String> {
        ACTIVE_CONTEXT
            .try_with(|ctx| ctx.borrow().request_id.clone())
            .ok()
    }

    /// Authenticated user of the active scope.
    pub fn user_id() -> Option<i64> {
        ACTIVE_CONTEXT
            .try_with(|ctx| ctx.borrow().user_id)
            .ok()
            .flatten()
    }

    /// Run `fut` in its own scope seeded with a snapshot of the current one.
    ///
    /// Use this for every branch of a concurrent fan-out: each branch starts
    /// from the values set before the fork and its own mutations stay local.
    /// Outside any scope `fut` runs without context.
    pub async fn fork<F>(fut: F) -> F::Output
    where
        F: Future,
    {
        match Self::get() {
            Some(snapshot) => Self::run(snapshot, fut).await,
            None => fut.await,
        }
    }

    /// Spawn `fut` on the runtime, carrying a snapshot of the current scope.
    pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match Self::get() {
            Some(snapshot) => tokio::spawn(ACTIVE_CONTEXT.scope(RefCell::new(snapshot), fut)),
            None => tokio::spawn(fut),
        }
    }
}
