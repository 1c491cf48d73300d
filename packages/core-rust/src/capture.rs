//! Outcome capture for in-flight remote item operations.
//!
//! Each adapter awaits one operation handle, maps whatever terminal state it
//! reaches into a [`TerminalState`], and classifies it into an
//! [`OperationResult`]. The adapters are total: faults, panics of the observed
//! operation, aborted tasks and fired cancellation tokens all resolve to a
//! failed result instead of propagating.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Fault;
use crate::outcome::{classify, OperationResult, TerminalState};
use crate::response::RequestCharge;

/// Awaits `operation` and captures its outcome together with `item`.
///
/// A panic raised while polling `operation` is caught and recorded as an
/// unstructured fault.
pub async fn capture_operation_result<F, R, T>(operation: F, item: T) -> OperationResult<T>
where
    F: Future<Output = Result<R, Fault>>,
    R: RequestCharge,
{
    let state = observe(operation).await;
    classify(&state, item)
}

/// Awaits a spawned operation task and captures its outcome together with `item`.
///
/// An aborted task is reported as a cancellation without cause; a task that
/// panicked is reported as an unstructured fault.
pub async fn capture_join_handle<R, T>(
    handle: JoinHandle<Result<R, Fault>>,
    item: T,
) -> OperationResult<T>
where
    R: RequestCharge,
{
    let state = match handle.await {
        Ok(result) => result.into(),
        Err(err) => match err.try_into_panic() {
            Ok(payload) => panicked(payload.as_ref()),
            Err(_cancelled) => {
                tracing::debug!("operation task was aborted");
                TerminalState::Cancelled(None)
            }
        },
    };
    classify(&state, item)
}

/// Awaits `operation` unless `token` is cancelled first.
///
/// When the token fires before the operation resolves, the operation is dropped
/// and the outcome is a cancellation without cause. If both are ready at the
/// same time the operation's own outcome is kept.
pub async fn capture_cancellable<F, R, T>(
    operation: F,
    token: &CancellationToken,
    item: T,
) -> OperationResult<T>
where
    F: Future<Output = Result<R, Fault>>,
    R: RequestCharge,
{
    let state = tokio::select! {
        biased;
        state = observe(operation) => state,
        () = token.cancelled() => {
            tracing::debug!("operation cancelled by token");
            TerminalState::Cancelled(None)
        }
    };
    classify(&state, item)
}

async fn observe<F, R>(operation: F) -> TerminalState<R>
where
    F: Future<Output = Result<R, Fault>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(result) => result.into(),
        Err(payload) => panicked(payload.as_ref()),
    }
}

fn panicked<R>(payload: &(dyn Any + Send)) -> TerminalState<R> {
    let message = panic_message(payload);
    tracing::warn!(panic = %message, "operation panicked");
    TerminalState::Faulted(Fault::from(anyhow::anyhow!(
        "operation panicked: {message}"
    )))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
