//! Typed outcome of a single remote item operation.
//!
//! [`classify`] turns the [`TerminalState`] of an operation into an
//! [`OperationResult`]. Classification is pure: the same state always yields an
//! equal result, and no fault ever escapes it.
//!
//! # Classification
//!
//! 1. `Completed` -> success, charged with the response's request charge.
//! 2. `Faulted` / `Cancelled` -> the fault is flattened into its leaf causes.
//! 3. The first [`ServiceError`] among the causes wins, even when it is not the
//!    first cause. Its request charge is recorded.
//! 4. Otherwise the first cause (if any) is recorded and no charge is set.

use crate::error::{Fault, OperationError, ServiceError};
use crate::response::RequestCharge;

// ---------------------------------------------------------------------------
// TerminalState
// ---------------------------------------------------------------------------

/// Final state reached by an asynchronous remote operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalState<R> {
    /// The operation ran to completion and produced a response.
    Completed(R),
    /// The operation failed with one or more causes.
    Faulted(Fault),
    /// The operation was cancelled before producing a response. A cause is
    /// attached only when the canceller recorded one.
    Cancelled(Option<Fault>),
}

impl<R> TerminalState<R> {
    /// Leaf causes of a faulted or cancelled state; empty for `Completed`.
    #[must_use]
    pub fn causes(&self) -> Vec<OperationError> {
        match self {
            Self::Completed(_) | Self::Cancelled(None) => Vec::new(),
            Self::Faulted(fault) | Self::Cancelled(Some(fault)) => fault.flatten(),
        }
    }
}

impl<R> From<Result<R, Fault>> for TerminalState<R> {
    fn from(result: Result<R, Fault>) -> Self {
        match result {
            Ok(response) => Self::Completed(response),
            Err(fault) => Self::Faulted(fault),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Success or failure of one operation, with the cost the store reported.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded {
        request_units: f64,
    },
    Failed {
        /// The cause selected by classification; `None` for a cancellation
        /// without a recorded cause.
        error: Option<OperationError>,
        /// Present only when the selected cause is a [`ServiceError`].
        request_units: Option<f64>,
    },
}

// ---------------------------------------------------------------------------
// OperationResult
// ---------------------------------------------------------------------------

/// Result of one attempted remote item operation, paired with its payload.
///
/// Built exactly once by [`classify`] and immutable afterwards. The payload is
/// moved through unchanged; pass `&T` or `Arc<T>` to keep the original.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult<T> {
    item: T,
    outcome: Outcome,
}

impl<T> OperationResult<T> {
    /// The request payload this result belongs to.
    #[must_use]
    pub fn item(&self) -> &T {
        &self.item
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Whether the operation completed without fault or cancellation.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded { .. })
    }

    /// Request units the store reported, or `None` when no charge could be
    /// extracted (unstructured failures and cancellations).
    #[must_use]
    pub fn request_charge(&self) -> Option<f64> {
        match self.outcome {
            Outcome::Succeeded { request_units } => Some(request_units),
            Outcome::Failed { request_units, .. } => request_units,
        }
    }

    /// Request units the store reported, `0.0` when unknown.
    #[must_use]
    pub fn request_units_consumed(&self) -> f64 {
        self.request_charge().unwrap_or_default()
    }

    /// The cause recorded for a failed operation.
    #[must_use]
    pub fn service_error(&self) -> Option<&OperationError> {
        match &self.outcome {
            Outcome::Succeeded { .. } => None,
            Outcome::Failed { error, .. } => error.as_ref(),
        }
    }

    /// Shorthand for the recorded cause when it is a structured store error.
    #[must_use]
    pub fn remote_error(&self) -> Option<&ServiceError> {
        self.service_error().and_then(OperationError::as_service_error)
    }

    /// Consumes the result, returning the payload.
    #[must_use]
    pub fn into_item(self) -> T {
        self.item
    }

    #[must_use]
    pub fn into_parts(self) -> (T, Outcome) {
        (self.item, self.outcome)
    }
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// Classifies the terminal state of an operation into an [`OperationResult`].
///
/// See the module documentation for the selection rules. Classifying the same
/// state twice yields equal results.
#[must_use]
pub fn classify<R, T>(state: &TerminalState<R>, item: T) -> OperationResult<T>
where
    R: RequestCharge,
{
    let outcome = match state {
        TerminalState::Completed(response) => {
            let request_units = response.request_charge();
            tracing::debug!(request_units, "operation completed");
            Outcome::Succeeded { request_units }
        }
        TerminalState::Faulted(_) | TerminalState::Cancelled(_) => {
            classify_causes(state.causes(), matches!(state, TerminalState::Cancelled(_)))
        }
    };

    OperationResult { item, outcome }
}

fn classify_causes(causes: Vec<OperationError>, cancelled: bool) -> Outcome {
    if let Some(err) = causes.iter().find_map(OperationError::as_service_error) {
        tracing::debug!(
            status_code = err.status_code,
            sub_status_code = err.sub_status_code,
            request_units = err.request_charge,
            cancelled,
            "operation failed with remote service error"
        );
        return Outcome::Failed {
            request_units: Some(err.request_charge),
            error: Some(OperationError::Service(err.clone())),
        };
    }

    let error = causes.into_iter().next();
    match &error {
        Some(err) => tracing::warn!(error = %err, cancelled, "operation failed"),
        None => tracing::debug!(cancelled, "operation ended without a recorded cause"),
    }

    Outcome::Failed {
        error,
        request_units: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
