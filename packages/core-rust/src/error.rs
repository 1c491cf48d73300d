//! Error taxonomy observed when a remote item operation does not complete normally.
//!
//! A failed operation carries a [`Fault`], which may nest further faults. The
//! adapter never propagates a fault; it flattens it into an ordered sequence of
//! [`OperationError`]s and picks one to record on the result.
//!
//! Two kinds of cause exist:
//!
//! - [`ServiceError`]: a structured error returned by the remote store itself,
//!   carrying status codes and the request charge billed for the attempt.
//! - [`UnstructuredError`]: anything else (transport failures, serialization
//!   bugs, panics of the operation task).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP status the remote store uses for "request timeout".
pub const STATUS_REQUEST_TIMEOUT: u16 = 408;
/// HTTP status the remote store uses for "conflict" (duplicate id on create).
pub const STATUS_CONFLICT: u16 = 409;
/// HTTP status the remote store uses for "not found".
pub const STATUS_NOT_FOUND: u16 = 404;
/// HTTP status the remote store uses when the request rate is too large.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// Status the remote store uses when a write was retried against a concurrent one.
pub const STATUS_RETRY_WITH: u16 = 449;
/// HTTP status the remote store uses when a partition is unavailable.
pub const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Structured error reported by the remote store for a single item operation.
///
/// Unlike an [`UnstructuredError`], a `ServiceError` always carries the request
/// charge billed for the failed attempt, so a bulk orchestrator can account for
/// the cost of failures as well as successes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("remote service error {status_code}/{sub_status_code}: {message}")]
pub struct ServiceError {
    /// HTTP-style status code returned by the remote store.
    pub status_code: u16,
    /// Store-specific refinement of `status_code` (0 when not reported).
    #[serde(default)]
    pub sub_status_code: u32,
    /// Request units charged for the failed attempt.
    #[serde(default)]
    pub request_charge: f64,
    /// Human-readable message from the remote store.
    #[serde(default)]
    pub message: String,
    /// Correlation id assigned by the remote store, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    /// Back-off hint in milliseconds, usually present on throttled requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl ServiceError {
    /// Creates a service error with the given status, charge and message.
    #[must_use]
    pub fn new(status_code: u16, request_charge: f64, message: impl Into<String>) -> Self {
        Self {
            status_code,
            sub_status_code: 0,
            request_charge,
            message: message.into(),
            activity_id: None,
            retry_after_ms: None,
        }
    }

    #[must_use]
    pub fn with_sub_status(mut self, sub_status_code: u32) -> Self {
        self.sub_status_code = sub_status_code;
        self
    }

    #[must_use]
    pub fn with_activity_id(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_ms = Some(u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Back-off hint supplied by the remote store.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_ms.map(Duration::from_millis)
    }

    /// The request rate exceeded the provisioned throughput (429).
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        self.status_code == STATUS_TOO_MANY_REQUESTS
    }

    /// An item with the same id already exists (409).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status_code == STATUS_CONFLICT
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status_code == STATUS_NOT_FOUND
    }

    /// Whether retrying the same operation later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.status_code,
            STATUS_REQUEST_TIMEOUT
                | STATUS_TOO_MANY_REQUESTS
                | STATUS_RETRY_WITH
                | STATUS_SERVICE_UNAVAILABLE
        )
    }
}

// ---------------------------------------------------------------------------
// UnstructuredError
// ---------------------------------------------------------------------------

/// Any cause that did not originate as a structured remote-store error.
///
/// The wrapped [`anyhow::Error`] is shared behind an `Arc` so the same cause can
/// be recorded on a result while the fault it came from is still inspected.
/// Equality is identity: two values are equal iff they share one allocation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct UnstructuredError(Arc<anyhow::Error>);

impl UnstructuredError {
    #[must_use]
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// Builds an unstructured cause from a plain message.
    #[must_use]
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::new(anyhow::Error::msg(message))
    }

    /// The underlying error.
    #[must_use]
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl PartialEq for UnstructuredError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<anyhow::Error> for UnstructuredError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(error)
    }
}

// ---------------------------------------------------------------------------
// OperationError
// ---------------------------------------------------------------------------

/// A single, non-aggregate cause of a failed operation.
///
/// This is the element type of a flattened [`Fault`] and the error recorded on
/// a failed [`OperationResult`](crate::OperationResult).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperationError {
    /// Structured error from the remote store.
    #[error(transparent)]
    Service(ServiceError),
    /// Any other cause.
    #[error(transparent)]
    Unstructured(UnstructuredError),
}

impl OperationError {
    /// Returns the structured remote-store error, if this cause is one.
    #[must_use]
    pub fn as_service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::Service(err) => Some(err),
            Self::Unstructured(_) => None,
        }
    }

    #[must_use]
    pub fn is_service_error(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

impl From<ServiceError> for OperationError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl From<UnstructuredError> for OperationError {
    fn from(err: UnstructuredError) -> Self {
        Self::Unstructured(err)
    }
}

// ---------------------------------------------------------------------------
// Fault
// ---------------------------------------------------------------------------

/// Error carried by an operation that reached the faulted terminal state.
///
/// A fault is either a single cause or an aggregate of further faults, which
/// may themselves be aggregates. [`Fault::flatten`] reduces any tree to the
/// ordered sequence of its leaf causes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Fault {
    #[error(transparent)]
    Service(ServiceError),
    #[error(transparent)]
    Unstructured(UnstructuredError),
    /// Several causes bundled together, in the order they were recorded.
    #[error("{} aggregated fault(s)", .0.len())]
    Aggregate(Vec<Fault>),
}

impl Fault {
    /// Builds an aggregate fault from any sequence of faults.
    #[must_use]
    pub fn aggregate<I>(faults: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Fault>,
    {
        Self::Aggregate(faults.into_iter().map(Into::into).collect())
    }

    /// Leaf causes of this fault, depth-first and left to right.
    ///
    /// Nested aggregates are unwrapped recursively, so a fault nested inside
    /// several aggregates yields the same sequence as the same leaves inlined
    /// into a single aggregate. An empty aggregate contributes nothing.
    #[must_use]
    pub fn flatten(&self) -> Vec<OperationError> {
        let mut causes = Vec::new();
        self.flatten_into(&mut causes);
        causes
    }

    fn flatten_into(&self, out: &mut Vec<OperationError>) {
        match self {
            Self::Service(err) => out.push(OperationError::Service(err.clone())),
            Self::Unstructured(err) => out.push(OperationError::Unstructured(err.clone())),
            Self::Aggregate(children) => {
                for child in children {
                    child.flatten_into(out);
                }
            }
        }
    }
}

impl From<ServiceError> for Fault {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl From<UnstructuredError> for Fault {
    fn from(err: UnstructuredError) -> Self {
        Self::Unstructured(err)
    }
}

impl From<anyhow::Error> for Fault {
    fn from(err: anyhow::Error) -> Self {
        Self::Unstructured(UnstructuredError::new(err))
    }
}

impl From<OperationError> for Fault {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::Service(err) => Self::Service(err),
            OperationError::Unstructured(err) => Self::Unstructured(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn generic(message: &'static str) -> UnstructuredError {
        UnstructuredError::msg(message)
    }

    #[test]
    fn flatten_single_cause() {
        let err = ServiceError::new(429, 3.1, "throttled");
        let causes = Fault::from(err.clone()).flatten();
        assert_eq!(causes, vec![OperationError::Service(err)]);
    }

    #[test]
    fn flatten_nested_preserves_order() {
        let a = generic("a");
        let b = ServiceError::new(409, 1.0, "b");
        let c = generic("c");
        let d = ServiceError::new(503, 2.0, "d");

        let fault = Fault::aggregate([
            Fault::from(a.clone()),
            Fault::aggregate([Fault::from(b.clone()), Fault::aggregate([c.clone()])]),
            Fault::from(d.clone()),
        ]);

        assert_eq!(
            fault.flatten(),
            vec![
                OperationError::from(a),
                OperationError::from(b),
                OperationError::from(c),
                OperationError::from(d),
            ]
        );
    }

    #[test]
    fn flatten_empty_aggregate() {
        let fault = Fault::Aggregate(vec![Fault::Aggregate(vec![]), Fault::Aggregate(vec![])]);
        assert!(fault.flatten().is_empty());
    }

    #[test]
    fn unstructured_equality_is_identity() {
        let a = generic("boom");
        let b = generic("boom");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "boom");
    }

    #[test]
    fn status_helpers() {
        assert!(ServiceError::new(429, 0.0, "").is_throttled());
        assert!(ServiceError::new(429, 0.0, "").is_transient());
        assert!(ServiceError::new(409, 0.0, "").is_conflict());
        assert!(!ServiceError::new(409, 0.0, "").is_transient());
        assert!(ServiceError::new(404, 0.0, "").is_not_found());
        assert!(ServiceError::new(449, 0.0, "").is_transient());
        assert!(ServiceError::new(503, 0.0, "").is_transient());
    }

    #[test]
    fn retry_after_round_trips_through_millis() {
        let err = ServiceError::new(429, 0.0, "slow down").with_retry_after(Duration::from_millis(1500));
        assert_eq!(err.retry_after_ms, Some(1500));
        assert_eq!(err.retry_after(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn service_error_display() {
        let err = ServiceError::new(429, 3.1, "Request rate is large").with_sub_status(3200);
        assert_eq!(
            err.to_string(),
            "remote service error 429/3200: Request rate is large"
        );
        // Transparent wrappers display the inner error unchanged.
        assert_eq!(OperationError::from(err.clone()).to_string(), err.to_string());
        assert_eq!(Fault::from(err.clone()).to_string(), err.to_string());
    }

    #[test]
    fn service_error_decodes_from_camel_case_payload() {
        let json = r#"{
            "statusCode": 429,
            "subStatusCode": 3200,
            "requestCharge": 3.1,
            "message": "Request rate is large",
            "activityId": "6f1c2b",
            "retryAfterMs": 120
        }"#;
        let err: ServiceError = serde_json::from_str(json).unwrap();
        assert_eq!(err.status_code, 429);
        assert_eq!(err.sub_status_code, 3200);
        assert!((err.request_charge - 3.1).abs() < f64::EPSILON);
        assert_eq!(err.activity_id.as_deref(), Some("6f1c2b"));
        assert_eq!(err.retry_after(), Some(Duration::from_millis(120)));
    }

    #[test]
    fn service_error_optional_fields_default() {
        let err: ServiceError = serde_json::from_str(r#"{"statusCode": 404}"#).unwrap();
        assert_eq!(err, ServiceError::new(404, 0.0, ""));
    }

    fn arb_leaf() -> impl Strategy<Value = Fault> {
        prop_oneof![
            (400u16..600, 0.0f64..100.0).prop_map(|(status, charge)| {
                Fault::Service(ServiceError::new(status, charge, "remote"))
            }),
            "[a-z]{1,8}".prop_map(|msg| Fault::Unstructured(UnstructuredError::msg(msg))),
        ]
    }

    fn arb_fault() -> impl Strategy<Value = Fault> {
        arb_leaf().prop_recursive(4, 32, 5, |inner| {
            prop::collection::vec(inner, 0..5).prop_map(Fault::Aggregate)
        })
    }

    proptest! {
        #[test]
        fn flatten_equals_inlined_flatten(fault in arb_fault()) {
            let flat = fault.flatten();
            let inlined = Fault::aggregate(flat.clone());
            prop_assert_eq!(inlined.flatten(), flat);
        }

        #[test]
        fn flatten_is_associative(a in arb_fault(), b in arb_fault(), c in arb_fault()) {
            let left = Fault::aggregate([Fault::aggregate([a.clone(), b.clone()]), c.clone()]);
            let right = Fault::aggregate([a, Fault::aggregate([b, c])]);
            prop_assert_eq!(left.flatten(), right.flatten());
        }
    }
}
