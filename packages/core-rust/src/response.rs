//! Successful responses of remote item operations.

use serde::{Deserialize, Serialize};

/// Exposes the cost metric the remote store charged for an operation.
///
/// The outcome adapter only needs the request charge of a successful
/// response; everything else about the response stays with the caller.
pub trait RequestCharge {
    /// Request units consumed by the operation.
    fn request_charge(&self) -> f64;
}

/// Response of a single item create, upsert, replace or read.
///
/// `R` is the resource type returned by the store. Writes that ask the store
/// not to echo the resource leave `resource` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(
    serialize = "R: Serialize",
    deserialize = "R: serde::de::DeserializeOwned"
))]
pub struct ItemResponse<R> {
    /// HTTP-style status code (200, 201, 204, ...).
    pub status_code: u16,
    /// Request units charged for this operation.
    pub request_charge: f64,
    /// The item as stored, when the store returned it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<R>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    /// Entity tag of the stored item version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl<R> ItemResponse<R> {
    /// Creates a response with the given status and charge and no resource.
    #[must_use]
    pub fn new(status_code: u16, request_charge: f64) -> Self {
        Self {
            status_code,
            request_charge,
            resource: None,
            activity_id: None,
            etag: None,
        }
    }

    #[must_use]
    pub fn with_resource(mut self, resource: R) -> Self {
        self.resource = Some(resource);
        self
    }

    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

impl<R> RequestCharge for ItemResponse<R> {
    fn request_charge(&self) -> f64 {
        self.request_charge
    }
}

impl<T: RequestCharge + ?Sized> RequestCharge for &T {
    fn request_charge(&self) -> f64 {
        (**self).request_charge()
    }
}

impl<T: RequestCharge + ?Sized> RequestCharge for Box<T> {
    fn request_charge(&self) -> f64 {
        (**self).request_charge()
    }
}
