//! `GraphBulk` Core — outcome capture for asynchronous remote item operations.
//!
//! A bulk executor issues many item writes and reads against a remote store.
//! This crate observes each in-flight operation until it reaches a terminal
//! state (completed, faulted or cancelled) and turns it into one
//! [`OperationResult`] that the executor can aggregate without inspecting raw
//! errors itself.

pub mod capture;
pub mod error;
pub mod outcome;
pub mod response;

pub use capture::{capture_cancellable, capture_join_handle, capture_operation_result};
pub use error::{Fault, OperationError, ServiceError, UnstructuredError};
pub use outcome::{classify, OperationResult, Outcome, TerminalState};
pub use response::{ItemResponse, RequestCharge};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
