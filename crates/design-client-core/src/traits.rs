//! Core traits for communication and execution.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{DesignOperation, OperationResult, Verb};

/// Boxed transport-level cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Channel error.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("No {verb} endpoint registered for {resource}")]
    EndpointNotFound { resource: &'static str, verb: Verb },
    #[error("Invalid response type {actual} for {request} (registered: {expected})")]
    ResponseTypeMismatch {
        request: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),
    #[error("Malformed body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Request cancelled")]
    Cancelled,
}

impl ChannelError {
    /// Contract errors are programming mistakes, never worth retrying.
    #[must_use]
    pub const fn is_contract_error(&self) -> bool {
        matches!(
            self,
            Self::EndpointNotFound { .. } | Self::ResponseTypeMismatch { .. }
        )
    }
}

/// Typed request/response channel to the design server.
///
/// Each wire type is bound to one endpoint; see
/// [`EndpointRegistry`](crate::EndpointRegistry).
#[async_trait]
pub trait CommunicationChannel: Send + Sync {
    /// Read the resource bound to `T`.
    ///
    /// Returns `None` when the server answers with no value.
    async fn fetch<T>(&self, cancel: &CancellationToken) -> Result<Option<T>, ChannelError>
    where
        T: DeserializeOwned + Send + 'static;

    /// Write `value` to the endpoint bound to `T`.
    async fn submit<T>(&self, value: &T, cancel: &CancellationToken) -> Result<(), ChannelError>
    where
        T: Serialize + Sync + 'static;

    /// Write `value` and decode the reply as `R`.
    ///
    /// `R` must be the reply type registered for `T`. For `R = bool` the
    /// reply is whether the status was a success, and failures are not
    /// raised.
    async fn submit_for<T, R>(&self, value: &T, cancel: &CancellationToken) -> Result<R, ChannelError>
    where
        T: Serialize + Sync + 'static,
        R: DeserializeOwned + Send + 'static;
}

/// Turns a descriptor into a result.
///
/// Implementations never fail past this boundary: any failure is reported
/// as an error-tagged [`OperationResult`].
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Execute one operation.
    async fn execute(
        &self,
        operation: &DesignOperation,
        cancel: &CancellationToken,
    ) -> OperationResult;

    /// Release the execution context, if one was acquired.
    async fn release(&self) {}
}
