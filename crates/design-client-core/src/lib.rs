//! Core abstractions for the design client.
//!
//! This crate provides the fundamental building blocks:
//! - Protocol types exchanged with the design server
//! - `EndpointRegistry` - explicit type → endpoint binding table
//! - `ExecutionSetup` - inputs for hosting a target application
//! - `CommunicationChannel` and `OperationExecutor` traits

pub mod context;
pub mod endpoint;
pub mod protocol;
pub mod traits;

pub use context::ExecutionSetup;
pub use endpoint::{Endpoint, EndpointRegistry, Verb};
pub use protocol::{
    DesignOperation, FailureKind, OperationFailure, OperationResult, OperationResultSubmitted,
    Parameters, PendingOperations, SessionSettings,
};
pub use traits::{ChannelError, CommunicationChannel, OperationExecutor};

/// Default route prefix of the design server API.
pub const DEFAULT_API_PREFIX: &str = "/api";
