//! Operation executor for the design client.
//!
//! Provides:
//! - `DesignOperationExecutor` - runs descriptors through an isolation strategy
//! - Isolation strategies (in-process, isolated worker, external process)
//! - Runner contract for out-of-process execution
//! - The fixed operation surface and its argument builders

pub mod command;
pub mod dispatcher;
pub mod executor;
pub mod operations;
pub mod runner;
pub mod strategy;
pub mod workdir;

use thiserror::Error;

pub use command::{CommandBuildError, CommandBuilder, RunnerCommand};
pub use dispatcher::{DispatcherLoader, HandlerTable, OperationDispatcher, StaticLoader};
pub use executor::DesignOperationExecutor;
pub use operations::{OperationName, OperationRequest};
pub use runner::{RunnerReply, RunnerRequest};
pub use strategy::{ExecutionStrategy, StrategyFactory, TargetKind};
pub use workdir::WorkingDirGuard;

/// Executor error.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("No strategy available for {target}: {reason}")]
    StrategyUnavailable { target: TargetKind, reason: String },
    #[error("Cannot execute this command because the design component is not installed in '{0}'")]
    DesignDependencyNotFound(String),
    #[error("Failed to load target: {0}")]
    Load(String),
    #[error("Command build error: {0}")]
    CommandBuild(#[from] CommandBuildError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    /// Whether the user can act on this error (as opposed to an internal fault).
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::StrategyUnavailable { .. } | Self::DesignDependencyNotFound(_) | Self::Load(_)
        )
    }
}
