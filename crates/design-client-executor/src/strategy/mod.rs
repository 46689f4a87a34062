//! Isolation strategies and their selection.
//!
//! All strategies expose the same capability, `invoke(name, parameters)`,
//! and produce the same result shape; the rest of the client does not care
//! which one runs.

mod in_process;
mod isolated;
mod process;

use std::{any::Any, fmt, sync::Arc};

use design_client_core::{ExecutionSetup, OperationFailure, Parameters};
use serde_json::Value;

pub use in_process::InProcessStrategy;
pub use isolated::IsolatedStrategy;
pub use process::ProcessStrategy;

use crate::{CommandBuilder, DispatcherLoader, ExecutorError};

/// How the target application can be hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A library: its dependency closure is loaded into this process.
    ClassLibrary,
    /// A deployable application: runs in its own process.
    Application,
    /// A legacy target hosted behind a dedicated worker boundary.
    LegacyDesktop,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClassLibrary => "class library",
            Self::Application => "application",
            Self::LegacyDesktop => "legacy desktop target",
        })
    }
}

/// A live execution context.
pub enum ExecutionStrategy {
    InProcess(InProcessStrategy),
    Process(ProcessStrategy),
    Isolated(IsolatedStrategy),
}

impl ExecutionStrategy {
    /// Run one operation inside the context.
    ///
    /// # Errors
    /// Returns the operation's failure, or a fault if the boundary broke.
    pub async fn invoke(&self, name: &str, parameters: &Parameters) -> Result<Value, OperationFailure> {
        match self {
            Self::InProcess(s) => s.invoke(name, parameters).await,
            Self::Process(s) => s.invoke(name, parameters).await,
            Self::Isolated(s) => s.invoke(name, parameters).await,
        }
    }

    /// Tear the context down.
    pub async fn teardown(self) {
        match self {
            Self::Isolated(s) => s.teardown().await,
            Self::InProcess(_) | Self::Process(_) => {}
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InProcess(_) => "in-process",
            Self::Process(_) => "process",
            Self::Isolated(_) => "isolated",
        }
    }
}

impl fmt::Debug for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExecutionStrategy").field(&self.name()).finish()
    }
}

/// Picks and builds the strategy for a target.
#[derive(Clone)]
pub struct StrategyFactory {
    setup: ExecutionSetup,
    loader: Option<Arc<dyn DispatcherLoader>>,
    runner: Option<CommandBuilder>,
}

impl StrategyFactory {
    #[must_use]
    pub const fn new(setup: ExecutionSetup) -> Self {
        Self {
            setup,
            loader: None,
            runner: None,
        }
    }

    /// Loader for the in-process and isolated strategies.
    #[must_use]
    pub fn with_loader(mut self, loader: impl DispatcherLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Runner command for the process strategy.
    #[must_use]
    pub fn with_runner(mut self, runner: CommandBuilder) -> Self {
        self.runner = Some(runner);
        self
    }

    #[must_use]
    pub const fn setup(&self) -> &ExecutionSetup {
        &self.setup
    }

    /// Build the strategy for `target`.
    ///
    /// This may block while the target is loaded.
    ///
    /// # Errors
    /// `StrategyUnavailable` when the prerequisite (loader or runner) is
    /// missing; loader and command errors otherwise.
    pub fn create(&self, target: TargetKind) -> Result<ExecutionStrategy, ExecutorError> {
        tracing::debug!(
            %target,
            assembly = %self.setup.assembly_name(),
            startup = %self.setup.startup_assembly_name(),
            "Creating execution strategy"
        );
        match target {
            TargetKind::ClassLibrary => {
                let dispatcher = self.loader(target)?.load(&self.setup)?;
                Ok(ExecutionStrategy::InProcess(InProcessStrategy::new(
                    dispatcher,
                    self.setup.project_dir.clone(),
                )))
            }
            TargetKind::Application => {
                let runner = self
                    .runner
                    .as_ref()
                    .ok_or_else(|| ExecutorError::StrategyUnavailable {
                        target,
                        reason: "no runner command configured".into(),
                    })?;
                Ok(ExecutionStrategy::Process(ProcessStrategy::new(
                    runner.resolve()?,
                    self.setup.clone(),
                )))
            }
            TargetKind::LegacyDesktop => {
                let loader = Arc::clone(self.loader(target)?);
                Ok(ExecutionStrategy::Isolated(IsolatedStrategy::start(
                    loader,
                    self.setup.clone(),
                )?))
            }
        }
    }

    fn loader(&self, target: TargetKind) -> Result<&Arc<dyn DispatcherLoader>, ExecutorError> {
        self.loader
            .as_ref()
            .ok_or_else(|| ExecutorError::StrategyUnavailable {
                target,
                reason: "no loader configured".into(),
            })
    }
}

/// Turn a panic payload into a fault.
pub(crate) fn panic_failure(payload: &(dyn Any + Send)) -> OperationFailure {
    let message = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "operation panicked".to_string());
    OperationFailure::fault(
        message,
        std::backtrace::Backtrace::force_capture().to_string(),
    )
}
