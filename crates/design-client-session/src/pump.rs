//! The drain/poll loop.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use design_client_core::{
    CommunicationChannel, DesignOperation, OperationExecutor, OperationResult,
    OperationResultSubmitted, PendingOperations, SessionSettings,
};
use tokio_util::sync::CancellationToken;

use crate::SessionError;

/// Default delay between empty polls of a stay-alive session.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(3000);

/// Where the pump is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Initializing,
    Polling,
    Draining,
    Completed,
    Errored,
}

/// Why a session completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// Queue and poll both came up empty without stay-alive.
    QueueExhausted,
    /// The server asked the client to stop.
    ShutdownRequested,
}

/// How a completed session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOutcome {
    pub reason: CompletionReason,
    /// Descriptors executed and submitted.
    pub executed: usize,
    /// Pending-operation fetches.
    pub polls: usize,
}

/// Pulls descriptors from the server, executes them in arrival order and
/// submits each result before touching the next one.
pub struct OperationPump<C, E> {
    channel: Arc<C>,
    executor: Arc<E>,
    retry_interval: Duration,
    state: PumpState,
    queue: VecDeque<DesignOperation>,
}

impl<C, E> OperationPump<C, E>
where
    C: CommunicationChannel,
    E: OperationExecutor,
{
    #[must_use]
    pub fn new(channel: Arc<C>, executor: Arc<E>) -> Self {
        Self {
            channel,
            executor,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            state: PumpState::Initializing,
            queue: VecDeque::new(),
        }
    }

    /// Delay between empty polls when the session stays alive. Zero polls
    /// again immediately.
    #[must_use]
    pub const fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    #[must_use]
    pub const fn state(&self) -> PumpState {
        self.state
    }

    /// Run the session to completion.
    ///
    /// # Errors
    /// `Establishment` if the server sends no settings, `Cancelled` once
    /// `cancel` fires, and any channel error. Operation failures are
    /// submitted as results and do not end the run.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<PumpOutcome, SessionError> {
        self.state = PumpState::Initializing;
        self.queue.clear();

        let result = self.pump(cancel).await;
        self.state = if result.is_ok() {
            PumpState::Completed
        } else {
            PumpState::Errored
        };
        result
    }

    async fn pump(&mut self, cancel: &CancellationToken) -> Result<PumpOutcome, SessionError> {
        check(cancel)?;
        let settings = self
            .channel
            .fetch::<SessionSettings>(cancel)
            .await?
            .ok_or(SessionError::Establishment)?;
        tracing::info!(stay_alive = settings.stay_alive, "Session established");

        let mut executed = 0;
        let mut polls = 0;
        loop {
            self.state = PumpState::Draining;
            while let Some(operation) = self.queue.pop_front() {
                check(cancel)?;
                let ack = self.dispatch(&operation, cancel).await?;
                executed += 1;
                if ack.server_requested_client_shutdown {
                    if !self.queue.is_empty() {
                        tracing::warn!(
                            abandoned = self.queue.len(),
                            "Server requested shutdown; dropping queued operations"
                        );
                        self.queue.clear();
                    }
                    tracing::info!(executed, polls, "Server requested client shutdown");
                    return Ok(PumpOutcome {
                        reason: CompletionReason::ShutdownRequested,
                        executed,
                        polls,
                    });
                }
            }

            self.state = PumpState::Polling;
            check(cancel)?;
            let batch = self
                .channel
                .fetch::<PendingOperations>(cancel)
                .await?
                .unwrap_or_default();
            polls += 1;

            if !batch.is_empty() {
                tracing::info!(count = batch.len(), "Received pending operations");
                self.queue.extend(batch);
                continue;
            }
            if !settings.stay_alive {
                tracing::info!(executed, polls, "No pending operations; session complete");
                return Ok(PumpOutcome {
                    reason: CompletionReason::QueueExhausted,
                    executed,
                    polls,
                });
            }
            self.backoff(cancel).await?;
        }
    }

    async fn dispatch(
        &self,
        operation: &DesignOperation,
        cancel: &CancellationToken,
    ) -> Result<OperationResultSubmitted, SessionError> {
        tracing::debug!(id = %operation.id, operation = %operation.name, "Dispatching operation");
        let result = self.executor.execute(operation, cancel).await;
        let ack = self
            .channel
            .submit_for::<OperationResult, OperationResultSubmitted>(&result, cancel)
            .await?;
        tracing::debug!(id = %operation.id, success = result.is_success(), "Result submitted");
        Ok(ack)
    }

    async fn backoff(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        if self.retry_interval.is_zero() {
            return Ok(());
        }
        tracing::debug!(retry = ?self.retry_interval, "No pending operations; waiting");
        tokio::select! {
            () = cancel.cancelled() => Err(SessionError::Cancelled),
            () = tokio::time::sleep(self.retry_interval) => Ok(()),
        }
    }
}

fn check(cancel: &CancellationToken) -> Result<(), SessionError> {
    if cancel.is_cancelled() {
        Err(SessionError::Cancelled)
    } else {
        Ok(())
    }
}
