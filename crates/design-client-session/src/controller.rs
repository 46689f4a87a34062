//! Background session controller.

use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use design_client_core::{CommunicationChannel, OperationExecutor};
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    SessionError,
    pump::{DEFAULT_RETRY_INTERVAL, OperationPump, PumpOutcome},
};

/// What one run left behind. Written once by the background task.
#[derive(Default)]
struct RunState {
    finished: AtomicBool,
    outcome: OnceLock<PumpOutcome>,
    error: OnceLock<SessionError>,
}

impl RunState {
    fn finish(&self, result: Result<PumpOutcome, SessionError>) {
        match result {
            Ok(outcome) => {
                let _ = self.outcome.set(outcome);
            }
            Err(e) => {
                let e = e.innermost();
                if e.is_cancelled() {
                    tracing::info!("Session cancelled");
                } else {
                    tracing::error!("Session failed: {e}");
                }
                let _ = self.error.set(e);
            }
        }
        self.finished.store(true, Ordering::Release);
    }
}

/// Runs a session in the background.
///
/// ```ignore
/// let mut client = DesignClient::new(channel, executor);
/// client.start(cancel).wait().await;
/// if let Some(e) = client.error() { ... }
/// ```
pub struct DesignClient<C, E> {
    channel: Arc<C>,
    executor: Arc<E>,
    retry_interval: Duration,
    state: Arc<RunState>,
    task: Option<JoinHandle<()>>,
}

impl<C, E> DesignClient<C, E>
where
    C: CommunicationChannel + 'static,
    E: OperationExecutor + 'static,
{
    #[must_use]
    pub fn new(channel: C, executor: E) -> Self {
        Self::from_shared(Arc::new(channel), Arc::new(executor))
    }

    /// Build from already shared handles.
    #[must_use]
    pub fn from_shared(channel: Arc<C>, executor: Arc<E>) -> Self {
        Self {
            channel,
            executor,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            state: Arc::new(RunState::default()),
            task: None,
        }
    }

    /// Delay between empty polls when the server asks the client to stay
    /// alive. Zero polls again immediately.
    #[must_use]
    pub const fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Start a session in the background and return immediately.
    ///
    /// Clears the previous run's error. Outside a tokio runtime the run
    /// finishes at once with [`SessionError::Aborted`]. Starting while a
    /// run is in flight is not supported.
    pub fn start(&mut self, cancel: CancellationToken) -> &mut Self {
        let state = Arc::new(RunState::default());
        self.state = Arc::clone(&state);

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                state.finish(Err(SessionError::Aborted(e.to_string())));
                self.task = None;
                return self;
            }
        };

        let channel = Arc::clone(&self.channel);
        let executor = Arc::clone(&self.executor);
        let retry_interval = self.retry_interval;

        self.task = Some(runtime.spawn(async move {
            let pump_executor = Arc::clone(&executor);
            let pumped = tokio::spawn(async move {
                OperationPump::new(channel, pump_executor)
                    .with_retry_interval(retry_interval)
                    .run(&cancel)
                    .await
            })
            .await;

            executor.release().await;

            state.finish(pumped.unwrap_or_else(|join| Err(aborted(join))));
        }));
        self
    }

    /// Wait for the background run to finish.
    pub async fn wait(&mut self) -> &mut Self {
        if let Some(task) = self.task.take() {
            if let Err(join) = task.await {
                if !self.state.finished.load(Ordering::Acquire) {
                    self.state.finish(Err(aborted(join)));
                }
            }
        }
        self
    }

    /// Whether the last started run has completed.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    /// Terminal error of the last run; `None` on clean completion.
    #[must_use]
    pub fn error(&self) -> Option<&SessionError> {
        if self.finished() {
            self.state.error.get()
        } else {
            None
        }
    }

    /// How the last run completed, if it did so cleanly.
    #[must_use]
    pub fn outcome(&self) -> Option<PumpOutcome> {
        self.state.outcome.get().copied()
    }
}

fn aborted(join: tokio::task::JoinError) -> SessionError {
    if join.is_panic() {
        let payload = join.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "session task panicked".to_string());
        SessionError::Aborted(message)
    } else {
        SessionError::Aborted(join.to_string())
    }
}
