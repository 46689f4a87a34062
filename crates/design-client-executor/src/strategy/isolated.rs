use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, mpsc},
    thread,
};

use design_client_core::{ExecutionSetup, OperationFailure, Parameters};
use serde_json::Value;
use tokio::sync::oneshot;

use super::panic_failure;
use crate::{DispatcherLoader, ExecutorError, WorkingDirGuard};

struct Job {
    name: String,
    parameters: Parameters,
    reply: oneshot::Sender<Result<Value, OperationFailure>>,
}

/// Hosts the target on a dedicated worker thread.
///
/// The dispatcher is loaded on the worker and never leaves it; panics are
/// contained at the job boundary. Teardown closes the job queue and joins
/// the worker.
pub struct IsolatedStrategy {
    jobs: Option<mpsc::Sender<Job>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl IsolatedStrategy {
    /// Start the worker and load the target on it.
    ///
    /// Blocks until loading finished.
    ///
    /// # Errors
    /// Returns the loader's error, or an I/O error if the thread cannot be
    /// spawned.
    pub fn start(
        loader: Arc<dyn DispatcherLoader>,
        setup: ExecutionSetup,
    ) -> Result<Self, ExecutorError> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), ExecutorError>>();

        let worker = thread::Builder::new()
            .name("design-isolated".into())
            .spawn(move || {
                let dispatcher = match loader.load(&setup) {
                    Ok(d) => {
                        let _ = ready_tx.send(Ok(()));
                        d
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Ok(job) = jobs_rx.recv() {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        let _cwd = WorkingDirGuard::enter(&setup.project_dir)
                            .map_err(|e| OperationFailure::from_error(&e))?;
                        dispatcher.invoke(&job.name, &job.parameters)
                    }))
                    .unwrap_or_else(|payload| Err(panic_failure(payload.as_ref())));
                    let _ = job.reply.send(result);
                }
                tracing::debug!("Isolated worker shutting down");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                jobs: Some(jobs_tx),
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(ExecutorError::Load("isolated worker died while loading".into()))
            }
        }
    }

    pub(super) async fn invoke(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<Value, OperationFailure> {
        let stopped = || OperationFailure::fault("isolated worker is not running", String::new());

        let (reply, result) = oneshot::channel();
        let job = Job {
            name: name.to_string(),
            parameters: parameters.clone(),
            reply,
        };
        self.jobs
            .as_ref()
            .ok_or_else(stopped)?
            .send(job)
            .map_err(|_| stopped())?;
        result.await.unwrap_or_else(|_| Err(stopped()))
    }

    pub(super) async fn teardown(mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let joined = tokio::task::spawn_blocking(move || worker.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                tracing::warn!("Isolated worker did not shut down cleanly");
            }
        }
    }
}

impl Drop for IsolatedStrategy {
    fn drop(&mut self) {
        // Closing the queue lets a detached worker exit on its own.
        self.jobs.take();
    }
}
