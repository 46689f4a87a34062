use std::{path::PathBuf, sync::Arc};

use design_client_core::{OperationFailure, Parameters};
use serde_json::Value;

use super::panic_failure;
use crate::{OperationDispatcher, WorkingDirGuard};

/// Runs operations on the blocking pool of this process, inside the
/// project directory.
pub struct InProcessStrategy {
    dispatcher: Arc<dyn OperationDispatcher>,
    project_dir: PathBuf,
}

impl InProcessStrategy {
    #[must_use]
    pub fn new(dispatcher: Arc<dyn OperationDispatcher>, project_dir: PathBuf) -> Self {
        Self {
            dispatcher,
            project_dir,
        }
    }

    pub(super) async fn invoke(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<Value, OperationFailure> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let project_dir = self.project_dir.clone();
        let name = name.to_string();
        let parameters = parameters.clone();

        tokio::task::spawn_blocking(move || {
            let _cwd = WorkingDirGuard::enter(&project_dir)
                .map_err(|e| OperationFailure::from_error(&e))?;
            dispatcher.invoke(&name, &parameters)
        })
        .await
        .unwrap_or_else(|join| {
            if join.is_panic() {
                Err(panic_failure(join.into_panic().as_ref()))
            } else {
                Err(OperationFailure::from_error(&join))
            }
        })
    }
}
