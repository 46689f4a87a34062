//! `OperationExecutor` backed by an isolation strategy.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use design_client_core::{
    DesignOperation, FailureKind, OperationExecutor, OperationFailure, OperationResult, Parameters,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{ExecutionStrategy, ExecutorError, OperationName, StrategyFactory, TargetKind};

/// Executes descriptors inside an execution context.
///
/// The context is acquired on first use and kept until [`release`]; a later
/// execution acquires a fresh one.
///
/// [`release`]: OperationExecutor::release
pub struct DesignOperationExecutor {
    factory: Arc<StrategyFactory>,
    target: TargetKind,
    strategy: Mutex<Option<ExecutionStrategy>>,
}

impl DesignOperationExecutor {
    #[must_use]
    pub fn new(factory: StrategyFactory, target: TargetKind) -> Self {
        Self {
            factory: Arc::new(factory),
            target,
            strategy: Mutex::new(None),
        }
    }

    /// Whether an execution context is currently held.
    pub async fn is_acquired(&self) -> bool {
        self.strategy.lock().await.is_some()
    }

    async fn acquire(&self) -> Result<ExecutionStrategy, ExecutorError> {
        let factory = Arc::clone(&self.factory);
        let target = self.target;
        let strategy = tokio::task::spawn_blocking(move || factory.create(target))
            .await
            .map_err(|e| ExecutorError::Load(e.to_string()))??;
        tracing::info!(
            strategy = strategy.name(),
            %target,
            "Acquired execution context"
        );
        Ok(strategy)
    }

    async fn invoke(&self, name: &str, parameters: &Parameters) -> Result<Value, OperationFailure> {
        let mut slot = self.strategy.lock().await;
        let strategy = match slot.take() {
            Some(strategy) => strategy,
            None => self.acquire().await.map_err(|e| {
                if e.is_user_facing() {
                    OperationFailure::operation(e.to_string())
                } else {
                    OperationFailure::from_error(&e)
                }
            })?,
        };
        let result = strategy.invoke(name, parameters).await;
        *slot = Some(strategy);
        result
    }
}

#[async_trait]
impl OperationExecutor for DesignOperationExecutor {
    async fn execute(
        &self,
        operation: &DesignOperation,
        _cancel: &CancellationToken,
    ) -> OperationResult {
        tracing::debug!(id = %operation.id, operation = %operation.name, "Executing operation");
        match self.invoke(&operation.name, &operation.parameters).await {
            Ok(value) => OperationResult::success(operation.id, results_for(&operation.name, value)),
            Err(failure) => {
                log_failure(&operation.name, &failure);
                OperationResult::failure(operation.id, failure)
            }
        }
    }

    async fn release(&self) {
        if let Some(strategy) = self.strategy.lock().await.take() {
            let name = strategy.name();
            strategy.teardown().await;
            tracing::info!(strategy = name, "Released execution context");
        }
    }
}

fn log_failure(operation: &str, failure: &OperationFailure) {
    match failure.kind {
        FailureKind::Operation => {
            tracing::warn!(operation, "{}", failure.message);
            if let Some(trace) = &failure.stack_trace {
                tracing::debug!(operation, "{trace}");
            }
        }
        FailureKind::Fault => {
            tracing::error!(
                operation,
                stack_trace = failure.stack_trace.as_deref().unwrap_or_default(),
                "{}",
                failure.message
            );
        }
    }
}

fn results_for(operation: &str, value: Value) -> BTreeMap<String, String> {
    let void = operation
        .parse::<OperationName>()
        .is_ok_and(OperationName::is_void);
    if void {
        if !value.is_null() {
            tracing::debug!(operation, "Discarding output of a void operation");
        }
        return BTreeMap::new();
    }
    pack_results(value)
}

/// Pack an operation's output into named string fields.
///
/// Object members become fields (strings verbatim, anything else as JSON);
/// other values land under `result`; `null` yields nothing.
#[must_use]
pub fn pack_results(value: Value) -> BTreeMap<String, String> {
    fn encode(value: Value) -> String {
        match value {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    match value {
        Value::Null => BTreeMap::new(),
        Value::Object(fields) => fields.into_iter().map(|(k, v)| (k, encode(v))).collect(),
        other => BTreeMap::from([("result".to_string(), encode(other))]),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use design_client_core::ExecutionSetup;
    use serde_json::json;

    use super::*;
    use crate::{DispatcherLoader, HandlerTable, OperationDispatcher, dispatcher::required_str};

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    impl DispatcherLoader for CountingLoader {
        fn load(&self, _setup: &ExecutionSetup) -> Result<Arc<dyn OperationDispatcher>, ExecutorError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(
                HandlerTable::new()
                    .on("AddMigration", |p| {
                        let name = required_str(p, "name")?;
                        Ok(json!({"migrationId": format!("20240101000000_{name}"), "files": 3}))
                    })
                    .on("GetContextTypes", |_| Ok(json!(["BlogContext"])))
                    .on("UpdateDatabase", |_| Ok(json!({"applied": 2})))
                    .on("DropDatabase", |_| {
                        Err(OperationFailure::fault("socket closed", "at Connection::open"))
                    }),
            ))
        }
    }

    fn executor(target: TargetKind) -> (DesignOperationExecutor, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let factory = StrategyFactory::new(ExecutionSetup::new(
            "Blog.dll",
            std::env::current_dir().unwrap(),
        ))
        .with_loader(CountingLoader {
            loads: Arc::clone(&loads),
        });
        (DesignOperationExecutor::new(factory, target), loads)
    }

    #[test]
    fn packs_objects_arrays_and_nulls() {
        let packed = pack_results(json!({"name": "Initial", "count": 2, "nested": {"a": 1}}));
        assert_eq!(packed["name"], "Initial");
        assert_eq!(packed["count"], "2");
        assert_eq!(packed["nested"], r#"{"a":1}"#);

        assert_eq!(pack_results(json!(["A", "B"]))["result"], r#"["A","B"]"#);
        assert_eq!(pack_results(json!("script")), BTreeMap::from([("result".into(), "script".into())]));
        assert!(pack_results(Value::Null).is_empty());
    }

    #[tokio::test]
    async fn results_and_errors_share_one_shape() {
        let _serial = crate::workdir::serial();
        let (executor, _) = executor(TargetKind::ClassLibrary);
        let cancel = CancellationToken::new();

        let add = DesignOperation::new("add-migration").with_parameter("name", "Initial");
        let ok = executor.execute(&add, &cancel).await;
        assert_eq!(ok.id, add.id);
        assert!(ok.is_success());
        assert_eq!(ok.results["migrationId"], "20240101000000_Initial");
        assert_eq!(ok.results["files"], "3");

        let missing_arg = executor
            .execute(&DesignOperation::new("AddMigration"), &cancel)
            .await;
        let error = missing_arg.error.unwrap();
        assert_eq!(error.kind, FailureKind::Operation);
        assert!(error.message.contains("name"));

        let fault = executor
            .execute(&DesignOperation::new("DropDatabase"), &cancel)
            .await;
        assert_eq!(fault.error.unwrap().stack_trace.as_deref(), Some("at Connection::open"));
    }

    #[tokio::test]
    async fn void_operations_report_no_results() {
        let _serial = crate::workdir::serial();
        let (executor, _) = executor(TargetKind::ClassLibrary);

        let update = executor
            .execute(&DesignOperation::new("UpdateDatabase"), &CancellationToken::new())
            .await;
        assert!(update.is_success());
        assert!(update.results.is_empty());
    }

    #[tokio::test]
    async fn context_is_acquired_once_and_released_once() {
        let _serial = crate::workdir::serial();
        let (executor, loads) = executor(TargetKind::LegacyDesktop);
        let cancel = CancellationToken::new();
        let op = DesignOperation::new("GetContextTypes");

        assert!(!executor.is_acquired().await);
        executor.execute(&op, &cancel).await;
        executor.execute(&op, &cancel).await;
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(executor.is_acquired().await);

        executor.release().await;
        executor.release().await;
        assert!(!executor.is_acquired().await);

        let again = executor.execute(&op, &cancel).await;
        assert_eq!(again.results["result"], r#"["BlogContext"]"#);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        executor.release().await;
    }

    #[tokio::test]
    async fn unavailable_strategy_is_reported_per_operation() {
        let (executor, loads) = executor(TargetKind::Application);
        let result = executor
            .execute(&DesignOperation::new("GetContextTypes"), &CancellationToken::new())
            .await;

        let error = result.error.unwrap();
        assert_eq!(error.kind, FailureKind::Operation);
        assert!(error.message.contains("runner"));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert!(!executor.is_acquired().await);
    }
}
