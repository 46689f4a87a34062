//! Operation dispatch by name.

use std::{collections::HashMap, fmt, sync::Arc};

use design_client_core::{ExecutionSetup, OperationFailure, Parameters};
use serde_json::Value;

use crate::{ExecutorError, OperationName};

/// Resolves an operation by name and runs it.
///
/// This is the design component of the target application. It is opaque to
/// the executor: all it sees is a name, arguments, and a value or failure.
pub trait OperationDispatcher: Send + Sync {
    /// Run `name` with `parameters`.
    ///
    /// # Errors
    /// Returns an operation failure for expected errors and a fault for
    /// anything unexpected.
    fn invoke(&self, name: &str, parameters: &Parameters) -> Result<Value, OperationFailure>;
}

type Handler = Box<dyn Fn(&Parameters) -> Result<Value, OperationFailure> + Send + Sync>;

/// Dispatcher backed by a table of named handlers.
///
/// Names are canonicalized through [`OperationName`] when they parse as
/// one, so `add-migration` reaches the `AddMigration` handler.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl HandlerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler.
    #[must_use]
    pub fn on<F>(mut self, name: impl AsRef<str>, handler: F) -> Self
    where
        F: Fn(&Parameters) -> Result<Value, OperationFailure> + Send + Sync + 'static,
    {
        self.handlers
            .insert(canonical(name.as_ref()), Box::new(handler));
        self
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OperationDispatcher for HandlerTable {
    fn invoke(&self, name: &str, parameters: &Parameters) -> Result<Value, OperationFailure> {
        let handler = self
            .handlers
            .get(&canonical(name))
            .ok_or_else(|| OperationFailure::operation(format!("Unknown operation '{name}'")))?;
        handler(parameters)
    }
}

fn canonical(name: &str) -> String {
    name.parse::<OperationName>()
        .map_or_else(|_| name.to_string(), |op| op.as_str().to_string())
}

/// Read a required string argument.
///
/// # Errors
/// Operation failure when the argument is missing, null or not a string.
pub fn required_str<'a>(parameters: &'a Parameters, key: &str) -> Result<&'a str, OperationFailure> {
    optional_str(parameters, key)?
        .ok_or_else(|| OperationFailure::operation(format!("Missing required argument '{key}'")))
}

/// Read an optional string argument.
///
/// # Errors
/// Operation failure when the argument is present but not a string.
pub fn optional_str<'a>(
    parameters: &'a Parameters,
    key: &str,
) -> Result<Option<&'a str>, OperationFailure> {
    match parameters.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(OperationFailure::operation(format!(
            "Argument '{key}' must be a string, got {other}"
        ))),
    }
}

/// Loads the design component of a target application.
pub trait DispatcherLoader: Send + Sync {
    /// Load the dispatcher for `setup`.
    ///
    /// # Errors
    /// `DesignDependencyNotFound` when the target does not ship a design
    /// component; `Load` for other failures.
    fn load(&self, setup: &ExecutionSetup) -> Result<Arc<dyn OperationDispatcher>, ExecutorError>;
}

/// Loader that hands out an already constructed dispatcher.
#[derive(Clone)]
pub struct StaticLoader(Arc<dyn OperationDispatcher>);

impl StaticLoader {
    #[must_use]
    pub fn new(dispatcher: impl OperationDispatcher + 'static) -> Self {
        Self(Arc::new(dispatcher))
    }
}

impl DispatcherLoader for StaticLoader {
    fn load(&self, _setup: &ExecutionSetup) -> Result<Arc<dyn OperationDispatcher>, ExecutorError> {
        Ok(Arc::clone(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn table() -> HandlerTable {
        HandlerTable::new()
            .on(OperationName::GetContextType.as_str(), |params| {
                let name = required_str(params, "name")?;
                Ok(json!(format!("{name}Context")))
            })
            .on("Custom", |_| Ok(Value::Null))
    }

    #[test]
    fn dispatches_by_any_spelling() {
        let mut params = Parameters::new();
        params.insert("name".into(), json!("Blog"));

        let table = table();
        assert_eq!(table.invoke("GetContextType", &params).unwrap(), json!("BlogContext"));
        assert_eq!(table.invoke("get-context-type", &params).unwrap(), json!("BlogContext"));
        assert_eq!(table.invoke("Custom", &params).unwrap(), Value::Null);
    }

    #[test]
    fn unknown_name_is_an_operation_error() {
        let failure = table().invoke("Nope", &Parameters::new()).unwrap_err();
        assert!(!failure.is_fault());
        assert!(failure.message.contains("Nope"));
    }

    #[test]
    fn argument_helpers_validate_types() {
        let mut params = Parameters::new();
        params.insert("force".into(), json!(true));
        params.insert("outputDir".into(), Value::Null);

        assert!(required_str(&params, "name").is_err());
        assert!(optional_str(&params, "force").is_err());
        assert_eq!(optional_str(&params, "outputDir").unwrap(), None);
    }

    #[test]
    fn static_loader_shares_one_dispatcher() {
        let loader = StaticLoader::new(table());
        let setup = ExecutionSetup::new("Blog.dll", ".");
        let a = loader.load(&setup).unwrap();
        let b = loader.load(&setup).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
