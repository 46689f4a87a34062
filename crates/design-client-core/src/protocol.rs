//! Wire protocol shared with the design server.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Loosely typed operation arguments, keyed by parameter name.
pub type Parameters = serde_json::Map<String, Value>;

/// Session settings, fetched once when the session starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Keep polling after the queue runs dry.
    #[serde(default)]
    pub stay_alive: bool,
}

/// One unit of work requested by the design server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignOperation {
    pub id: Uuid,
    /// Server-defined status code.
    #[serde(default)]
    pub status: i32,
    pub name: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl DesignOperation {
    /// Create a descriptor with a fresh identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: 0,
            name: name.into(),
            parameters: Parameters::new(),
        }
    }

    /// Attach a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// A batch of pending operations, in server order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingOperations(pub Vec<DesignOperation>);

impl PendingOperations {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<DesignOperation>> for PendingOperations {
    fn from(ops: Vec<DesignOperation>) -> Self {
        Self(ops)
    }
}

impl IntoIterator for PendingOperations {
    type Item = DesignOperation;
    type IntoIter = std::vec::IntoIter<DesignOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Whether a failure was expected by the operation or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// User-actionable failure (bad input, missing resource).
    Operation,
    /// Unexpected fault inside the operation.
    Fault,
}

/// Structured error produced by an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFailure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl OperationFailure {
    /// A user-facing operation error; carries no trace.
    #[must_use]
    pub fn operation(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Operation,
            message: message.into(),
            stack_trace: None,
        }
    }

    /// An unexpected fault with its trace.
    #[must_use]
    pub fn fault(message: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Fault,
            message: message.into(),
            stack_trace: Some(stack_trace.into()),
        }
    }

    /// Build a fault from an error, recording its source chain and a backtrace.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = String::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push_str("caused by: ");
            trace.push_str(&cause.to_string());
            trace.push('\n');
            source = cause.source();
        }
        trace.push_str(&std::backtrace::Backtrace::force_capture().to_string());
        Self::fault(err.to_string(), trace)
    }

    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.kind == FailureKind::Fault
    }
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for OperationFailure {}

/// Result of executing one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Identifier of the originating descriptor.
    pub id: Uuid,
    /// Named outputs, string-encoded.
    #[serde(default)]
    pub results: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationFailure>,
}

impl OperationResult {
    #[must_use]
    pub const fn success(id: Uuid, results: BTreeMap<String, String>) -> Self {
        Self {
            id,
            results,
            error: None,
        }
    }

    #[must_use]
    pub const fn failure(id: Uuid, error: OperationFailure) -> Self {
        Self {
            id,
            results: BTreeMap::new(),
            error: Some(error),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Acknowledgment returned after a result is submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResultSubmitted {
    #[serde(default)]
    pub server_requested_client_shutdown: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_use_camel_case() {
        let settings: SessionSettings = serde_json::from_str(r#"{"stayAlive": true}"#).unwrap();
        assert!(settings.stay_alive);
    }

    #[test]
    fn pending_operations_are_a_bare_array() {
        let json = r#"[
            {"id": "6f1c1f1e-8a4e-4d3b-9d2e-2f1f0b7c9a11", "status": 1, "name": "AddMigration",
             "parameters": {"name": "Initial", "force": false}},
            {"id": "0b8e6a62-5b1e-4b8f-a2f7-0e7c6f0f3c22", "name": "GetContextTypes"}
        ]"#;
        let ops: PendingOperations = serde_json::from_str(json).unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops.0[0].name, "AddMigration");
        assert_eq!(ops.0[0].parameters["force"], Value::Bool(false));
        assert_eq!(ops.0[1].status, 0);
        assert!(ops.0[1].parameters.is_empty());
    }

    #[test]
    fn successful_result_omits_error() {
        let id = Uuid::new_v4();
        let mut results = BTreeMap::new();
        results.insert("migrationFile".to_string(), "20240101_Initial.cs".to_string());
        let json = serde_json::to_value(OperationResult::success(id, results)).unwrap();

        assert_eq!(json["id"], Value::String(id.to_string()));
        assert_eq!(json["results"]["migrationFile"], "20240101_Initial.cs");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failed_result_carries_kind_and_trace() {
        let result = OperationResult::failure(
            Uuid::nil(),
            OperationFailure::fault("boom", "at frame 0"),
        );
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["error"]["kind"], "fault");
        assert_eq!(json["error"]["stackTrace"], "at frame 0");
        assert!(!result.is_success());
    }

    #[test]
    fn acknowledgment_defaults_to_keep_running() {
        let ack: OperationResultSubmitted = serde_json::from_str("{}").unwrap();
        assert!(!ack.server_requested_client_shutdown);
    }

    #[test]
    fn fault_from_error_records_chain() {
        let io = std::io::Error::other("disk gone");
        let failure = OperationFailure::from_error(&io);

        assert!(failure.is_fault());
        assert_eq!(failure.message, "disk gone");
        assert!(failure.stack_trace.is_some());
    }
}
