//! Out-of-process runner contract.
//!
//! The parent encodes a [`RunnerRequest`] as command-line arguments; the
//! runner executes it against its dispatcher and prints a [`RunnerReply`]
//! as the last line of stdout. Exit code 0 means success, 1 failure.

use std::{
    io::Write,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
};

use design_client_core::{ExecutionSetup, OperationFailure, Parameters};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{OperationDispatcher, strategy::panic_failure};

pub const ASSEMBLY_OPTION: &str = "--assembly";
pub const STARTUP_ASSEMBLY_OPTION: &str = "--startup-assembly";
pub const DATA_DIR_OPTION: &str = "--data-dir";
pub const PROJECT_DIR_OPTION: &str = "--project-dir";
pub const CONTENT_ROOT_PATH_OPTION: &str = "--content-root-path";
pub const ROOT_NAMESPACE_OPTION: &str = "--root-namespace";
pub const ENVIRONMENT_OPTION: &str = "--environment";
pub const VERBOSE_OPTION: &str = "--verbose";
pub const OPERATION_OPTION: &str = "--operation";
pub const PARAMETERS_OPTION: &str = "--parameters";

/// Runner error.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Missing value for option '{0}'")]
    MissingValue(String),
    #[error("Unrecognized argument '{0}'")]
    UnknownArgument(String),
    #[error("Missing required option '{0}'")]
    MissingOption(&'static str),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One operation invocation, as sent to a runner process.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerRequest {
    pub setup: ExecutionSetup,
    pub operation: String,
    pub parameters: Parameters,
}

impl RunnerRequest {
    #[must_use]
    pub fn new(setup: ExecutionSetup, operation: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            setup,
            operation: operation.into(),
            parameters,
        }
    }

    /// Encode as runner arguments.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let setup = &self.setup;
        let mut args = vec![
            ASSEMBLY_OPTION.to_string(),
            setup.assembly.clone(),
            STARTUP_ASSEMBLY_OPTION.to_string(),
            setup.effective_startup_assembly().to_string(),
            DATA_DIR_OPTION.to_string(),
            setup.data_dir().display().to_string(),
            PROJECT_DIR_OPTION.to_string(),
            setup.project_dir.display().to_string(),
            CONTENT_ROOT_PATH_OPTION.to_string(),
            setup.content_root_path().display().to_string(),
            ROOT_NAMESPACE_OPTION.to_string(),
            setup.root_namespace().to_string(),
        ];
        if let Some(environment) = &setup.environment {
            args.push(ENVIRONMENT_OPTION.to_string());
            args.push(environment.clone());
        }
        if setup.verbose {
            args.push(VERBOSE_OPTION.to_string());
        }
        args.push(OPERATION_OPTION.to_string());
        args.push(self.operation.clone());
        args.push(PARAMETERS_OPTION.to_string());
        args.push(Value::Object(self.parameters.clone()).to_string());
        args
    }

    /// Decode runner arguments (without the program name).
    ///
    /// # Errors
    /// Returns error on unknown arguments, missing values, a missing
    /// `--assembly`/`--operation`, or malformed `--parameters`.
    pub fn parse<I, S>(args: I) -> Result<Self, RunnerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut assembly = None;
        let mut startup_assembly = None;
        let mut data_dir = None;
        let mut project_dir = None;
        let mut content_root_path = None;
        let mut root_namespace = None;
        let mut environment = None;
        let mut verbose = false;
        let mut operation = None;
        let mut parameters = Parameters::new();

        let mut args = args.into_iter().map(Into::<String>::into);
        while let Some(arg) = args.next() {
            if arg == VERBOSE_OPTION {
                verbose = true;
                continue;
            }
            let slot = match arg.as_str() {
                ASSEMBLY_OPTION => &mut assembly,
                STARTUP_ASSEMBLY_OPTION => &mut startup_assembly,
                DATA_DIR_OPTION => &mut data_dir,
                PROJECT_DIR_OPTION => &mut project_dir,
                CONTENT_ROOT_PATH_OPTION => &mut content_root_path,
                ROOT_NAMESPACE_OPTION => &mut root_namespace,
                ENVIRONMENT_OPTION => &mut environment,
                OPERATION_OPTION => &mut operation,
                PARAMETERS_OPTION => {
                    let raw = args
                        .next()
                        .ok_or_else(|| RunnerError::MissingValue(arg.clone()))?;
                    parameters = serde_json::from_str(&raw)?;
                    continue;
                }
                _ => return Err(RunnerError::UnknownArgument(arg.clone())),
            };
            *slot = Some(
                args.next()
                    .ok_or_else(|| RunnerError::MissingValue(arg.clone()))?,
            );
        }

        let assembly = assembly.ok_or(RunnerError::MissingOption(ASSEMBLY_OPTION))?;
        let operation = operation.ok_or(RunnerError::MissingOption(OPERATION_OPTION))?;
        let project_dir = match project_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };

        let mut setup = ExecutionSetup::new(assembly, project_dir);
        setup.startup_assembly = startup_assembly;
        setup.data_dir = data_dir.map(PathBuf::from);
        setup.content_root_path = content_root_path.map(PathBuf::from);
        setup.root_namespace = root_namespace;
        setup.environment = environment;
        setup.verbose = verbose;

        Ok(Self {
            setup,
            operation,
            parameters,
        })
    }
}

/// Reply envelope printed by a runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunnerReply {
    Success {
        #[serde(default)]
        value: Value,
    },
    Error(OperationFailure),
}

impl From<Result<Value, OperationFailure>> for RunnerReply {
    fn from(result: Result<Value, OperationFailure>) -> Self {
        match result {
            Ok(value) => Self::Success { value },
            Err(failure) => Self::Error(failure),
        }
    }
}

impl From<RunnerReply> for Result<Value, OperationFailure> {
    fn from(reply: RunnerReply) -> Self {
        match reply {
            RunnerReply::Success { value } => Ok(value),
            RunnerReply::Error(failure) => Err(failure),
        }
    }
}

/// Run `request` against `dispatcher` and write the reply line to `out`.
///
/// Returns the process exit code.
///
/// # Errors
/// Returns error only if the reply cannot be written.
pub fn serve<W: Write>(
    request: &RunnerRequest,
    dispatcher: &dyn OperationDispatcher,
    out: &mut W,
) -> Result<i32, RunnerError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        dispatcher.invoke(&request.operation, &request.parameters)
    }))
    .unwrap_or_else(|payload| Err(panic_failure(payload.as_ref())));

    let code = i32::from(result.is_err());
    let reply = RunnerReply::from(result);
    serde_json::to_writer(&mut *out, &reply)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(code)
}
