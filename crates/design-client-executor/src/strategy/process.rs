use std::process::{ExitStatus, Stdio};

use command_group::AsyncCommandGroup;
use design_client_core::{ExecutionSetup, OperationFailure, Parameters};
use serde_json::Value;
use tokio::process::Command;

use crate::{RunnerCommand, RunnerReply, RunnerRequest};

/// Runs each operation in a fresh runner process.
///
/// The request is appended to the runner command as arguments (see
/// [`RunnerCommand::args_for`]);
/// the runner's last stdout line is its reply. Earlier output is forwarded
/// to the log.
pub struct ProcessStrategy {
    command: RunnerCommand,
    setup: ExecutionSetup,
}

impl ProcessStrategy {
    #[must_use]
    pub const fn new(command: RunnerCommand, setup: ExecutionSetup) -> Self {
        Self { command, setup }
    }

    pub(super) async fn invoke(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<Value, OperationFailure> {
        let request = RunnerRequest::new(self.setup.clone(), name, parameters.clone());

        let mut command = Command::new(&self.command.program);
        command
            .args(self.command.args_for(&request))
            .current_dir(&self.setup.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(
            program = %self.command.program.display(),
            operation = name,
            "Dispatching operation to runner process"
        );

        let child = command
            .group_spawn()
            .map_err(|e| OperationFailure::from_error(&e))?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OperationFailure::from_error(&e))?;

        decode_output(output.status, &output.stdout, &output.stderr)
    }
}

fn decode_output(
    status: ExitStatus,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<Value, OperationFailure> {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);

    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        tracing::warn!(target: "design_client::runner", "{line}");
    }

    let mut lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    let reply = lines
        .last()
        .and_then(|last| serde_json::from_str::<RunnerReply>(last).ok());
    if reply.is_some() {
        lines.pop();
    }
    for line in &lines {
        tracing::debug!(target: "design_client::runner", "{line}");
    }

    match (reply, status.success()) {
        (Some(RunnerReply::Error(failure)), _) => Err(failure),
        (Some(RunnerReply::Success { value }), true) => Ok(value),
        (Some(RunnerReply::Success { .. }), false) => Err(OperationFailure::fault(
            format!("Runner reported success but exited with {status}"),
            stderr.into_owned(),
        )),
        (None, true) => {
            let text = lines.join("\n");
            Ok(if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            })
        }
        (None, false) => Err(OperationFailure::fault(
            format!("Runner exited with {status}"),
            stderr.into_owned(),
        )),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use std::path::PathBuf;

    use super::*;
    use crate::CommandBuilder;

    fn strategy(script: &str, project_dir: PathBuf) -> ProcessStrategy {
        let command = CommandBuilder::new("sh -c")
            .params([script, "runner"])
            .resolve()
            .unwrap();
        ProcessStrategy::new(command, ExecutionSetup::new("Blog.dll", project_dir))
    }

    fn cwd() -> PathBuf {
        std::env::current_dir().unwrap()
    }

    #[tokio::test]
    async fn success_reply_is_returned_and_logs_are_skipped() {
        let s = strategy(
            r#"echo "Build started"; echo '{"status":"success","value":{"migrationFile":"Initial.cs"}}'"#,
            cwd(),
        );
        let value = assert_ok!(s.invoke("AddMigration", &Parameters::new()).await);
        assert_eq!(value, json!({"migrationFile": "Initial.cs"}));
    }

    #[tokio::test]
    async fn error_reply_keeps_its_kind() {
        let s = strategy(
            r#"echo '{"status":"error","kind":"operation","message":"No DbContext was found"}'; exit 1"#,
            cwd(),
        );
        let failure = assert_err!(s.invoke("GetContextType", &Parameters::new()).await);
        assert!(!failure.is_fault());
        assert_eq!(failure.message, "No DbContext was found");
    }

    #[tokio::test]
    async fn exit_code_without_reply_is_a_fault_with_stderr() {
        let s = strategy("echo 'unhandled exception' >&2; exit 3", cwd());
        let failure = assert_err!(s.invoke("DropDatabase", &Parameters::new()).await);
        assert!(failure.is_fault());
        assert!(failure.stack_trace.unwrap().contains("unhandled exception"));
    }

    #[tokio::test]
    async fn request_reaches_the_runner_in_the_project_dir() {
        let project = tempfile::tempdir().unwrap();
        let project_dir = project.path().canonicalize().unwrap();
        // "$@" is the encoded request; print the operation value and cwd.
        let s = strategy(
            r#"while [ "$#" -gt 0 ]; do if [ "$1" = "--operation" ]; then op="$2"; fi; shift; done; echo "$op $(pwd -P)""#,
            project_dir.clone(),
        );
        let value = s.invoke("GetMigrations", &Parameters::new()).await.unwrap();
        assert_eq!(value, json!(format!("GetMigrations {}", project_dir.display())));
    }
}
