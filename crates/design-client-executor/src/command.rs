//! Runner command building utilities.

use std::path::PathBuf;

use thiserror::Error;

use crate::runner::RunnerRequest;

/// Command build error.
#[derive(Debug, Error)]
pub enum CommandBuildError {
    #[error("Base command cannot be parsed: {0}")]
    InvalidBase(String),
    #[error("Base command is empty after parsing")]
    EmptyCommand,
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),
}

/// Runner command with its program resolved on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerCommand {
    pub program: PathBuf,
    /// Arguments placed before every request.
    pub base_args: Vec<String>,
}

impl RunnerCommand {
    /// Full argument list for one request.
    #[must_use]
    pub fn args_for(&self, request: &RunnerRequest) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend(request.to_args());
        args
    }
}

/// Builder for the runner command line.
///
/// The base is a shell-style command line (`"dotnet exec runner.dll"`);
/// parameters are appended verbatim.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    base: String,
    params: Vec<String>,
}

impl CommandBuilder {
    #[must_use]
    pub fn new<S: Into<String>>(base: S) -> Self {
        Self {
            base: base.into(),
            params: Vec::new(),
        }
    }

    /// Append fixed parameters after the base command.
    #[must_use]
    pub fn params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.params.extend(params.into_iter().map(Into::into));
        self
    }

    /// Split the command line and locate the program.
    ///
    /// # Errors
    /// Returns error if the base cannot be parsed, is empty, or names an
    /// executable that cannot be found.
    pub fn resolve(&self) -> Result<RunnerCommand, CommandBuildError> {
        let mut parts = split_command_line(&self.base)?;
        if parts.is_empty() {
            return Err(CommandBuildError::EmptyCommand);
        }
        let program = parts.remove(0);
        let program = which::which(&program)
            .map_err(|_| CommandBuildError::ExecutableNotFound(program))?;
        parts.extend(self.params.iter().cloned());
        Ok(RunnerCommand {
            program,
            base_args: parts,
        })
    }
}

fn split_command_line(input: &str) -> Result<Vec<String>, CommandBuildError> {
    #[cfg(windows)]
    {
        let parts = winsplit::split(input);
        if parts.is_empty() {
            Err(CommandBuildError::EmptyCommand)
        } else {
            Ok(parts)
        }
    }

    #[cfg(not(windows))]
    {
        shlex::split(input).ok_or_else(|| CommandBuildError::InvalidBase(input.to_string()))
    }
}
