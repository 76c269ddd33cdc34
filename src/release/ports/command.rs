//! External program execution port.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for command execution.
pub type CommandResult<T> = Result<T, CommandError>;

/// Captured result of a finished program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, absent when the process was killed by a signal.
    pub status: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns whether the program exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }

    /// Returns trimmed stderr, or the exit status when stderr is empty.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_owned();
        }
        self.status.map_or_else(
            || "terminated by signal".to_owned(),
            |code| format!("exited with status {code}"),
        )
    }
}

/// Runs external programs with a bounded lifetime.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and captures its output.
    ///
    /// A non-zero exit is reported through [`CommandOutput::status`], not as
    /// an error. Dropping the returned future kills the child.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NotFound`] when the program is not installed,
    /// [`CommandError::TimedOut`] when it outlives the runner's limit, or
    /// [`CommandError::Io`] for other spawn and pipe failures.
    async fn run(&self, program: &str, args: &[String]) -> CommandResult<CommandOutput>;
}

/// Errors returned while executing external programs.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// The program is not on `PATH`.
    #[error("{program} is not installed or not on PATH")]
    NotFound {
        /// Program name.
        program: String,
    },

    /// The program ran past its time limit and was killed.
    #[error("{program} timed out after {}s", .limit.as_secs())]
    TimedOut {
        /// Program name.
        program: String,
        /// Applied limit.
        limit: Duration,
    },

    /// Spawning or talking to the process failed.
    #[error("failed to run {program}: {source}")]
    Io {
        /// Program name.
        program: String,
        /// Underlying error.
        source: Arc<std::io::Error>,
    },
}
