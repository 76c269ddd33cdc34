//! Command runner adapters.
//!
//! [`TokioCommandRunner`] drives real processes. [`ScriptedCommandRunner`]
//! answers from canned responses and records every invocation; it backs
//! adapter tests that must not shell out.

use crate::release::ports::{CommandError, CommandOutput, CommandResult, CommandRunner};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Limit applied when a runner is built without an explicit one.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Runs processes on the tokio runtime with a hard time limit.
///
/// Children are spawned with `kill_on_drop`, so a timeout or a cancelled
/// caller terminates the process instead of leaking it.
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    timeout: Duration,
    envs: Vec<(String, String)>,
}

impl TokioCommandRunner {
    /// Creates a runner with the given per-command limit.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            envs: Vec::new(),
        }
    }

    /// Adds an environment variable to every spawned process.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> CommandResult<CommandOutput> {
        debug!(program, ?args, "spawning command");
        let child = tokio::process::Command::new(program)
            .args(args)
            .envs(self.envs.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| spawn_error(program, err))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CommandError::TimedOut {
                program: program.to_owned(),
                limit: self.timeout,
            })?
            .map_err(|err| CommandError::Io {
                program: program.to_owned(),
                source: Arc::new(err),
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn spawn_error(program: &str, err: std::io::Error) -> CommandError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return CommandError::NotFound {
            program: program.to_owned(),
        };
    }
    CommandError::Io {
        program: program.to_owned(),
        source: Arc::new(err),
    }
}

/// One call observed by [`ScriptedCommandRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    /// Program name.
    pub program: String,
    /// Arguments in order.
    pub args: Vec<String>,
}

impl RecordedCommand {
    /// Returns the subcommand, skipping leading global options.
    #[must_use]
    pub fn subcommand(&self) -> Option<&str> {
        subcommand_of(&self.args)
    }
}

/// Returns the first argument after any leading `-c <value>` or
/// `-C <dir>` global options.
fn subcommand_of(args: &[String]) -> Option<&str> {
    let mut remaining = args.iter();
    while let Some(arg) = remaining.next() {
        if !matches!(arg.as_str(), "-c" | "-C") {
            return Some(arg.as_str());
        }
        if remaining.next().is_none() {
            return None;
        }
    }
    None
}

type Handler = Arc<dyn Fn(&[String]) -> CommandResult<CommandOutput> + Send + Sync>;

struct ScriptRule {
    program: String,
    subcommand: Option<String>,
    handler: Handler,
}

#[derive(Default)]
struct ScriptState {
    rules: Vec<ScriptRule>,
    invocations: Vec<RecordedCommand>,
}

/// Command runner that replays scripted responses.
///
/// Rules match on program name and, optionally, the subcommand. The most
/// recently added matching rule wins; unmatched calls succeed with empty
/// output.
#[derive(Clone, Default)]
pub struct ScriptedCommandRunner {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedCommandRunner {
    /// Creates a runner with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes matching calls through `handler`.
    pub fn on<F>(&self, program: &str, subcommand: Option<&str>, handler: F)
    where
        F: Fn(&[String]) -> CommandResult<CommandOutput> + Send + Sync + 'static,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.rules.push(ScriptRule {
            program: program.to_owned(),
            subcommand: subcommand.map(str::to_owned),
            handler: Arc::new(handler),
        });
    }

    /// Answers matching calls with a fixed output.
    pub fn respond(&self, program: &str, subcommand: Option<&str>, output: CommandOutput) {
        self.on(program, subcommand, move |_| Ok(output.clone()));
    }

    /// Answers matching calls with a fixed error.
    pub fn fail(&self, program: &str, subcommand: Option<&str>, error: CommandError) {
        self.on(program, subcommand, move |_| Err(error.clone()));
    }

    /// Returns every call observed so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<RecordedCommand> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.invocations.clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> CommandResult<CommandOutput> {
        let handler = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.invocations.push(RecordedCommand {
                program: program.to_owned(),
                args: args.to_vec(),
            });
            state
                .rules
                .iter()
                .rev()
                .find(|rule| {
                    rule.program == program
                        && rule
                            .subcommand
                            .as_deref()
                            .is_none_or(|sub| subcommand_of(args) == Some(sub))
                })
                .map(|rule| Arc::clone(&rule.handler))
        };
        handler.map_or_else(|| Ok(CommandOutput::ok("")), |respond| respond(args))
    }
}
