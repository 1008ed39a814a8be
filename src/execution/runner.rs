use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::env::Environment;
use super::unit::SENTINEL_EXIT_CODE;

/// Captured result of one finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled after {0:?}")]
    Cancelled(Duration),
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` with exactly `env` as its environment, buffering both
    /// output streams until it exits or `cancel` fires.
    async fn run(
        &self,
        command: &str,
        env: &Environment,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, RunError>;
}

/// Runs a command string through `<shell> -c`.
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        env: &Environment,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, RunError> {
        let started = Instant::now();

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: self.shell.clone(),
                source,
            })?;

        // Dropping the wait future on cancellation drops the child, which kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|source| RunError::Spawn {
                program: self.shell.clone(),
                source,
            })?,
            _ = cancel.cancelled() => return Err(RunError::Cancelled(started.elapsed())),
        };

        Ok(CommandOutput {
            exit_code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        })
    }
}

/// The process exit code, or the sentinel when it was terminated by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SENTINEL_EXIT_CODE)
}
