//! External command execution.
//!
//! Every side effect of a renewal run (certbot, systemctl, hostname) goes through
//! [`CommandRunner`] so the orchestrator can be driven by a scripted runner in tests.

pub(crate) mod certbot;
pub(crate) mod service;

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit. Output is kept because certbot reports progress on stdout
    /// even when it fails.
    #[error("`{command}` exited with {}: {}", exit_label(.code), trimmed(.stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {}", format_timeout(.timeout))]
    TimedOut { command: String, timeout: Duration },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (killed by signal)".to_string(),
    }
}

fn format_timeout(timeout: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*timeout)
}

fn trimmed(text: &str) -> &str {
    text.trim()
}

impl CommandError {
    /// Standard output captured before the command failed, if any.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            CommandError::Failed { stdout, .. } if !stdout.trim().is_empty() => Some(stdout),
            _ => None,
        }
    }
}

/// Runs one shell command to completion and returns its trimmed stdout.
pub(crate) trait CommandRunner {
    async fn run(&self, command: &str) -> Result<String, CommandError>;
}

/// Runs commands through `sh -c`, each bounded by a timeout.
pub(crate) struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<String, CommandError> {
        debug!("running `{}`", command);
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out future is dropped; take the child process down with it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CommandError::TimedOut {
                command: command.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| CommandError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout.trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let err = CommandError::Failed {
            command: command.to_string(),
            code: output.status.code(),
            stdout,
            stderr,
        };
        debug!("{err}");
        Err(err)
    }
}
