//! Opaque system-command fallback.
//!
//! Used for any action whose name matches no registered tool. The command
//! line is reassembled from the action and run through the platform shell
//! under a hard wall-clock limit.

use super::types::{Tool, ToolError};
use crate::directive::Action;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Close an unbalanced double quote so the shell does not wait for input.
pub fn balance_quotes(command: &str) -> String {
    let mut line = command.trim().to_owned();
    if line.matches('"').count() % 2 == 1 {
        line.push('"');
    }
    line
}

/// Runs unknown commands through `sh -c` (or `cmd /C` on Windows).
pub struct ShellFallback {
    shell: String,
    limit: Duration,
}

impl ShellFallback {
    /// Create the fallback with the given shell and time limit.
    pub fn new(shell: impl Into<String>, limit: Duration) -> Self {
        Self {
            shell: shell.into(),
            limit,
        }
    }

    fn command(&self, line: &str) -> Command {
        let mut command = Command::new(&self.shell);
        if self.shell.eq_ignore_ascii_case("cmd") {
            command.arg("/C");
        } else {
            command.arg("-c");
        }
        command
            .arg(line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Tool for ShellFallback {
    fn name(&self) -> &str {
        "shell"
    }

    fn usage(&self) -> &str {
        "<any other command line>"
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.limit + Duration::from_secs(5))
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        let line = balance_quotes(&action.command_line());
        tracing::debug!(command = %line, "running fallback command");
        let child = self
            .command(&line)
            .spawn()
            .map_err(|e| ToolError::Failed(format!("failed to start command: {e}")))?;

        let output = match tokio::time::timeout(self.limit, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ToolError::Failed(format!("command failed: {e}"))),
            Err(_) => {
                return Err(ToolError::Failed(format!(
                    "command timed out after {}s",
                    self.limit.as_secs_f64()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if !stdout.is_empty() {
            return Ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        if !output.status.success() && !stderr.is_empty() {
            return Err(ToolError::Failed(stderr));
        }
        Ok(stderr)
    }
}
