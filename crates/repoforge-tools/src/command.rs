//! External command templates and execution.

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::ToolError;
use crate::Result;

/// Default timeout for collaborator commands.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// A command line with `{placeholder}` arguments.
///
/// The first element is the executable. Placeholders are substituted per
/// invocation; unknown placeholders are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Timeout in seconds (0 disables the timeout).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandSpec {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Override the timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Substitute `{name}` placeholders in every argument.
    pub fn render(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.command
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{name}}}"), value)
                })
            })
            .collect()
    }

    /// Render and run the command; a non-zero exit is an error.
    ///
    /// `tool` names the collaborator in logs and errors.
    pub async fn run(&self, tool: &str, vars: &[(&str, &str)]) -> Result<CommandOutput> {
        let start = Instant::now();
        let argv = self.render(vars);
        let (exe, args) = argv.split_first().ok_or_else(|| ToolError::EmptyCommand {
            tool: tool.to_string(),
        })?;

        tracing::debug!(tool = %tool, command = ?argv, "running collaborator command");

        let child = Command::new(exe)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = if self.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| ToolError::Timeout {
                tool: tool.to_string(),
                timeout_secs: self.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if !output.status.success() {
            return Err(ToolError::CommandFailed {
                tool: tool.to_string(),
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            });
        }

        tracing::debug!(tool = %tool, duration_ms = result.duration_ms, "collaborator command finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_all_occurrences() {
        let spec = CommandSpec::new(["sign", "--key={key}", "{file}", "{file}.asc", "{unknown}"]);
        let argv = spec.render(&[("key", "ABC123"), ("file", "/ws/a.deb")]);
        assert_eq!(
            argv,
            vec!["sign", "--key=ABC123", "/ws/a.deb", "/ws/a.deb.asc", "{unknown}"]
        );
    }

    #[test]
    fn spec_deserializes_with_default_timeout() {
        let spec: CommandSpec = serde_json::from_str(r#"{"command": ["true"]}"#).unwrap();
        assert_eq!(spec.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn run_captures_stdout() {
        let spec = CommandSpec::new(["echo", "{word}"]);
        let out = spec.run("echo", &[("word", "hello")]).await.unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn run_non_zero_exit_is_error() {
        let spec = CommandSpec::new(["false"]);
        match spec.run("false", &[]).await {
            Err(ToolError::CommandFailed { exit_code, .. }) => assert_ne!(exit_code, 0),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_empty_command_is_error() {
        let spec = CommandSpec::new(Vec::<String>::new());
        let err = spec.run("signer", &[]).await.unwrap_err();
        assert!(matches!(err, ToolError::EmptyCommand { .. }));
    }

    #[tokio::test]
    async fn run_times_out() {
        let spec = CommandSpec::new(["sleep", "5"]).with_timeout(1);
        let err = spec.run("sleep", &[]).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_secs: 1, .. }));
    }
}
