use std::path::Path;
use std::process::{Output, Stdio};

use crate::command::CommandError;

/// Abstraction over external command execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks
/// or recording fakes.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command and capture stdout as text.
    async fn exec(&self, program: &str, args: &[String]) -> Result<String, CommandError>;

    /// Execute a command with stdout written straight to the file at `output`.
    async fn exec_to_file(
        &self,
        program: &str,
        args: &[String],
        output: &Path,
    ) -> Result<(), CommandError>;

    /// Execute a command, streaming its output to the terminal until it exits.
    async fn exec_streaming(&self, program: &str, args: &[String]) -> Result<(), CommandError>;
}

/// Runs commands as child processes of the hook.
///
/// Every child is killed when its future is dropped, so a timed-out step
/// never leaves a process behind.
pub struct RealExecutor;

impl RealExecutor {
    async fn captured(
        &self,
        program: &str,
        args: &[String],
        stdout: Stdio,
    ) -> Result<Output, CommandError> {
        tracing::debug!(program, ?args, "exec");

        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CommandError::NotFound {
                program: program.to_owned(),
                source: e,
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(CommandError::CommandFailed {
                program: program.to_owned(),
                args: args.to_vec(),
                stderr,
            })
        }
    }
}

impl CommandExecutor for RealExecutor {
    async fn exec(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        let output = self.captured(program, args, Stdio::piped()).await?;
        String::from_utf8(output.stdout).map_err(|e| CommandError::InvalidUtf8 {
            program: program.to_owned(),
            source: e,
        })
    }

    async fn exec_to_file(
        &self,
        program: &str,
        args: &[String],
        output: &Path,
    ) -> Result<(), CommandError> {
        let file = std::fs::File::create(output).map_err(|e| CommandError::Output {
            path: output.to_path_buf(),
            source: e,
        })?;
        self.captured(program, args, Stdio::from(file)).await?;
        Ok(())
    }

    async fn exec_streaming(&self, program: &str, args: &[String]) -> Result<(), CommandError> {
        tracing::debug!(program, ?args, "exec (streaming)");

        let status = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| CommandError::NotFound {
                program: program.to_owned(),
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::CommandFailed {
                program: program.to_owned(),
                args: args.to_vec(),
                stderr: format!("exit code: {status}"),
            })
        }
    }
}
