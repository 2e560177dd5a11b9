use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::types::{CommandResult, ExecutionError, Result};

/// Maximum size for captured stdout/stderr to prevent memory issues
const MAX_OUTPUT_SIZE: usize = 10 * 1024; // 10KB per stream

/// Command executor runs one argv at a time in a fixed working directory and
/// captures its output. A nonzero exit is reported in the result, not raised;
/// callers decide which commands are allowed to fail.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    /// Working directory for command execution
    pub working_dir: PathBuf,
    /// Maximum time to wait for command completion, `None` waits forever
    pub timeout: Option<Duration>,
}

impl CommandExecutor {
    pub fn new<P: AsRef<Path>>(working_dir: P, timeout: Option<Duration>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Execute a single command and capture its output
    pub async fn execute(&self, command: &[String]) -> Result<CommandResult> {
        let Some((executable, args)) = command.split_first() else {
            return Err(ExecutionError::StartFailed {
                command: "<empty>".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "Command cannot be empty",
                ),
            }
            .into());
        };

        let command_line = command.join(" ");
        info!(command = %command_line, "Running command");
        debug!(
            working_dir = %self.working_dir.display(),
            timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
            "Command environment"
        );

        let start_time = Instant::now();

        let mut cmd = Command::new(executable);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match timeout(limit, cmd.output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!(
                        command = %command_line,
                        timeout_ms = limit.as_millis() as u64,
                        "Command timed out"
                    );
                    return Err(ExecutionError::Timeout {
                        command: command_line,
                        timeout: limit,
                    }
                    .into());
                }
            },
            None => cmd.output().await,
        };

        let output = output.map_err(|io_error| {
            error!(command = %command_line, error = %io_error, "Failed to execute command");
            ExecutionError::StartFailed {
                command: command_line.clone(),
                source: io_error,
            }
        })?;

        let result = CommandResult {
            command: command.to_vec(),
            exit_code: output.status.code(),
            stdout: truncate_output(output.stdout),
            stderr: truncate_output(output.stderr),
            duration: start_time.elapsed(),
        };

        log_output(&result);
        Ok(result)
    }
}

/// Log captured output: stdout at info, stderr at warn
fn log_output(result: &CommandResult) {
    let stdout = result.stdout.trim();
    if !stdout.is_empty() {
        info!(stdout = %stdout, "Command output");
    }

    let stderr = result.stderr.trim();
    if !stderr.is_empty() {
        warn!(stderr = %stderr, "Command error output");
    }

    debug!(
        exit_code = result.exit_code,
        duration_ms = result.duration.as_millis() as u64,
        "Command completed"
    );
}

/// Truncate command output to prevent memory issues
fn truncate_output(output: Vec<u8>) -> String {
    let output_str = String::from_utf8_lossy(&output);
    if output_str.len() > MAX_OUTPUT_SIZE {
        let mut end = MAX_OUTPUT_SIZE;
        while !output_str.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... [truncated at {} bytes]",
            &output_str[..end],
            MAX_OUTPUT_SIZE
        )
    } else {
        output_str.into_owned()
    }
}
