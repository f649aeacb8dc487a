//! External process invocation
//!
//! All command-line engines go through `Tool::run`, which bounds the call by
//! the configured timeout and kills the child when it expires.

use std::ffi::OsString;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use super::{BackendError, BackendResult};

/// Stderr is trimmed to this many bytes in error messages
const STDERR_LIMIT: usize = 2048;

/// A resolved external binary
#[derive(Debug, Clone)]
pub struct Tool {
    /// Name used in logs and errors
    pub name: &'static str,
    /// Executable path or name looked up on PATH
    pub program: String,
}

impl Tool {
    pub fn new(name: &'static str, program: impl Into<String>) -> Self {
        Self {
            name,
            program: program.into(),
        }
    }

    /// Run the tool and return its output if it exited successfully
    pub async fn run(&self, args: &[OsString], timeout: Duration) -> BackendResult<Output> {
        tracing::debug!("Running {} {:?}", self.program, args);

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BackendError::ToolNotFound {
                    tool: self.name.to_string(),
                    reason: format!("'{}' is not installed or not on PATH", self.program),
                },
                _ => BackendError::Io(e),
            })?,
            Err(_) => {
                tracing::warn!("{} timed out after {:?}", self.name, timeout);
                return Err(BackendError::Timeout(timeout.as_secs()));
            }
        };

        if !output.status.success() {
            return Err(BackendError::ToolFailed {
                tool: self.name.to_string(),
                status: output.status.to_string(),
                stderr: truncate(String::from_utf8_lossy(&output.stderr).trim()),
            });
        }

        Ok(output)
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= STDERR_LIMIT {
        return text.to_string();
    }
    let mut end = STDERR_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
