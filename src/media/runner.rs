//! Blocking-style execution of external tools with an exit-status contract.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{RedubError, Result};

/// Number of stderr lines kept in error messages.
const STDERR_TAIL_LINES: usize = 8;

/// Captured output of a successful tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
}

/// Runs one external program per call and waits for it to exit.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    timeout: Option<Duration>,
}

impl ToolRunner {
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Bound every invocation; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `program` with `args` and wait for it to exit.
    ///
    /// A non-zero exit, a spawn failure or a timeout is `ToolExecutionFailed`,
    /// and `partial_output` is removed when it fails.
    ///
    /// The child gets its own process group, so a Ctrl+C at the terminal
    /// reaches only this process and the running tool is left to finish.
    pub async fn run(
        &self,
        program: &Path,
        args: &[OsString],
        partial_output: Option<&Path>,
    ) -> Result<ToolOutput> {
        let tool = tool_name(program);
        debug!("Running {}: {}", tool, render_command(program, args));

        let start = Instant::now();
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let child = command
            .spawn()
            .map_err(|e| RedubError::tool(&tool, format!("could not start: {e}")))?;

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    // Dropping the future drops the child, which kills it.
                    warn!("{} timed out after {:?}, killed", tool, limit);
                    if let Some(path) = partial_output {
                        remove_partial(path);
                    }
                    return Err(RedubError::tool(
                        &tool,
                        format!("timed out after {}s", limit.as_secs_f64()),
                    ));
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|e| RedubError::tool(&tool, format!("could not wait for exit: {e}")))?;

        if !output.status.success() {
            if let Some(path) = partial_output {
                remove_partial(path);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RedubError::tool(
                &tool,
                format!("{} {}", output.status, stderr_tail(&stderr)),
            ));
        }

        debug!("{} finished in {:.2}s", tool, start.elapsed().as_secs_f64());
        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    /// Check that `program` starts and answers `-version`.
    pub async fn check_available(&self, program: &Path) -> Result<()> {
        let args = [OsString::from("-version")];
        self.run(program, &args, None).await.map_err(|e| {
            RedubError::tool(
                tool_name(program),
                format!(
                    "not usable ({e}). Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)"
                ),
            )
        })?;
        debug!("{} is available", program.display());
        Ok(())
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

fn render_command(program: &Path, args: &[OsString]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove partial output {:?}: {}", path, e);
        }
    }
}
