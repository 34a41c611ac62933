//! Builder for executing external tool commands with timeout support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    /// Stdout followed by stderr, the way a terminal would interleave them
    /// for tools that only write to one of the two.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }
}

/// How a bounded tool invocation ended.
#[derive(Debug, Clone)]
pub enum ToolRun {
    /// The process exited on its own; the status may be non-zero.
    Completed(ToolOutput),
    /// The process outlived its timeout and was killed.
    TimedOut,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use loopcast_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> loopcast_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("error")
///     .arg("/path/to/video.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// File name of the program, for error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run the command to completion or until the timeout elapses.
    ///
    /// A non-zero exit is not an error here; the caller inspects the
    /// [`ToolOutput`]. On timeout the child is killed.
    ///
    /// # Errors
    ///
    /// Returns [`loopcast_core::Error::Tool`] if spawning the process or
    /// collecting its output fails.
    pub async fn run(&self) -> loopcast_core::Result<ToolRun> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout drops the child, which kills it.
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            loopcast_core::Error::tool(&program_name, format!("failed to spawn: {e}"))
        })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ToolRun::Completed(ToolOutput {
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })),
            Ok(Err(e)) => Err(loopcast_core::Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => Ok(ToolRun::TimedOut),
        }
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Returns [`loopcast_core::Error::Tool`] if the process times out (message
    ///   includes the timeout duration).
    /// - Returns [`loopcast_core::Error::Tool`] if the process exits with a non-zero
    ///   status (message includes stderr).
    /// - Returns [`loopcast_core::Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> loopcast_core::Result<ToolOutput> {
        match self.run().await? {
            ToolRun::Completed(output) if output.status.success() => Ok(output),
            ToolRun::Completed(output) => Err(loopcast_core::Error::tool(
                self.program_name(),
                format!(
                    "exited with status {}: {}",
                    output.status,
                    output.stderr.trim()
                ),
            )),
            ToolRun::TimedOut => Err(loopcast_core::Error::tool(
                self.program_name(),
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}
