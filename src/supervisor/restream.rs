//! Tracked loop-stream subprocesses.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

use loopcast_av::{RestreamLauncher, Validator};

/// Stderr lines kept for a failed stream.
pub const STDERR_TAIL_LINES: usize = 20;

/// How one loop stream ended.
#[derive(Debug)]
pub enum StreamOutcome {
    /// Not launched: the source failed its launch-time check.
    Skipped { stream_name: String, reason: String },
    /// The process exited successfully.
    Exited { stream_name: String, status: ExitStatus },
    /// The process could not start, could not be checked, or exited non-zero.
    Failed {
        stream_name: String,
        error: String,
        stderr_tail: Vec<String>,
    },
    /// Stopped by shutdown.
    Cancelled { stream_name: String },
}

impl StreamOutcome {
    pub fn stream_name(&self) -> &str {
        match self {
            StreamOutcome::Skipped { stream_name, .. }
            | StreamOutcome::Exited { stream_name, .. }
            | StreamOutcome::Failed { stream_name, .. }
            | StreamOutcome::Cancelled { stream_name } => stream_name,
        }
    }
}

/// Owns every running loop stream.
///
/// Each stream runs on its own task inside a [`JoinSet`]; cancelling the
/// shared token kills every child process.
pub struct StreamSupervisor {
    launcher: Arc<dyn RestreamLauncher>,
    validator: Arc<dyn Validator>,
    cancel: CancellationToken,
    tasks: JoinSet<StreamOutcome>,
    names: HashMap<Id, String>,
}

impl StreamSupervisor {
    pub fn new(
        launcher: Arc<dyn RestreamLauncher>,
        validator: Arc<dyn Validator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            launcher,
            validator,
            cancel,
            tasks: JoinSet::new(),
            names: HashMap::new(),
        }
    }

    /// Launch `source` as a looping stream named `stream_name`.
    ///
    /// The source is re-validated first and skipped if it is now corrupted.
    /// Problems surface as the task's [`StreamOutcome`], never as a panic or
    /// error here.
    pub fn start_loop_stream(&mut self, source: PathBuf, stream_name: String) {
        let launcher = self.launcher.clone();
        let validator = self.validator.clone();
        let cancel = self.cancel.child_token();

        let task_name = stream_name.clone();
        let handle = self.tasks.spawn(async move {
            let outcome = run_stream(launcher, validator, source, task_name, cancel).await;
            log_outcome(&outcome);
            outcome
        });
        self.names.insert(handle.id(), stream_name);
    }

    /// Streams still running.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next stream to end. `None` once all have ended.
    ///
    /// A task that panicked is reported as [`StreamOutcome::Failed`] under
    /// the name it was started with.
    pub async fn next_outcome(&mut self) -> Option<StreamOutcome> {
        let outcome = match self.tasks.join_next_with_id().await? {
            Ok((id, outcome)) => {
                self.names.remove(&id);
                outcome
            }
            Err(e) => {
                let stream_name = self.names.remove(&e.id()).unwrap_or_default();
                let outcome = StreamOutcome::Failed {
                    stream_name,
                    error: format!("stream task failed: {e}"),
                    stderr_tail: Vec::new(),
                };
                log_outcome(&outcome);
                outcome
            }
        };
        Some(outcome)
    }

    /// Cancel every stream and collect how each ended.
    pub async fn shutdown(mut self) -> Vec<StreamOutcome> {
        self.cancel.cancel();
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        while let Some(outcome) = self.next_outcome().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

async fn run_stream(
    launcher: Arc<dyn RestreamLauncher>,
    validator: Arc<dyn Validator>,
    source: PathBuf,
    stream_name: String,
    cancel: CancellationToken,
) -> StreamOutcome {
    match validator.is_corrupted(&source).await {
        Ok(false) => {}
        Ok(true) => {
            return StreamOutcome::Skipped {
                stream_name,
                reason: format!("{} is corrupted", source.display()),
            };
        }
        Err(e) => {
            return StreamOutcome::Failed {
                stream_name,
                error: format!("launch check failed: {e}"),
                stderr_tail: Vec::new(),
            };
        }
    }

    let mut cmd = launcher.command(&source, &stream_name);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return StreamOutcome::Failed {
                stream_name,
                error: format!("failed to start {}: {e}", launcher.name()),
                stderr_tail: Vec::new(),
            };
        }
    };

    tracing::info!(
        stream = %stream_name,
        source = %source.display(),
        pid = child.id(),
        "Loop stream started"
    );

    let tail = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(collect_tail(stderr, stream_name.clone())));

    tokio::select! {
        status = child.wait() => {
            let stderr_tail = match tail {
                Some(handle) => handle.await.unwrap_or_default(),
                None => Vec::new(),
            };
            match status {
                Ok(status) if status.success() => StreamOutcome::Exited { stream_name, status },
                Ok(status) => StreamOutcome::Failed {
                    stream_name,
                    error: format!("{} exited with {status}", launcher.name()),
                    stderr_tail,
                },
                Err(e) => StreamOutcome::Failed {
                    stream_name,
                    error: format!("wait failed: {e}"),
                    stderr_tail,
                },
            }
        }
        _ = cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                tracing::debug!(stream = %stream_name, error = %e, "Kill failed");
            }
            if let Some(handle) = tail {
                handle.abort();
            }
            StreamOutcome::Cancelled { stream_name }
        }
    }
}

/// Drain `stderr`, keeping the last [`STDERR_TAIL_LINES`] lines.
async fn collect_tail<R: AsyncRead + Unpin>(stderr: R, stream_name: String) -> Vec<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::trace!(stream = %stream_name, "{line}");
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::trace!(stream = %stream_name, error = %e, "stderr read failed");
                break;
            }
        }
    }

    tail.into()
}

fn log_outcome(outcome: &StreamOutcome) {
    match outcome {
        StreamOutcome::Skipped { stream_name, reason } => {
            tracing::warn!(stream = %stream_name, "Skipping stream: {reason}")
        }
        StreamOutcome::Exited { stream_name, status } => {
            tracing::info!(stream = %stream_name, %status, "Loop stream exited")
        }
        StreamOutcome::Failed {
            stream_name,
            error,
            stderr_tail,
        } => tracing::error!(
            stream = %stream_name,
            stderr = %stderr_tail.join("\n"),
            "Loop stream failed: {error}"
        ),
        StreamOutcome::Cancelled { stream_name } => {
            tracing::debug!(stream = %stream_name, "Loop stream cancelled")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tail_keeps_last_lines() {
        let input: Vec<u8> = (0..30)
            .map(|i| format!("line {i}\n"))
            .collect::<String>()
            .into_bytes();
        let tail = collect_tail(&input[..], "s".into()).await;
        assert_eq!(tail.len(), STDERR_TAIL_LINES);
        assert_eq!(tail.first().map(String::as_str), Some("line 10"));
        assert_eq!(tail.last().map(String::as_str), Some("line 29"));
    }

    #[test]
    fn outcome_stream_name() {
        let outcome = StreamOutcome::Cancelled {
            stream_name: "lobby".into(),
        };
        assert_eq!(outcome.stream_name(), "lobby");
    }
}
