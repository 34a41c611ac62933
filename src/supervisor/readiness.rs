//! Readiness tracking for a server subprocess.
//!
//! A [`ReadinessMonitor`] consumes the server's output line by line and moves
//! a [`ServerState`] machine forward. Callers wait on the state with a
//! timeout instead of on the raw stream, so any reader and any predicate can
//! drive it.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Lifecycle of a supervised server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotStarted,
    Starting,
    Ready,
    ExitedWithoutReady,
    Terminated,
}

impl ServerState {
    /// A line matching the readiness predicate was seen.
    pub fn on_marker(self) -> Self {
        match self {
            ServerState::Starting => ServerState::Ready,
            other => other,
        }
    }

    /// The output stream closed. A ready server stays `Ready`; only a kill
    /// moves it to `Terminated`.
    pub fn on_output_closed(self) -> Self {
        match self {
            ServerState::NotStarted | ServerState::Starting => {
                ServerState::ExitedWithoutReady
            }
            other => other,
        }
    }

    /// The process was killed by the supervisor. This is the only way into
    /// `Terminated`.
    pub fn on_kill(self) -> Self {
        ServerState::Terminated
    }

    /// Whether waiting for readiness can stop.
    fn is_settled(self) -> bool {
        !matches!(self, ServerState::NotStarted | ServerState::Starting)
    }
}

/// Result of waiting for readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    ExitedWithoutReady,
    TimedOut,
}

/// Predicate matching lines that contain `marker`.
pub fn marker_predicate(
    marker: impl Into<String>,
) -> impl Fn(&str) -> bool + Send + Sync + 'static {
    let marker = marker.into();
    move |line: &str| line.contains(&marker)
}

/// Drives a [`ServerState`] from a line-oriented output stream.
#[derive(Debug)]
pub struct ReadinessMonitor {
    state: Arc<watch::Sender<ServerState>>,
    reader_task: JoinHandle<()>,
}

impl ReadinessMonitor {
    /// Start reading `reader` on a dedicated task.
    ///
    /// The task keeps draining output after readiness so the producer never
    /// blocks on a full pipe. `label` tags the logged lines.
    pub fn spawn<R, P>(reader: R, predicate: P, label: impl Into<String>) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let (tx, _rx) = watch::channel(ServerState::Starting);
        let state = Arc::new(tx);
        let label = label.into();

        let task_state = state.clone();
        let reader_task = tokio::spawn(async move {
            let mut reader = reader;
            let mut buf = Vec::new();

            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(server = %label, error = %e, "Output read failed");
                        break;
                    }
                }

                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                tracing::debug!(server = %label, "{line}");

                if *task_state.borrow() == ServerState::Starting && predicate(line) {
                    task_state.send_modify(|s| *s = s.on_marker());
                    tracing::info!(server = %label, "Server is ready");
                }
            }

            let before = *task_state.borrow();
            task_state.send_modify(|s| *s = s.on_output_closed());
            match before {
                ServerState::Starting => {
                    tracing::warn!(server = %label, "Output closed before readiness")
                }
                ServerState::Ready => {
                    tracing::warn!(server = %label, "Server output closed after readiness")
                }
                _ => {}
            }
        });

        Self { state, reader_task }
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Wait until the server is ready, has exited, or `timeout` elapses.
    pub async fn wait(&self, timeout: Duration) -> Readiness {
        let mut rx = self.state.subscribe();
        let settled = tokio::time::timeout(timeout, rx.wait_for(|s| s.is_settled())).await;

        match settled {
            Err(_) => Readiness::TimedOut,
            Ok(Err(_)) => Readiness::ExitedWithoutReady,
            Ok(Ok(state)) => match *state {
                ServerState::Ready => Readiness::Ready,
                _ => Readiness::ExitedWithoutReady,
            },
        }
    }

    /// Record that the process was killed and stop reading its output.
    pub fn terminate(&self) {
        self.state.send_modify(|s| *s = s.on_kill());
        self.reader_task.abort();
    }
}

impl Drop for ReadinessMonitor {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
