//! The media server subprocess.

use std::process::Stdio;

use tokio::io::BufReader;
use tokio::process::{Child, Command};

use loopcast_core::config::MediaServerConfig;
use loopcast_core::{Error, Result};

use super::readiness::{marker_predicate, Readiness, ReadinessMonitor, ServerState};

/// A running media server that has reported readiness.
#[derive(Debug)]
pub struct MediaServer {
    program: String,
    child: Child,
    monitor: ReadinessMonitor,
}

impl MediaServer {
    /// Start the server and block until its readiness marker appears.
    ///
    /// Exiting or timing out before the marker is an [`Error::NotReady`]; the
    /// process is killed before returning in either case.
    pub async fn start_and_await_ready(config: &MediaServerConfig) -> Result<Self> {
        let program = config.command.display().to_string();

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        tracing::info!(command = %program, "Starting media server");

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::tool(&program, format!("failed to start: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("media server stdout not captured".into()))?;

        let monitor = ReadinessMonitor::spawn(
            BufReader::new(stdout),
            marker_predicate(config.ready_marker.clone()),
            program.clone(),
        );

        let mut server = Self {
            program,
            child,
            monitor,
        };

        match server.monitor.wait(config.ready_timeout()).await {
            Readiness::Ready => {
                tracing::info!(command = %server.program, "Media server ready");
                Ok(server)
            }
            Readiness::ExitedWithoutReady => {
                let program = server.program.clone();
                server.kill().await;
                Err(Error::NotReady(format!(
                    "{program} exited without printing \"{}\"",
                    config.ready_marker
                )))
            }
            Readiness::TimedOut => {
                let program = server.program.clone();
                server.kill().await;
                Err(Error::NotReady(format!(
                    "{program} did not become ready within {}s",
                    config.ready_timeout_secs
                )))
            }
        }
    }

    pub fn state(&self) -> ServerState {
        self.monitor.state()
    }

    /// Forcibly stop the server.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(command = %self.program, error = %e, "Media server kill failed");
        }
        self.monitor.terminate();
        tracing::info!(command = %self.program, "Media server stopped");
    }
}
