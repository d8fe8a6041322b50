//! Lifecycle of the `ghc-mod legacy-interactive` subprocess.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::ghcmod::error::SessionError;
use crate::ghcmod::protocol::ResponseAccumulator;
use crate::throttle::ThrottledDelayer;

/// How long stderr lines are batched before being logged.
const STDERR_DELAY_MS: u64 = 100;

/// A live ghc-mod child with exclusive ownership of its stdio pipes.
///
/// All writes and reads happen through [`interact`], one command at a time;
/// the session layer enforces that discipline with its queue.
///
/// [`interact`]: GhcModProcess::interact
pub(crate) struct GhcModProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl GhcModProcess {
    /// Spawns `<executable> legacy-interactive` with piped stdio.
    pub(crate) fn spawn(executable: &Path) -> Result<Self, SessionError> {
        let spawn_err = |source| SessionError::Spawn {
            executable: executable.to_path_buf(),
            source,
        };

        let mut child = Command::new(executable)
            .arg("legacy-interactive")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_err(std::io::Error::other("stdin not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_err(std::io::Error::other("stdout not captured")))?;
        if let Some(stderr) = child.stderr.take() {
            drain_stderr(stderr);
        }

        debug!("Spawned ghc-mod process from {:?}", executable);
        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    /// True once the child has exited (or its status can no longer be read).
    pub(crate) fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Writes one framed command and awaits its sentinel-terminated response.
    pub(crate) async fn interact(
        &mut self,
        frame: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, SessionError> {
        if let Err(e) = self.write_frame(frame).await {
            warn!("Failed to write `{}` to ghc-mod stdin: {}", command, e);
            return Err(SessionError::Crash {
                command: command.to_string(),
                partial: Vec::new(),
            });
        }
        self.wait_for_answer(command, timeout).await
    }

    async fn write_frame(&mut self, frame: &str) -> std::io::Result<()> {
        self.stdin.write_all(frame.as_bytes()).await?;
        self.stdin.flush().await
    }

    /// Reads stdout until the sentinel, EOF (crash), or the deadline.
    ///
    /// Pending-response state machine: awaiting -> (satisfied | crashed |
    /// timed-out). On timeout the child is left running; partial output is
    /// logged and discarded.
    async fn wait_for_answer(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, SessionError> {
        let deadline = Instant::now() + timeout;
        let mut acc = ResponseAccumulator::new();
        let mut buf = vec![0u8; 8192];

        loop {
            let read = tokio::time::timeout_at(deadline, self.stdout.read(&mut buf)).await;
            match read {
                Err(_) => {
                    warn!(
                        "Timeout on ghc-mod command `{}`; output so far: {:?}",
                        command,
                        acc.into_lines()
                    );
                    return Err(SessionError::Timeout {
                        command: command.to_string(),
                        timeout_secs: timeout.as_secs(),
                    });
                }
                Ok(Ok(0)) => {
                    return Err(SessionError::Crash {
                        command: command.to_string(),
                        partial: acc.into_lines(),
                    });
                }
                Ok(Ok(n)) => {
                    if let Some(payload) = acc.push_bytes(&buf[..n]) {
                        return Ok(payload);
                    }
                }
                Ok(Err(e)) => {
                    warn!("Failed to read ghc-mod stdout: {}", e);
                    return Err(SessionError::Crash {
                        command: command.to_string(),
                        partial: acc.into_lines(),
                    });
                }
            }
        }
    }

    /// Closes stdin and terminates the child. Safe to call on an already
    /// exited process.
    pub(crate) async fn kill(mut self) {
        let _ = self.stdin.shutdown().await;
        if let Err(e) = self.child.kill().await {
            debug!("Failed to kill ghc-mod process: {}", e);
        }
        debug!("ghc-mod process terminated");
    }
}

/// Logs the child's stderr, batching bursts through a delayer so each spurt
/// of output lands in one log record.
fn drain_stderr(stderr: tokio::process::ChildStderr) {
    let delayer = ThrottledDelayer::new(Duration::from_millis(STDERR_DELAY_MS));
    let buffered: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            buffered.lock().unwrap().push(line);
            let buffered = Arc::clone(&buffered);
            let flush = delayer.trigger(move || async move {
                let drained: Vec<String> = buffered.lock().unwrap().drain(..).collect();
                if !drained.is_empty() {
                    warn!("ghc-mod stderr: {}", drained.join("\n"));
                }
            });
            drop(flush);
        }
    });
}
