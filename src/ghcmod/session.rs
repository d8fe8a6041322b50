//! The ghc-mod session: one subprocess, one command in flight at a time.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ghcmod::GhcMod;
use crate::ghcmod::command::GhcModCommand;
use crate::ghcmod::error::SessionError;
use crate::ghcmod::process::GhcModProcess;

/// How a session spawns and waits on its subprocess.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub executable: PathBuf,
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("ghc-mod"),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Default)]
struct SessionState {
    process: Option<GhcModProcess>,
}

/// Owns one `ghc-mod legacy-interactive` subprocess per analysis root.
///
/// The subprocess is a REPL with a single shared cursor of state (its notion
/// of the current file), so commands from concurrent callers are strictly
/// serialized: a command's bytes are not written until the previous command's
/// response has fully resolved. tokio's mutex wakes waiters in FIFO order,
/// which makes the queue ordering the submission ordering.
pub struct GhcModSession {
    options: SessionOptions,
    state: Mutex<SessionState>,
}

impl GhcModSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Runs the map/command/unmap bracket against a live process.
    async fn drive(
        &self,
        process: &mut GhcModProcess,
        command: &GhcModCommand,
    ) -> Result<Vec<String>, SessionError> {
        let timeout = self.options.timeout;

        if let Some(frame) = command.map_file_frame() {
            process.interact(&frame, "map-file", timeout).await?;
        }

        let result = process
            .interact(&command.encode(), &command.command, timeout)
            .await;

        // Release the overlay even when the command failed, so it never
        // leaks into the next command. Skipped when the process is gone;
        // a failure here is logged but must not mask the command's outcome.
        if let Some(frame) = command.unmap_file_frame() {
            let process_alive = !matches!(result, Err(SessionError::Crash { .. }));
            if process_alive {
                if let Err(e) = process.interact(&frame, "unmap-file", timeout).await {
                    warn!("Failed to unmap {:?}: {}", command.file, e);
                }
            }
        }

        result
    }
}

#[async_trait::async_trait]
impl GhcMod for GhcModSession {
    async fn run_command(&self, command: GhcModCommand) -> Result<Vec<String>, SessionError> {
        // Single-flight queue: the lock is held across the whole bracket.
        let mut state = self.state.lock().await;

        // Respawn if the process is absent or exited since the last command.
        let mut existing = state.process.take();
        if existing.as_mut().is_some_and(|p| p.has_exited()) {
            info!("ghc-mod process exited since the last command, respawning");
            existing = None;
        }
        let process = match existing {
            Some(process) => state.process.insert(process),
            None => state
                .process
                .insert(GhcModProcess::spawn(&self.options.executable)?),
        };

        debug!("Running ghc-mod command `{}`", command.command);
        let result = self.drive(process, &command).await;

        // A crashed process is gone; drop the handle so the next command
        // respawns.
        if matches!(result, Err(SessionError::Crash { .. })) {
            state.process = None;
        }

        result
    }

    /// Tears down the subprocess. Idempotent; a later command would lazily
    /// respawn, but the backend stops issuing commands after LSP shutdown.
    async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(process) = state.process.take() {
            process.kill().await;
            info!("ghc-mod session shut down");
        }
    }
}
