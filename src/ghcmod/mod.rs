//! Driving ghc-mod's legacy-interactive mode over a persistent subprocess.

pub mod command;
pub mod error;
mod process;
pub mod protocol;
pub mod session;

use crate::ghcmod::command::GhcModCommand;
use crate::ghcmod::error::SessionError;

/// The command surface the provider layer runs against; implemented by
/// [`session::GhcModSession`] and mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GhcMod: Send + Sync {
    /// Runs one command, returning the decoded payload lines.
    async fn run_command(&self, command: GhcModCommand) -> Result<Vec<String>, SessionError>;

    /// Tears down the subprocess.
    async fn shutdown(&self);
}
