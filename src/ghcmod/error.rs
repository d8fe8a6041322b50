use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to spawn ghc-mod process {executable:?}: {source}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ghc-mod command `{command}` timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("ghc-mod exited while running `{command}` ({} partial lines)", partial.len())]
    Crash {
        command: String,
        /// Output accumulated before the process went away.
        partial: Vec<String>,
    },
}
