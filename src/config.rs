use std::path::PathBuf;

use serde::Deserialize;

/// Delay before re-checking a document after an edit, per document.
pub const CHECK_DELAY_MS: u64 = 250;

/// Delay before answering a hover request; only the latest hover matters.
pub const HOVER_DELAY_MS: u64 = 100;

/// Server settings, supplied via initialization options or
/// `workspace/didChangeConfiguration` under the `ghcMod` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Path to the ghc-mod executable.
    pub executable_path: PathBuf,
    /// Maximum number of diagnostics published per document.
    pub max_number_of_problems: usize,
    /// Seconds to wait for a ghc-mod command before failing it.
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable_path: PathBuf::from("ghc-mod"),
            max_number_of_problems: 100,
            timeout_secs: 60,
        }
    }
}

/// Envelope of a `didChangeConfiguration` payload: `{ "ghcMod": { ... } }`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceSettings {
    pub ghc_mod: Settings,
}

/// Returns the path to the data directory for ghcmod-lsp.
/// Uses $XDG_DATA_HOME/ghcmod-lsp if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/ghcmod-lsp,
/// or ./ghcmod-lsp if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("ghcmod-lsp.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("ghcmod-lsp")
}
