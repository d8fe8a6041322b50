//! ghc-mod command model and request framing.

use crate::ghcmod::protocol::{EOT, LINE_SEP};

/// A single ghc-mod command, immutable once submitted.
///
/// `text` carries unsaved editor content; when present the command is
/// bracketed with `map-file`/`unmap-file` so ghc-mod analyzes the buffer
/// instead of the file on disk.
#[derive(Debug, Clone, Default)]
pub struct GhcModCommand {
    /// Command name, e.g. `check`, `type`, `info`.
    pub command: String,
    /// Target path, relative to the session's analysis root.
    pub file: Option<String>,
    /// Positional arguments appended after the path.
    pub args: Vec<String>,
    /// Unsaved buffer content to overlay over `file`.
    pub text: Option<String>,
}

impl GhcModCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Encodes the command line: `name [file] [args...]` joined by spaces,
    /// embedded line separators collapsed to single spaces, terminated by the
    /// line separator.
    pub fn encode(&self) -> String {
        let mut parts = vec![self.command.as_str()];
        if let Some(file) = &self.file {
            parts.push(file);
        }
        parts.extend(self.args.iter().map(String::as_str));
        let mut line = parts.join(" ").replace(LINE_SEP, " ");
        line.push_str(LINE_SEP);
        line
    }

    /// The `map-file` frame establishing the overlay, if this command
    /// carries unsaved text.
    pub fn map_file_frame(&self) -> Option<String> {
        let text = self.text.as_ref()?;
        let file = self.file.as_deref().unwrap_or_default();
        Some(format!("map-file {}{}{}{}", file, LINE_SEP, text, EOT))
    }

    /// The `unmap-file` frame releasing the overlay.
    pub fn unmap_file_frame(&self) -> Option<String> {
        self.text.as_ref()?;
        let file = self.file.as_deref().unwrap_or_default();
        Some(format!("unmap-file {}{}", file, LINE_SEP))
    }
}
