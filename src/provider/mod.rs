//! Translates editor requests into ghc-mod commands and parses the replies.

pub mod document;

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, Location, Position, Range, Url,
};
use tracing::debug;

use crate::ghcmod::GhcMod;
use crate::ghcmod::command::GhcModCommand;
use crate::ghcmod::error::SessionError;
use crate::provider::document::{is_position_in_range, symbol_at_position};

/// `path:line:column: [Warning|Error: ]message`, 1-based.
static DIAGNOSTIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?):([0-9]+):([0-9]+): *(?:(Warning|Error): *)?").unwrap()
});

/// `-- Defined at path:line:column`, 1-based.
static DEFINED_AT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-- Defined at (.+?):(\d+):(\d+)").unwrap());

/// Code-intelligence operations over one analysis root.
pub struct GhcModProvider {
    ghc_mod: Arc<dyn GhcMod>,
    root: PathBuf,
}

impl GhcModProvider {
    pub fn new(ghc_mod: Arc<dyn GhcMod>, root: PathBuf) -> Self {
        Self { ghc_mod, root }
    }

    /// Checks a document, returning parsed diagnostics.
    ///
    /// `map_file` overlays `text` so unsaved buffers are checked instead of
    /// the on-disk file.
    pub async fn do_check(
        &self,
        text: &str,
        uri: &Url,
        map_file: bool,
    ) -> Result<Vec<Diagnostic>, SessionError> {
        let mut command = GhcModCommand::new("check").with_file(self.relative_path(uri));
        if map_file {
            command = command.with_text(text);
        }
        let lines = self.ghc_mod.run_command(command).await?;
        Ok(lines
            .iter()
            .filter_map(|line| parse_check_diagnostic(line))
            .collect())
    }

    /// Looks up the type at `position`.
    ///
    /// ghc-mod returns results narrowest range first; the first line whose
    /// range contains the position wins. Malformed lines are skipped.
    pub async fn get_type(
        &self,
        text: &str,
        uri: &Url,
        position: Position,
        map_file: bool,
    ) -> Result<String, SessionError> {
        let mut command = GhcModCommand::new("type")
            .with_file(self.relative_path(uri))
            .with_args(vec![
                (position.line + 1).to_string(),
                (position.character + 1).to_string(),
            ]);
        if map_file {
            command = command.with_text(text);
        }
        let lines = self.ghc_mod.run_command(command).await?;
        Ok(lines
            .iter()
            .find_map(|line| parse_type_info(line, position))
            .unwrap_or_default())
    }

    /// Looks up info for the symbol at `position`, stripped for tooltip use.
    pub async fn get_info(
        &self,
        text: &str,
        uri: &Url,
        position: Position,
        map_file: bool,
    ) -> Result<String, SessionError> {
        let info = self.get_info_raw(text, uri, position, map_file).await?;
        let tooltip = DEFINED_AT_RE.replace_all(&info, "").trim().to_string();
        if tooltip.contains("Cannot show info") {
            Ok(String::new())
        } else {
            Ok(tooltip)
        }
    }

    /// Resolves the definition sites of the symbol at `position` from the
    /// `-- Defined at` markers in ghc-mod's info output.
    pub async fn get_definition_location(
        &self,
        text: &str,
        uri: &Url,
        position: Position,
    ) -> Result<Vec<Location>, SessionError> {
        let info = self.get_info_raw(text, uri, position, false).await?;
        Ok(DEFINED_AT_RE
            .captures_iter(&info)
            .filter_map(|caps| self.location_from_capture(&caps))
            .collect())
    }

    pub async fn shutdown(&self) {
        self.ghc_mod.shutdown().await;
    }

    async fn get_info_raw(
        &self,
        text: &str,
        uri: &Url,
        position: Position,
        map_file: bool,
    ) -> Result<String, SessionError> {
        let Some(symbol) = symbol_at_position(text, position) else {
            return Ok(String::new());
        };
        if is_blacklisted(&symbol) {
            debug!("Skipping info lookup for comment-like symbol `{}`", symbol);
            return Ok(String::new());
        }

        let mut command = GhcModCommand::new("info")
            .with_file(self.relative_path(uri))
            .with_args(vec![symbol]);
        if map_file {
            command = command.with_text(text);
        }
        let lines = self.ghc_mod.run_command(command).await?;
        Ok(lines.join("\n"))
    }

    /// The target path sent on the wire, relative to the analysis root.
    fn relative_path(&self, uri: &Url) -> String {
        let Ok(path) = uri.to_file_path() else {
            return uri.path().to_string();
        };
        path.strip_prefix(&self.root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned()
    }

    fn location_from_capture(&self, caps: &regex::Captures<'_>) -> Option<Location> {
        let path = PathBuf::from(&caps[1]);
        let path = if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        };
        let line = caps[2].parse::<u32>().ok()?.checked_sub(1)?;
        let character = caps[3].parse::<u32>().ok()?.checked_sub(1)?;
        let position = Position { line, character };
        Some(Location {
            uri: Url::from_file_path(path).ok()?,
            range: Range {
                start: position,
                end: position,
            },
        })
    }
}

/// Comment sequences never name a symbol ghc-mod can describe.
fn is_blacklisted(symbol: &str) -> bool {
    symbol.contains("--") || symbol.contains("{-") || symbol.contains("-}")
}

/// Parses one `check` output line into a diagnostic, 1-based to 0-based.
/// A line without a `Warning:` marker is an error.
fn parse_check_diagnostic(line: &str) -> Option<Diagnostic> {
    let caps = DIAGNOSTIC_RE.captures(line)?;
    let full = caps.get(0)?;
    let lineno: u32 = caps[2].parse().ok()?;
    let column: u32 = caps[3].parse().ok()?;
    let severity = match caps.get(4).map(|m| m.as_str()) {
        Some("Warning") => DiagnosticSeverity::WARNING,
        _ => DiagnosticSeverity::ERROR,
    };
    let position = Position {
        line: lineno.saturating_sub(1),
        character: column.saturating_sub(1),
    };
    Some(Diagnostic {
        severity: Some(severity),
        range: Range {
            start: position,
            end: position,
        },
        message: line[full.end()..].to_string(),
        ..Diagnostic::default()
    })
}

/// Parses one `type` output line: `startLine startCol endLine endCol "type"`,
/// 1-based. Returns the type text when the range contains `position`.
fn parse_type_info(line: &str, position: Position) -> Option<String> {
    let (coords, rest) = line.split_once('"')?;
    let type_text = rest.strip_suffix('"').unwrap_or(rest);

    let mut numbers = coords
        .split_whitespace()
        .map(|token| token.parse::<u32>().ok()?.checked_sub(1));
    let start_line = numbers.next()??;
    let start_character = numbers.next()??;
    let end_line = numbers.next()??;
    let end_character = numbers.next()??;
    if numbers.next().is_some() {
        return None;
    }

    let range = Range {
        start: Position {
            line: start_line,
            character: start_character,
        },
        end: Position {
            line: end_line,
            character: end_character,
        },
    };

    if is_position_in_range(position, range) {
        Some(type_text.to_string())
    } else {
        None
    }
}
