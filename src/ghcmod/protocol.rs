//! Wire protocol for ghc-mod's legacy-interactive mode.
//!
//! Responses are a sequence of lines terminated by a line containing exactly
//! `OK`. Payload lines encode embedded newlines as NUL bytes, which are
//! decoded back to the platform line separator before the payload is handed
//! to the caller.

/// Platform line separator, matching what ghc-mod emits on each platform.
#[cfg(not(windows))]
pub const LINE_SEP: &str = "\n";
#[cfg(windows)]
pub const LINE_SEP: &str = "\r\n";

/// End-of-transmission marker terminating a `map-file` payload.
#[cfg(not(windows))]
pub const EOT: &str = "\n\x04\n";
#[cfg(windows)]
pub const EOT: &str = "\r\n\x04\r\n";

/// The line marking the end of a response.
pub const SENTINEL: &str = "OK";

/// Decodes NUL-escaped embedded newlines in a payload line.
pub fn decode_line(line: &str) -> String {
    line.replace('\0', LINE_SEP)
}

/// Incremental parser for a sentinel-terminated response.
///
/// The subprocess may flush output in arbitrary fragments, so chunks are
/// buffered and the sentinel check re-runs after every complete line.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    lines: Vec<String>,
    partial: String,
    undecoded: Vec<u8>,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw stdout chunk. A multi-byte UTF-8 sequence split across
    /// reads is held back undecoded until its remaining bytes arrive; bytes
    /// that can never form a valid sequence become replacement characters.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Option<Vec<String>> {
        self.undecoded.extend_from_slice(chunk);

        let mut decoded = String::new();
        loop {
            match std::str::from_utf8(&self.undecoded) {
                Ok(text) => {
                    decoded.push_str(text);
                    self.undecoded.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    decoded.push_str(&String::from_utf8_lossy(&self.undecoded[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            decoded.push(char::REPLACEMENT_CHARACTER);
                            self.undecoded.drain(..valid + len);
                        }
                        None => {
                            // Incomplete trailing code point; keep it for the
                            // next chunk.
                            self.undecoded.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        self.push_chunk(&decoded)
    }

    /// Feeds one stdout chunk. Returns the decoded payload once the sentinel
    /// line has been seen, `None` while the response is still incomplete.
    pub fn push_chunk(&mut self, chunk: &str) -> Option<Vec<String>> {
        self.partial.push_str(chunk);

        while let Some(idx) = self.partial.find(LINE_SEP) {
            let rest = self.partial.split_off(idx + LINE_SEP.len());
            let mut line = std::mem::replace(&mut self.partial, rest);
            line.truncate(idx);

            if line == SENTINEL {
                return Some(self.lines.drain(..).map(|l| decode_line(&l)).collect());
            }
            self.lines.push(line);
        }

        None
    }

    /// Lines accumulated so far, for crash diagnostics.
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
