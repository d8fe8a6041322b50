//! Shared test plumbing: a fake ghc-mod executable speaking the
//! legacy-interactive wire protocol, and LSP request builders.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tower_lsp::ClientSocket;
use tower_lsp::jsonrpc::Request;
use tower_lsp::lsp_types::Url;

/// Writes an executable shell script that mimics `ghc-mod
/// legacy-interactive`: it logs every received command line to `log`, answers
/// a small set of commands, and terminates each response with the `OK`
/// sentinel.
#[cfg(unix)]
pub fn write_fake_ghc_mod(dir: &Path, log: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-ghc-mod");
    let script = format!(
        r#"#!/bin/sh
LOG='{log}'
EOT=$(printf '\004')
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$LOG"
  set -- $line
  cmd=$1
  case "$cmd" in
    map-file)
      while IFS= read -r payload; do
        if [ "$payload" = "$EOT" ]; then break; fi
        printf '%s\n' "$payload" >> "$LOG"
      done
      echo OK
      ;;
    unmap-file)
      echo OK
      ;;
    check)
      echo 'A.hs:5:7:Not in scope: `a`'
      echo OK
      ;;
    info)
      echo 'x :: Int -- Defined at A.hs:1:1'
      echo OK
      ;;
    type)
      echo '1 8 1 9 "Int"'
      echo '1 1 1 9 "IO ()"'
      echo OK
      ;;
    empty)
      echo OK
      ;;
    echo)
      shift
      echo "$@"
      echo OK
      ;;
    nul)
      printf 'first\0second\n'
      echo OK
      ;;
    wide)
      head -c 8191 /dev/zero | tr '\0' 'a'
      printf 'é\n'
      echo OK
      ;;
    slow)
      sleep 1
      echo OK
      ;;
    crash)
      exit 1
      ;;
    hang)
      sleep 30
      echo OK
      ;;
    *)
      echo "unknown command $cmd"
      echo OK
      ;;
  esac
done
"#,
        log = log.display()
    );

    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Command lines the fake executable received, in arrival order.
pub fn read_wire_log(log: &Path) -> Vec<String> {
    std::fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn create_initialize_request(id: i64, root: &Path, executable: &Path) -> Request {
    Request::build("initialize")
        .id(id)
        .params(json!({
            "capabilities": {},
            "rootUri": Url::from_file_path(root).unwrap(),
            "initializationOptions": {
                "executablePath": executable.display().to_string(),
                "timeoutSecs": 5,
            },
        }))
        .finish()
}

pub fn create_initialized_notification() -> Request {
    Request::build("initialized").params(json!({})).finish()
}

pub fn create_did_open_notification(uri: &str, text: &str) -> Request {
    Request::build("textDocument/didOpen")
        .params(json!({
            "textDocument": {
                "uri": uri,
                "languageId": "haskell",
                "version": 1,
                "text": text,
            },
        }))
        .finish()
}

pub fn create_did_change_notification(uri: &str, text: &str) -> Request {
    Request::build("textDocument/didChange")
        .params(json!({
            "textDocument": { "uri": uri, "version": 2 },
            "contentChanges": [{ "text": text }],
        }))
        .finish()
}

pub fn create_hover_request(id: i64, uri: &str, line: u32, character: u32) -> Request {
    Request::build("textDocument/hover")
        .id(id)
        .params(json!({
            "textDocument": { "uri": uri },
            "position": { "line": line, "character": character },
        }))
        .finish()
}

/// Forwards every server-to-client message from the socket into a channel.
pub fn spawn_notification_collector(mut socket: ClientSocket) -> mpsc::UnboundedReceiver<Request> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(message) = socket.next().await {
            let _ = tx.send(message);
        }
    });
    rx
}

/// Waits for the next notification with the given method, discarding others.
pub async fn wait_for_notification(
    rx: &mut mpsc::UnboundedReceiver<Request>,
    method: &str,
) -> Option<Request> {
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(message) = rx.recv().await {
            if message.method() == method {
                return Some(message);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}
