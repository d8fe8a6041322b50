//! Integration tests for the ghc-mod session against a fake subprocess.

#![cfg(unix)]

mod helper;

use std::time::Duration;

use tempfile::TempDir;

use ghcmod_lsp::ghcmod::GhcMod;
use ghcmod_lsp::ghcmod::command::GhcModCommand;
use ghcmod_lsp::ghcmod::error::SessionError;
use ghcmod_lsp::ghcmod::session::{GhcModSession, SessionOptions};

use helper::{read_wire_log, write_fake_ghc_mod};

struct Fixture {
    _temp_dir: TempDir,
    log: std::path::PathBuf,
    session: GhcModSession,
}

fn fixture() -> Fixture {
    fixture_with_timeout(Duration::from_secs(5))
}

fn fixture_with_timeout(timeout: Duration) -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let log = temp_dir.path().join("wire.log");
    let executable = write_fake_ghc_mod(temp_dir.path(), &log);
    let session = GhcModSession::new(SessionOptions {
        executable,
        timeout,
    });
    Fixture {
        _temp_dir: temp_dir,
        log,
        session,
    }
}

#[tokio::test]
async fn check_command_returns_payload_lines() {
    let fx = fixture();
    let lines = fx
        .session
        .run_command(GhcModCommand::new("check").with_file("A.hs"))
        .await
        .unwrap();
    assert_eq!(lines, vec!["A.hs:5:7:Not in scope: `a`"]);
    fx.session.shutdown().await;
}

#[tokio::test]
async fn empty_response_yields_no_lines() {
    let fx = fixture();
    let lines = fx
        .session
        .run_command(GhcModCommand::new("empty"))
        .await
        .unwrap();
    assert!(lines.is_empty());
    fx.session.shutdown().await;
}

#[tokio::test]
async fn nul_bytes_in_payload_decode_to_newlines() {
    let fx = fixture();
    let lines = fx
        .session
        .run_command(GhcModCommand::new("nul"))
        .await
        .unwrap();
    assert_eq!(lines, vec!["first\nsecond"]);
    fx.session.shutdown().await;
}

#[tokio::test]
async fn multibyte_output_survives_chunked_reads() {
    let fx = fixture();
    // The response line is longer than one stdout read, so the trailing
    // two-byte character straddles the chunk boundary.
    let lines = fx
        .session
        .run_command(GhcModCommand::new("wide"))
        .await
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].len(), 8193);
    assert!(lines[0].ends_with('\u{e9}'));
    fx.session.shutdown().await;
}

#[tokio::test]
async fn concurrent_commands_complete_in_submission_order() {
    let fx = fixture();

    let a = fx.session.run_command(GhcModCommand::new("echo").with_args(vec!["alpha".into()]));
    let b = fx.session.run_command(GhcModCommand::new("echo").with_args(vec!["beta".into()]));
    let c = fx.session.run_command(GhcModCommand::new("echo").with_args(vec!["gamma".into()]));

    let (a, b, c) = futures::join!(a, b, c);
    // Each caller gets its own command's response, never a neighbor's.
    assert_eq!(a.unwrap(), vec!["alpha"]);
    assert_eq!(b.unwrap(), vec!["beta"]);
    assert_eq!(c.unwrap(), vec!["gamma"]);

    // The subprocess saw whole command lines in submission order; no
    // interleaved bytes.
    assert_eq!(
        read_wire_log(&fx.log),
        vec!["echo alpha", "echo beta", "echo gamma"]
    );
    fx.session.shutdown().await;
}

#[tokio::test]
async fn overlay_commands_bracket_with_map_and_unmap() {
    let fx = fixture();
    let lines = fx
        .session
        .run_command(
            GhcModCommand::new("check")
                .with_file("A.hs")
                .with_text("main = undefined"),
        )
        .await
        .unwrap();
    assert_eq!(lines, vec!["A.hs:5:7:Not in scope: `a`"]);

    // map-file (with its payload) strictly precedes the real command, and
    // unmap-file follows it.
    assert_eq!(
        read_wire_log(&fx.log),
        vec![
            "map-file A.hs",
            "main = undefined",
            "check A.hs",
            "unmap-file A.hs"
        ]
    );
    fx.session.shutdown().await;
}

#[tokio::test]
async fn overlay_is_released_even_when_the_command_times_out() {
    let fx = fixture_with_timeout(Duration::from_millis(200));

    let err = fx
        .session
        .run_command(
            GhcModCommand::new("slow")
                .with_file("A.hs")
                .with_text("main = undefined"),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Timeout { command, .. } if command == "slow"
    ));

    // The subprocess outlives the timeout and still receives the unmap-file
    // frame once it gets around to reading it.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        read_wire_log(&fx.log).last().map(String::as_str),
        Some("unmap-file A.hs")
    );
    fx.session.shutdown().await;
}

#[tokio::test]
async fn crash_rejects_command_and_next_command_respawns() {
    let fx = fixture();

    let err = fx
        .session
        .run_command(GhcModCommand::new("crash"))
        .await
        .unwrap_err();
    match err {
        SessionError::Crash { command, partial } => {
            assert_eq!(command, "crash");
            assert!(partial.is_empty());
        }
        other => panic!("expected crash error, got {other:?}"),
    }

    // The session self-heals: the next command spawns a fresh process.
    let lines = fx
        .session
        .run_command(GhcModCommand::new("check").with_file("A.hs"))
        .await
        .unwrap();
    assert_eq!(lines, vec!["A.hs:5:7:Not in scope: `a`"]);
    fx.session.shutdown().await;
}

#[tokio::test]
async fn slow_command_times_out() {
    let fx = fixture_with_timeout(Duration::from_millis(200));

    let err = fx
        .session
        .run_command(GhcModCommand::new("hang"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Timeout { command, .. } if command == "hang"
    ));

    fx.session.shutdown().await;
}

#[tokio::test]
async fn missing_executable_fails_with_spawn_error() {
    let temp_dir = TempDir::new().unwrap();
    let session = GhcModSession::new(SessionOptions {
        executable: temp_dir.path().join("does-not-exist"),
        timeout: Duration::from_secs(1),
    });

    let err = session
        .run_command(GhcModCommand::new("check").with_file("A.hs"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Spawn { .. }));
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let fx = fixture();
    fx.session
        .run_command(GhcModCommand::new("empty"))
        .await
        .unwrap();
    fx.session.shutdown().await;
    fx.session.shutdown().await;
}
