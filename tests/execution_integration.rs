//! Execution engine integration tests.
//!
//! These run real child processes and verify the engine's contract:
//! complete output capture, typed exit-code failures, timeout kills and
//! concurrent stream draining.

use std::time::{Duration, Instant};

use shell_exec::{
    execute_simple, execute_with_timeout, Command, CommandExecutor, ShellExecError,
};

#[cfg(unix)]
fn sh(script: &str) -> Command {
    Command::from_tokens(["sh", "-c", script])
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_empty_command_fails_without_launching() {
    let err = execute_simple(Vec::<String>::new()).unwrap_err();
    assert!(matches!(err, ShellExecError::InvalidCommand(_)));
}

#[test]
fn test_blank_token_fails_without_launching() {
    let err = execute_simple(["echo", "   "]).unwrap_err();
    assert!(matches!(err, ShellExecError::InvalidCommand(_)));
}

#[test]
fn test_missing_executable_is_launch_error() {
    let err = execute_simple(["no-such-binary-a93f1c"]).unwrap_err();
    assert!(matches!(err, ShellExecError::Launch(_)));
}

// ============================================================================
// Success path
// ============================================================================

#[test]
#[cfg(unix)]
fn test_echo_output_round_trip() {
    let result = execute_simple(["echo", "hello"]).unwrap();
    assert_eq!(result.output, "hello\n");
    assert_eq!(result.exit_code, 0);
    assert!(!result.timed_out);
    assert!(result.success());
}

#[test]
#[cfg(unix)]
fn test_idempotent_invocations() {
    let executor = CommandExecutor::new();
    let cmd = Command::from_tokens(["echo", "same"]);

    let first = executor.execute(&cmd).unwrap();
    let second = executor.execute(&cmd).unwrap();

    assert_eq!(first.output, second.output);
    assert_eq!(first.exit_code, second.exit_code);
    assert_eq!(first.timed_out, second.timed_out);
}

#[test]
#[cfg(unix)]
fn test_working_directory_override() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = Command::new("pwd").working_dir(dir.path());

    let result = CommandExecutor::new().execute(&cmd).unwrap();

    let reported = std::fs::canonicalize(result.output_trimmed()).unwrap();
    let expected = std::fs::canonicalize(dir.path()).unwrap();
    assert_eq!(reported, expected);
}

#[test]
#[cfg(unix)]
fn test_env_overlay_is_merged() {
    let cmd = sh("printf '%s' \"$SHELL_EXEC_IT\"").env("SHELL_EXEC_IT", "grounded");
    let result = CommandExecutor::new().execute(&cmd).unwrap();
    assert_eq!(result.output, "grounded");
}

#[test]
#[cfg(unix)]
fn test_env_replacement_drops_parent_vars() {
    // absolute path: PATH is gone once the parent env is dropped
    let cmd = Command::from_tokens(["/bin/sh", "-c", "printf '%s|%s' \"$FOO\" \"$HOME\""])
        .env("FOO", "bar")
        .inherit_env(false);

    let result = CommandExecutor::new().execute(&cmd).unwrap();
    assert_eq!(result.output, "bar|");
}

#[test]
#[cfg(unix)]
fn test_merged_streams_share_one_capture() {
    let cmd = sh("echo out; echo err >&2").merge_stderr(true);
    let result = CommandExecutor::new().execute(&cmd).unwrap();

    assert!(result.output.contains("out"));
    assert!(result.output.contains("err"));
    assert_eq!(result.exit_code, 0);
}

// ============================================================================
// Non-zero exit
// ============================================================================

#[test]
#[cfg(unix)]
fn test_exit_code_is_carried_exactly() {
    let err = CommandExecutor::new().execute(&sh("exit 3")).unwrap_err();
    match err {
        ShellExecError::NonZeroExit { code, .. } => assert_eq!(code, 3),
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[test]
#[cfg(unix)]
fn test_stderr_text_reaches_the_caller() {
    let err = CommandExecutor::new()
        .execute(&sh("echo oops >&2; exit 7"))
        .unwrap_err();
    match err {
        ShellExecError::NonZeroExit { code, stderr } => {
            assert_eq!(code, 7);
            assert_eq!(stderr, "oops\n");
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

// ============================================================================
// Timeout
// ============================================================================

#[test]
#[cfg(unix)]
fn test_timeout_kills_sleeping_child() {
    let start = Instant::now();
    let err = execute_with_timeout(["sleep", "5"], Duration::from_millis(100)).unwrap_err();

    match err {
        ShellExecError::TimedOut { timeout, .. } => {
            assert_eq!(timeout, Duration::from_millis(100));
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
    // the call returned long before the 5s sleep: the child is dead and
    // reaped, not detached
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[test]
#[cfg(unix)]
fn test_timeout_keeps_partial_output() {
    let cmd = sh("echo started; sleep 5").timeout(Duration::from_millis(300));
    let err = CommandExecutor::new().execute(&cmd).unwrap_err();

    match err {
        ShellExecError::TimedOut { output, .. } => {
            assert!(output.contains("started"));
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
}

#[test]
#[cfg(unix)]
fn test_fast_child_never_times_out() {
    let result = execute_with_timeout(["echo", "quick"], Duration::from_secs(5)).unwrap();
    assert_eq!(result.output, "quick\n");
    assert!(!result.timed_out);
}

#[test]
#[cfg(unix)]
fn test_non_zero_exit_within_budget_is_not_a_timeout() {
    let cmd = sh("exit 9").timeout(Duration::from_secs(5));
    let err = CommandExecutor::new().execute(&cmd).unwrap_err();
    assert!(matches!(err, ShellExecError::NonZeroExit { code: 9, .. }));
}

// ============================================================================
// Concurrent draining
// ============================================================================

#[test]
#[cfg(unix)]
fn test_heavy_output_on_both_streams_does_not_deadlock() {
    // each stream gets well over the OS pipe buffer size; sequential
    // draining would hang on the first full pipe
    let cmd = sh("seq 1 20000 >&2; seq 1 20000");
    let result = CommandExecutor::new().execute(&cmd).unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output_lines().count(), 20000);
}

#[test]
#[cfg(unix)]
fn test_large_stderr_is_fully_drained() {
    let err = CommandExecutor::new()
        .execute(&sh("seq 1 20000 >&2; exit 9"))
        .unwrap_err();
    match err {
        ShellExecError::NonZeroExit { code, stderr } => {
            assert_eq!(code, 9);
            assert_eq!(stderr.lines().count(), 20000);
            assert!(stderr.ends_with("20000\n"));
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[test]
#[cfg(unix)]
fn test_capture_cap_prevents_unbounded_growth() {
    let executor = CommandExecutor::new().max_capture_bytes(1024);
    let result = executor.execute(&sh("seq 1 2000")).unwrap();

    // seq 1 2000 is ~9KB; the capped buffer keeps only a tail
    assert_eq!(result.exit_code, 0);
    assert!(result.output.len() < 8000);
}

// ============================================================================
// Line forwarding and streaming
// ============================================================================

#[test]
#[cfg(unix)]
fn test_line_handler_sees_every_line() {
    use std::sync::{Arc, Mutex};

    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&collected);

    let result = CommandExecutor::new()
        .execute_with_handler(&sh("echo one; echo two"), move |line| {
            sink.lock().unwrap().push(line.to_string());
        })
        .unwrap();

    assert!(result.output.is_empty());
    assert_eq!(result.exit_code, 0);
    assert_eq!(&*collected.lock().unwrap(), &["one", "two"]);
}

#[tokio::test]
#[cfg(unix)]
async fn test_streaming_delivers_lines_then_result() {
    let executor = CommandExecutor::new();
    let cmd = sh("echo a; echo b");

    let (mut rx, handle) = executor.execute_streaming(&cmd).await.unwrap();

    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line.text);
    }
    assert_eq!(lines, vec!["a", "b"]);

    let result = handle.await.unwrap().unwrap();
    assert_eq!(result.exit_code, 0);
    assert!(!result.timed_out);
}

// ============================================================================
// Refresh-interval gating
// ============================================================================

#[test]
#[cfg(unix)]
fn test_refresh_interval_reuses_previous_result() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("runs");
    let script = format!("echo run >> {}; cat {}", marker.display(), marker.display());

    let gated = CommandExecutor::new().refresh_interval(Duration::from_secs(30));
    let first = gated.execute(&sh(&script)).unwrap();
    let second = gated.execute(&sh(&script)).unwrap();

    // second call was served from the previous run
    assert_eq!(first.output, second.output);
    assert_eq!(std::fs::read_to_string(&marker).unwrap().lines().count(), 1);

    // an ungated executor runs the command again
    CommandExecutor::new().execute(&sh(&script)).unwrap();
    assert_eq!(std::fs::read_to_string(&marker).unwrap().lines().count(), 2);
}
