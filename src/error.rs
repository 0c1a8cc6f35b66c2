//! Error types for shell-exec.

use std::time::Duration;

use thiserror::Error;

/// Main error type for shell-exec operations.
#[derive(Error, Debug)]
pub enum ShellExecError {
    /// Malformed invocation: empty token list or a blank token.
    /// No process is launched.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The OS refused to create the process (missing executable,
    /// permission denied).
    #[error("failed to launch process: {0}")]
    Launch(#[source] std::io::Error),

    /// Process ran to completion but exited with a non-zero code.
    ///
    /// Carries the text captured from the error stream so callers can log
    /// diagnostics and branch on the code.
    #[error("command exited with code {code}: {stderr}")]
    NonZeroExit {
        /// Platform-native exit code.
        code: i32,
        /// Captured error-stream text.
        stderr: String,
    },

    /// Process was forcibly killed after exceeding its time budget.
    ///
    /// Distinct from [`ShellExecError::NonZeroExit`] even though the
    /// OS-level exit status also reflects the kill.
    #[error("command timed out after {timeout:?}")]
    TimedOut {
        /// The configured budget that was exceeded.
        timeout: Duration,
        /// Output captured before the kill.
        output: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShellExecError {
    /// Exit code carried by a [`ShellExecError::NonZeroExit`] failure.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Convenience Result type for shell-exec operations.
pub type Result<T> = std::result::Result<T, ShellExecError>;
