//! # shell-exec
//!
//! External process execution with concurrent output draining and
//! timeouts.
//!
//! One invocation launches one child process from an argument vector,
//! reads stdout and stderr on dedicated threads while the child runs,
//! optionally kills the child when it exceeds a time budget, and reports
//! either a captured-output result or a typed failure carrying the exit
//! code.
//!
//! ## Features
//!
//! - **Concurrent draining**: both streams are read while the child runs,
//!   so a chatty child can never deadlock against a full pipe
//! - **Typed failures**: non-zero exit and timeout are distinct errors
//!   callers can branch on
//! - **Deterministic cleanup**: process handle, pipe readers and timer are
//!   released on every exit path
//! - **Lightweight**: plain pipes and native threads, no PTY
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use shell_exec::{Command, CommandExecutor, ShellExecError};
//!
//! fn main() {
//!     // Initialize logging
//!     shell_exec::logging::try_init().ok();
//!
//!     let cmd = Command::new("pandoc")
//!         .args(["article.org", "-o", "article.html"])
//!         .timeout(Duration::from_secs(30));
//!
//!     match CommandExecutor::new().execute(&cmd) {
//!         Ok(result) => println!("converted in {:?}", result.duration),
//!         Err(ShellExecError::NonZeroExit { code, stderr }) => {
//!             eprintln!("converter failed ({code}): {stderr}");
//!         }
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod platform;

// Re-export commonly used types
pub use error::{Result, ShellExecError};
pub use execution::{
    execute_simple, execute_with_timeout, Command, CommandExecutor, CommandResult, OutputLine,
    OutputSource,
};
pub use platform::OsType;
