//! External process execution engine.
//!
//! One invocation launches one child process, drains stdout and stderr on
//! dedicated threads while the child runs, optionally enforces a timeout
//! by killing the child, and reports either a captured result or a typed
//! failure carrying the exit code.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use shell_exec::execution::{execute_simple, Command, CommandExecutor};
//!
//! // Simple one-shot execution
//! let result = execute_simple(["echo", "hello"]).unwrap();
//! println!("Output: {}", result.output);
//!
//! // Command with options
//! let cmd = Command::new("pandoc")
//!     .args(["article.org", "-o", "article.html"])
//!     .working_dir("/var/content")
//!     .timeout(Duration::from_secs(60));
//! let result = CommandExecutor::new().execute(&cmd);
//! ```

mod command;
mod drain;
mod executor;
mod result;
mod timeout;

pub use command::Command;
pub use drain::{CaptureBuffer, DrainReport, OutputSink, StreamDrainer, DEFAULT_MAX_CAPTURE_BYTES};
pub use executor::{execute_simple, execute_with_timeout, CommandExecutor};
pub use result::{CommandResult, OutputLine, OutputSource};
pub use timeout::{GuardState, TimeoutGuard};
