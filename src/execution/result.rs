//! Execution result types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of a completed invocation.
///
/// Constructed exactly once per invocation, only after the child has
/// exited and both stream drainers have joined — the output it carries is
/// complete, with no bytes left buffered in the OS pipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Captured output text. Well-defined only under the accumulate
    /// strategy; empty when stdout was forwarded line-by-line.
    pub output: String,
    /// Platform-native exit code; 0 conventionally denotes success.
    pub exit_code: i32,
    /// True only if the timeout guard fired before natural exit.
    pub timed_out: bool,
    /// Wall-clock execution duration.
    pub duration: Duration,
}

impl CommandResult {
    /// Whether the command completed normally with exit code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Output with surrounding whitespace trimmed.
    pub fn output_trimmed(&self) -> &str {
        self.output.trim()
    }

    /// Output split into lines.
    pub fn output_lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }
}

impl Default for CommandResult {
    fn default() -> Self {
        Self {
            output: String::new(),
            exit_code: 0,
            timed_out: false,
            duration: Duration::ZERO,
        }
    }
}

/// One line of streamed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    /// Line text, terminator stripped.
    pub text: String,
    /// Stream the line came from.
    pub source: OutputSource,
}

/// Source stream of a piece of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputSource {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputLine {
    /// Create a stdout line.
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: OutputSource::Stdout,
        }
    }

    /// Create a stderr line.
    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: OutputSource::Stderr,
        }
    }
}
