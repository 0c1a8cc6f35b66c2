//! Command building and representation.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ShellExecError;
use crate::Result;

/// A command to be executed as a child process.
///
/// The token vector is handed to the OS as-is: the first token is the
/// executable, the rest are its arguments. Tokens are never re-split or
/// re-quoted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    /// Command tokens; first is the executable.
    pub tokens: Vec<String>,
    /// Working directory override (if any).
    pub working_dir: Option<PathBuf>,
    /// Environment variables merged into the child's environment.
    pub env: HashMap<String, String>,
    /// Whether the child inherits the parent environment. When false, the
    /// child sees only the `env` overlay.
    pub inherit_env: bool,
    /// Maximum execution time. `None` or zero means unbounded.
    pub timeout: Option<Duration>,
    /// Whether stderr is captured into the same buffer as stdout.
    pub merge_stderr: bool,
}

impl Command {
    /// Create a new command for the given executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            tokens: vec![program.into()],
            ..Self::default()
        }
    }

    /// Create a command from a full token vector.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Append one argument token.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.tokens.push(arg.into());
        self
    }

    /// Append multiple argument tokens.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable to the overlay.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variables to the overlay.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
        self
    }

    /// Set whether the parent environment is inherited.
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set whether stderr is merged into the stdout capture.
    pub fn merge_stderr(mut self, merge: bool) -> Self {
        self.merge_stderr = merge;
        self
    }

    /// The executable token, if any.
    pub fn program(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// Validate the token vector: non-empty, no blank tokens.
    pub fn validate(&self) -> Result<()> {
        if self.tokens.is_empty() {
            return Err(ShellExecError::InvalidCommand(
                "empty command token list".into(),
            ));
        }
        if self.tokens.iter().any(|t| t.trim().is_empty()) {
            return Err(ShellExecError::InvalidCommand(format!(
                "blank entry in command: {self}"
            )));
        }
        Ok(())
    }
}

impl Default for Command {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
            inherit_env: true,
            timeout: None,
            merge_stderr: false,
        }
    }
}

impl fmt::Display for Command {
    /// Tokens space-joined; tokens containing spaces are shown quoted.
    /// Diagnostic rendering only, never fed back into execution.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if token.contains(' ') {
                write!(f, "\"{token}\"")?;
            } else {
                f.write_str(token)?;
            }
        }
        Ok(())
    }
}
