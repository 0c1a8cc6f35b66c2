//! Platform classification and shell invocation helpers.
//!
//! The OS family is resolved exactly once per process and is read-only
//! afterwards. Engine behavior that differs per platform (spawn
//! serialization, command line limits, script conventions) is keyed off
//! this value rather than ad-hoc target checks at call sites.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::ShellExecError;
use crate::Result;

/// Maximum command line length accepted on Windows (KB830473).
pub const WINDOWS_MAX_COMMAND_LENGTH: usize = 8191;

/// Operating system family of the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsType {
    /// Linux.
    Linux,
    /// Windows.
    Windows,
    /// macOS.
    Mac,
    /// Solaris / illumos.
    Solaris,
    /// FreeBSD.
    FreeBsd,
    /// Some other form of Unix.
    Other,
}

static OS_TYPE: OnceLock<OsType> = OnceLock::new();

impl OsType {
    /// The OS family of the current process.
    ///
    /// Resolved on first use and immutable for the remainder of the
    /// process lifetime.
    pub fn current() -> OsType {
        *OS_TYPE.get_or_init(Self::detect)
    }

    fn detect() -> OsType {
        if cfg!(target_os = "windows") {
            OsType::Windows
        } else if cfg!(target_os = "linux") {
            OsType::Linux
        } else if cfg!(target_os = "macos") {
            OsType::Mac
        } else if cfg!(any(target_os = "solaris", target_os = "illumos")) {
            OsType::Solaris
        } else if cfg!(target_os = "freebsd") {
            OsType::FreeBsd
        } else {
            OsType::Other
        }
    }

    /// Whether this is the Windows family.
    pub fn is_windows(self) -> bool {
        self == OsType::Windows
    }
}

/// Whether process creation must be serialized on this platform.
///
/// Concurrent launches on Windows can leak pipe handles into unrelated
/// children, which then hangs reads on the output and error streams
/// (KB315939). Spawns are funneled through a single process-wide lock
/// there; every other platform spawns freely.
pub fn requires_serialized_spawn() -> bool {
    OsType::current().is_windows()
}

/// Validate a token vector against the Windows command line limit.
///
/// Token lengths are summed as-is; separators are not counted.
pub fn check_windows_command_length(tokens: &[String]) -> Result<()> {
    let len: usize = tokens.iter().map(String::len).sum();
    if len > WINDOWS_MAX_COMMAND_LENGTH {
        let joined = tokens.join("");
        let prefix: String = joined.chars().take(100).collect();
        return Err(ShellExecError::InvalidCommand(format!(
            "command line length {} exceeds the maximum of {}, command starts with: {}",
            len, WINDOWS_MAX_COMMAND_LENGTH, prefix
        )));
    }
    Ok(())
}

/// Quote an argument so that bash interprets it as a single value.
///
/// Quotes for one level of bash only.
pub fn bash_quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('\'');
    quoted.push_str(&arg.replace('\'', "'\\''"));
    quoted.push('\'');
    quoted
}

/// Script file name for the given basename: `.cmd` on Windows, `.sh`
/// elsewhere.
pub fn script_file_name(basename: &str) -> String {
    if OsType::current().is_windows() {
        format!("{basename}.cmd")
    } else {
        format!("{basename}.sh")
    }
}

/// Script file path inside `parent` for the given basename.
pub fn script_file_path(parent: &Path, basename: &str) -> PathBuf {
    parent.join(script_file_name(basename))
}

/// Command token vector that runs the given script through the platform
/// interpreter: `cmd /c` on Windows, `/bin/bash` elsewhere.
pub fn run_script_command(script: &Path) -> Vec<String> {
    let path = script.display().to_string();
    if OsType::current().is_windows() {
        vec!["cmd".into(), "/c".into(), path]
    } else {
        vec!["/bin/bash".into(), bash_quote(&path)]
    }
}

/// Regex source matching environment variable references in shell text:
/// `%VAR%` on Windows, `$VAR` elsewhere.
pub fn env_var_pattern() -> &'static str {
    if OsType::current().is_windows() {
        "%([A-Za-z_][A-Za-z0-9_]*?)%"
    } else {
        r"\$([A-Za-z_][A-Za-z0-9_]*)"
    }
}
