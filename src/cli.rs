//! Command-line interface for shell-exec.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Command tokens to execute (first token is the program).
    pub tokens: Vec<String>,
    /// Working directory for the command.
    pub dir: Option<PathBuf>,
    /// Environment variable overlay, in order of appearance.
    pub env: Vec<(String, String)>,
    /// Timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Capture stderr into the same buffer as stdout.
    pub merge_stderr: bool,
    /// Do not inherit the parent environment.
    pub no_inherit_env: bool,
    /// Forward stdout lines live instead of capturing.
    pub stream: bool,
    /// Print the result as JSON.
    pub json: bool,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('d') | Long("dir") => {
                result.dir = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("env") => {
                let value: String = parser.value()?.parse()?;
                let (key, val) = value
                    .split_once('=')
                    .ok_or_else(|| ArgsError::InvalidValue("env", value.clone()))?;
                if key.is_empty() {
                    return Err(ArgsError::InvalidValue("env", value.clone()));
                }
                result.env.push((key.to_string(), val.to_string()));
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                let ms = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("timeout", value))?;
                result.timeout_ms = Some(ms);
            }
            Long("merge-stderr") => {
                result.merge_stderr = true;
            }
            Long("no-inherit-env") => {
                result.no_inherit_env = true;
            }
            Long("stream") => {
                result.stream = true;
            }
            Long("json") => {
                result.json = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                result.tokens.push(val.string()?);
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-exec {version}
Run one external command with captured output and an optional timeout

USAGE:
    shell-exec [OPTIONS] [--] <COMMAND> [ARGS...]

OPTIONS:
    -d, --dir <DIR>         Working directory for the command
    -e, --env <KEY=VALUE>   Environment variable overlay (repeatable)
    -t, --timeout <MS>      Kill the command after this many milliseconds
        --merge-stderr      Capture stderr into the same buffer as stdout
        --no-inherit-env    Child sees only the -e overlay
        --stream            Forward stdout lines live instead of capturing
        --json              Print the result as JSON
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_EXEC_TIMEOUT_MS         Default timeout (overrides config)
    SHELL_EXEC_MAX_OUTPUT_BYTES   Capture buffer cap (overrides config)
    SHELL_EXEC_LOG_LEVEL          Log level (overrides config)
    RUST_LOG                      Alternative log level setting

EXIT STATUS:
    The child's own exit code on failure, 124 on timeout, 2 on usage
    errors.

EXAMPLES:
    # Run a command and print its captured output
    shell-exec echo hello

    # Use -- so the child's options are not parsed as shell-exec options
    shell-exec -- ls -la /tmp

    # Kill a runaway converter after two seconds
    shell-exec -t 2000 -- pandoc article.org -o article.html

    # Machine-readable result
    shell-exec --json -- git status --short
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-exec {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
