//! Shell-exec binary entry point.

use shell_exec::cli::{self, Args};
use shell_exec::config::Config;
use shell_exec::{logging, Command, CommandExecutor, ShellExecError};
use tracing::debug;

/// Exit status when the child was killed for exceeding its budget.
const EXIT_TIMED_OUT: i32 = 124;

/// Exit status for usage and configuration errors.
const EXIT_USAGE: i32 = 2;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("shell-exec: {e}");
            return EXIT_USAGE;
        }
    };

    if args.help {
        cli::print_help();
        return 0;
    }
    if args.version {
        cli::print_version();
        return 0;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("shell-exec: {e}");
            return EXIT_USAGE;
        }
    };
    let _ = logging::init_with_filter(config.log_filter());

    if args.tokens.is_empty() {
        eprintln!("shell-exec: no command given (try --help)");
        return EXIT_USAGE;
    }

    let command = build_command(&args, &config);
    let executor = CommandExecutor::new().max_capture_bytes(config.execution.max_output_bytes);
    debug!(command = %command, "running");

    let outcome = if args.stream {
        executor.execute_with_handler(&command, |line| println!("{line}"))
    } else {
        executor.execute(&command)
    };

    match outcome {
        Ok(result) => {
            if args.json {
                match serde_json::to_string_pretty(&result) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("shell-exec: failed to encode result: {e}");
                        return 1;
                    }
                }
            } else if !args.stream {
                print!("{}", result.output);
            }
            0
        }
        Err(ShellExecError::NonZeroExit { code, stderr }) => {
            if args.json {
                let body = serde_json::json!({
                    "error": "non_zero_exit",
                    "exit_code": code,
                    "stderr": stderr,
                });
                println!("{body}");
            } else {
                eprint!("{stderr}");
            }
            code
        }
        Err(ShellExecError::TimedOut { timeout, output }) => {
            if args.json {
                let body = serde_json::json!({
                    "error": "timed_out",
                    "timeout_ms": timeout.as_millis() as u64,
                    "output": output,
                });
                println!("{body}");
            } else {
                eprintln!("shell-exec: command timed out after {}ms", timeout.as_millis());
            }
            EXIT_TIMED_OUT
        }
        Err(e @ ShellExecError::InvalidCommand(_)) => {
            eprintln!("shell-exec: {e}");
            EXIT_USAGE
        }
        Err(e) => {
            eprintln!("shell-exec: {e}");
            1
        }
    }
}

fn build_command(args: &Args, config: &Config) -> Command {
    let mut command = Command::from_tokens(args.tokens.clone())
        .envs(args.env.iter().cloned())
        .inherit_env(!args.no_inherit_env)
        .merge_stderr(config.execution.merge_stderr);

    if let Some(dir) = &args.dir {
        command = command.working_dir(dir);
    }
    if let Some(timeout) = config.timeout() {
        command = command.timeout(timeout);
    }
    command
}
