//! Command execution engine.

use std::process::{Child, Command as OsCommand, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::command::Command;
use super::drain::{
    CaptureBuffer, DrainReport, OutputSink, StreamDrainer, DEFAULT_MAX_CAPTURE_BYTES,
};
use super::result::{CommandResult, OutputLine};
use super::timeout::TimeoutGuard;
use crate::error::ShellExecError;
use crate::platform;
use crate::Result;

/// Poll interval while waiting for the child to exit.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Channel capacity for streaming execution.
const STREAM_CHANNEL_CAPACITY: usize = 64;

// Serializes process creation on the platform with the spawn handle race.
// Held for the duration of spawn only.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// How stdout is consumed during one invocation.
enum StdoutStrategy {
    Capture,
    Lines(Box<dyn FnMut(&str) + Send>),
}

/// Executor for running external commands to completion.
///
/// One `execute` call manages exactly one child process end-to-end: spawn,
/// concurrent draining of both streams, optional timeout enforcement, and
/// deterministic release of every handle on all exit paths.
pub struct CommandExecutor {
    max_capture_bytes: usize,
    refresh_interval: Option<Duration>,
    last_run: Mutex<Option<(Instant, CommandResult)>>,
}

impl CommandExecutor {
    /// Create a new command executor with default settings.
    pub fn new() -> Self {
        Self {
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
            refresh_interval: None,
            last_run: Mutex::new(None),
        }
    }

    /// Cap on each capture buffer before it is reset.
    pub fn max_capture_bytes(mut self, limit: usize) -> Self {
        self.max_capture_bytes = limit;
        self
    }

    /// Gate re-execution by a refresh interval.
    ///
    /// While the previous successful result is younger than `interval`,
    /// `execute` returns it again instead of re-launching the command.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Execute the command and capture its output.
    ///
    /// Returns the captured result on exit code 0; fails with
    /// [`ShellExecError::NonZeroExit`] on any other exit code and
    /// [`ShellExecError::TimedOut`] when the timeout guard killed the
    /// child.
    pub fn execute(&self, command: &Command) -> Result<CommandResult> {
        if let Some(cached) = self.cached_result() {
            debug!(command = %command, "within refresh interval, reusing previous result");
            return Ok(cached);
        }
        let result = self.run(command, StdoutStrategy::Capture)?;
        self.store_result(&result);
        Ok(result)
    }

    /// Execute the command, forwarding each stdout line to `on_line`.
    ///
    /// `CommandResult::output` is empty in this mode; stderr is still
    /// captured for diagnostics.
    pub fn execute_with_handler<F>(&self, command: &Command, on_line: F) -> Result<CommandResult>
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.run(command, StdoutStrategy::Lines(Box::new(on_line)))
    }

    /// Execute the command on a blocking task, streaming stdout lines.
    ///
    /// Returns a receiver for the lines and a handle resolving to the
    /// final result once the child has exited and both streams are
    /// drained.
    pub async fn execute_streaming(
        &self,
        command: &Command,
    ) -> Result<(
        mpsc::Receiver<OutputLine>,
        tokio::task::JoinHandle<Result<CommandResult>>,
    )> {
        let (tx, rx) = mpsc::channel::<OutputLine>(STREAM_CHANNEL_CAPACITY);
        let command = command.clone();
        let max_capture_bytes = self.max_capture_bytes;

        let handle = tokio::task::spawn_blocking(move || {
            let executor = CommandExecutor::new().max_capture_bytes(max_capture_bytes);
            executor.execute_with_handler(&command, move |line| {
                // a dropped receiver just stops the forwarding
                let _ = tx.blocking_send(OutputLine::stdout(line));
            })
        });

        Ok((rx, handle))
    }

    fn run(&self, command: &Command, stdout_strategy: StdoutStrategy) -> Result<CommandResult> {
        command.validate()?;
        if platform::OsType::current().is_windows() {
            platform::check_windows_command_length(&command.tokens)?;
        }
        let timeout = command.timeout.filter(|t| !t.is_zero());
        let start = Instant::now();
        debug!(command = %command, ?timeout, "launching");

        let mut builder = OsCommand::new(&command.tokens[0]);
        builder
            .args(&command.tokens[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.working_dir {
            builder.current_dir(dir);
        }
        if !command.inherit_env {
            builder.env_clear();
        }
        builder.envs(&command.env);

        let mut child = spawn(&mut builder)?;

        let (stdout_pipe, stderr_pipe) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ShellExecError::Io(std::io::Error::other(
                    "child spawned without piped streams",
                )));
            }
        };

        let (stdout_sink, stdout_buffer) = match stdout_strategy {
            StdoutStrategy::Capture => {
                let (sink, buffer) = OutputSink::capture(self.max_capture_bytes);
                (sink, Some(buffer))
            }
            StdoutStrategy::Lines(handler) => (OutputSink::Lines(handler), None),
        };

        // stderr is always captured for diagnostics; merged mode shares
        // the stdout buffer so both streams interleave into one capture.
        let (stderr_sink, stderr_buffer) = match (&stdout_buffer, command.merge_stderr) {
            (Some(buffer), true) => (
                OutputSink::capture_shared(Arc::clone(buffer), self.max_capture_bytes),
                Arc::clone(buffer),
            ),
            _ => {
                let (sink, buffer) = OutputSink::capture(self.max_capture_bytes);
                (sink, buffer)
            }
        };

        let stdout_drainer = match StreamDrainer::spawn("stdout", stdout_pipe, stdout_sink) {
            Ok(drainer) => drainer,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ShellExecError::Io(e));
            }
        };
        let stderr_drainer = match StreamDrainer::spawn("stderr", stderr_pipe, stderr_sink) {
            Ok(drainer) => drainer,
            Err(e) => {
                // kill first so the stdout drainer hits end-of-stream
                let _ = child.kill();
                let _ = child.wait();
                stdout_drainer.join();
                return Err(ShellExecError::Io(e));
            }
        };

        let child = Arc::new(Mutex::new(child));
        let completed = Arc::new(AtomicBool::new(false));
        let timed_out = Arc::new(AtomicBool::new(false));

        let mut guard = match timeout {
            Some(t) => match TimeoutGuard::arm(
                t,
                Arc::clone(&child),
                Arc::clone(&completed),
                Arc::clone(&timed_out),
            ) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    // without a timer the invocation would run unbounded
                    kill_and_reap(&child);
                    stdout_drainer.join();
                    stderr_drainer.join();
                    return Err(ShellExecError::Io(e));
                }
            },
            None => None,
        };

        let status = wait_for_exit(&child);
        completed.store(true, Ordering::SeqCst);
        if let Some(guard) = guard.as_mut() {
            guard.disarm();
        }

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                kill_and_reap(&child);
                stdout_drainer.join();
                stderr_drainer.join();
                return Err(ShellExecError::Io(e));
            }
        };

        // Both drainers are joined before the status is interpreted: the
        // pipes must be fully drained before any result exists.
        let stdout_report = stdout_drainer.join();
        let stderr_report = stderr_drainer.join();
        log_drain_issue("stdout", &stdout_report);
        log_drain_issue("stderr", &stderr_report);

        let duration = start.elapsed();
        let exit_code = exit_code_of(&status);
        let was_timed_out = timed_out.load(Ordering::SeqCst);
        let output = stdout_buffer
            .as_ref()
            .map(buffer_to_string)
            .unwrap_or_default();
        debug!(exit_code, timed_out = was_timed_out, ?duration, "command finished");

        if was_timed_out {
            return Err(ShellExecError::TimedOut {
                timeout: timeout.unwrap_or_default(),
                output,
            });
        }
        if exit_code != 0 {
            return Err(ShellExecError::NonZeroExit {
                code: exit_code,
                stderr: buffer_to_string(&stderr_buffer),
            });
        }
        Ok(CommandResult {
            output,
            exit_code,
            timed_out: false,
            duration,
        })
    }

    fn cached_result(&self) -> Option<CommandResult> {
        let interval = self.refresh_interval?;
        let last = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
        last.as_ref()
            .filter(|(at, _)| at.elapsed() < interval)
            .map(|(_, result)| result.clone())
    }

    fn store_result(&self, result: &CommandResult) {
        if self.refresh_interval.is_none() {
            return;
        }
        let mut last = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
        *last = Some((Instant::now(), result.clone()));
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn(builder: &mut OsCommand) -> Result<Child> {
    let _lock = platform::requires_serialized_spawn()
        .then(|| SPAWN_LOCK.lock().unwrap_or_else(PoisonError::into_inner));
    builder.spawn().map_err(ShellExecError::Launch)
}

fn wait_for_exit(child: &Arc<Mutex<Child>>) -> std::io::Result<ExitStatus> {
    loop {
        let mut locked = child.lock().unwrap_or_else(PoisonError::into_inner);
        match locked.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => return Err(e),
        }
        drop(locked);
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

fn kill_and_reap(child: &Arc<Mutex<Child>>) {
    let mut locked = child.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = locked.kill() {
        debug!(error = %e, "kill on cleanup failed");
    }
    let _ = locked.wait();
}

fn exit_code_of(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        // shell convention for signal-terminated children
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

fn buffer_to_string(buffer: &CaptureBuffer) -> String {
    let bytes = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&bytes).into_owned()
}

fn log_drain_issue(stream: &str, report: &DrainReport) {
    if let Some(error) = &report.error {
        warn!(stream, error = %error, "stream drain ended early, output may be partial");
    }
}

/// One-shot command execution with default settings.
pub fn execute_simple<I, S>(tokens: I) -> Result<CommandResult>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandExecutor::new().execute(&Command::from_tokens(tokens))
}

/// One-shot command execution with a timeout.
pub fn execute_with_timeout<I, S>(tokens: I, timeout: Duration) -> Result<CommandResult>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandExecutor::new().execute(&Command::from_tokens(tokens).timeout(timeout))
}
