//! Timeout enforcement for running invocations.

use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

/// Lifecycle of a timeout guard.
///
/// `Fired` and `Disarmed` are terminal; exactly one of them is reached
/// per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Waiting for the deadline.
    Armed,
    /// Deadline elapsed; the kill check ran.
    Fired,
    /// Cancelled before the deadline; may not fire anymore.
    Disarmed,
}

struct Shared {
    state: Mutex<GuardState>,
    wake: Condvar,
}

/// Single-shot timer that kills the child if it outlives its budget.
///
/// The race against natural exit is resolved in favor of the child: the
/// guard kills only after observing that the completion flag is still
/// unset and the process is still running.
pub struct TimeoutGuard {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl TimeoutGuard {
    /// Arm the guard: after `timeout`, kill `child` unless it completed.
    ///
    /// `completed` is set by the runner once it has observed process
    /// exit; `timed_out` is set by the guard when it kills the child.
    pub fn arm(
        timeout: Duration,
        child: Arc<Mutex<Child>>,
        completed: Arc<AtomicBool>,
        timed_out: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(GuardState::Armed),
            wake: Condvar::new(),
        });
        let timer_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("command-timeout".into())
            .spawn(move || run_timer(&timer_shared, timeout, &child, &completed, &timed_out))?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Current state of the guard.
    pub fn state(&self) -> GuardState {
        *lock_state(&self.shared)
    }

    /// Whether the deadline elapsed before the guard was disarmed.
    pub fn fired(&self) -> bool {
        self.state() == GuardState::Fired
    }

    /// Cancel the timer if it has not fired yet and release its thread.
    ///
    /// Idempotent; a guard that already fired stays fired.
    pub fn disarm(&mut self) {
        {
            let mut state = lock_state(&self.shared);
            if *state == GuardState::Armed {
                *state = GuardState::Disarmed;
            }
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}

fn run_timer(
    shared: &Shared,
    timeout: Duration,
    child: &Mutex<Child>,
    completed: &AtomicBool,
    timed_out: &AtomicBool,
) {
    let guard = lock_state(shared);
    let (mut state, wait) = shared
        .wake
        .wait_timeout_while(guard, timeout, |s| *s == GuardState::Armed)
        .unwrap_or_else(PoisonError::into_inner);

    if !wait.timed_out() || *state != GuardState::Armed {
        // disarmed before the deadline
        return;
    }
    *state = GuardState::Fired;
    drop(state);

    if completed.load(Ordering::SeqCst) {
        debug!("deadline passed after natural exit, nothing to kill");
        return;
    }
    let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(?status, "child exited just before the deadline fired");
        }
        Ok(None) => {
            timed_out.store(true, Ordering::SeqCst);
            warn!(timeout = ?timeout, "child exceeded its time budget, killing");
            if let Err(e) = child.kill() {
                warn!(error = %e, "failed to kill timed-out child");
            }
        }
        Err(e) => {
            warn!(error = %e, "could not determine child state at deadline");
        }
    }
}

fn lock_state(shared: &Shared) -> MutexGuard<'_, GuardState> {
    shared.state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use std::time::Instant;

    fn spawn_sleeper(seconds: &str) -> Child {
        Command::new("sleep")
            .arg(seconds)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn sleep")
    }

    #[test]
    #[cfg(unix)]
    fn test_guard_fires_and_kills() {
        let child = Arc::new(Mutex::new(spawn_sleeper("5")));
        let completed = Arc::new(AtomicBool::new(false));
        let timed_out = Arc::new(AtomicBool::new(false));

        let mut guard = TimeoutGuard::arm(
            Duration::from_millis(50),
            Arc::clone(&child),
            Arc::clone(&completed),
            Arc::clone(&timed_out),
        )
        .unwrap();

        let start = Instant::now();
        // the child must be reaped well before its 5s sleep
        let status = loop {
            if let Some(status) = child.lock().unwrap().try_wait().unwrap() {
                break status;
            }
            assert!(start.elapsed() < Duration::from_secs(3), "kill never landed");
            thread::sleep(Duration::from_millis(10));
        };

        assert!(timed_out.load(Ordering::SeqCst));
        assert!(!status.success());
        guard.disarm();
        assert_eq!(guard.state(), GuardState::Fired);
    }

    #[test]
    #[cfg(unix)]
    fn test_disarm_before_deadline() {
        let child = Arc::new(Mutex::new(spawn_sleeper("5")));
        let completed = Arc::new(AtomicBool::new(false));
        let timed_out = Arc::new(AtomicBool::new(false));

        let mut guard = TimeoutGuard::arm(
            Duration::from_secs(30),
            Arc::clone(&child),
            Arc::clone(&completed),
            Arc::clone(&timed_out),
        )
        .unwrap();

        completed.store(true, Ordering::SeqCst);
        guard.disarm();

        assert_eq!(guard.state(), GuardState::Disarmed);
        assert!(!timed_out.load(Ordering::SeqCst));

        // child was never touched by the guard
        let mut locked = child.lock().unwrap();
        assert!(locked.try_wait().unwrap().is_none());
        locked.kill().unwrap();
        locked.wait().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_fired_after_exit_is_noop() {
        let mut exited = Command::new("true")
            .spawn()
            .expect("spawn true");
        exited.wait().unwrap();
        let child = Arc::new(Mutex::new(exited));
        let completed = Arc::new(AtomicBool::new(true));
        let timed_out = Arc::new(AtomicBool::new(false));

        let mut guard = TimeoutGuard::arm(
            Duration::from_millis(20),
            Arc::clone(&child),
            Arc::clone(&completed),
            Arc::clone(&timed_out),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(guard.state(), GuardState::Fired);
        assert!(!timed_out.load(Ordering::SeqCst));
        guard.disarm();
        assert_eq!(guard.state(), GuardState::Fired);
    }

    #[test]
    #[cfg(unix)]
    fn test_disarm_is_idempotent() {
        let child = Arc::new(Mutex::new(spawn_sleeper("1")));
        let completed = Arc::new(AtomicBool::new(false));
        let timed_out = Arc::new(AtomicBool::new(false));

        let mut guard = TimeoutGuard::arm(
            Duration::from_secs(30),
            Arc::clone(&child),
            completed,
            timed_out,
        )
        .unwrap();

        guard.disarm();
        guard.disarm();
        assert_eq!(guard.state(), GuardState::Disarmed);

        let mut locked = child.lock().unwrap();
        let _ = locked.kill();
        let _ = locked.wait();
    }
}
