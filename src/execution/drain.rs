//! Stream draining for child process pipes.
//!
//! Each pipe gets its own dedicated thread reading until end-of-stream.
//! A child that fills one pipe blocks until someone reads it; draining
//! both streams concurrently with process execution is what keeps a
//! chatty child from deadlocking against its own pipes.

use std::io::{BufRead, BufReader, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::warn;

/// Default cap on an accumulated capture buffer.
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 1_000_000;

/// Read chunk size for the accumulate strategy.
const READ_BUFFER_SIZE: usize = 4096;

/// Shared buffer filled by a capturing drainer.
pub type CaptureBuffer = Arc<Mutex<Vec<u8>>>;

/// Consumption strategy for one stream.
pub enum OutputSink {
    /// Accumulate raw bytes into a shared buffer, capped at `max_bytes`.
    /// The buffer is reset with a warning once the cap is exceeded.
    Capture {
        /// Destination buffer.
        buffer: CaptureBuffer,
        /// Size cap before the buffer is reset.
        max_bytes: usize,
    },
    /// Forward each line to the handler, terminator stripped.
    Lines(Box<dyn FnMut(&str) + Send>),
}

impl OutputSink {
    /// Capture into a fresh buffer; returns the sink and the buffer handle.
    pub fn capture(max_bytes: usize) -> (Self, CaptureBuffer) {
        let buffer: CaptureBuffer = Arc::new(Mutex::new(Vec::new()));
        (
            Self::Capture {
                buffer: Arc::clone(&buffer),
                max_bytes,
            },
            buffer,
        )
    }

    /// Capture into an existing buffer. Used to merge stderr into the
    /// stdout capture.
    pub fn capture_shared(buffer: CaptureBuffer, max_bytes: usize) -> Self {
        Self::Capture { buffer, max_bytes }
    }

    /// Forward lines to the given handler.
    pub fn lines(handler: impl FnMut(&str) + Send + 'static) -> Self {
        Self::Lines(Box::new(handler))
    }

    /// Forward lines to the invoking process's own stdout.
    pub fn passthrough() -> Self {
        Self::lines(|line| println!("{line}"))
    }
}

/// Outcome of one drained stream.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    /// Total bytes consumed from the stream.
    pub bytes_read: u64,
    /// Whether the capture buffer was reset after exceeding its cap.
    pub truncated: bool,
    /// Read error that ended the drain early, if any.
    pub error: Option<String>,
}

/// A dedicated thread reading one child stream until end-of-stream.
pub struct StreamDrainer {
    label: &'static str,
    handle: JoinHandle<DrainReport>,
}

impl StreamDrainer {
    /// Spawn the draining thread for `reader`.
    pub fn spawn<R>(label: &'static str, reader: R, sink: OutputSink) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("{label}-drainer"))
            .spawn(move || drain(label, reader, sink))?;
        Ok(Self { label, handle })
    }

    /// Wait for end-of-stream and collect the report.
    ///
    /// A panic on the draining thread is downgraded to a report error;
    /// nothing crosses the thread boundary as an unwind.
    pub fn join(self) -> DrainReport {
        match self.handle.join() {
            Ok(report) => report,
            Err(_) => DrainReport {
                error: Some(format!("{} drainer panicked", self.label)),
                ..DrainReport::default()
            },
        }
    }
}

fn drain<R: Read>(label: &'static str, reader: R, sink: OutputSink) -> DrainReport {
    match sink {
        OutputSink::Capture { buffer, max_bytes } => {
            drain_capture(label, reader, &buffer, max_bytes)
        }
        OutputSink::Lines(handler) => drain_lines(reader, handler),
    }
}

fn drain_capture<R: Read>(
    label: &'static str,
    mut reader: R,
    buffer: &CaptureBuffer,
    max_bytes: usize,
) -> DrainReport {
    let mut report = DrainReport::default();
    let mut chunk = [0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                report.bytes_read += n as u64;
                let mut buf = lock_buffer(buffer);
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > max_bytes {
                    warn!(
                        stream = label,
                        limit = max_bytes,
                        "captured output exceeded limit, resetting buffer"
                    );
                    buf.clear();
                    report.truncated = true;
                }
            }
            Err(e) => {
                report.error = Some(e.to_string());
                break;
            }
        }
    }
    report
}

fn drain_lines<R: Read>(reader: R, mut handler: Box<dyn FnMut(&str) + Send>) -> DrainReport {
    let mut report = DrainReport::default();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(n) => {
                report.bytes_read += n as u64;
                let text = String::from_utf8_lossy(&line);
                handler(trim_line_ending(&text));
            }
            Err(e) => {
                report.error = Some(e.to_string());
                break;
            }
        }
    }
    report
}

fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

// A poisoned capture buffer still holds valid bytes; take the data over
// the poison.
fn lock_buffer(buffer: &CaptureBuffer) -> MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}
