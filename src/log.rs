//! Log sink abstraction
//!
//! The host accessory framework hands each platform a log function; the
//! watchdog and device dispatch report their lifecycle through it so hosts
//! (and tests) can observe completions, timeouts, and degradations. The
//! default sink forwards to `tracing`.

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Severity for sink messages. Failure paths log at `Warn`, lifecycle
/// messages at `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
}

/// Cheaply cloneable, host-supplied logging destination.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<dyn Fn(Level, &str) + Send + Sync>,
}

impl LogSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Level, &str) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Sink that forwards to the `tracing` subscriber.
    pub fn forward_to_tracing() -> Self {
        Self::new(|level, msg| match level {
            Level::Info => debug!("{msg}"),
            Level::Warn => warn!("{msg}"),
        })
    }

    /// Sink that records every message, for hosts that buffer their own logs
    /// and for tests asserting on watchdog output.
    pub fn memory() -> (Self, Arc<Mutex<Vec<String>>>) {
        let buffer: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let writer = buffer.clone();
        let sink = Self::new(move |_, msg| {
            if let Ok(mut lines) = writer.lock() {
                lines.push(msg.to_string());
            }
        });
        (sink, buffer)
    }

    pub fn info(&self, msg: &str) {
        (self.inner)(Level::Info, msg);
    }

    pub fn warn(&self, msg: &str) {
        (self.inner)(Level::Warn, msg);
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::forward_to_tracing()
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_messages() {
        let (sink, lines) = LogSink::memory();
        sink.info("hello");
        sink.warn("uh oh");

        let lines = lines.lock().unwrap();
        assert_eq!(lines.as_slice(), ["hello", "uh oh"]);
    }
}
