//! Watchdog-guarded completion
//!
//! Every get/set dispatch is wrapped in a guard that makes sure the terminal
//! callback fires exactly once: either with the handler's real result or,
//! after the timeout elapses, with no value. A late result is dropped and
//! logged. The guard is the safety net for handlers that hang, fail, or
//! misbehave; it never panics and never returns an error.

use crate::log::LogSink;
use anyhow::Result;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Terminal callback for one get/set invocation.
///
/// `Ok(None)` means "nothing to report" (timeout, missing handler, swallowed
/// handler failure), `Ok(Some(v))` a real value, `Err(e)` a transport-level
/// error surfaced to the caller.
pub type Completion = Box<dyn FnOnce(Result<Option<Value>>) + Send + 'static>;

/// Count of guards that have been armed but not yet completed.
///
/// Observational only; it appears in log lines for diagnostics and is never
/// consulted for control decisions. Owned by the platform registry rather
/// than living as a process-wide static.
#[derive(Debug, Default)]
pub struct InFlightGauge(AtomicUsize);

impl InFlightGauge {
    fn enter(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn leave(&self) -> usize {
        self.0.fetch_sub(1, Ordering::Relaxed) - 1
    }

    pub fn current(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

struct GuardState {
    name: String,
    start: Instant,
    sink: LogSink,
    gauge: Arc<InFlightGauge>,
    // Some until the first completion or timeout wins; taking it is the
    // single-fire transition.
    terminal: Mutex<Option<Completion>>,
}

impl GuardState {
    fn terminal(&self) -> MutexGuard<'_, Option<Completion>> {
        match self.terminal.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Cloneable handle through which a handler delivers its result. Any number
/// of clones may race with each other and with the timeout; exactly one
/// terminal invocation results.
#[derive(Clone)]
pub struct WatchdogHandle {
    state: Arc<GuardState>,
}

impl WatchdogHandle {
    /// Deliver a result. First call wins; later calls only log that the
    /// callback took too long and drop the result.
    pub fn complete(&self, result: Result<Option<Value>>) {
        let elapsed = self.state.start.elapsed().as_millis();
        let taken = self.state.terminal().take();
        match taken {
            Some(terminal) => {
                let in_flight = self.state.gauge.leave();
                self.state.sink.info(&format!(
                    "{} completed in {}ms ({})",
                    self.state.name, elapsed, in_flight
                ));
                terminal(result);
            }
            None => {
                self.state.sink.warn(&format!(
                    "{} callback took too long {}ms ({})",
                    self.state.name,
                    elapsed,
                    self.state.gauge.current()
                ));
            }
        }
    }

    fn kick(&self, max_duration: Duration) {
        let taken = self.state.terminal().take();
        if let Some(terminal) = taken {
            let in_flight = self.state.gauge.leave();
            self.state.sink.warn(&format!(
                "{} watch dog kicked after {}ms ({})",
                self.state.name,
                max_duration.as_millis(),
                in_flight
            ));
            terminal(Ok(None));
        }
    }
}

/// Arm a guard around `terminal`. Must be called within a tokio runtime; the
/// timeout runs as a spawned timer task.
pub fn guard(
    name: &str,
    max_duration: Duration,
    sink: LogSink,
    gauge: Arc<InFlightGauge>,
    terminal: Completion,
) -> WatchdogHandle {
    gauge.enter();
    let handle = WatchdogHandle {
        state: Arc::new(GuardState {
            name: name.to_string(),
            start: Instant::now(),
            sink,
            gauge,
            terminal: Mutex::new(Some(terminal)),
        }),
    };

    let timer = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(max_duration).await;
        timer.kick(max_duration);
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_completion(count: Arc<AtomicUsize>, results: Arc<Mutex<Vec<Option<Value>>>>) -> Completion {
        Box::new(move |result| {
            count.fetch_add(1, Ordering::SeqCst);
            results.lock().unwrap().push(result.unwrap_or(None));
        })
    }

    #[tokio::test(start_paused = true)]
    async fn completion_fires_exactly_once() {
        let (sink, _) = LogSink::memory();
        let gauge = Arc::new(InFlightGauge::default());
        let count = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(Mutex::new(Vec::new()));

        let handle = guard(
            "getPower",
            Duration::from_millis(5000),
            sink,
            gauge.clone(),
            counting_completion(count.clone(), results.clone()),
        );

        handle.complete(Ok(Some(json!(true))));
        handle.complete(Ok(Some(json!(false))));
        handle.complete(Ok(None));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(results.lock().unwrap().as_slice(), [Some(json!(true))]);
        assert_eq!(gauge.current(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_with_no_value() {
        let (sink, lines) = LogSink::memory();
        let gauge = Arc::new(InFlightGauge::default());
        let count = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(Mutex::new(Vec::new()));

        let handle = guard(
            "getBrightness",
            Duration::from_millis(100),
            sink,
            gauge.clone(),
            counting_completion(count.clone(), results.clone()),
        );
        assert_eq!(gauge.current(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(results.lock().unwrap().as_slice(), [None]);
        assert_eq!(gauge.current(), 0);

        // A late result is dropped, only logged.
        handle.complete(Ok(Some(json!(42))));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let lines = lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.contains("watch dog kicked after 100ms")));
        assert!(lines.iter().any(|l| l.contains("callback took too long")));
    }

    #[tokio::test(start_paused = true)]
    async fn racing_clones_produce_one_completion() {
        let (sink, _) = LogSink::memory();
        let gauge = Arc::new(InFlightGauge::default());
        let count = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(Mutex::new(Vec::new()));

        let handle = guard(
            "setBrightness",
            Duration::from_millis(5000),
            sink,
            gauge,
            counting_completion(count.clone(), results),
        );

        let mut tasks = Vec::new();
        for i in 0..8 {
            let h = handle.clone();
            tasks.push(tokio::spawn(async move {
                h.complete(Ok(Some(json!(i))));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gauge_tracks_concurrent_guards() {
        let (sink, _) = LogSink::memory();
        let gauge = Arc::new(InFlightGauge::default());

        let a = guard(
            "getPower",
            Duration::from_millis(5000),
            sink.clone(),
            gauge.clone(),
            Box::new(|_| {}),
        );
        let b = guard(
            "getBrightness",
            Duration::from_millis(5000),
            sink,
            gauge.clone(),
            Box::new(|_| {}),
        );
        assert_eq!(gauge.current(), 2);

        a.complete(Ok(None));
        assert_eq!(gauge.current(), 1);
        b.complete(Ok(None));
        assert_eq!(gauge.current(), 0);
    }
}
