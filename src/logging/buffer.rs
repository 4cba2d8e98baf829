//! Batched log delivery.
//!
//! # Flush Triggers
//! - size: `add` reaching `max_size` flushes synchronously
//! - time: a background task flushes every `flush_interval`
//! - explicit: `flush()`, `request_flush()`
//! - teardown: `destroy()` (and `Drop`) stops the task and flushes once more
//!
//! The queue is swapped out under its lock and the handler runs outside it,
//! so a handler that logs again cannot deadlock the buffer.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::errors::ErrorInfo;
use crate::logging::console::ConsoleWriter;
use crate::logging::entry::LogEntry;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Failure reported by a flush handler.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sink rejected batch: {0}")]
    Rejected(String),
}

/// Receives flushed batches.
pub trait FlushHandler: Send + Sync {
    fn on_flush(&self, batch: Vec<LogEntry>) -> Result<(), SinkError>;
}

impl<F> FlushHandler for F
where
    F: Fn(Vec<LogEntry>) -> Result<(), SinkError> + Send + Sync,
{
    fn on_flush(&self, batch: Vec<LogEntry>) -> Result<(), SinkError> {
        self(batch)
    }
}

/// Writes each flushed entry to the console.
pub struct ConsoleSink {
    writer: Arc<dyn ConsoleWriter>,
    pretty: bool,
}

impl ConsoleSink {
    pub fn new(writer: Arc<dyn ConsoleWriter>, pretty: bool) -> Self {
        Self { writer, pretty }
    }
}

impl FlushHandler for ConsoleSink {
    fn on_flush(&self, batch: Vec<LogEntry>) -> Result<(), SinkError> {
        for entry in &batch {
            let line = if self.pretty { entry.to_pretty() } else { entry.to_json() };
            self.writer.write_line(entry.level().stream(), &line);
        }
        Ok(())
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStats {
    pub flushed_batches: u64,
    pub flushed_entries: u64,
    pub failed_batches: u64,
}

enum BufferCommand {
    Flush,
    Shutdown,
}

struct BufferCore {
    queue: Mutex<Vec<LogEntry>>,
    max_size: usize,
    on_flush: Arc<dyn FlushHandler>,
    destroyed: AtomicBool,
    flushed_batches: AtomicU64,
    flushed_entries: AtomicU64,
    failed_batches: AtomicU64,
}

impl BufferCore {
    fn flush(&self) {
        let batch = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            if queue.is_empty() {
                return;
            }
            std::mem::take(&mut *queue)
        };
        self.deliver(batch);
    }

    fn deliver(&self, batch: Vec<LogEntry>) {
        let size = batch.len() as u64;
        let handler = &self.on_flush;
        match panic::catch_unwind(AssertUnwindSafe(|| handler.on_flush(batch))) {
            Ok(Ok(())) => {
                self.flushed_batches.fetch_add(1, Ordering::Relaxed);
                self.flushed_entries.fetch_add(size, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                self.failed_batches.fetch_add(1, Ordering::Relaxed);
                tracing::error!(entries = size, error = %e, "Log flush handler failed");
            }
            Err(payload) => {
                self.failed_batches.fetch_add(1, Ordering::Relaxed);
                let info = ErrorInfo::from_panic(payload.as_ref());
                tracing::error!(entries = size, error = %info.message, "Log flush handler panicked");
            }
        }
    }
}

/// Bounded queue of log entries delivered in batches.
pub struct LogBuffer {
    core: Arc<BufferCore>,
    commands: Mutex<Option<mpsc::UnboundedSender<BufferCommand>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    flush_interval: Duration,
}

impl LogBuffer {
    /// Create a buffer. A zero `max_size` is treated as 1 and a zero
    /// interval as `DEFAULT_FLUSH_INTERVAL`.
    ///
    /// The periodic flush task is spawned only when called inside a tokio
    /// runtime; otherwise only size, explicit and teardown flushes happen.
    pub fn new(max_size: usize, flush_interval: Duration, on_flush: Arc<dyn FlushHandler>) -> Self {
        let flush_interval = if flush_interval.is_zero() {
            DEFAULT_FLUSH_INTERVAL
        } else {
            flush_interval
        };

        let core = Arc::new(BufferCore {
            queue: Mutex::new(Vec::new()),
            max_size: max_size.max(1),
            on_flush,
            destroyed: AtomicBool::new(false),
            flushed_batches: AtomicU64::new(0),
            flushed_entries: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
        });

        let (commands, worker) = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let worker = handle.spawn(run_flush_loop(core.clone(), flush_interval, rx));
                (Some(tx), Some(worker))
            }
            Err(_) => {
                tracing::debug!("No tokio runtime; periodic log flush disabled");
                (None, None)
            }
        };

        Self {
            core,
            commands: Mutex::new(commands),
            worker: Mutex::new(worker),
            flush_interval,
        }
    }

    /// Queue an entry, flushing synchronously once `max_size` is reached.
    /// After `destroy`, entries are delivered immediately one by one.
    pub fn add(&self, entry: LogEntry) {
        // `destroyed` is read under the queue lock so an entry can never be
        // pushed after the final drain.
        let ready = {
            let mut queue = self.core.queue.lock().unwrap_or_else(|e| e.into_inner());
            if self.core.destroyed.load(Ordering::SeqCst) {
                Some(vec![entry])
            } else {
                queue.push(entry);
                (queue.len() >= self.core.max_size).then(|| std::mem::take(&mut *queue))
            }
        };

        if let Some(batch) = ready {
            self.core.deliver(batch);
        }
    }

    /// Deliver everything queued now.
    pub fn flush(&self) {
        self.core.flush();
    }

    /// Ask the background task to flush. Falls back to an inline flush when
    /// no task is running.
    pub fn request_flush(&self) {
        let sent = self
            .commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|tx| tx.send(BufferCommand::Flush).is_ok())
            .unwrap_or(false);
        if !sent {
            self.core.flush();
        }
    }

    /// Stop the periodic task and drain the queue. Idempotent.
    pub fn destroy(&self) {
        let remaining = {
            let mut queue = self.core.queue.lock().unwrap_or_else(|e| e.into_inner());
            if self.core.destroyed.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *queue)
        };

        if let Some(tx) = self.commands.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(BufferCommand::Shutdown);
        }
        // The task exits on the shutdown message; the handle is only dropped.
        self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if !remaining.is_empty() {
            self.core.deliver(remaining);
        }
    }

    pub fn len(&self) -> usize {
        self.core.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.core.max_size
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    pub fn is_destroyed(&self) -> bool {
        self.core.destroyed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            flushed_batches: self.core.flushed_batches.load(Ordering::Relaxed),
            flushed_entries: self.core.flushed_entries.load(Ordering::Relaxed),
            failed_batches: self.core.failed_batches.load(Ordering::Relaxed),
        }
    }
}

impl Drop for LogBuffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

async fn run_flush_loop(
    core: Arc<BufferCore>,
    interval: Duration,
    mut commands: mpsc::UnboundedReceiver<BufferCommand>,
) {
    let mut ticker = time::interval(interval);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => core.flush(),
            command = commands.recv() => match command {
                Some(BufferCommand::Flush) => core.flush(),
                Some(BufferCommand::Shutdown) | None => break,
            },
        }
    }
    tracing::debug!("Log buffer flush task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::level::LogLevel;

    type Batches = Arc<Mutex<Vec<Vec<LogEntry>>>>;

    fn spy() -> (Arc<dyn FlushHandler>, Batches) {
        let batches: Batches = Arc::new(Mutex::new(Vec::new()));
        let sink = batches.clone();
        let handler = move |batch: Vec<LogEntry>| -> Result<(), SinkError> {
            sink.lock().unwrap().push(batch);
            Ok(())
        };
        (Arc::new(handler), batches)
    }

    fn entry(message: &str) -> LogEntry {
        LogEntry::new(LogLevel::Info, message)
    }

    #[test]
    fn test_size_triggered_flush() {
        let (handler, batches) = spy();
        let buffer = LogBuffer::new(2, Duration::from_secs(60), handler);

        buffer.add(entry("a"));
        assert!(batches.lock().unwrap().is_empty());
        buffer.add(entry("b"));

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_destroy_drains_pending_entries() {
        let (handler, batches) = spy();
        let buffer = LogBuffer::new(2, Duration::from_secs(60), handler);

        buffer.add(entry("a"));
        buffer.add(entry("b"));
        buffer.add(entry("c"));
        buffer.destroy();
        buffer.destroy();

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1][0].message(), "c");
    }

    #[test]
    fn test_add_after_destroy_is_delivered() {
        let (handler, batches) = spy();
        let buffer = LogBuffer::new(10, Duration::from_secs(60), handler);
        buffer.destroy();
        buffer.add(entry("late"));

        assert_eq!(batches.lock().unwrap().len(), 1);
        assert_eq!(buffer.stats().flushed_entries, 1);
    }

    #[test]
    fn test_flush_on_empty_is_noop() {
        let (handler, batches) = spy();
        let buffer = LogBuffer::new(10, Duration::from_secs(60), handler);
        buffer.flush();
        assert!(batches.lock().unwrap().is_empty());
        assert_eq!(buffer.stats(), BufferStats::default());
    }

    #[test]
    fn test_handler_failure_is_contained() {
        let failing = |_batch: Vec<LogEntry>| -> Result<(), SinkError> {
            Err(SinkError::Rejected("collector offline".into()))
        };
        let buffer = LogBuffer::new(1, Duration::from_secs(60), Arc::new(failing));
        buffer.add(entry("a"));
        assert_eq!(buffer.stats().failed_batches, 1);

        let panicking = |_batch: Vec<LogEntry>| -> Result<(), SinkError> { panic!("sink bug") };
        let buffer = LogBuffer::new(1, Duration::from_secs(60), Arc::new(panicking));
        buffer.add(entry("b"));
        assert_eq!(buffer.stats().failed_batches, 1);
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let (handler, _) = spy();
        let buffer = LogBuffer::new(0, Duration::ZERO, handler);
        assert_eq!(buffer.max_size(), 1);
        assert_eq!(buffer.flush_interval(), DEFAULT_FLUSH_INTERVAL);
    }

    #[tokio::test]
    async fn test_periodic_flush() {
        let (handler, batches) = spy();
        let buffer = LogBuffer::new(100, Duration::from_millis(20), handler);
        buffer.add(entry("tick"));

        time::sleep(Duration::from_millis(120)).await;
        assert_eq!(batches.lock().unwrap().len(), 1);
        buffer.destroy();
    }

    #[tokio::test]
    async fn test_requested_flush_runs_on_task() {
        let (handler, batches) = spy();
        let buffer = LogBuffer::new(100, Duration::from_secs(60), handler);
        buffer.add(entry("now"));
        buffer.request_flush();

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_add_and_destroy_lose_nothing() {
        use std::sync::atomic::AtomicUsize;
        use std::thread;

        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 2_000;

        for _ in 0..50 {
            let delivered = Arc::new(AtomicUsize::new(0));
            let counter = delivered.clone();
            let handler = move |batch: Vec<LogEntry>| -> Result<(), SinkError> {
                counter.fetch_add(batch.len(), Ordering::SeqCst);
                Ok(())
            };
            let buffer = Arc::new(LogBuffer::new(64, Duration::from_secs(60), Arc::new(handler)));

            let producers: Vec<_> = (0..PRODUCERS)
                .map(|_| {
                    let buffer = buffer.clone();
                    thread::spawn(move || {
                        for _ in 0..PER_PRODUCER {
                            buffer.add(entry("tick"));
                        }
                    })
                })
                .collect();

            thread::sleep(Duration::from_micros(200));
            buffer.destroy();
            for producer in producers {
                producer.join().unwrap();
            }

            assert!(buffer.is_empty());
            assert_eq!(delivered.load(Ordering::SeqCst), PRODUCERS * PER_PRODUCER);
        }
    }
}
