//! Shutdown coordination for the daemon.
//!
//! Background loops are spawned through [`Shutdown::spawn`] so `drain` can
//! signal them and wait for each one against a single deadline.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// What happened to each registered task during `drain`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: Vec<&'static str>,
    pub panicked: Vec<&'static str>,
    /// Still running at the deadline and aborted.
    pub aborted: Vec<&'static str>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.panicked.is_empty() && self.aborted.is_empty()
    }
}

/// Coordinator for graceful shutdown.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    drain_timeout: Duration,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::with_drain_timeout(DEFAULT_DRAIN_TIMEOUT)
    }

    pub fn with_drain_timeout(drain_timeout: Duration) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            tasks: Mutex::new(Vec::new()),
            drain_timeout,
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Spawn a named task that receives the shutdown signal and is awaited
    /// by `drain`.
    pub fn spawn<F, Fut>(&self, name: &'static str, task: F)
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.subscribe()));
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name, handle));
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Trigger shutdown and wait for every spawned task. Tasks still running
    /// when the drain timeout expires are aborted.
    pub async fn drain(&self) -> DrainReport {
        self.trigger();
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        let deadline = Instant::now() + self.drain_timeout;
        let mut report = DrainReport::default();

        for (name, mut handle) in tasks {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => report.completed.push(name),
                Ok(Err(e)) => {
                    tracing::error!(task = name, error = %e, "Background task panicked");
                    report.panicked.push(name);
                }
                Err(_) => {
                    tracing::warn!(
                        task = name,
                        timeout = ?self.drain_timeout,
                        "Background task missed the drain deadline, aborting"
                    );
                    handle.abort();
                    report.aborted.push(name);
                }
            }
        }

        report
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_all_subscribers() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_waits_for_cooperative_tasks() {
        let shutdown = Shutdown::with_drain_timeout(Duration::from_secs(5));
        shutdown.spawn("export", |mut rx| async move {
            let _ = rx.recv().await;
        });
        shutdown.spawn("reload", |mut rx| async move {
            let _ = rx.recv().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        });

        let report = shutdown.drain().await;
        assert!(report.is_clean());
        assert_eq!(report.completed, vec!["export", "reload"]);
    }

    #[tokio::test]
    async fn test_drain_aborts_tasks_past_the_deadline() {
        let shutdown = Shutdown::with_drain_timeout(Duration::from_millis(50));
        shutdown.spawn("stuck", |_rx| std::future::pending::<()>());
        shutdown.spawn("quick", |mut rx| async move {
            let _ = rx.recv().await;
        });

        let report = shutdown.drain().await;
        assert_eq!(report.aborted, vec!["stuck"]);
        assert_eq!(report.completed, vec!["quick"]);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_drain_reports_panicked_tasks() {
        let shutdown = Shutdown::new();
        shutdown.spawn("broken", |_rx| async {
            let batches: Vec<u32> = Vec::new();
            let first = batches[0];
            assert_eq!(first, 0);
        });

        let report = shutdown.drain().await;
        assert_eq!(report.panicked, vec!["broken"]);
    }

    #[tokio::test]
    async fn test_drain_without_tasks() {
        let report = Shutdown::default().drain().await;
        assert_eq!(report, DrainReport::default());
    }
}
