//! Interval scheduler for maintenance jobs.
//!
//! Jobs run on a fixed cadence with at-least-one-active-run semantics: a
//! slow job delays its own next tick but never overlaps itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

type Job = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Fixed-interval job scheduler.
pub struct Scheduler {
    running: Arc<RwLock<bool>>,
    handles: Arc<RwLock<Vec<JoinHandle<()>>>>,
}

impl Scheduler {
    /// Create a new scheduler.
    pub fn new() -> Self {
        Self {
            running: Arc::new(RwLock::new(true)),
            handles: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Schedule `job` to run every `interval`.
    ///
    /// The first run happens after one full interval, not immediately.
    pub async fn schedule<F, Fut>(&self, interval: Duration, name: &str, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job: Job = Arc::new(move || Box::pin(job()));
        let running = self.running.clone();
        let name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                {
                    let r = running.read().await;
                    if !*r {
                        break;
                    }
                }

                tracing::debug!(job = %name, "scheduled job tick");
                job().await;
            }
        });

        self.handles.write().await.push(handle);
    }

    /// Stop all scheduled jobs.
    pub async fn stop(&self) {
        *self.running.write().await = false;

        let mut handles = self.handles.write().await;
        for handle in handles.drain(..) {
            handle.abort();
        }
    }

    /// Check whether the scheduler is running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_scheduler_runs_job() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        scheduler
            .schedule(Duration::from_millis(20), "counter", move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        tokio::time::sleep(Duration::from_millis(90)).await;
        scheduler.stop().await;
        let observed = count.load(Ordering::SeqCst);
        assert!(observed >= 2, "expected at least 2 ticks, got {}", observed);

        // No further runs after stop.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), observed);
    }

    #[tokio::test]
    async fn test_scheduler_stop_flag() {
        let scheduler = Scheduler::new();
        assert!(scheduler.is_running().await);
        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
    }
}
