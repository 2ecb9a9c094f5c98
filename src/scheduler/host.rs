use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Work run on every tick of a periodic job.
pub type JobCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Something that can fire named callbacks on a fixed period.
///
/// Registering a name that is already registered replaces the old job.
pub trait SchedulerHost: Send + Sync {
    fn register_periodic(&self, name: &str, interval: Duration, callback: JobCallback);

    fn is_registered(&self, name: &str) -> bool;

    /// Remove the job. A no-op for unknown names.
    fn deregister(&self, name: &str);
}

/// Runs each job in its own tokio task on a `tokio::time::interval`.
///
/// The first tick fires immediately. Ticks missed while a run is still in
/// progress are skipped, not queued. Must be used from within a tokio runtime.
#[derive(Default)]
pub struct TokioSchedulerHost {
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioSchedulerHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        // A panic while holding this lock cannot leave the map inconsistent
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run_job_loop(name: String, interval: Duration, callback: JobCallback) {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            tracing::debug!(job = %name, "Running scheduled job");
            callback().await;
        }
    }
}

impl SchedulerHost for TokioSchedulerHost {
    fn register_periodic(&self, name: &str, interval: Duration, callback: JobCallback) {
        let handle = tokio::spawn(Self::run_job_loop(name.to_string(), interval, callback));
        if let Some(previous) = self.jobs().insert(name.to_string(), handle) {
            previous.abort();
        }
        tracing::info!(job = %name, interval_secs = interval.as_secs(), "Registered periodic job");
    }

    fn is_registered(&self, name: &str) -> bool {
        self.jobs()
            .get(name)
            .is_some_and(|handle| !handle.is_finished())
    }

    fn deregister(&self, name: &str) {
        if let Some(handle) = self.jobs().remove(name) {
            handle.abort();
            tracing::info!(job = %name, "Deregistered periodic job");
        }
    }
}

impl Drop for TokioSchedulerHost {
    fn drop(&mut self) {
        for (_, handle) in self.jobs().drain() {
            handle.abort();
        }
    }
}
