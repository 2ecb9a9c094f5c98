use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::host::{JobCallback, SchedulerHost};
use crate::import::ImportPipeline;
use crate::model::{FeedConfig, Frequency};

/// Name under which the periodic import is registered with the host.
pub const HOOK_NAME: &str = "feedpress_import";

/// Registration state of the periodic import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Unregistered,
    Registered(Frequency),
}

/// Owns the lifecycle of the recurring import trigger.
///
/// The scheduler never watches configuration itself: whoever saves a new
/// frequency or feed list calls [`ImportScheduler::reschedule`].
pub struct ImportScheduler {
    host: Arc<dyn SchedulerHost>,
    pipeline: Arc<ImportPipeline>,
    state: Mutex<SchedulerState>,
}

impl ImportScheduler {
    pub fn new(host: Arc<dyn SchedulerHost>, pipeline: Arc<ImportPipeline>) -> Self {
        Self {
            host,
            pipeline,
            state: Mutex::new(SchedulerState::Unregistered),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.lock_state()
    }

    /// Startup transition: register the import at `frequency` unless the
    /// host already has it.
    pub fn ensure_registered(&self, frequency: Frequency, feeds: Vec<FeedConfig>) -> SchedulerState {
        let mut state = self.lock_state();
        if self.host.is_registered(HOOK_NAME) {
            if *state == SchedulerState::Unregistered {
                *state = SchedulerState::Registered(frequency);
            }
            return *state;
        }

        self.register(frequency, feeds);
        *state = SchedulerState::Registered(frequency);
        *state
    }

    /// Replace the registration after a configuration change.
    pub fn reschedule(&self, frequency: Frequency, feeds: Vec<FeedConfig>) -> SchedulerState {
        let mut state = self.lock_state();
        self.host.deregister(HOOK_NAME);
        self.register(frequency, feeds);
        *state = SchedulerState::Registered(frequency);
        *state
    }

    /// Teardown transition. Deregisters unconditionally.
    pub fn shutdown(&self) {
        let mut state = self.lock_state();
        self.host.deregister(HOOK_NAME);
        *state = SchedulerState::Unregistered;
        tracing::info!("Import schedule removed");
    }

    fn register(&self, frequency: Frequency, feeds: Vec<FeedConfig>) {
        tracing::info!(
            frequency = %frequency,
            feeds = feeds.len(),
            "Scheduling periodic import"
        );
        self.host
            .register_periodic(HOOK_NAME, frequency.interval(), self.callback(feeds));
    }

    /// The scheduled path only logs whether anything was imported.
    fn callback(&self, feeds: Vec<FeedConfig>) -> JobCallback {
        let pipeline = Arc::clone(&self.pipeline);
        let feeds: Arc<[FeedConfig]> = feeds.into();

        Arc::new(move || {
            let pipeline = Arc::clone(&pipeline);
            let feeds = Arc::clone(&feeds);
            async move {
                let result = pipeline.run_all(&feeds).await;
                tracing::info!(
                    any_imported = result.any_imported(),
                    imported = result.imported_count(),
                    "Scheduled import finished"
                );
            }
            .boxed()
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
