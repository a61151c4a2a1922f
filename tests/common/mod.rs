#![allow(dead_code, unused_imports)]

pub use msrunner_test_utils::builders;
pub use msrunner_test_utils::fake_job::{ConcurrencyTracker, FakeJob};
pub use msrunner_test_utils::fake_launcher::RecordingLauncher;
pub use msrunner_test_utils::{capture_logs, init_tracing, with_timeout};

use std::sync::Arc;

use msrunner::job::Job;

/// Erase concrete job types for `TaskManager::run`.
pub fn jobs(list: &[&Arc<FakeJob>]) -> Vec<Arc<dyn Job>> {
    list.iter()
        .map(|j| Arc::clone(*j) as Arc<dyn Job>)
        .collect()
}

/// Position of `event` in the tracker log, panicking if it never happened.
pub fn position(events: &[String], event: &str) -> usize {
    events
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("event {event:?} not in {events:?}"))
}
