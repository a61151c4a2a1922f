// src/job/future.rs

//! Single-assignment, multi-reader completion value.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

/// Resolved once with a job's result (usually an output path); any number
/// of dependents can await it and all see the same value.
///
/// Cloning yields another handle to the same slot.
#[derive(Debug, Clone)]
pub struct CompletionFuture {
    slot: Arc<watch::Sender<Option<String>>>,
}

impl Default for CompletionFuture {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionFuture {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    /// Store `value` unless a value is already present.
    ///
    /// Returns `true` only for the call that actually resolved the future.
    pub fn resolve(&self, value: impl Into<String>) -> bool {
        let value = value.into();
        self.slot.send_if_modified(|slot| {
            if slot.is_some() {
                false
            } else {
                *slot = Some(value);
                true
            }
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn value(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    /// Suspend until resolved, then return the value.
    pub async fn wait(&self) -> String {
        let mut rx = self.slot.subscribe();
        let value = match rx.wait_for(Option::is_some).await {
            Ok(v) => v.clone(),
            Err(_) => None,
        };
        match value {
            Some(v) => v,
            // The sender lives in `self`, so the channel cannot close under us.
            None => std::future::pending().await,
        }
    }

    /// Like [`CompletionFuture::wait`], but warn every `interval` while still
    /// unresolved. Never gives up.
    pub async fn wait_logged(&self, interval: Duration, waiter: &str) -> String {
        let mut waited = Duration::ZERO;
        loop {
            match tokio::time::timeout(interval, self.wait()).await {
                Ok(value) => return value,
                Err(_) => {
                    waited += interval;
                    warn!(
                        job = %waiter,
                        waited_secs = waited.as_secs(),
                        "still waiting on dependency; if it failed, this job will never start"
                    );
                }
            }
        }
    }
}
