//! Progress notifications emitted by the range engine.
//!
//! Reporters are pure side effects. Their methods cannot fail, and the engine
//! additionally contains panics raised inside a reporter so that a broken
//! progress surface never ends a download.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{info, warn};

use super::session::SessionId;

/// Receives per-session progress events.
pub trait ProgressReporter: Send + Sync {
    /// Called once, before the first request.
    fn create(&self, id: &SessionId, file_name: &str);

    /// Called after every accepted part; `percent` is in `0..=100`.
    fn update(&self, id: &SessionId, file_name: &str, percent: u8);

    /// Terminal success.
    fn complete(&self, id: &SessionId);

    /// Terminal failure.
    fn abort(&self, id: &SessionId);
}

/// Reporter that writes progress events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn create(&self, id: &SessionId, file_name: &str) {
        info!(session = %id, file_name, "download started");
    }

    fn update(&self, id: &SessionId, file_name: &str, percent: u8) {
        info!(session = %id, file_name, percent, "download progress");
    }

    fn complete(&self, id: &SessionId) {
        info!(session = %id, "download completed");
    }

    fn abort(&self, id: &SessionId) {
        warn!(session = %id, "download aborted");
    }
}

/// Runs a reporter callback, swallowing any panic it raises.
pub(crate) fn notify<F>(event: &'static str, callback: F)
where
    F: FnOnce(),
{
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        warn!(event, "progress reporter panicked; ignoring");
    }
}
