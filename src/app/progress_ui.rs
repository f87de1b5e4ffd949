//! Progress bars for download sessions.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use media_downloader::{ProgressReporter, SessionId};

static CONTAINER: OnceLock<MultiProgress> = OnceLock::new();

/// Process-wide container for session bars, created on first use.
fn container() -> &'static MultiProgress {
    CONTAINER.get_or_init(MultiProgress::new)
}

/// Renders one bar per session in a shared [`MultiProgress`].
pub(crate) struct IndicatifReporter {
    bars: Mutex<HashMap<SessionId, ProgressBar>>,
    retain: Duration,
    visible: bool,
}

impl IndicatifReporter {
    /// `retain` is how long a completed bar stays; hidden reporters draw nothing.
    pub(crate) fn new(retain: Duration, visible: bool) -> Self {
        Self {
            bars: Mutex::new(HashMap::new()),
            retain,
            visible,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.bold} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }

    fn take(&self, id: &SessionId) -> Option<ProgressBar> {
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    #[cfg(test)]
    fn active(&self) -> usize {
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Removes a finished bar after the retain delay.
    fn schedule_removal(&self, bar: ProgressBar) {
        if !self.visible || self.retain.is_zero() {
            container().remove(&bar);
            return;
        }
        let retain = self.retain;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(retain).await;
                    container().remove(&bar);
                });
            }
            Err(_) => container().remove(&bar),
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn create(&self, id: &SessionId, file_name: &str) {
        let bar = if self.visible {
            container().add(ProgressBar::new(100))
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(Self::style());
        bar.set_prefix(file_name.to_string());
        bar.set_message("Starting");
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), bar);
    }

    fn update(&self, id: &SessionId, file_name: &str, percent: u8) {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = bars.get(id) {
            // Name may change once the served content type is known.
            bar.set_prefix(file_name.to_string());
            bar.set_position(u64::from(percent.min(100)));
            bar.set_message("Downloading");
        }
    }

    fn complete(&self, id: &SessionId) {
        if let Some(bar) = self.take(id) {
            bar.set_position(100);
            bar.finish_with_message("Completed");
            self.schedule_removal(bar);
        }
    }

    fn abort(&self, id: &SessionId) {
        if let Some(bar) = self.take(id) {
            bar.abandon_with_message("Aborted");
        }
    }
}
