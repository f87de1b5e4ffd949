//! Shared helpers for range engine integration tests: a range-honoring mock
//! responder and recording collaborators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use media_downloader::download::{DownloadError, MediaBlob, ProgressReporter, SaveAction};
use media_downloader::SessionId;
use wiremock::{Respond, ResponseTemplate};

/// Serves `payload` in `chunk`-sized 206 parts, starting wherever the
/// request's `Range: bytes=<offset>-` header points.
pub struct RangeResponder {
    payload: Vec<u8>,
    chunk: usize,
    content_type: &'static str,
    requests: Arc<AtomicUsize>,
}

impl RangeResponder {
    pub fn new(payload: Vec<u8>, chunk: usize, content_type: &'static str) -> Self {
        Self {
            payload,
            chunk,
            content_type,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of requests served so far.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.requests)
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let offset = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.strip_suffix('-'))
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        if offset >= self.payload.len() {
            return ResponseTemplate::new(416);
        }
        let end = (offset + self.chunk).min(self.payload.len()) - 1;
        ResponseTemplate::new(206)
            .insert_header("Content-Type", self.content_type)
            .insert_header(
                "Content-Range",
                format!("bytes {offset}-{end}/{}", self.payload.len()).as_str(),
            )
            .set_body_bytes(self.payload[offset..=end].to_vec())
    }
}

/// Deterministic test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| u8::try_from(i % 251).unwrap_or(0)).collect()
}

/// Progress events as seen by a reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Create(String),
    Update(u8),
    Complete,
    Abort,
}

/// Reporter that records every event, keyed by session.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<(SessionId, Event)>>,
}

impl RecordingReporter {
    pub fn events_for(&self, id: &SessionId) -> Vec<Event> {
        self.events
            .lock()
            .expect("reporter lock")
            .iter()
            .filter(|(session, _)| session == id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn percents_for(&self, id: &SessionId) -> Vec<u8> {
        self.events_for(id)
            .into_iter()
            .filter_map(|event| match event {
                Event::Update(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn push(&self, id: &SessionId, event: Event) {
        self.events
            .lock()
            .expect("reporter lock")
            .push((id.clone(), event));
    }
}

impl ProgressReporter for RecordingReporter {
    fn create(&self, id: &SessionId, file_name: &str) {
        self.push(id, Event::Create(file_name.to_string()));
    }

    fn update(&self, id: &SessionId, _file_name: &str, percent: u8) {
        self.push(id, Event::Update(percent));
    }

    fn complete(&self, id: &SessionId) {
        self.push(id, Event::Complete);
    }

    fn abort(&self, id: &SessionId) {
        self.push(id, Event::Abort);
    }
}

/// Save action that keeps blobs in memory.
#[derive(Default)]
pub struct RecordingSaver {
    saved: Mutex<Vec<(MediaBlob, String)>>,
}

impl RecordingSaver {
    pub fn saved(&self) -> Vec<(MediaBlob, String)> {
        self.saved.lock().expect("saver lock").clone()
    }
}

impl SaveAction for RecordingSaver {
    fn save(&self, blob: MediaBlob, file_name: &str) -> Result<(), DownloadError> {
        self.saved
            .lock()
            .expect("saver lock")
            .push((blob, file_name.to_string()));
        Ok(())
    }
}
