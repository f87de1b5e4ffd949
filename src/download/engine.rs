//! Sequential range download engine.
//!
//! One [`RangeDownloadEngine`] serves one media family. Each call to
//! [`RangeDownloadEngine::download`] runs an independent session: it picks a
//! sink, issues `Range: bytes=<offset>-` requests one at a time, validates
//! every response, and finalizes into the sink once the total size is reached.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_downloader::download::{
//!     DirectorySaveAs, DirectorySaver, HttpClient, RangeDownloadEngine, TracingReporter,
//! };
//!
//! # async fn example() {
//! let saver = Arc::new(DirectorySaver::new("./downloads"));
//! let engine = RangeDownloadEngine::video(
//!     Arc::new(HttpClient::new()),
//!     saver.clone(),
//!     Arc::new(TracingReporter),
//! )
//! .with_save_as(Arc::new(DirectorySaveAs::new("./downloads")));
//!
//! if let Some(outcome) = engine.download("https://example.com/stream/42").await {
//!     println!("{}: {}", outcome.file_name, outcome.state.as_str());
//! }
//! saver.flush().await;
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use super::client::{RangeResponse, RangeTransport};
use super::content_range::ContentRange;
use super::error::{DownloadError, SaveAsError};
use super::media::{MediaKind, essence};
use super::progress::{ProgressReporter, notify};
use super::session::{DownloadSession, SessionId, SessionState};
use super::sink::{BufferedSink, SaveAction, SaveAsProvider, Sink, SinkKind};

/// Terminal result of one session.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Session identifier used for progress events.
    pub id: SessionId,
    /// Final file name.
    pub file_name: String,
    /// `Completed`, `Aborted`, or `Failed`.
    pub state: SessionState,
    /// Bytes accepted before the session ended.
    pub bytes_received: u64,
    /// Total size, once any response established it.
    pub total_size: Option<u64>,
    /// Sink variant the session wrote into.
    pub sink: SinkKind,
    /// Where a streaming session's file landed. Buffered saves run in the
    /// background, so their path is not known here.
    pub saved_as: Option<PathBuf>,
    /// The fatal error, for sessions that did not complete.
    pub error: Option<DownloadError>,
}

impl SessionOutcome {
    /// Returns true when the session delivered its data.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }
}

/// Drives range-request sessions for one media family.
///
/// Collaborators are injected: the transport, an optional save-as capability,
/// the buffered save action, and the progress reporter. Sessions share
/// nothing but these collaborators, so any number may run concurrently.
#[derive(Clone)]
pub struct RangeDownloadEngine {
    kind: MediaKind,
    transport: Arc<dyn RangeTransport>,
    save_as: Option<Arc<dyn SaveAsProvider>>,
    saver: Arc<dyn SaveAction>,
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for RangeDownloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeDownloadEngine")
            .field("kind", &self.kind)
            .field("save_as", &self.save_as.is_some())
            .finish_non_exhaustive()
    }
}

impl RangeDownloadEngine {
    /// Creates an engine for `kind` without a save-as capability.
    #[must_use]
    pub fn new(
        kind: MediaKind,
        transport: Arc<dyn RangeTransport>,
        saver: Arc<dyn SaveAction>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            kind,
            transport,
            save_as: None,
            saver,
            reporter,
        }
    }

    /// Creates a `video/*` engine.
    #[must_use]
    pub fn video(
        transport: Arc<dyn RangeTransport>,
        saver: Arc<dyn SaveAction>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self::new(MediaKind::Video, transport, saver, reporter)
    }

    /// Creates an `audio/*` engine.
    #[must_use]
    pub fn audio(
        transport: Arc<dyn RangeTransport>,
        saver: Arc<dyn SaveAction>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self::new(MediaKind::Audio, transport, saver, reporter)
    }

    /// Adds a save-as capability consulted before each session's first request.
    #[must_use]
    pub fn with_save_as(mut self, provider: Arc<dyn SaveAsProvider>) -> Self {
        self.save_as = Some(provider);
        self
    }

    /// Media family this engine accepts.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Runs one session for `url` to a terminal state.
    ///
    /// Returns `None` without creating a session when `url` is empty.
    /// Failures are reported through the progress reporter and the log and
    /// returned inside the outcome; they never propagate further.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn download(&self, url: &str) -> Option<SessionOutcome> {
        if url.trim().is_empty() {
            debug!("empty source URL, nothing to download");
            return None;
        }

        let mut session = DownloadSession::new(url, self.kind);
        let preview: String = url.chars().take(50).collect();
        info!(
            session = %session.id(),
            file_name = session.file_name(),
            "starting {} download: {preview}...",
            self.kind
        );

        let id = session.id().clone();
        notify("create", || self.reporter.create(&id, session.file_name()));

        let mut sink = self.select_sink(session.file_name()).await;
        let sink_kind = sink.kind();
        let result = match self.drive(&mut session, &mut sink).await {
            Ok(()) => self.finalize(&mut session, sink).await,
            Err(e) => {
                sink.discard().await;
                Err(e)
            }
        };

        let mut saved_as = None;
        let error = match result {
            Ok(path) => {
                saved_as = path;
                session.set_state(SessionState::Completed);
                notify("complete", || self.reporter.complete(&id));
                None
            }
            Err(e) => {
                let state = if e.is_empty_result() {
                    SessionState::Aborted
                } else {
                    SessionState::Failed
                };
                session.set_state(state);
                error!(
                    session = %id,
                    file_name = session.file_name(),
                    error = %e,
                    protocol_violation = e.is_protocol_violation(),
                    state = state.as_str(),
                    "download did not complete"
                );
                notify("abort", || self.reporter.abort(&id));
                Some(e)
            }
        };

        let file_name = saved_as
            .as_deref()
            .and_then(Path::file_name)
            .map_or_else(
                || session.file_name().to_string(),
                |name| name.to_string_lossy().into_owned(),
            );
        Some(SessionOutcome {
            id,
            file_name,
            state: session.state(),
            bytes_received: session.next_offset(),
            total_size: session.total_size(),
            sink: sink_kind,
            saved_as,
            error,
        })
    }

    /// Chooses the session's sink before any network request.
    async fn select_sink(&self, suggested_name: &str) -> Sink {
        let Some(provider) = self.save_as.as_ref().filter(|p| p.is_available()) else {
            return Sink::Buffered(BufferedSink::new());
        };
        match provider.request(suggested_name).await {
            Ok(streaming) => Sink::Streaming(streaming),
            Err(SaveAsError::Cancelled) => {
                debug!(file_name = suggested_name, "save-as cancelled, buffering in memory");
                Sink::Buffered(BufferedSink::new())
            }
            Err(e) => {
                error!(
                    file_name = suggested_name,
                    error = %e,
                    "save-as unavailable, buffering in memory"
                );
                Sink::Buffered(BufferedSink::new())
            }
        }
    }

    /// Fetches parts until the total size is reached.
    async fn drive(
        &self,
        session: &mut DownloadSession,
        sink: &mut Sink,
    ) -> Result<(), DownloadError> {
        session.set_state(SessionState::Fetching);
        loop {
            let response = self
                .transport
                .fetch(session.source_url(), session.next_offset())
                .await?;
            self.validate(session, &response)?;

            if response.status == 206 {
                let offset = session.next_offset();
                let header = response
                    .content_range
                    .as_deref()
                    .ok_or(DownloadError::MissingContentRange { offset })?;
                let range: ContentRange = header.parse()?;
                session.check_partial(&range)?;

                let received = sink.accept(response.body).await?;
                session.record_partial(&range, received)?;
                let percent = session.progress_percent();
                debug!(
                    file_name = session.file_name(),
                    start = range.start,
                    end = range.end,
                    total = range.total,
                    percent,
                    "accepted part"
                );
                let id = session.id();
                notify("update", || {
                    self.reporter.update(id, session.file_name(), percent);
                });
            } else {
                session.check_full()?;
                info!(
                    file_name = session.file_name(),
                    "server ignored range, full download fallback"
                );
                let received = sink.accept(response.body).await?;
                session.record_full(received)?;
                let id = session.id();
                notify("update", || {
                    self.reporter.update(id, session.file_name(), 100);
                });
            }

            if !session.has_remaining() {
                return Ok(());
            }
        }
    }

    /// Checks status and content type before any body byte is consumed.
    fn validate(
        &self,
        session: &mut DownloadSession,
        response: &RangeResponse,
    ) -> Result<(), DownloadError> {
        if !matches!(response.status, 200 | 206) {
            return Err(DownloadError::http_status(
                session.source_url(),
                response.status,
            ));
        }
        let mime = essence(response.content_type.as_deref().unwrap_or(""));
        if !self.kind.matches_family(mime) {
            return Err(DownloadError::content_type(self.kind.family(), mime));
        }
        session.apply_mime(mime);
        Ok(())
    }

    /// Closes or saves the sink; a streaming destination is discarded on any failure.
    async fn finalize(
        &self,
        session: &mut DownloadSession,
        sink: Sink,
    ) -> Result<Option<PathBuf>, DownloadError> {
        session.set_state(SessionState::Finalizing);
        match sink {
            Sink::Streaming(mut streaming) => {
                if session.next_offset() == 0 {
                    streaming.abort().await;
                    return Err(DownloadError::NoData);
                }
                let path = match streaming.close(session.file_name()).await {
                    Ok(path) => path,
                    Err(e) => {
                        streaming.abort().await;
                        return Err(e);
                    }
                };
                info!(
                    path = %path.display(),
                    bytes = session.next_offset(),
                    "streaming download finished"
                );
                Ok(Some(path))
            }
            Sink::Buffered(buffered) => {
                let blob = buffered.finalize(&session.blob_mime())?;
                let size = blob.len();
                if u64::try_from(size).ok() != session.total_size() {
                    warn!(
                        file_name = session.file_name(),
                        size,
                        total = ?session.total_size(),
                        "assembled size differs from reported total"
                    );
                }
                self.saver.save(blob, session.file_name())?;
                info!(file_name = session.file_name(), bytes = size, "downloaded");
                Ok(None)
            }
        }
    }
}
