//! Resumable range-request download engine for media streams.
//!
//! A session repeatedly issues `Range: bytes=<offset>-` requests, validates
//! each response (status, content type, `Content-Range` contiguity, stable
//! total size), and accumulates the parts into one sink until the total size
//! is reached.
//!
//! # Features
//!
//! - Video and audio engines with per-family content type checks
//! - Streaming (save-as) and buffered (in-memory) sinks
//! - File names recovered from URL metadata, else derived from a URL hash
//! - Progress reporting isolated from download correctness
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_downloader::download::{
//!     DirectorySaver, HttpClient, MediaKind, RangeDownloadEngine, TracingReporter,
//! };
//!
//! # async fn example() {
//! let url = "https://example.com/audio/7";
//! let saver = Arc::new(DirectorySaver::new("."));
//! let engine = RangeDownloadEngine::new(
//!     MediaKind::detect(url),
//!     Arc::new(HttpClient::new()),
//!     saver.clone(),
//!     Arc::new(TracingReporter),
//! );
//! let outcome = engine.download(url).await;
//! saver.flush().await;
//! # }
//! ```

mod client;
pub mod constants;
mod content_range;
mod engine;
mod error;
pub mod filename;
mod media;
mod progress;
mod session;
mod sink;

pub use client::{BodyStream, HttpClient, RangeResponse, RangeTransport};
pub use content_range::ContentRange;
pub use engine::{RangeDownloadEngine, SessionOutcome};
pub use error::{DownloadError, SaveAsError};
pub use media::{MediaKind, essence};
pub use progress::{ProgressReporter, TracingReporter};
pub use session::{DownloadSession, SessionId, SessionState};
pub use sink::{
    BufferedSink, DirectorySaveAs, DirectorySaver, FileSink, MediaBlob, SaveAction,
    SaveAsProvider, Sink, SinkKind, StreamingSink,
};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
