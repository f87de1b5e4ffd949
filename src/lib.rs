//! Media Downloader Library
//!
//! Resumable range-request downloads of video and audio streams. A session
//! fetches a resource in consecutive `Range` parts, validates every part, and
//! hands the result to a streaming destination or to an in-memory buffer that
//! is saved once complete.
//!
//! # Architecture
//!
//! - [`download`] - range engine, sessions, sinks, transport, progress
//!
//! The command-line front end (config file, progress bars, concurrent
//! sessions) lives in the `media-downloader` binary.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
mod user_agent;

// Re-export commonly used types
pub use download::{
    DownloadError, HttpClient, MediaKind, ProgressReporter, RangeDownloadEngine, SaveAsError,
    SessionId, SessionOutcome, SessionState, SinkKind,
};
