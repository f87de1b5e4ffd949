//! Error types for the download module.
//!
//! Every variant maps to one class of session-terminating failure: transport,
//! content type, range protocol, empty result, or local I/O.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that terminate a download session.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, body read).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Response status was neither 200 nor 206.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Response content type is outside the engine's media family.
    #[error("unexpected content type '{actual}', expected {expected}/*")]
    ContentType {
        /// Expected primary type (`video` or `audio`).
        expected: &'static str,
        /// Content type the server sent (parameters stripped, may be empty).
        actual: String,
    },

    /// A 206 response arrived without a `Content-Range` header.
    #[error("partial response at offset {offset} has no Content-Range header")]
    MissingContentRange {
        /// Offset the request asked for.
        offset: u64,
    },

    /// `Content-Range` did not match `bytes <start>-<end>/<total>`.
    #[error("malformed Content-Range header '{value}'")]
    MalformedContentRange {
        /// Raw header value.
        value: String,
    },

    /// Server answered with a range that does not start at the cursor.
    #[error("offset gap: expected range to start at {expected}, server sent {actual}")]
    OffsetGap {
        /// Current session offset.
        expected: u64,
        /// Start offset the server reported.
        actual: u64,
    },

    /// Total size changed between parts.
    #[error("size mismatch: first response reported {expected} bytes, later {actual}")]
    SizeMismatch {
        /// Total size recorded from the first part.
        expected: u64,
        /// Total size in the current part.
        actual: u64,
    },

    /// Part body length disagrees with its `Content-Range`.
    #[error("part length mismatch: Content-Range covers {expected} bytes, body had {actual}")]
    PartLength {
        /// Length implied by the header.
        expected: u64,
        /// Bytes actually received.
        actual: u64,
    },

    /// Server ignored the range and sent the full resource mid-session.
    #[error("server sent a full response after {offset} bytes were already received")]
    UnexpectedFullResponse {
        /// Bytes accepted before the full response arrived.
        offset: u64,
    },

    /// Buffered finalization found nothing to save.
    #[error("no data to save")]
    NoData,

    /// File system error in a local sink (create, write, flush).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The save step could not be dispatched.
    #[error("failed to save {file_name}: {reason}")]
    Save {
        /// Name the blob was to be saved as.
        file_name: String,
        /// Why dispatch failed.
        reason: String,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a content type mismatch error.
    pub fn content_type(expected: &'static str, actual: impl Into<String>) -> Self {
        Self::ContentType {
            expected,
            actual: actual.into(),
        }
    }

    /// Creates a malformed `Content-Range` error.
    pub fn malformed_content_range(value: impl Into<String>) -> Self {
        Self::MalformedContentRange {
            value: value.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a save dispatch error.
    pub fn save(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Save {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns true for failures caused by the range protocol itself.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingContentRange { .. }
                | Self::MalformedContentRange { .. }
                | Self::OffsetGap { .. }
                | Self::SizeMismatch { .. }
                | Self::PartLength { .. }
                | Self::UnexpectedFullResponse { .. }
        )
    }

    /// Returns true when the session ended with nothing to save.
    ///
    /// Such sessions end `Aborted` rather than `Failed`.
    #[must_use]
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

/// Failure to obtain a streaming save-as destination.
#[derive(Debug, Error)]
pub enum SaveAsError {
    /// The user (or its local analogue) declined; fall back silently.
    #[error("save-as cancelled")]
    Cancelled,

    /// Any other acquisition failure; fall back but log it.
    #[error("save-as failed for {path}: {source}")]
    Failed {
        /// Destination that could not be opened.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl SaveAsError {
    /// Creates an acquisition failure.
    pub fn failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Failed {
            path: path.into(),
            source,
        }
    }

    /// Returns true for explicit cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/v.mp4", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(
            msg.contains("https://example.com/v.mp4"),
            "Expected URL in: {msg}"
        );
    }

    #[test]
    fn test_download_error_content_type_display() {
        let error = DownloadError::content_type("video", "text/html");
        let msg = error.to_string();
        assert!(msg.contains("text/html"), "Expected actual type in: {msg}");
        assert!(msg.contains("video/*"), "Expected family in: {msg}");
    }

    #[test]
    fn test_download_error_offset_gap_display() {
        let error = DownloadError::OffsetGap {
            expected: 100,
            actual: 150,
        };
        let msg = error.to_string();
        assert!(msg.contains("100") && msg.contains("150"), "got: {msg}");
    }

    #[test]
    fn test_protocol_violation_classification() {
        assert!(DownloadError::MissingContentRange { offset: 0 }.is_protocol_violation());
        assert!(DownloadError::malformed_content_range("bytes */10").is_protocol_violation());
        assert!(
            DownloadError::SizeMismatch {
                expected: 1,
                actual: 2
            }
            .is_protocol_violation()
        );
        assert!(!DownloadError::http_status("u", 500).is_protocol_violation());
        assert!(!DownloadError::NoData.is_protocol_violation());
    }

    #[test]
    fn test_empty_result_classification() {
        assert!(DownloadError::NoData.is_empty_result());
        assert!(!DownloadError::content_type("audio", "video/mp4").is_empty_result());
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full");
        let error = DownloadError::io(PathBuf::from("/tmp/clip.mp4"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/clip.mp4"), "Expected path in: {msg}");
    }

    #[test]
    fn test_save_as_error_cancelled() {
        assert!(SaveAsError::Cancelled.is_cancelled());
        let failed = SaveAsError::failed(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!failed.is_cancelled());
        assert!(failed.to_string().contains("/tmp/x"));
    }
}
