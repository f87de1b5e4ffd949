//! Per-download session state: identifier, cursor, size, and naming.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use super::constants::SESSION_ID_RANDOM_LEN;
use super::content_range::ContentRange;
use super::error::DownloadError;
use super::filename::{fallback_file_name, recover_metadata_file_name, replace_extension};
use super::media::MediaKind;

/// Opaque identifier correlating progress events for one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new id: random base-36 characters plus a millisecond timestamp.
    #[must_use]
    pub fn generate() -> Self {
        const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut rng = rand::thread_rng();
        let random: String = (0..SESSION_ID_RANDOM_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        Self(format!("{random}_{}", now_millis()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created; no request issued yet.
    Pending,
    /// A range request is in flight or about to be issued.
    Fetching,
    /// All bytes received; closing the sink or saving the blob.
    Finalizing,
    /// Data delivered to its destination.
    Completed,
    /// Ended without data to save.
    Aborted,
    /// Ended by a fatal transport, content, protocol, or sink error.
    Failed,
}

impl SessionState {
    /// Returns true for `Completed`, `Aborted`, and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }

    /// Stable lowercase label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

/// One end-to-end attempt to retrieve and save a single resource.
///
/// `next_offset` always equals the number of accepted bytes; `total_size`
/// is fixed by the first response and never changes afterwards.
#[derive(Debug, Clone)]
pub struct DownloadSession {
    id: SessionId,
    source_url: String,
    kind: MediaKind,
    next_offset: u64,
    total_size: Option<u64>,
    file_extension: String,
    file_name: String,
    state: SessionState,
}

impl DownloadSession {
    /// Creates a session for `url`, deriving its initial file name.
    #[must_use]
    pub fn new(url: &str, kind: MediaKind) -> Self {
        let mut file_name = fallback_file_name(url, kind, now_millis());
        if let Some(recovered) = recover_metadata_file_name(url) {
            file_name = recovered;
        }
        if kind == MediaKind::Audio {
            file_name = replace_extension(&file_name, kind.default_extension());
        }
        Self {
            id: SessionId::generate(),
            source_url: url.to_string(),
            kind,
            next_offset: 0,
            total_size: None,
            file_extension: kind.default_extension().to_string(),
            file_name,
            state: SessionState::Pending,
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Source URL, immutable for the session.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Offset of the next byte to request.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Total resource size once known.
    #[must_use]
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// Current file extension (without the dot).
    #[must_use]
    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    /// Current file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// MIME type of the finalized blob.
    #[must_use]
    pub fn blob_mime(&self) -> String {
        self.kind.blob_mime(&self.file_extension)
    }

    /// Returns true while bytes remain to be fetched.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.total_size
            .is_none_or(|total| self.next_offset < total)
    }

    /// Progress as a whole percentage, truncated, clamped to 100.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        match self.total_size {
            None => 0,
            Some(0) => 100,
            Some(total) => {
                let pct = u128::from(self.next_offset) * 100 / u128::from(total);
                u8::try_from(pct.min(100)).unwrap_or(100)
            }
        }
    }

    /// Applies a served MIME type to the extension and file name.
    pub fn apply_mime(&mut self, mime: &str) {
        let extension = self.kind.extension_for(mime);
        self.file_name = replace_extension(&self.file_name, &extension);
        self.file_extension = extension;
    }

    /// Validates a partial response's range against the session.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::OffsetGap`] when the range does not start at
    /// the cursor and [`DownloadError::SizeMismatch`] when the total differs
    /// from the first response.
    pub fn check_partial(&self, range: &ContentRange) -> Result<(), DownloadError> {
        if range.start != self.next_offset {
            return Err(DownloadError::OffsetGap {
                expected: self.next_offset,
                actual: range.start,
            });
        }
        if let Some(expected) = self.total_size
            && expected != range.total
        {
            return Err(DownloadError::SizeMismatch {
                expected,
                actual: range.total,
            });
        }
        Ok(())
    }

    /// Accepts a partial response whose body carried `body_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns the [`check_partial`](Self::check_partial) errors, or
    /// [`DownloadError::PartLength`] when the body length disagrees with the range.
    pub fn record_partial(
        &mut self,
        range: &ContentRange,
        body_len: u64,
    ) -> Result<(), DownloadError> {
        self.check_partial(range)?;
        if body_len != range.len() {
            return Err(DownloadError::PartLength {
                expected: range.len(),
                actual: body_len,
            });
        }
        self.total_size = Some(range.total);
        self.next_offset = range.next_offset();
        Ok(())
    }

    /// Checks that a full (200) response may be accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::UnexpectedFullResponse`] once any bytes were accepted.
    pub fn check_full(&self) -> Result<(), DownloadError> {
        if self.next_offset != 0 {
            return Err(DownloadError::UnexpectedFullResponse {
                offset: self.next_offset,
            });
        }
        Ok(())
    }

    /// Accepts a full (200) response body of `body_len` bytes as the whole resource.
    ///
    /// # Errors
    ///
    /// See [`check_full`](Self::check_full).
    pub fn record_full(&mut self, body_len: u64) -> Result<(), DownloadError> {
        self.check_full()?;
        self.total_size = Some(body_len);
        self.next_offset = body_len;
        Ok(())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
