//! Strict `Content-Range` parsing for 206 responses.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use super::error::DownloadError;

/// Exact `bytes <start>-<end>/<total>` form; unknown totals (`*`) are rejected.
#[allow(clippy::expect_used)]
static CONTENT_RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^bytes (\d+)-(\d+)/(\d+)$").expect("Content-Range regex is valid") // Static pattern, safe to panic
});

/// A satisfied byte range as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte offset, inclusive.
    pub start: u64,
    /// Last byte offset, inclusive.
    pub end: u64,
    /// Full resource size.
    pub total: u64,
}

impl ContentRange {
    /// Number of bytes the range covers.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false; a parsed range covers at least one byte.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Offset the next range request should start at.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.end + 1
    }
}

impl FromStr for ContentRange {
    type Err = DownloadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || DownloadError::malformed_content_range(value);
        let captures = CONTENT_RANGE_PATTERN
            .captures(value.trim())
            .ok_or_else(malformed)?;
        let number = |index: usize| -> Result<u64, DownloadError> {
            captures
                .get(index)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .ok_or_else(malformed)
        };
        let range = Self {
            start: number(1)?,
            end: number(2)?,
            total: number(3)?,
        };
        if range.start > range.end || range.end >= range.total {
            return Err(malformed());
        }
        Ok(range)
    }
}
