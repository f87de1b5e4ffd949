//! Media families served by the range engine.

use std::fmt;

use super::constants::{AUDIO_EXTENSION, DEFAULT_VIDEO_EXTENSION};
use super::filename::sanitize_filename_component;

/// URL prefix of progressive (ranged) media streams that are always video.
const PROGRESSIVE_PREFIX: &str = "https://web.telegram.org/a/progressive";

/// The content-type family an engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// `video/*` responses; extension follows the served subtype.
    Video,
    /// `audio/*` responses; extension is always `ogg`.
    Audio,
}

impl MediaKind {
    /// Picks the engine for a media source URL.
    ///
    /// Document and progressive stream URLs are video; other URLs mentioning
    /// `audio` are audio; everything else defaults to video.
    #[must_use]
    pub fn detect(url: &str) -> Self {
        if url.contains("document") || url.starts_with(PROGRESSIVE_PREFIX) {
            Self::Video
        } else if url.contains("audio") {
            Self::Audio
        } else {
            Self::Video
        }
    }

    /// Primary MIME type this kind accepts.
    #[must_use]
    pub fn family(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    /// Extension used before any response has been seen.
    #[must_use]
    pub fn default_extension(self) -> &'static str {
        match self {
            Self::Video => DEFAULT_VIDEO_EXTENSION,
            Self::Audio => AUDIO_EXTENSION,
        }
    }

    /// Returns true if `mime` (parameters already stripped) is in this family.
    #[must_use]
    pub fn matches_family(self, mime: &str) -> bool {
        mime.split_once('/')
            .is_some_and(|(primary, _)| primary.trim().eq_ignore_ascii_case(self.family()))
    }

    /// Extension to save under once the served MIME type is known.
    #[must_use]
    pub fn extension_for(self, mime: &str) -> String {
        match self {
            Self::Audio => AUDIO_EXTENSION.to_string(),
            Self::Video => {
                let subtype = mime.split_once('/').map_or("", |(_, sub)| sub.trim());
                let cleaned = sanitize_filename_component(&subtype.to_lowercase());
                if cleaned.is_empty() {
                    DEFAULT_VIDEO_EXTENSION.to_string()
                } else {
                    cleaned
                }
            }
        }
    }

    /// MIME type attached to the finalized in-memory blob.
    #[must_use]
    pub fn blob_mime(self, extension: &str) -> String {
        match self {
            Self::Video => format!("video/{extension}"),
            Self::Audio => format!("audio/{AUDIO_EXTENSION}"),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.family())
    }
}

/// Strips parameters from a `Content-Type` header value.
#[must_use]
pub fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}
