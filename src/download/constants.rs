//! Constants for the download module (timeouts, naming, progress).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// How long a completed progress entry stays visible before removal.
pub const PROGRESS_RETAIN: Duration = Duration::from_secs(4);

/// Extension used by the video engine until a content type is learned.
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// Fixed extension for the audio engine, regardless of the served subtype.
pub const AUDIO_EXTENSION: &str = "ogg";

/// Length of the random component of a session identifier.
pub const SESSION_ID_RANDOM_LEN: usize = 8;
