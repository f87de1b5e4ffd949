//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use media_downloader::MediaKind;

/// Download video and audio streams with resumable range requests.
///
/// Each URL runs as its own session: parts are fetched in order with
/// `Range: bytes=<offset>-` until the whole resource has arrived.
#[derive(Parser, Debug)]
#[command(name = "media-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Media URLs to download (reads stdin, one per line, when omitted)
    pub urls: Vec<String>,

    /// Media family to accept; `auto` picks per URL
    #[arg(short, long, value_enum, default_value_t = KindArg::Auto)]
    pub kind: KindArg,

    /// Directory for saved files (default: config value or current directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Buffer every download in memory instead of streaming to disk
    #[arg(long)]
    pub no_save_as: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// HTTP connect timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Overall per-request timeout in seconds (1-3600); unlimited by default
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,
}

/// `--kind` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Decide per URL.
    Auto,
    /// Accept `video/*` only.
    Video,
    /// Accept `audio/*` only.
    Audio,
}

impl KindArg {
    /// Resolves the engine kind for `url`.
    #[must_use]
    pub fn resolve(self, url: &str) -> MediaKind {
        match self {
            Self::Auto => MediaKind::detect(url),
            Self::Video => MediaKind::Video,
            Self::Audio => MediaKind::Audio,
        }
    }
}
