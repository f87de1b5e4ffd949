//! Command-line application support: config file and progress display.

pub(crate) mod config;
pub(crate) mod progress_ui;
