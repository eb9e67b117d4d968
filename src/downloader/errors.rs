// Error types for the download workflow

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Terminal failure categories for a playlist run.
///
/// Per-entry fetch failures are not represented here; those are recovered by
/// the engine's skip policy and surfaced as warning events instead.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("No URL provided")]
    EmptyUrl,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("ffmpeg was not found; install it or place it in the application's ffmpeg/bin folder")]
    TranscoderMissing,

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Could not access playlist: {0}")]
    Probe(String),

    #[error("Could not read playlist metadata: {0}")]
    Parse(String),

    #[error("Could not create destination folder {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Download failed: {0}")]
    Fetch(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Unknown(String),
}

impl DownloadError {
    /// Process exit code for the CLI, one per failure category.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EmptyUrl | Self::InvalidUrl(_) => 2,
            Self::TranscoderMissing | Self::ToolNotFound(_) => 3,
            Self::Probe(_) | Self::Parse(_) => 4,
            Self::Destination { .. } => 5,
            Self::Fetch(_) => 6,
            Self::Cancelled => 130,
            Self::Unknown(_) => 1,
        }
    }

    /// Wrap raw engine output from a failed metadata probe.
    pub fn probe_failure(stderr: &str) -> Self {
        Self::Probe(summarize_engine_error(stderr))
    }

    /// Wrap raw engine output from a failed batch download.
    pub fn fetch_failure(stderr: &str) -> Self {
        Self::Fetch(summarize_engine_error(stderr))
    }
}

/// Condense engine stderr into a single readable reason.
///
/// Smart detection of the usual suspects first, then the engine's last
/// `ERROR:` line, then the last line of whatever was printed.
pub(crate) fn summarize_engine_error(stderr: &str) -> String {
    let lower = stderr.to_lowercase();

    if lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("sign in to confirm")
    {
        return "YouTube is throttling requests from this address; try again later".to_string();
    }
    if lower.contains("timed out") || lower.contains("timeout") {
        return "network timeout while contacting YouTube".to_string();
    }
    if lower.contains("private video") || lower.contains("private playlist") {
        return "this content is private".to_string();
    }
    if lower.contains("video unavailable")
        || lower.contains("playlist does not exist")
        || lower.contains("not available")
    {
        return "this content is unavailable or has been removed".to_string();
    }
    if lower.contains("unsupported url") || lower.contains("is not a valid url") {
        return "the engine does not recognize this URL".to_string();
    }
    if lower.contains("ffmpeg") && (lower.contains("not found") || lower.contains("not installed"))
    {
        return "ffmpeg is required for audio conversion but was not found".to_string();
    }

    let last_error_line = stderr
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with("ERROR:"));
    if let Some(line) = last_error_line {
        return line.trim_start().trim_start_matches("ERROR:").trim().to_string();
    }

    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "the engine reported no details".to_string();
    }
    trimmed.lines().last().unwrap_or(trimmed).trim().to_string()
}
