// Data models for the download workflow

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Folder title used when the metadata probe returns no playlist title.
pub const DEFAULT_PLAYLIST_TITLE: &str = "YouTube Playlist";

/// Severity of a single run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// One structured log line produced by a run.
///
/// Events travel over a FIFO channel and are drained by a single consumer in
/// the order they were emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    pub level: EventLevel,
    pub text: String,
}

impl RunEvent {
    pub fn new(level: EventLevel, text: impl Into<String>) -> Self {
        Self { level, text: text.into() }
    }
}

/// Lifecycle of one playlist run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Validating,
    ProbingMetadata,
    PreparingDestination,
    Fetching,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::ProbingMetadata => "probing metadata",
            Self::PreparingDestination => "preparing destination",
            Self::Fetching => "fetching",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// What the user asked for: one source URL, one destination root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistRequest {
    pub url: String,
    pub dest_root: PathBuf,
}

impl PlaylistRequest {
    pub fn new(url: impl Into<String>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest_root: dest_root.into(),
        }
    }
}

/// Result of the metadata probe.
///
/// `entry_count` is the length of the flat entry listing; a single-video URL
/// has no listing and reports 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistMetadata {
    pub title: Option<String>,
    pub entry_count: usize,
}

/// Options handed to the media engine for both probe and fetch calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Stream selector, best audio first.
    pub format: String,
    /// Target codec for audio extraction.
    pub audio_format: String,
    /// Target bitrate for the transcode.
    pub audio_quality: String,
    /// Keep going when individual entries fail.
    pub skip_errors: bool,
    /// Verify TLS certificates on media hosts.
    pub check_certificates: bool,
    /// Socket timeout in seconds passed through to the engine.
    pub socket_timeout: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            format: "bestaudio/best".to_string(),
            audio_format: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            skip_errors: true,
            check_certificates: false,
            socket_timeout: Some(30),
        }
    }
}

/// Behavioral profile of a run.
///
/// The command line uses the strict profile. The lenient profile matches the
/// desktop build: no URL gate, and a missing transcoder is a warning rather
/// than a hard stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPolicy {
    pub validate_url: bool,
    pub require_transcoder: bool,
}

impl RunPolicy {
    pub fn strict() -> Self {
        Self {
            validate_url: true,
            require_transcoder: true,
        }
    }

    pub fn lenient() -> Self {
        Self {
            validate_url: false,
            require_transcoder: false,
        }
    }
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

/// Terminal summary of a run that reached `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub playlist_title: String,
    pub dest_dir: PathBuf,
    pub entry_count: usize,
    pub produced_files: usize,
}

/// Default destination root: the platform downloads folder.
pub fn default_dest_root() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}
