// Downloader module - the playlist-to-MP3 workflow

pub mod errors;
pub mod models;
pub mod traits;
pub mod tools;
pub mod backends;
pub mod orchestrator;
pub mod utils;

pub use backends::YtDlpEngine;
pub use errors::DownloadError;
pub use models::{
    default_dest_root, EngineOptions, EventLevel, PlaylistMetadata, PlaylistRequest, RunEvent,
    RunOutcome, RunPolicy, RunState, DEFAULT_PLAYLIST_TITLE,
};
pub use orchestrator::{Downloader, RunHandle};
pub use tools::{ToolInfo, ToolManager, ToolType};
pub use traits::{EventSink, MediaEngine};
pub use utils::{is_youtube_url, sanitize_filename};
