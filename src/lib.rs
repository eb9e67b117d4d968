// mixtape - playlist-to-MP3 download orchestration on top of yt-dlp and ffmpeg

pub mod downloader;

pub use downloader::{
    default_dest_root, is_youtube_url, sanitize_filename, DownloadError, Downloader,
    EngineOptions, EventLevel, EventSink, MediaEngine, PlaylistMetadata, PlaylistRequest,
    RunEvent, RunHandle, RunOutcome, RunPolicy, RunState, YtDlpEngine, DEFAULT_PLAYLIST_TITLE,
};
