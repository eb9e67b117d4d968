// yt-dlp subprocess engine

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio_util::sync::CancellationToken;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{EngineOptions, PlaylistMetadata};
use crate::downloader::tools::{ToolManager, ToolType};
use crate::downloader::traits::{EventSink, MediaEngine};
use crate::downloader::utils::run_output_with_timeout;

/// How long a metadata probe may run before it is killed.
const PROBE_TIMEOUT_SECS: u64 = 120;

lazy_static! {
    static ref PROGRESS_RE: Regex = Regex::new(
        r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*\s*\w+)(?:\s+at\s+(\d+\.?\d*\s*\w+/s))?(?:\s+ETA\s+(\S+))?"
    )
    .unwrap();
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
    static ref ITEM_RE: Regex =
        Regex::new(r"\[download\]\s+Downloading item (\d+) of (\d+)").unwrap();
    static ref EXTRACT_RE: Regex = Regex::new(r"\[ExtractAudio\]\s+Destination:\s+(.+)").unwrap();
}

pub struct YtDlpEngine {
    bin: String,
}

impl YtDlpEngine {
    /// Resolve the engine binary through tool discovery.
    pub fn detect() -> Result<Self, DownloadError> {
        let info = ToolManager::new().get_tool_info(ToolType::YtDlp);
        match info.path {
            Some(bin) => {
                tracing::debug!(bin = %bin, version = ?info.version, "resolved yt-dlp");
                Ok(Self { bin })
            }
            None => Err(DownloadError::ToolNotFound(
                "yt-dlp (install it with your package manager)".to_string(),
            )),
        }
    }

    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn probe_playlist(
        &self,
        url: &str,
        options: &EngineOptions,
    ) -> Result<PlaylistMetadata, DownloadError> {
        let args = build_probe_args(url, options);
        tracing::debug!(bin = %self.bin, ?args, "probing playlist metadata");

        let output = run_output_with_timeout(&self.bin, &args, PROBE_TIMEOUT_SECS)
            .await
            .map_err(DownloadError::Probe)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::probe_failure(&stderr));
        }

        parse_playlist_metadata(&output.stdout)
    }

    async fn fetch_playlist(
        &self,
        url: &str,
        dest_dir: &Path,
        options: &EngineOptions,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let args = build_fetch_args(url, dest_dir, options);
        tracing::debug!(bin = %self.bin, ?args, "starting batch download");

        let mut child = TokioCommand::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DownloadError::ToolNotFound(format!("{}: {}", self.bin, e)))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            DownloadError::Unknown("could not capture engine stdout".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            DownloadError::Unknown("could not capture engine stderr".to_string())
        })?;

        // Collect stderr on the side; error lines are forwarded as they come.
        let stderr_sink = sink.clone();
        let stderr_task = tokio::spawn(async move {
            let mut collected = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                forward_stderr_line(&line, &stderr_sink);
                collected.push(line);
            }
            collected.join("\n")
        });

        // Stream stdout for progress until the engine closes it.
        let mut saw_activity = false;
        let mut stdout_lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                next = stdout_lines.next_line() => {
                    match next {
                        Ok(Some(line)) => {
                            if line.starts_with("[download]") {
                                saw_activity = true;
                            }
                            forward_stdout_line(&line, sink);
                        }
                        _ => break,
                    }
                }
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(DownloadError::Cancelled);
                }
            }
        }

        let status = tokio::select! {
            res = child.wait() => {
                res.map_err(|e| DownloadError::Unknown(format!("engine exited abnormally: {}", e)))?
            }
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(DownloadError::Cancelled);
            }
        };
        let stderr_output = stderr_task.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }

        // With --ignore-errors the engine exits non-zero when any entry
        // failed even though the batch itself ran to the end. Activity on
        // stdout tells the two cases apart.
        if options.skip_errors && saw_activity {
            sink.warning("Some tracks could not be downloaded");
            return Ok(());
        }

        Err(DownloadError::fetch_failure(&stderr_output))
    }
}

fn build_probe_args(url: &str, options: &EngineOptions) -> Vec<String> {
    let mut args = vec![
        "--flat-playlist".to_string(),
        "--dump-single-json".to_string(),
        "--no-warnings".to_string(),
    ];
    if !options.check_certificates {
        args.push("--no-check-certificates".to_string());
    }
    if let Some(secs) = options.socket_timeout {
        args.push("--socket-timeout".to_string());
        args.push(secs.to_string());
    }
    args.push(url.to_string());
    args
}

fn build_fetch_args(url: &str, dest_dir: &Path, options: &EngineOptions) -> Vec<String> {
    let template = dest_dir.join("%(playlist_index)s - %(title)s.%(ext)s");
    let mut args = vec![
        "-f".to_string(),
        options.format.clone(),
        "-x".to_string(),
        "--audio-format".to_string(),
        options.audio_format.clone(),
        "--audio-quality".to_string(),
        options.audio_quality.clone(),
        "--newline".to_string(),
        "--no-warnings".to_string(),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
    ];
    if options.skip_errors {
        args.push("--ignore-errors".to_string());
    }
    if !options.check_certificates {
        args.push("--no-check-certificates".to_string());
    }
    if let Some(secs) = options.socket_timeout {
        args.push("--socket-timeout".to_string());
        args.push(secs.to_string());
    }
    args.push(url.to_string());
    args
}

fn parse_playlist_metadata(stdout: &[u8]) -> Result<PlaylistMetadata, DownloadError> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| DownloadError::Parse(format!("unreadable probe output: {}", e)))?;

    let title = json["title"].as_str().map(|s| s.to_string());
    // A single video has no entry listing at all
    let entry_count = json["entries"]
        .as_array()
        .map(|entries| entries.len())
        .unwrap_or(0);

    Ok(PlaylistMetadata { title, entry_count })
}

/// Route one engine stdout line to the event stream.
///
/// Track starts and conversions are worth showing; byte-level progress is
/// noise and stays at debug level.
fn forward_stdout_line(line: &str, sink: &EventSink) {
    if let Some(caps) = ITEM_RE.captures(line) {
        let current = caps.get(1).map(|m| m.as_str()).unwrap_or("?");
        let total = caps.get(2).map(|m| m.as_str()).unwrap_or("?");
        sink.info(format!("Track {} of {}", current, total));
        return;
    }
    if let Some(caps) = DEST_RE.captures(line) {
        let path = caps.get(1).map(|m| m.as_str()).unwrap_or("file");
        sink.info(format!("Downloading: {}", short_name(path)));
        return;
    }
    if let Some(caps) = EXTRACT_RE.captures(line) {
        let path = caps.get(1).map(|m| m.as_str()).unwrap_or("file");
        sink.info(format!("Converting to MP3: {}", short_name(path)));
        return;
    }
    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent = caps.get(1).map(|m| m.as_str()).unwrap_or("?");
        let size = caps.get(2).map(|m| m.as_str()).unwrap_or("?");
        let speed = caps.get(3).map(|m| m.as_str());
        let eta = caps.get(4).map(|m| m.as_str());
        let mut status = format!("{}% of {}", percent, size);
        if let Some(speed) = speed {
            status.push_str(&format!(" at {}", speed));
        }
        if let Some(eta) = eta {
            status.push_str(&format!(" ETA {}", eta));
        }
        sink.debug(status);
        return;
    }
    sink.debug(line.to_string());
}

/// Route one engine stderr line to the event stream.
///
/// Entry failures under skip-on-error arrive here as `ERROR:` lines; they
/// are forwarded verbatim so the user sees which tracks were skipped.
fn forward_stderr_line(line: &str, sink: &EventSink) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }
    if trimmed.starts_with("ERROR:") || trimmed.starts_with("WARNING:") {
        sink.warning(trimmed.to_string());
    } else {
        sink.debug(trimmed.to_string());
    }
}

fn short_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::EventLevel;
    use std::path::PathBuf;

    #[test]
    fn test_probe_args_are_metadata_only() {
        let options = EngineOptions::default();
        let args = build_probe_args("https://youtube.com/playlist?list=PL1", &options);
        assert!(args.contains(&"--flat-playlist".to_string()));
        assert!(args.contains(&"--dump-single-json".to_string()));
        assert!(args.contains(&"--no-check-certificates".to_string()));
        assert!(!args.iter().any(|a| a == "-x"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://youtube.com/playlist?list=PL1")
        );
    }

    #[test]
    fn test_fetch_args_request_mp3_at_192k() {
        let options = EngineOptions::default();
        let dest = PathBuf::from("/tmp/My Mix");
        let args = build_fetch_args("https://youtube.com/playlist?list=PL1", &dest, &options);
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "bestaudio/best"));
        assert!(args.windows(2).any(|w| w[0] == "--audio-format" && w[1] == "mp3"));
        assert!(args.windows(2).any(|w| w[0] == "--audio-quality" && w[1] == "192K"));
        assert!(args.contains(&"--ignore-errors".to_string()));

        let template = args
            .windows(2)
            .find(|w| w[0] == "-o")
            .map(|w| w[1].clone())
            .unwrap_or_default();
        assert!(template.starts_with("/tmp/My Mix"));
        assert!(template.ends_with("%(playlist_index)s - %(title)s.%(ext)s"));
    }

    #[test]
    fn test_fetch_args_respect_option_toggles() {
        let options = EngineOptions {
            skip_errors: false,
            check_certificates: true,
            socket_timeout: None,
            ..Default::default()
        };
        let args = build_fetch_args("u", Path::new("/tmp/x"), &options);
        assert!(!args.contains(&"--ignore-errors".to_string()));
        assert!(!args.contains(&"--no-check-certificates".to_string()));
        assert!(!args.contains(&"--socket-timeout".to_string()));
    }

    #[test]
    fn test_parse_metadata_with_title_and_entries() {
        let json = r#"{"title": "Road Trip", "entries": [{"id": "a"}, {"id": "b"}, {"id": "c"}]}"#;
        let meta = parse_playlist_metadata(json.as_bytes()).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Road Trip"));
        assert_eq!(meta.entry_count, 3);
    }

    #[test]
    fn test_parse_metadata_single_video_has_no_entries() {
        let json = r#"{"title": "One Song", "id": "abc123"}"#;
        let meta = parse_playlist_metadata(json.as_bytes()).unwrap();
        assert_eq!(meta.title.as_deref(), Some("One Song"));
        assert_eq!(meta.entry_count, 0);
    }

    #[test]
    fn test_parse_metadata_without_title() {
        let meta = parse_playlist_metadata(br#"{"entries": []}"#).unwrap();
        assert!(meta.title.is_none());
        assert_eq!(meta.entry_count, 0);
    }

    #[test]
    fn test_parse_metadata_rejects_garbage() {
        assert!(parse_playlist_metadata(b"not json").is_err());
    }

    #[test]
    fn test_destination_lines_are_promoted_to_info() {
        let (sink, mut rx) = EventSink::channel();
        forward_stdout_line("[download] Destination: /tmp/Mix/1 - Song.webm", &sink);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.level, EventLevel::Info);
        assert!(event.text.contains("1 - Song.webm"));
        assert!(!event.text.contains("/tmp"));
    }

    #[test]
    fn test_progress_lines_are_demoted_to_debug() {
        let (sink, mut rx) = EventSink::channel();
        forward_stdout_line(
            "[download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59",
            &sink,
        );
        let event = rx.try_recv().unwrap();
        assert_eq!(event.level, EventLevel::Debug);
        assert!(event.text.contains("12.5%"));
    }

    #[test]
    fn test_item_lines_become_track_announcements() {
        let (sink, mut rx) = EventSink::channel();
        forward_stdout_line("[download] Downloading item 3 of 12", &sink);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.level, EventLevel::Info);
        assert_eq!(event.text, "Track 3 of 12");
    }

    #[test]
    fn test_error_lines_are_forwarded_verbatim_as_warnings() {
        let (sink, mut rx) = EventSink::channel();
        forward_stderr_line("ERROR: [youtube] abc: Video unavailable", &sink);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.level, EventLevel::Warning);
        assert_eq!(event.text, "ERROR: [youtube] abc: Video unavailable");
    }

    #[test]
    fn test_blank_stderr_lines_are_dropped() {
        let (sink, mut rx) = EventSink::channel();
        forward_stderr_line("   ", &sink);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fetch_with_missing_binary_is_a_tool_error() {
        let engine = YtDlpEngine::with_binary("/nonexistent/yt-dlp");
        let (sink, _rx) = EventSink::channel();
        let err = engine
            .fetch_playlist(
                "https://youtube.com/playlist?list=PL1",
                Path::new("/tmp"),
                &EngineOptions::default(),
                &sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
