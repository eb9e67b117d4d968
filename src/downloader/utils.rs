// Helper functions shared across the downloader module

use lazy_static::lazy_static;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};

lazy_static! {
    static ref RESERVED_CHARS_RE: Regex = Regex::new(r#"[\\/*?:"<>|]"#).unwrap();
    static ref YOUTUBE_HOST_RE: Regex = Regex::new(
        r"(?i)^(?:https?://)?(?:[a-z0-9-]+\.)*(?:youtube\.com|youtu\.be)(?:[/?#]|$)"
    )
    .unwrap();
}

/// Strip characters that are not legal in file or directory names.
///
/// Removes `\ / * ? : " < > |` and keeps everything else (whitespace,
/// Unicode, emoji) in its original order. Idempotent, never truncates.
pub fn sanitize_filename(name: &str) -> String {
    RESERVED_CHARS_RE.replace_all(name, "").into_owned()
}

/// Check whether a string looks like a YouTube playlist/video URL.
///
/// Hostname-based: `youtube.com` or `youtu.be` under any subdomain (`www.`,
/// `m.`, `music.`), case-insensitive, scheme optional. No network access.
pub fn is_youtube_url(url: &str) -> bool {
    YOUTUBE_HOST_RE.is_match(url)
}

/// Run a command to completion with a timeout (shared utility)
pub async fn run_output_with_timeout(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, String> {
    let child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program, e))?;

    match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(output) => output.map_err(|e| format!("Failed to wait for {}: {}", program, e)),
        Err(_) => Err(format!("{} timed out after {}s", program, timeout_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_reserved_chars() {
        assert_eq!(sanitize_filename(r#"a\b/c*d?e:f"g<h>i|j"#), "abcdefghij");
        assert_eq!(sanitize_filename("AC/DC: Greatest*Hits?"), "ACDC GreatestHits");
    }

    #[test]
    fn test_sanitize_preserves_everything_else() {
        assert_eq!(
            sanitize_filename("Café del Mar: Vol. 1 🎵"),
            "Café del Mar Vol. 1 🎵"
        );
        assert_eq!(sanitize_filename("  spaced  out  "), "  spaced  out  ");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [r#"Mix: "Best of" <2024> |live|"#, "plain title", ""];
        for input in inputs {
            let once = sanitize_filename(input);
            assert_eq!(sanitize_filename(&once), once);
        }
    }

    #[test]
    fn test_sanitize_empty_string() {
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename(r#"\/*?:"<>|"#), "");
    }

    #[test]
    fn test_url_accepts_playlist_and_short_links() {
        assert!(is_youtube_url("https://www.youtube.com/playlist?list=PL1"));
        assert!(is_youtube_url("https://youtu.be/abc123"));
        assert!(is_youtube_url("youtube.com/watch?v=abc"));
        assert!(is_youtube_url("HTTPS://WWW.YOUTUBE.COM/playlist?list=PL1"));
    }

    #[test]
    fn test_url_accepts_mobile_and_music_hosts() {
        assert!(is_youtube_url("https://m.youtube.com/playlist?list=PL1"));
        assert!(is_youtube_url("https://music.youtube.com/watch?v=abc"));
        assert!(is_youtube_url("m.youtube.com/watch?v=abc"));
    }

    #[test]
    fn test_url_rejects_other_input() {
        assert!(!is_youtube_url("not a url"));
        assert!(!is_youtube_url(""));
        assert!(!is_youtube_url("https://vimeo.com/12345"));
        assert!(!is_youtube_url("https://notyoutube.com/watch?v=abc"));
        assert!(!is_youtube_url("https://example.com/youtube.com"));
        assert!(!is_youtube_url("https://youtube.com.evil.com/watch?v=abc"));
    }
}
