use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn binary_name(&self) -> &'static str {
        if cfg!(windows) {
            match self {
                ToolType::YtDlp => "yt-dlp.exe",
                ToolType::Ffmpeg => "ffmpeg.exe",
            }
        } else {
            self.as_str()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// Locates the external binaries the workflow depends on.
pub struct ToolManager {
    /// Directory shipped next to the executable that may hold a transcoder.
    local_dir: Option<PathBuf>,
}

impl ToolManager {
    pub fn new() -> Self {
        let local_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("ffmpeg").join("bin")));
        Self { local_dir }
    }

    pub fn with_local_dir(local_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: Some(local_dir.into()),
        }
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let name = tool_type.as_str().to_string();
        let (path, version) = self.detect_tool(&tool_type);

        ToolInfo {
            name,
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    /// Detect the transcoder and, when it was found in the shipped
    /// directory, prepend that directory to `PATH` so engine subprocesses
    /// can resolve it too.
    pub fn ensure_transcoder(&self) -> ToolInfo {
        let info = self.get_tool_info(ToolType::Ffmpeg);
        if let (Some(path), Some(dir)) = (&info.path, &self.local_dir) {
            if Path::new(path).starts_with(dir) {
                tracing::debug!(dir = %dir.display(), "adding shipped ffmpeg directory to PATH");
                prepend_to_path(dir);
            }
        }
        info
    }

    fn detect_tool(&self, tool_type: &ToolType) -> (Option<String>, Option<String>) {
        // 1. The shipped directory, then known install locations
        for candidate in self.candidate_paths(tool_type) {
            if candidate.exists() {
                let path = candidate.to_string_lossy().into_owned();
                let version = self.get_version(&path);
                return (Some(path), version);
            }
        }

        // 2. Whatever PATH resolves
        let finder = if cfg!(windows) { "where" } else { "which" };
        if let Ok(output) = Command::new(finder).arg(tool_type.binary_name()).output() {
            if output.status.success() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if let Some(path) = stdout.lines().next().map(|line| line.trim().to_string()) {
                    if !path.is_empty() {
                        let version = self.get_version(&path);
                        return (Some(path), version);
                    }
                }
            }
        }

        (None, None)
    }

    fn candidate_paths(&self, tool_type: &ToolType) -> Vec<PathBuf> {
        let binary_name = tool_type.binary_name();
        let mut candidates = Vec::new();
        // Only the transcoder is ever shipped alongside the app; a shipped
        // copy takes precedence over system installs.
        if *tool_type == ToolType::Ffmpeg {
            if let Some(dir) = &self.local_dir {
                candidates.push(dir.join(binary_name));
            }
        }
        candidates.push(PathBuf::from("/opt/homebrew/bin").join(binary_name));
        candidates.push(PathBuf::from("/usr/local/bin").join(binary_name));
        candidates.push(PathBuf::from("/usr/bin").join(binary_name));
        candidates
    }

    fn get_version(&self, path: &str) -> Option<String> {
        match Command::new(path).arg("--version").output() {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                stdout.lines().next().map(|line| line.trim().to_string())
            }
            _ => None,
        }
    }
}

fn prepend_to_path(dir: &Path) {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let mut parts = vec![dir.to_path_buf()];
    parts.extend(std::env::split_paths(&current));
    if let Ok(joined) = std::env::join_paths(parts) {
        std::env::set_var("PATH", joined);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_transcoder_wins_detection() {
        let tmp = tempfile::tempdir().unwrap();
        let shipped = tmp.path().join(ToolType::Ffmpeg.binary_name());
        std::fs::write(&shipped, b"").unwrap();

        let manager = ToolManager::with_local_dir(tmp.path());
        let info = manager.get_tool_info(ToolType::Ffmpeg);

        assert!(info.is_available);
        let path = info.path.unwrap();
        assert!(Path::new(&path).starts_with(tmp.path()));
    }

    #[test]
    fn test_local_dir_is_never_searched_for_the_engine() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(ToolType::YtDlp.binary_name()), b"").unwrap();

        let manager = ToolManager::with_local_dir(tmp.path());
        let info = manager.get_tool_info(ToolType::YtDlp);

        // The engine may still resolve from the system, but never from here
        assert!(info
            .path
            .map_or(true, |p| !Path::new(&p).starts_with(tmp.path())));
    }
}
