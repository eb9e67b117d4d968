// Engine seam and event stream for the download workflow

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{EngineOptions, EventLevel, PlaylistMetadata, RunEvent};
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Abstraction over the external media engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &'static str;

    /// Metadata-only probe: playlist title and flat entry count.
    ///
    /// Must not download any media.
    async fn probe_playlist(
        &self,
        url: &str,
        options: &EngineOptions,
    ) -> Result<PlaylistMetadata, DownloadError>;

    /// Fetch every entry as MP3 into `dest_dir`.
    ///
    /// With `options.skip_errors` set, per-entry failures are reported as
    /// warnings through the sink and the batch continues; `Ok` means the
    /// batch ran to the end, not that every entry succeeded. The engine
    /// checks `cancel` and kills any in-flight subprocess when it trips.
    async fn fetch_playlist(
        &self,
        url: &str,
        dest_dir: &Path,
        options: &EngineOptions,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError>;
}

/// Sending half of a run's event channel.
///
/// Cloneable and non-blocking; events emitted after the consumer goes away
/// are dropped.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl EventSink {
    /// Create a sink together with its single consumer.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, level: EventLevel, text: impl Into<String>) {
        let _ = self.tx.send(RunEvent::new(level, text));
    }

    pub fn debug(&self, text: impl Into<String>) {
        self.emit(EventLevel::Debug, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.emit(EventLevel::Info, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.emit(EventLevel::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(EventLevel::Error, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_emit_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.info("first");
        sink.warning("second");
        sink.error("third");
        drop(sink);

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event.text);
        }
        assert_eq!(seen, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_emit_after_consumer_drop_is_ignored() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.info("nobody listening");
    }
}
