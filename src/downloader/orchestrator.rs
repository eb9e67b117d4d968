// Download orchestrator - drives one playlist request through its lifecycle

use std::path::Path;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::errors::DownloadError;
use super::models::{
    EngineOptions, PlaylistRequest, RunEvent, RunOutcome, RunPolicy, RunState,
    DEFAULT_PLAYLIST_TITLE,
};
use super::tools::{ToolInfo, ToolManager};
use super::traits::{EventSink, MediaEngine};
use super::utils::{is_youtube_url, sanitize_filename};

/// Sequences one playlist run: validate, probe, prepare the destination,
/// fetch, report. All engine work happens behind the [`MediaEngine`] seam.
pub struct Downloader {
    engine: Box<dyn MediaEngine>,
    policy: RunPolicy,
    options: EngineOptions,
    transcoder: ToolInfo,
}

impl Downloader {
    /// Build a downloader around an engine. Detects the transcoder and, when
    /// it lives in the shipped directory, makes it visible to engine
    /// subprocesses via `PATH`.
    pub fn new(engine: Box<dyn MediaEngine>) -> Self {
        let transcoder = ToolManager::new().ensure_transcoder();
        Self {
            engine,
            policy: RunPolicy::default(),
            options: EngineOptions::default(),
            transcoder,
        }
    }

    pub fn with_policy(mut self, policy: RunPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_transcoder(mut self, transcoder: ToolInfo) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// Run the request to completion, reporting progress through the sink.
    ///
    /// Terminal failures are also pushed onto the event stream before this
    /// returns, so a consumer that only watches events still sees them.
    pub async fn run(
        &self,
        request: &PlaylistRequest,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, DownloadError> {
        match self.drive(request, sink, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                set_state(sink, RunState::Failed);
                sink.error(e.to_string());
                Err(e)
            }
        }
    }

    /// Start the run on a background task and hand back its controls.
    pub fn spawn(self, request: PlaylistRequest) -> RunHandle {
        let (sink, events) = EventSink::channel();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { self.run(&request, &sink, &task_cancel).await });
        RunHandle {
            events,
            cancel,
            task,
        }
    }

    async fn drive(
        &self,
        request: &PlaylistRequest,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, DownloadError> {
        set_state(sink, RunState::Validating);

        let url = request.url.trim();
        if url.is_empty() {
            return Err(DownloadError::EmptyUrl);
        }
        if self.policy.validate_url && !is_youtube_url(url) {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }
        if !self.transcoder.is_available {
            if self.policy.require_transcoder {
                return Err(DownloadError::TranscoderMissing);
            }
            sink.warning("ffmpeg was not found; conversion to MP3 may fail");
        }
        sink.info(format!("Processing {}", url));

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        set_state(sink, RunState::ProbingMetadata);
        sink.info("Looking up playlist...");
        let metadata = self.engine.probe_playlist(url, &self.options).await?;

        let title = metadata
            .title
            .unwrap_or_else(|| DEFAULT_PLAYLIST_TITLE.to_string());
        sink.info(format!("Playlist: {} ({} tracks)", title, metadata.entry_count));

        set_state(sink, RunState::PreparingDestination);
        // A title of nothing but reserved characters still gets its own folder
        let mut folder_name = sanitize_filename(&title);
        if folder_name.is_empty() {
            folder_name = DEFAULT_PLAYLIST_TITLE.to_string();
        }
        let dest_dir = request.dest_root.join(folder_name);
        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|source| DownloadError::Destination {
                path: dest_dir.clone(),
                source,
            })?;
        sink.info(format!("Saving to {}", dest_dir.display()));

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        set_state(sink, RunState::Fetching);
        self.engine
            .fetch_playlist(url, &dest_dir, &self.options, sink, cancel)
            .await?;

        // The batch returning is what counts as done; a shortfall in the
        // produced files is reported but does not fail the run.
        let produced_files = count_mp3_files(&dest_dir).await;
        if metadata.entry_count > 0 && produced_files < metadata.entry_count {
            sink.warning(format!(
                "Expected {} tracks but found {} MP3 files",
                metadata.entry_count, produced_files
            ));
        }

        set_state(sink, RunState::Completed);
        sink.info("Download finished");

        Ok(RunOutcome {
            playlist_title: title,
            dest_dir,
            entry_count: metadata.entry_count,
            produced_files,
        })
    }
}

/// A spawned run: its event stream, cancellation switch, and final outcome.
pub struct RunHandle {
    events: UnboundedReceiver<RunEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Result<RunOutcome, DownloadError>>,
}

impl RunHandle {
    /// Next event, or `None` once the run is over and the stream is drained.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Ask the run to stop at its next cancellation point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token observers can use to cancel from another task.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunOutcome, DownloadError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(DownloadError::Unknown(format!("run task failed: {}", e))),
        }
    }
}

fn set_state(sink: &EventSink, state: RunState) {
    tracing::debug!(%state, "state change");
    sink.debug(format!("state: {}", state));
}

async fn count_mp3_files(dir: &Path) -> usize {
    let mut count = 0;
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_mp3 = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("mp3"))
                .unwrap_or(false);
            if is_mp3 {
                count += 1;
            }
        }
    }
    count
}
