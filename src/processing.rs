use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chapters::{build_segments, parse_timestamps};
use crate::config::Config;
use crate::download::{normalize_video_input, AcquireRequest, Downloader, YtDlpDownloader};
use crate::error::{FailureKind, Result, SplitError};
use crate::state::{RunState, RunStateMachine, StateTransition};
use crate::transcode::{ClipJob, FfmpegTranscoder, Transcoder};

/// Name of the JSON summary written next to the clips
pub const REPORT_FILE_NAME: &str = "split_report.json";

const SUCCESS_MESSAGE: &str = "Video download and trimming completed.";

/// Input for one run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Video URL or id
    pub video: String,
    /// Cookie file for yt-dlp; required
    pub cookies_file: Option<PathBuf>,
}

/// Messages sent from the run task to the front end
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The run entered a new state
    State(RunState),
    /// Percentage within the current stage
    Progress(f64),
    /// A clip was written
    ClipCreated {
        index: usize,
        total: usize,
        path: PathBuf,
    },
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub video: String,
    pub final_state: RunState,
    pub history: Vec<StateTransition>,
    pub output_dir: Option<PathBuf>,
    pub clips: Vec<PathBuf>,
    pub failure: Option<FailureKind>,
    /// Human-readable outcome
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == RunState::Done
    }

    /// Report for a run whose task never returned one
    fn interrupted(video: String, started_at: DateTime<Utc>, error: SplitError) -> Self {
        let now = Utc::now();
        Self {
            video,
            final_state: RunState::Failed,
            history: vec![StateTransition {
                state: RunState::Failed,
                at: now,
            }],
            output_dir: None,
            clips: Vec::new(),
            failure: Some(error.kind()),
            message: error.user_message(),
            started_at,
            finished_at: now,
        }
    }

    /// Write the report as `split_report.json` into `dir`
    pub async fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(REPORT_FILE_NAME);
        let json_data = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json_data).await?;
        debug!("💾 Run report saved to: {}", path.display());
        Ok(path)
    }
}

/// Downloads a video and cuts it into one clip per chapter.
///
/// Runs execute on a background task; at most one run per splitter is active.
pub struct ChapterSplitter {
    downloader: Arc<dyn Downloader>,
    transcoder: Arc<dyn Transcoder>,
    save_report: bool,
    active: Arc<AtomicBool>,
}

impl ChapterSplitter {
    pub fn new(downloader: Arc<dyn Downloader>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            downloader,
            transcoder,
            save_report: true,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Splitter using yt-dlp and ffmpeg as configured
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(YtDlpDownloader::from_config(config)),
            Arc::new(FfmpegTranscoder::from_config(config)),
        )
        .with_report(config.output.save_report)
    }

    pub fn with_report(mut self, save_report: bool) -> Self {
        self.save_report = save_report;
        self
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a run on a background task.
    ///
    /// Fails with `RunInProgress` while another run from this splitter is active.
    pub fn start(&self, request: RunRequest) -> Result<RunHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SplitError::RunInProgress);
        }
        let guard = ActiveRun(Arc::clone(&self.active));

        let (tx, rx) = mpsc::unbounded_channel();
        let context = self.clone_run_context();
        let video = request.video.clone();
        let started_at = Utc::now();
        let cancel = Arc::new(Notify::new());
        let cancelled = Arc::clone(&cancel);

        let task = tokio::spawn(async move {
            let _guard = guard;
            context.execute(request, tx, cancelled).await
        });

        Ok(RunHandle {
            video,
            started_at,
            events: rx,
            cancel,
            task,
        })
    }

    fn clone_run_context(&self) -> RunContext {
        RunContext {
            downloader: Arc::clone(&self.downloader),
            transcoder: Arc::clone(&self.transcoder),
            save_report: self.save_report,
        }
    }
}

/// Clears the active flag when a run task ends or is dropped
struct ActiveRun(Arc<AtomicBool>);

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running split
pub struct RunHandle {
    video: String,
    started_at: DateTime<Utc>,
    events: mpsc::UnboundedReceiver<RunEvent>,
    cancel: Arc<Notify>,
    task: JoinHandle<RunReport>,
}

impl RunHandle {
    /// Next event, or `None` once the run has finished
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Detached handle that can cancel this run
    pub fn canceller(&self) -> RunCanceller {
        RunCanceller(Arc::clone(&self.cancel))
    }

    pub fn cancel(&self) {
        self.cancel.notify_one();
    }

    /// Wait for the run to finish
    pub async fn wait(self) -> RunReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) if e.is_cancelled() => {
                RunReport::interrupted(self.video, self.started_at, SplitError::Cancelled)
            }
            Err(e) => RunReport::interrupted(
                self.video,
                self.started_at,
                SplitError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("run task failed: {}", e),
                )),
            ),
        }
    }
}

/// Cancels a run; any running child process is killed.
///
/// The run still produces its report, listing the clips written so far.
#[derive(Debug, Clone)]
pub struct RunCanceller(Arc<Notify>);

impl RunCanceller {
    pub fn cancel(&self) {
        self.0.notify_one();
    }
}

/// State owned by one run task
#[derive(Clone)]
struct RunContext {
    downloader: Arc<dyn Downloader>,
    transcoder: Arc<dyn Transcoder>,
    save_report: bool,
}

/// What a run has produced so far
#[derive(Default)]
struct RunOutputs {
    output_dir: Option<PathBuf>,
    clips: Vec<PathBuf>,
}

impl RunContext {
    async fn execute(
        self,
        request: RunRequest,
        events: mpsc::UnboundedSender<RunEvent>,
        cancel: Arc<Notify>,
    ) -> RunReport {
        let started_at = Utc::now();
        let mut machine = RunStateMachine::new();
        let mut outputs = RunOutputs::default();

        info!("🚀 Starting run for {}", request.video);

        // Dropping the drive future kills any child process it is waiting on
        let outcome = tokio::select! {
            result = self.drive(&request, &mut machine, &mut outputs, &events) => result,
            _ = cancel.notified() => {
                warn!("🛑 Run cancelled: {}", request.video);
                Err(SplitError::Cancelled)
            }
        };

        let (failure, message) = match outcome {
            Ok(()) => {
                info!("🎉 Created {} clips", outputs.clips.len());
                (None, SUCCESS_MESSAGE.to_string())
            }
            Err(e) => {
                if machine.fail() {
                    let _ = events.send(RunEvent::State(RunState::Failed));
                }
                if matches!(e, SplitError::NoChapters) {
                    warn!("⚠️ No chapters found for {}", request.video);
                } else {
                    warn!("❌ Run failed for {}: {}", request.video, e);
                }
                (Some(e.kind()), e.user_message())
            }
        };

        let report = RunReport {
            video: request.video,
            final_state: machine.current(),
            history: machine.history().to_vec(),
            output_dir: outputs.output_dir,
            clips: outputs.clips,
            failure,
            message,
            started_at,
            finished_at: Utc::now(),
        };

        if self.save_report {
            if let Some(ref dir) = report.output_dir {
                if let Err(e) = report.save(dir).await {
                    warn!("Failed to save run report: {}", e);
                }
            }
        }

        report
    }

    async fn drive(
        &self,
        request: &RunRequest,
        machine: &mut RunStateMachine,
        outputs: &mut RunOutputs,
        events: &mpsc::UnboundedSender<RunEvent>,
    ) -> Result<()> {
        let cookies_file = request
            .cookies_file
            .clone()
            .ok_or(SplitError::MissingCredential)?;
        // yt-dlp runs inside the output base directory, so relative paths must not reach it
        let cookies_file = match tokio::fs::canonicalize(&cookies_file).await {
            Ok(path) => path,
            Err(_) => return Err(SplitError::CredentialNotFound(cookies_file)),
        };
        let url = normalize_video_input(&request.video)?;

        // Stage 1: download
        enter(machine, RunState::Acquiring, events)?;
        let _ = events.send(RunEvent::Progress(0.0));
        let progress_events = events.clone();
        let on_progress = move |percent: f64| {
            let _ = progress_events.send(RunEvent::Progress(percent));
        };
        let acquisition = self
            .downloader
            .acquire(&AcquireRequest { url, cookies_file }, &on_progress)
            .await?;
        outputs.output_dir = Some(acquisition.output_dir.clone());

        // Stage 2: chapters
        enter(machine, RunState::Parsing, events)?;
        let entries = parse_timestamps(&acquisition.description);
        if entries.is_empty() {
            return Err(SplitError::NoChapters);
        }
        let segments = build_segments(&entries)?;
        info!("📑 Found {} chapters in {}", segments.len(), acquisition.title);

        // Stage 3: clips, strictly in chapter order
        enter(machine, RunState::Trimming, events)?;
        let _ = events.send(RunEvent::Progress(0.0));
        let total = segments.len();
        for (index, segment) in segments.iter().enumerate() {
            let job = ClipJob {
                input: acquisition.media_path.clone(),
                start_seconds: segment.start_seconds,
                end_seconds: segment.end_seconds,
                output: acquisition.output_dir.join(&segment.output_filename),
            };

            debug!("✂️ Clip {}/{}: {}", index + 1, total, segment.label);
            self.transcoder.trim(&job).await?;

            outputs.clips.push(job.output.clone());
            let _ = events.send(RunEvent::ClipCreated {
                index: index + 1,
                total,
                path: job.output,
            });
            let _ = events.send(RunEvent::Progress((index + 1) as f64 / total as f64 * 100.0));
        }

        enter(machine, RunState::Done, events)?;
        Ok(())
    }
}

fn enter(
    machine: &mut RunStateMachine,
    state: RunState,
    events: &mpsc::UnboundedSender<RunEvent>,
) -> Result<()> {
    machine.transition(state)?;
    let _ = events.send(RunEvent::State(state));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{Acquisition, ProgressFn};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NoopDownloader;

    #[async_trait]
    impl Downloader for NoopDownloader {
        async fn acquire(&self, _: &AcquireRequest, _: &ProgressFn) -> Result<Acquisition> {
            Err(SplitError::Acquisition("offline".to_string()))
        }
    }

    struct NoopTranscoder;

    #[async_trait]
    impl Transcoder for NoopTranscoder {
        async fn trim(&self, _: &ClipJob) -> Result<()> {
            Ok(())
        }
    }

    fn splitter() -> ChapterSplitter {
        ChapterSplitter::new(Arc::new(NoopDownloader), Arc::new(NoopTranscoder))
    }

    #[tokio::test]
    async fn test_missing_credential_never_enters_acquiring() {
        let mut handle = splitter()
            .start(RunRequest {
                video: "dQw4w9WgXcQ".to_string(),
                cookies_file: None,
            })
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        let report = handle.wait().await;

        assert_eq!(events, vec![RunEvent::State(RunState::Failed)]);
        assert_eq!(report.failure, Some(FailureKind::MissingCredential));
        assert!(!report.history.iter().any(|t| t.state == RunState::Acquiring));
    }

    #[tokio::test]
    async fn test_acquisition_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let cookies = temp_dir.path().join("cookies.txt");
        tokio::fs::write(&cookies, "# Netscape HTTP Cookie File\n").await.unwrap();

        let handle = splitter()
            .start(RunRequest {
                video: "dQw4w9WgXcQ".to_string(),
                cookies_file: Some(cookies),
            })
            .unwrap();
        let report = handle.wait().await;

        assert!(!report.succeeded());
        assert_eq!(report.failure, Some(FailureKind::Acquisition));
        assert!(report.message.contains("offline"));
        assert!(report.output_dir.is_none());
    }

    /// Remembers the cookie path it was handed, then fails
    #[derive(Default)]
    struct RecordingDownloader {
        cookies: std::sync::Mutex<Option<PathBuf>>,
    }

    #[async_trait]
    impl Downloader for RecordingDownloader {
        async fn acquire(&self, request: &AcquireRequest, _: &ProgressFn) -> Result<Acquisition> {
            *self.cookies.lock().unwrap() = Some(request.cookies_file.clone());
            Err(SplitError::Acquisition("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_relative_cookie_path_is_made_absolute() {
        // Tests run from the package root, where Cargo.toml always exists
        let downloader = Arc::new(RecordingDownloader::default());
        let splitter = ChapterSplitter::new(downloader.clone(), Arc::new(NoopTranscoder));

        let report = splitter
            .start(RunRequest {
                video: "dQw4w9WgXcQ".to_string(),
                cookies_file: Some(PathBuf::from("Cargo.toml")),
            })
            .unwrap()
            .wait()
            .await;
        assert_eq!(report.failure, Some(FailureKind::Acquisition));

        let cookies = downloader.cookies.lock().unwrap().clone().unwrap();
        assert!(cookies.is_absolute());
        assert_eq!(cookies, std::fs::canonicalize("Cargo.toml").unwrap());
    }

    #[tokio::test]
    async fn test_nonexistent_relative_cookie_path() {
        let downloader = Arc::new(RecordingDownloader::default());
        let splitter = ChapterSplitter::new(downloader.clone(), Arc::new(NoopTranscoder));

        let report = splitter
            .start(RunRequest {
                video: "dQw4w9WgXcQ".to_string(),
                cookies_file: Some(PathBuf::from("no-such-cookies.txt")),
            })
            .unwrap()
            .wait()
            .await;

        assert_eq!(report.failure, Some(FailureKind::MissingCredential));
        assert!(report.message.contains("no-such-cookies.txt"));
        assert!(downloader.cookies.lock().unwrap().is_none());
    }

    #[test]
    fn test_interrupted_report_is_saved() {
        let temp_dir = TempDir::new().unwrap();
        let report =
            RunReport::interrupted("dQw4w9WgXcQ".to_string(), Utc::now(), SplitError::Cancelled);

        let path = tokio_test::block_on(async { report.save(temp_dir.path()).await }).unwrap();
        assert_eq!(path.file_name().unwrap(), REPORT_FILE_NAME);

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["final_state"], "Failed");
        assert_eq!(saved["failure"], "Cancelled");
    }

    #[tokio::test]
    async fn test_active_flag_released_after_run() {
        let splitter = splitter();
        let handle = splitter
            .start(RunRequest {
                video: "x".to_string(),
                cookies_file: None,
            })
            .unwrap();
        handle.wait().await;
        assert!(!splitter.is_running());
    }
}
