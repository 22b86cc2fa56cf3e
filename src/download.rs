use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Config, DownloadConfig};
use crate::error::{Result, SplitError};
use crate::process::{last_line, tail_lines};
use crate::sanitize::sanitize_filename;

/// Receives download progress as a percentage in `0.0..=100.0`
pub type ProgressFn = dyn Fn(f64) + Send + Sync;

const PROGRESS_PREFIX: &str = "CS_PROGRESS|";
const OUTPUT_PREFIX: &str = "CS_OUTPUT|";

/// File name (without extension) the download is moved to inside its folder
pub const ORIGINAL_VIDEO_STEM: &str = "original_video";

static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("percent pattern is valid"));

static BARE_VIDEO_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id pattern is valid"));

/// What to download and how to authenticate
#[derive(Debug, Clone)]
pub struct AcquireRequest {
    /// Normalised video URL
    pub url: String,
    /// Cookie file handed to yt-dlp
    pub cookies_file: PathBuf,
}

/// A downloaded video, moved into its own output folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acquisition {
    pub media_path: PathBuf,
    pub description: String,
    pub output_dir: PathBuf,
    pub title: String,
}

/// Fetches a video and its description
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn acquire(&self, request: &AcquireRequest, progress: &ProgressFn) -> Result<Acquisition>;
}

/// Subset of `yt-dlp -J` output we rely on
#[derive(Debug, Clone, Deserialize)]
pub struct VideoMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl VideoMetadata {
    /// Folder name for this video's clips
    pub fn folder_name(&self) -> String {
        [self.title.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .map(|name| sanitize_filename(name, true))
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| "video".to_string())
    }
}

/// Turn user input into something yt-dlp accepts.
///
/// URLs are validated and passed through, bare 11-character video ids are expanded
/// to a watch URL, anything else is left for yt-dlp to interpret.
pub fn normalize_video_input(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SplitError::InvalidInput("video URL or id is empty".to_string()));
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let url = Url::parse(trimmed)
            .map_err(|e| SplitError::InvalidInput(format!("invalid URL {:?}: {}", trimmed, e)))?;
        return Ok(url.to_string());
    }

    if BARE_VIDEO_ID.is_match(trimmed) {
        return Ok(format!("https://www.youtube.com/watch?v={}", trimmed));
    }

    Ok(trimmed.to_string())
}

/// Extract the percentage from a `CS_PROGRESS|` line
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let caps = PERCENT.captures(rest)?;
    let percent: f64 = caps[1].parse().ok()?;
    Some(percent.clamp(0.0, 100.0))
}

/// Parse `yt-dlp -J` output
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoMetadata> {
    serde_json::from_slice(stdout)
        .map_err(|e| SplitError::Acquisition(format!("unexpected yt-dlp metadata: {}", e)))
}

/// Downloader backed by the yt-dlp command line tool
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    ytdlp_bin: PathBuf,
    config: DownloadConfig,
    base_dir: PathBuf,
}

impl YtDlpDownloader {
    pub fn new(ytdlp_bin: PathBuf, config: DownloadConfig, base_dir: PathBuf) -> Self {
        Self {
            ytdlp_bin,
            config,
            base_dir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.tools.ytdlp_bin.clone(),
            config.download.clone(),
            config.output.base_dir.clone(),
        )
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.ytdlp_bin);
        command
            .env("PYTHONIOENCODING", "UTF-8")
            .env("PYTHONUTF8", "1")
            .current_dir(&self.base_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    pub fn probe_args(&self, request: &AcquireRequest) -> Vec<String> {
        vec![
            "-J".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-color".to_string(),
            "--cookies".to_string(),
            request.cookies_file.to_string_lossy().to_string(),
            request.url.clone(),
        ]
    }

    pub fn download_args(&self, request: &AcquireRequest) -> Vec<String> {
        vec![
            "-f".to_string(),
            self.config.format.clone(),
            "-o".to_string(),
            self.config.output_template.clone(),
            "--merge-output-format".to_string(),
            self.config.merge_output_format.clone(),
            "--no-playlist".to_string(),
            "--no-color".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            format!("download:{}%(progress._percent_str)s", PROGRESS_PREFIX),
            "--print".to_string(),
            format!("after_move:{}%(filepath)s", OUTPUT_PREFIX),
            "--cookies".to_string(),
            request.cookies_file.to_string_lossy().to_string(),
            request.url.clone(),
        ]
    }

    /// Read title and description without downloading
    pub async fn probe(&self, request: &AcquireRequest) -> Result<VideoMetadata> {
        debug!("🔍 Probing metadata for {}", request.url);

        let output = self
            .command()
            .args(self.probe_args(request))
            .output()
            .await
            .map_err(|e| SplitError::Acquisition(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SplitError::Acquisition(
                last_line(&stderr).unwrap_or_else(|| format!("yt-dlp exited with {}", output.status)),
            ));
        }

        parse_probe_output(&output.stdout)
    }

    /// Download the video into the base directory, returning the file yt-dlp wrote
    async fn download(&self, request: &AcquireRequest, progress: &ProgressFn) -> Result<PathBuf> {
        let args = self.download_args(request);
        debug!("⬇️ {} {}", self.ytdlp_bin.display(), args.join(" "));

        let mut child = self
            .command()
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SplitError::Acquisition(format!("failed to start yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SplitError::Acquisition("yt-dlp stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SplitError::Acquisition("yt-dlp stderr unavailable".to_string()))?;

        // Progress may arrive on either stream depending on the yt-dlp build
        let stdout_reader = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut output_path = None;
            while let Some(line) = lines.next_line().await? {
                if let Some(path) = line.trim().strip_prefix(OUTPUT_PREFIX) {
                    output_path = Some(PathBuf::from(path.trim()));
                } else if let Some(percent) = parse_progress_line(&line) {
                    progress(percent);
                }
            }
            Ok::<_, std::io::Error>(output_path)
        };

        let stderr_reader = async {
            let mut lines = BufReader::new(stderr).lines();
            let mut diagnostics = String::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(percent) = parse_progress_line(&line) {
                    progress(percent);
                } else {
                    diagnostics.push_str(&line);
                    diagnostics.push('\n');
                }
            }
            diagnostics
        };

        let (output_path, diagnostics) = tokio::join!(stdout_reader, stderr_reader);
        let status = child.wait().await?;

        if !status.success() {
            return Err(SplitError::Acquisition(
                last_line(&diagnostics).unwrap_or_else(|| format!("yt-dlp exited with {}", status)),
            ));
        }

        if !diagnostics.trim().is_empty() {
            debug!("yt-dlp stderr: {}", tail_lines(&diagnostics, 5));
        }

        let path = output_path?.ok_or_else(|| {
            SplitError::Acquisition("yt-dlp did not report the downloaded file".to_string())
        })?;

        Ok(if path.is_relative() {
            self.base_dir.join(path)
        } else {
            path
        })
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn acquire(&self, request: &AcquireRequest, progress: &ProgressFn) -> Result<Acquisition> {
        tokio::fs::create_dir_all(&self.base_dir).await?;

        let metadata = self.probe(request).await?;
        let title = metadata.title.clone().unwrap_or_default();
        info!("📹 Downloading: {}", if title.is_empty() { &request.url } else { &title });

        let downloaded = self.download(request, progress).await?;

        let output_dir = self.base_dir.join(metadata.folder_name());
        tokio::fs::create_dir_all(&output_dir).await?;

        let media_path = output_dir.join(original_video_name(&downloaded));
        tokio::fs::rename(&downloaded, &media_path).await.map_err(|e| {
            SplitError::Acquisition(format!(
                "could not move {} to {}: {}",
                downloaded.display(),
                media_path.display(),
                e
            ))
        })?;

        if metadata.description.is_none() {
            warn!("⚠️ Video has no description: {}", request.url);
        }

        info!("✅ Downloaded to {}", media_path.display());

        Ok(Acquisition {
            media_path,
            description: metadata.description.unwrap_or_default(),
            output_dir,
            title,
        })
    }
}

/// `original_video.<ext>`, keeping the extension yt-dlp chose
fn original_video_name(downloaded: &Path) -> String {
    let ext = downloaded
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    format!("{}.{}", ORIGINAL_VIDEO_STEM, ext)
}
