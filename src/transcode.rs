use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{Config, TranscodeConfig};
use crate::error::{Result, SplitError};
use crate::process::tail_lines;

/// One clip to cut from the source video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClipJob {
    pub input: PathBuf,
    pub start_seconds: u32,
    /// `None` cuts to the end of the input
    pub end_seconds: Option<u32>,
    pub output: PathBuf,
}

impl ClipJob {
    pub fn clip_name(&self) -> String {
        self.output
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.output.display().to_string())
    }
}

/// Cuts a time range out of a media file
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn trim(&self, job: &ClipJob) -> Result<()>;
}

/// Transcoder backed by the ffmpeg command line tool
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_bin: PathBuf,
    config: TranscodeConfig,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_bin: PathBuf, config: TranscodeConfig) -> Self {
        Self { ffmpeg_bin, config }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tools.ffmpeg_bin.clone(), config.transcode.clone())
    }

    /// Arguments for one clip; the output is always overwritten
    pub fn build_args(&self, job: &ClipJob) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-y".to_string(),
            "-i".to_string(),
            job.input.to_string_lossy().to_string(),
            "-ss".to_string(),
            job.start_seconds.to_string(),
        ];

        // An end of 0 comes from a later chapter at 00:00 and cuts to the end of the input
        if let Some(end) = job.end_seconds.filter(|&end| end > 0) {
            args.push("-to".to_string());
            args.push(end.to_string());
        }

        args.extend([
            "-c:v".to_string(),
            self.config.video_codec.clone(),
            "-b:v".to_string(),
            self.config.video_bitrate.clone(),
            "-c:a".to_string(),
            self.config.audio_codec.clone(),
            "-b:a".to_string(),
            self.config.audio_bitrate.clone(),
            job.output.to_string_lossy().to_string(),
        ]);

        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn trim(&self, job: &ClipJob) -> Result<()> {
        let args = self.build_args(job);
        debug!("✂️ {} {}", self.ffmpeg_bin.display(), args.join(" "));

        let output = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SplitError::Transcoding {
                clip: job.clip_name(),
                message: format!("failed to run ffmpeg: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = tail_lines(&stderr, 3);
            return Err(SplitError::Transcoding {
                clip: job.clip_name(),
                message: if detail.is_empty() {
                    format!("ffmpeg exited with {}", output.status)
                } else {
                    format!("ffmpeg exited with {}: {}", output.status, detail)
                },
            });
        }

        info!("🎬 Created {}", job.output.display());
        Ok(())
    }
}
