use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the chapter splitter
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// External tool locations
    pub tools: ToolsConfig,

    /// yt-dlp download settings
    pub download: DownloadConfig,

    /// ffmpeg encoding settings
    pub transcode: TranscodeConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// yt-dlp executable
    pub ytdlp_bin: PathBuf,

    /// ffmpeg executable
    pub ffmpeg_bin: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Format selector passed to `-f`
    pub format: String,

    /// Output template passed to `-o`
    pub output_template: String,

    /// Container used when merging separate video and audio streams
    pub merge_output_format: String,

    /// Netscape cookie file for authenticated access
    pub cookies_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub video_codec: String,

    /// Target video bitrate, ffmpeg notation
    pub video_bitrate: String,

    pub audio_codec: String,

    /// Target audio bitrate, ffmpeg notation
    pub audio_bitrate: String,

    /// ffmpeg `-loglevel`
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the per-video folders are created in
    pub base_dir: PathBuf,

    /// Write `split_report.json` into the output folder after each run
    pub save_report: bool,

    /// Log level
    pub log_level: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            format: "bestvideo+bestaudio/best".to_string(),
            output_template: "%(title)s.%(ext)s".to_string(),
            merge_output_format: "mp4".to_string(),
            cookies_file: None,
        }
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            video_bitrate: "2500k".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            log_level: "error".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            save_report: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// First existing config file from the standard search locations
    pub fn locate() -> Option<PathBuf> {
        let config_paths = [
            "chapter-splitter.toml",
            "config/chapter-splitter.toml",
            "/etc/chapter-splitter/config.toml",
        ];

        config_paths
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    /// Load from the first config file found, falling back to defaults.
    /// Environment overrides apply in both cases.
    pub fn load() -> Result<Self> {
        match Self::locate() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::from_env()),
        }
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override settings from `CHAPTER_SPLITTER_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(cookies) = std::env::var("CHAPTER_SPLITTER_COOKIES") {
            self.download.cookies_file = Some(PathBuf::from(cookies));
        }

        if let Ok(output_dir) = std::env::var("CHAPTER_SPLITTER_OUTPUT_DIR") {
            self.output.base_dir = PathBuf::from(output_dir);
        }

        if let Ok(ytdlp) = std::env::var("CHAPTER_SPLITTER_YTDLP") {
            self.tools.ytdlp_bin = PathBuf::from(ytdlp);
        }

        if let Ok(ffmpeg) = std::env::var("CHAPTER_SPLITTER_FFMPEG") {
            self.tools.ffmpeg_bin = PathBuf::from(ffmpeg);
        }

        if let Ok(log_level) = std::env::var("CHAPTER_SPLITTER_LOG_LEVEL") {
            self.output.log_level = log_level;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tools.ytdlp_bin.as_os_str().is_empty() {
            return Err(anyhow!("tools.ytdlp_bin must not be empty"));
        }

        if self.tools.ffmpeg_bin.as_os_str().is_empty() {
            return Err(anyhow!("tools.ffmpeg_bin must not be empty"));
        }

        if self.download.format.trim().is_empty() {
            return Err(anyhow!("download.format must not be empty"));
        }

        for (name, value) in [
            ("transcode.video_bitrate", &self.transcode.video_bitrate),
            ("transcode.audio_bitrate", &self.transcode.audio_bitrate),
        ] {
            if !is_bitrate(value) {
                return Err(anyhow!("{} is not a valid bitrate: {:?}", name, value));
            }
        }

        if self.output.base_dir.exists() && !self.output.base_dir.is_dir() {
            return Err(anyhow!(
                "output.base_dir is not a directory: {}",
                self.output.base_dir.display()
            ));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Chapter Splitter Configuration:\n\
            - yt-dlp: {}\n\
            - ffmpeg: {}\n\
            - Format: {}\n\
            - Video: {} @ {}\n\
            - Audio: {} @ {}\n\
            - Output Directory: {}\n\
            - Cookies: {}",
            self.tools.ytdlp_bin.display(),
            self.tools.ffmpeg_bin.display(),
            self.download.format,
            self.transcode.video_codec,
            self.transcode.video_bitrate,
            self.transcode.audio_codec,
            self.transcode.audio_bitrate,
            self.output.base_dir.display(),
            self.download
                .cookies_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
        )
    }
}

/// ffmpeg bitrate notation: digits with an optional `k` or `M` suffix
fn is_bitrate(value: &str) -> bool {
    let digits = value.trim_end_matches(['k', 'K', 'M']);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.base_dir = dir;
        self
    }

    pub fn with_cookies_file(mut self, path: PathBuf) -> Self {
        self.config.download.cookies_file = Some(path);
        self
    }

    pub fn with_ytdlp_bin(mut self, path: PathBuf) -> Self {
        self.config.tools.ytdlp_bin = path;
        self
    }

    pub fn with_ffmpeg_bin(mut self, path: PathBuf) -> Self {
        self.config.tools.ffmpeg_bin = path;
        self
    }

    pub fn with_bitrates(mut self, video: &str, audio: &str) -> Self {
        self.config.transcode.video_bitrate = video.to_string();
        self.config.transcode.audio_bitrate = audio.to_string();
        self
    }

    pub fn save_report(mut self, enable: bool) -> Self {
        self.config.output.save_report = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
