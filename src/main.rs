use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use chapter_splitter::chapters::{build_segments, parse_timestamps};
use chapter_splitter::process::tool_version;
use chapter_splitter::{ChapterSplitter, Config, RunEvent, RunRequest, RunState, SplitError};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = Command::new("Chapter Splitter")
        .version("0.1.0")
        .about("Download a video and cut it into one clip per chapter listed in its description")
        .arg(
            Arg::new("video")
                .value_name("URL_OR_ID")
                .help("Video URL or id")
                .required_unless_present("plan"),
        )
        .arg(
            Arg::new("cookies")
                .short('c')
                .long("cookies")
                .value_name("FILE")
                .help("cookies.txt file used for authenticated downloads"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory the per-video clip folder is created in"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)"),
        )
        .arg(
            Arg::new("plan")
                .long("plan")
                .value_name("FILE")
                .help("Print the clip plan for a description text file and exit")
                .conflicts_with("video"),
        )
        .arg(
            Arg::new("no-report")
                .long("no-report")
                .help("Do not write split_report.json")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration
    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .or_else(Config::locate);
    let mut config = match config_path {
        Some(ref path) => Config::from_file(path)?,
        None => Config::from_env(),
    };

    if let Some(cookies) = matches.get_one::<String>("cookies") {
        config.download.cookies_file = Some(PathBuf::from(cookies));
    }
    if let Some(output_dir) = matches.get_one::<String>("output-dir") {
        config.output.base_dir = PathBuf::from(output_dir);
    }
    if matches.get_flag("no-report") {
        config.output.save_report = false;
    }

    // Initialize logging
    let level = if matches.get_flag("verbose") {
        "debug"
    } else {
        config.output.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chapter_splitter={},warn", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match config_path {
        Some(path) => info!("📄 Loaded configuration from: {}", path.display()),
        None => debug!("No configuration file found, using defaults"),
    }
    config.validate()?;
    debug!("{}", config.summary());

    if let Some(plan_file) = matches.get_one::<String>("plan") {
        return print_plan(Path::new(plan_file));
    }

    let video = matches
        .get_one::<String>("video")
        .cloned()
        .context("a video URL or id is required")?;

    // Check external tools before starting
    for (bin, flag) in [
        (&config.tools.ytdlp_bin, "--version"),
        (&config.tools.ffmpeg_bin, "-version"),
    ] {
        if let Err(e) = tool_version(bin, flag).await {
            eprintln!("❌ {}", e);
            return Ok(ExitCode::FAILURE);
        }
    }

    info!("🚀 Chapter Splitter starting...");
    info!("📂 Output directory: {}", config.output.base_dir.display());

    let splitter = ChapterSplitter::from_config(&config);
    let mut handle = splitter.start(RunRequest {
        video,
        cookies_file: config.download.cookies_file.clone(),
    })?;
    let canceller = handle.canceller();

    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg:<12} [{bar:40.cyan/blue}] {pos:>3}%")?
            .progress_chars("=> "),
    );

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(RunEvent::State(state)) => progress.set_message(stage_label(state)),
                Some(RunEvent::Progress(percent)) => progress.set_position(percent.round() as u64),
                Some(RunEvent::ClipCreated { index, total, path }) => {
                    progress.println(format!("Created {} ({}/{})", path.display(), index, total));
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                progress.println("Cancelling...");
                canceller.cancel();
            }
        }
    }

    let report = handle.wait().await;
    progress.finish_and_clear();

    if report.succeeded() {
        println!("✅ {}", report.message);
        if let Some(dir) = report.output_dir {
            println!("📂 {} clips in {}", report.clips.len(), dir.display());
        }
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("❌ {}", report.message);
        Ok(ExitCode::FAILURE)
    }
}

fn stage_label(state: RunState) -> &'static str {
    match state {
        RunState::Idle => "Waiting",
        RunState::Acquiring => "Downloading",
        RunState::Parsing => "Reading TOC",
        RunState::Trimming => "Trimming",
        RunState::Done => "Done",
        RunState::Failed => "Failed",
    }
}

/// Print the clips a description would produce, without downloading
fn print_plan(description_file: &Path) -> Result<ExitCode> {
    let description = std::fs::read_to_string(description_file)
        .with_context(|| format!("Failed to read {}", description_file.display()))?;

    let segments = build_segments(&parse_timestamps(&description))?;
    if segments.is_empty() {
        eprintln!("❌ {}", SplitError::NoChapters.user_message());
        return Ok(ExitCode::FAILURE);
    }

    for segment in &segments {
        let end = segment
            .end_seconds
            .map(|end| format!("{}s", end))
            .unwrap_or_else(|| "end".to_string());
        println!(
            "{:>6}s -> {:>6}  {}",
            segment.start_seconds, end, segment.output_filename
        );
    }

    Ok(ExitCode::SUCCESS)
}
