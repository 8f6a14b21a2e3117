// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
// Add other lints specific to this module that you want to allow but not auto-fix

use anyhow::{Result, anyhow, Context};
use log::{warn, info, LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::path::{Path, PathBuf};
use std::io::Write;
use std::sync::Arc;
use clap::{Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};
use walkdir::WalkDir;

use crate::api::RunOptions;
use crate::api::http::HttpPipelineApi;
use crate::app_config::Config;
use crate::console::BatchConsole;
use crate::history::{FileBackend, HistoryStore};
use crate::tracking::{
    BatchContext, BatchPoller, BatchRequest, BatchSubmitter, DiffCache, PollEvent, SaveCoordinator,
};

mod api;
mod app_config;
mod console;
mod errors;
mod history;
mod job;
mod language_utils;
mod tracking;

// Common media extensions the dubbing pipeline accepts as uploads.
// This list is not exhaustive but covers the most common formats.
const MEDIA_EXTENSIONS: [&str; 14] = [
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v",
    "mpg", "mpeg", "mp3", "wav", "m4a", "flac",
];

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a dubbing batch and watch it to completion (default command)
    #[command(alias = "dub")]
    Submit(SubmitArgs),

    /// Re-attach to a batch submitted earlier and watch it
    Watch(WatchArgs),

    /// Browse, delete or export recorded job outcomes
    History(HistoryArgs),

    /// Generate shell completions for dubtrack
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct SubmitArgs {
    /// Media files, folders or URLs to dub
    #[arg(value_name = "SOURCE", required_unless_present = "urls_file")]
    sources: Vec<String>,

    /// Read additional URLs from a file, one per line
    #[arg(long, value_name = "FILE")]
    urls_file: Option<PathBuf>,

    /// Source language code (e.g. 'en'), or 'auto' to detect
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language codes, comma separated (e.g. 'fr,de')
    #[arg(short, long, value_delimiter = ',')]
    target_language: Vec<String>,

    /// Work title the outputs are filed under on the backend
    #[arg(short = 'w', long)]
    target_work: Option<String>,

    /// Override the configured speech recognition model
    #[arg(long, value_name = "MODEL")]
    asr_model: Option<String>,

    /// Override the configured translation model
    #[arg(long, value_name = "MODEL")]
    translation_model: Option<String>,

    /// Override the configured speech synthesis model
    #[arg(long, value_name = "MODEL")]
    tts_model: Option<String>,

    /// Override the configured translation strategy
    #[arg(long, value_name = "STRATEGY")]
    translation_strategy: Option<String>,

    /// Override the configured dubbing strategy
    #[arg(long, value_name = "STRATEGY")]
    dubbing_strategy: Option<String>,

    /// Submit and print the batch id without watching
    #[arg(short, long)]
    no_watch: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Parser, Debug)]
struct WatchArgs {
    /// Batch id printed at submit time
    #[arg(value_name = "BATCH_ID")]
    batch_id: String,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Parser, Debug)]
struct HistoryArgs {
    #[command(subcommand)]
    action: HistoryAction,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List recorded jobs, newest first
    List {
        /// Print one record in full instead of the table
        #[arg(long)]
        index: Option<usize>,
    },

    /// Delete the record at the given list index
    Delete {
        #[arg(value_name = "INDEX")]
        index: usize,
    },

    /// Export the history as a timestamped JSON snapshot
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// DubTrack - Batch tracking client for an AI dubbing pipeline
///
/// Submits media batches to a dubbing backend, follows their progress
/// and records every finished item into a local history.
#[derive(Parser, Debug)]
#[command(name = "dubtrack")]
#[command(version = "1.0.0")]
#[command(about = "Batch dubbing submission and tracking tool")]
#[command(long_about = "DubTrack submits media files and URLs to an AI dubbing pipeline as one batch, \
polls the batch status until every item settles, and records outcomes locally.

EXAMPLES:
    dubtrack movie.mp4 -t fr                    # Dub one file into French
    dubtrack /media/ -t fr,de                   # Dub a whole folder into two languages
    dubtrack https://youtu.be/xyz -t es         # Dub a remote video
    dubtrack submit -n clip.mp4 -t fr           # Submit and print the batch id only
    dubtrack --urls-file urls.txt -t fr         # Dub every URL listed in a file
    dubtrack watch 0b9f3a7c-...                 # Re-attach to a running batch
    dubtrack history list                       # Show recorded outcomes
    dubtrack history export -o jobs.json        # Export the history snapshot
    dubtrack completions bash > dubtrack.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default
    one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Media files, folders or URLs to dub
    #[arg(value_name = "SOURCE")]
    sources: Vec<String>,

    /// Read additional URLs from a file, one per line
    #[arg(long, value_name = "FILE")]
    urls_file: Option<PathBuf>,

    /// Source language code (e.g. 'en'), or 'auto' to detect
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language codes, comma separated (e.g. 'fr,de')
    #[arg(short, long, value_delimiter = ',')]
    target_language: Vec<String>,

    /// Work title the outputs are filed under on the backend
    #[arg(short = 'w', long)]
    target_work: Option<String>,

    /// Override the configured speech recognition model
    #[arg(long, value_name = "MODEL")]
    asr_model: Option<String>,

    /// Override the configured translation model
    #[arg(long, value_name = "MODEL")]
    translation_model: Option<String>,

    /// Override the configured speech synthesis model
    #[arg(long, value_name = "MODEL")]
    tts_model: Option<String>,

    /// Override the configured translation strategy
    #[arg(long, value_name = "STRATEGY")]
    translation_strategy: Option<String>,

    /// Override the configured dubbing strategy
    #[arg(long, value_name = "STRATEGY")]
    dubbing_strategy: Option<String>,

    /// Submit and print the batch id without watching
    #[arg(short, long)]
    no_watch: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color code for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let emoji = Self::get_emoji_for_level(record.level());
            let color = Self::get_color_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                color,
                now,
                emoji,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    // Parse command line arguments using clap
    let cli = CommandLineOptions::parse();

    // Handle subcommands
    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "dubtrack", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Submit(args)) => run_submit(args).await,
        Some(Commands::Watch(args)) => run_watch(args).await,
        Some(Commands::History(args)) => run_history(args).await,
        None => {
            // Default behavior - use top-level args for backwards compatibility
            if cli.sources.is_empty() && cli.urls_file.is_none() {
                return Err(anyhow!("SOURCE is required when no subcommand is specified"));
            }
            let submit_args = SubmitArgs {
                sources: cli.sources,
                urls_file: cli.urls_file,
                source_language: cli.source_language,
                target_language: cli.target_language,
                target_work: cli.target_work,
                asr_model: cli.asr_model,
                translation_model: cli.translation_model,
                tts_model: cli.tts_model,
                translation_strategy: cli.translation_strategy,
                dubbing_strategy: cli.dubbing_strategy,
                no_watch: cli.no_watch,
                config_path: cli.config_path,
                log_level: cli.log_level,
            };
            run_submit(submit_args).await
        }
    }
}

/// Load or create the configuration, applying the CLI log level
fn load_config(config_path: &str, cli_level: Option<&CliLogLevel>) -> Result<Config> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = cli_level {
        let config_log_level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level_filter(&config_log_level));
    }

    let mut config = if Path::new(config_path).exists() {
        Config::from_file(config_path)?
    } else {
        // Create default configuration if not exists
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        config.write_to(config_path)?;
        config
    };

    // Override config with CLI log level if provided
    if let Some(cmd_log_level) = cli_level {
        config.log_level = cmd_log_level.clone().into();
    }

    // Validate the configuration after loading and overriding
    config.validate()
        .context("Configuration validation failed")?;

    // If log level was not set via command line, update it from config now
    if cli_level.is_none() {
        // Just update the max level without reinitializing the logger
        log::set_max_level(level_filter(&config.log_level));
    }

    Ok(config)
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

async fn run_submit(options: SubmitArgs) -> Result<()> {
    let config = load_config(&options.config_path, options.log_level.as_ref())?;

    let (files, mut urls) = partition_sources(&options.sources)?;
    if let Some(path) = &options.urls_file {
        urls.extend(read_url_lines(path)?);
    }

    let request = BatchRequest {
        files,
        urls,
        source_language: options
            .source_language
            .clone()
            .unwrap_or_else(|| config.defaults.source_language.clone()),
        target_languages: if options.target_language.is_empty() {
            config.defaults.target_languages.clone()
        } else {
            options.target_language.clone()
        },
        target_work: options.target_work.clone(),
        options: apply_option_overrides(&options, config.defaults.options.clone()),
    };

    let api = Arc::new(HttpPipelineApi::new(
        &config.backend.endpoint,
        config.backend.timeout_secs,
    ));
    let submitter = BatchSubmitter::new(Arc::clone(&api));
    let ctx = submitter.submit(request).await?;

    // The batch id goes to stdout so scripts can capture it
    println!("{}", ctx.batch_id);

    if options.no_watch {
        info!("Not watching; run 'dubtrack watch {}' to re-attach", ctx.batch_id);
        return Ok(());
    }

    watch_batch(api, &config, ctx).await
}

async fn run_watch(options: WatchArgs) -> Result<()> {
    let config = load_config(&options.config_path, options.log_level.as_ref())?;

    let api = Arc::new(HttpPipelineApi::new(
        &config.backend.endpoint,
        config.backend.timeout_secs,
    ));
    let ctx = BatchContext::attached(&options.batch_id);
    watch_batch(api, &config, ctx).await
}

/// Poll one batch to completion, rendering events as they arrive
async fn watch_batch(api: Arc<HttpPipelineApi>, config: &Config, ctx: BatchContext) -> Result<()> {
    let backend = Arc::new(FileBackend::new(config.history.resolved_path()?));
    let store = Arc::new(HistoryStore::new(backend));
    let saver = Arc::new(SaveCoordinator::new(store));
    let cache = Arc::new(DiffCache::new(saver));

    let poller = BatchPoller::with_timing(
        api,
        cache,
        config.tracker.poll_interval(),
        config.tracker.failure_threshold,
    );

    info!("Watching batch {} ({} item(s))", ctx.batch_id, ctx.total);
    let console = BatchConsole::new(ctx.total);
    let mut events = poller.start(ctx);

    loop {
        tokio::select! {
            maybe_event = events.recv() => match maybe_event {
                Some(event) => {
                    let stopped = matches!(event, PollEvent::Stopped { .. });
                    console.handle(&event);
                    if stopped {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                console.println("Stopping at user request");
                poller.stop();
            }
        }
    }

    Ok(())
}

async fn run_history(options: HistoryArgs) -> Result<()> {
    let config = load_config(&options.config_path, options.log_level.as_ref())?;

    let backend = Arc::new(FileBackend::new(config.history.resolved_path()?));
    let store = HistoryStore::new(backend);

    match options.action {
        HistoryAction::List { index: None } => {
            console::print_history(&store.load());
        }
        HistoryAction::List { index: Some(index) } => {
            let records = store.load();
            match records.get(index) {
                Some(record) => console::print_record(index, record),
                None => warn!("No record at index {} ({} recorded)", index, records.len()),
            }
        }
        HistoryAction::Delete { index } => {
            if store.delete(index) {
                info!("Deleted history record {}", index);
            }
        }
        HistoryAction::Export { output } => {
            let snapshot = store.export_snapshot();
            let json = serde_json::to_string_pretty(&snapshot)
                .context("Failed to serialize history export")?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write export to {}", path.display()))?;
                    info!("Exported {} record(s) to {}", snapshot.count, path.display());
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

/// Split CLI sources into upload files and remote URLs.
/// Directories expand to the media files they contain.
fn partition_sources(sources: &[String]) -> Result<(Vec<PathBuf>, Vec<String>)> {
    let mut files = Vec::new();
    let mut urls = Vec::new();

    for source in sources {
        if source.starts_with("http://") || source.starts_with("https://") {
            urls.push(source.clone());
            continue;
        }

        let path = PathBuf::from(source);
        if path.is_dir() {
            let found = collect_media_files(&path);
            if found.is_empty() {
                return Err(anyhow!("No media files found in directory: {:?}", path));
            }
            info!("Expanded {:?} into {} media file(s)", path, found.len());
            files.extend(found);
        } else {
            // Missing paths stay in the list so validation reports them
            files.push(path);
        }
    }

    Ok((files, urls))
}

/// Read URLs from a file, one per line, skipping blank lines
fn read_url_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Fold CLI model and strategy overrides into the configured run options
fn apply_option_overrides(options: &SubmitArgs, mut run: RunOptions) -> RunOptions {
    if let Some(model) = &options.asr_model {
        run.asr_model = model.clone();
    }
    if let Some(model) = &options.translation_model {
        run.translation_model = model.clone();
    }
    if let Some(model) = &options.tts_model {
        run.tts_model = model.clone();
    }
    if let Some(strategy) = &options.translation_strategy {
        run.translation_strategy = strategy.clone();
    }
    if let Some(strategy) = &options.dubbing_strategy {
        run.dubbing_strategy = strategy.clone();
    }
    run
}

fn collect_media_files(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_media_file(path))
        .collect();
    found.sort();
    found
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
}
