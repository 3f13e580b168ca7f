//! `watch-history` command-line tool.
//!
//! Inspects and maintains the watch-history store used by media players:
//! listing, recording progress, pruning, import/export, and following live
//! changes.

#![allow(clippy::multiple_crate_versions)]

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use watch_history::recorder::{Clock, SystemClock};
use watch_history::{
    format_position, Config, HistoryQuery, ProgressRecorder, Result, SortKey, SortOrder,
    WatchHistoryError, WatchHistoryItem, WatchHistoryRepository,
};

#[derive(Parser)]
#[command(name = "watch-history")]
#[command(about = "Inspect and maintain media playback history")]
#[command(version)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    FirstWatched,
    LastWatched,
    Duration,
    Position,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => Self::Name,
            SortArg::FirstWatched => Self::FirstWatched,
            SortArg::LastWatched => Self::LastWatched,
            SortArg::Duration => Self::TotalDuration,
            SortArg::Position => Self::LastPosition,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List watched media, newest first
    List {
        /// Show at most N entries
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Only entries whose name or subtitle contains this text
        #[arg(long, value_name = "QUERY")]
        search: Option<String>,

        /// Sort column
        #[arg(long, value_enum, default_value = "last-watched")]
        sort: SortArg,

        /// Sort ascending instead of descending
        #[arg(long, action = ArgAction::SetTrue)]
        asc: bool,
    },
    /// Show one entry by file name
    Show { name: String },
    /// Record a playback position
    Record {
        /// Media file that is playing
        file: PathBuf,
        /// Current position in seconds
        position: f64,
        /// Total duration in seconds
        duration: f64,
        /// Subtitle file in use
        #[arg(long, value_name = "PATH")]
        subtitle: Option<PathBuf>,
    },
    /// Delete entries by file name
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete entries not watched for N days
    Prune {
        #[arg(long, value_name = "N")]
        days: u32,
    },
    /// Delete every entry
    Clear,
    /// Export history as JSON (to stdout unless --output is given)
    Export {
        /// Output file, or a directory to place a dated export file in
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import history from a JSON export
    Import {
        path: PathBuf,
        /// Replace entries that already exist
        #[arg(long, action = ArgAction::SetTrue)]
        overwrite: bool,
    },
    /// Print the history every time it changes, until Ctrl-C
    Watch,
}

fn describe(item: &WatchHistoryItem, now_ms: i64) -> String {
    let subtitle = if item.subtitle_name.is_empty() {
        String::new()
    } else {
        format!("  [{}]", item.subtitle_name)
    };
    format!(
        "{}  {} / {}  {:>3.0}%  {}{}",
        item.name,
        format_position(item.last_position),
        format_position(item.total_duration),
        item.progress_ratio() * 100.0,
        item.time_ago(now_ms),
        subtitle,
    )
}

fn export_target(repository: &WatchHistoryRepository, output: &Path) -> PathBuf {
    if output.is_dir() {
        output.join(repository.default_export_file_name())
    } else {
        output.to_path_buf()
    }
}

async fn run(command: Commands, config: &Config, repository: WatchHistoryRepository) -> Result<()> {
    let now = SystemClock.now_ms();

    match command {
        Commands::List {
            limit,
            search,
            sort,
            asc,
        } => {
            let query = HistoryQuery {
                search,
                sort_key: sort.into(),
                order: if asc { SortOrder::Asc } else { SortOrder::Desc },
            };
            let items = repository.query(&query).await?;
            for item in items.iter().take(limit.unwrap_or(usize::MAX)) {
                println!("{}", describe(item, now));
            }
        }
        Commands::Show { name } => match repository.find_by_name(&name).await? {
            Some(item) => {
                let json =
                    serde_json::to_string_pretty(&item).map_err(WatchHistoryError::serialization)?;
                println!("{json}");
            }
            None => println!("{name}: not in history"),
        },
        Commands::Record {
            file,
            position,
            duration,
            subtitle,
        } => {
            let mut recorder = ProgressRecorder::with_interval(repository, config.save_interval_ms);
            let outcome = recorder
                .record_progress(&file, position, duration, subtitle.as_deref())
                .await;
            println!("{outcome:?}");
        }
        Commands::Delete { ids } => {
            let removed = repository.delete_multiple(&ids).await?;
            println!("deleted {removed} of {}", ids.len());
        }
        Commands::Prune { days } => {
            let removed = repository.delete_older_than_days(days).await?;
            println!("pruned {removed} entries older than {days} days");
        }
        Commands::Clear => {
            let removed = repository.clear().await?;
            println!("cleared {removed} entries");
        }
        Commands::Export { output } => {
            let json = repository.export_json().await?;
            match output {
                Some(output) => {
                    let target = export_target(&repository, &output);
                    std::fs::write(&target, json)?;
                    println!("exported to {}", target.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Import { path, overwrite } => {
            let json = std::fs::read_to_string(&path)?;
            let imported = repository.import_json(&json, overwrite).await?;
            println!("imported {imported} entries");
        }
        Commands::Watch => {
            let mut stream = repository.watch().await?;
            loop {
                tokio::select! {
                    snapshot = stream.next_snapshot() => {
                        let Some(snapshot) = snapshot else { break };
                        let now = SystemClock.now_ms();
                        println!("--- {} entries", snapshot.len());
                        for item in snapshot.iter() {
                            println!("{}", describe(item, now));
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    match cli.verbose {
        0 => {}
        1 => config.log_level = Some("debug".to_string()),
        _ => config.log_level = Some("trace".to_string()),
    }

    let result = match watch_history::initialize(&config) {
        Ok(repository) => run(cli.command, &config, repository).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
