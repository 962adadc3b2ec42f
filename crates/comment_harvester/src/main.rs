//! # comment-harvester
//!
//! Collects top-level comments for a list of content ids from the upstream
//! comment listing and appends them to a JSON Lines file, skipping comments
//! stored by earlier runs.
//!
//! ```bash
//! comment-harvester --config harvest.ron --ids ids.csv --workers 3 --cap 200
//! ```
//!
//! While running, commands typed on stdin adjust the run: `pause`, `resume`,
//! `stop`, `status`, `rate <rpm>`, `delay <min> <max>`, `workers <n>`,
//! `cap <n>`. Ctrl-C stops gracefully.

mod config;
mod control;
mod logging;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use comment_engine::{DelimitedIdFile, Harvester, JsonlCommentStore, ReqwestPageFetcher, RunSummary};
use engine_logging::engine_info;
use log::LevelFilter;

use crate::config::{FileConfig, Overrides};
use crate::logging::LogDestination;
use crate::progress::LogProgress;

#[derive(Debug, Parser)]
#[command(
    name = "comment-harvester",
    version,
    about = "Rate-limited, resumable comment harvester"
)]
struct Cli {
    /// RON configuration file. Every field is optional.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[arg(long, value_enum, default_value_t = LogDestination::Both)]
    log: LogDestination,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    #[arg(long, default_value = "./harvest.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log, cli.log_level, &cli.log_file);

    let mut config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    config.apply(&cli.overrides);

    let fetcher =
        ReqwestPageFetcher::new(config.fetch_settings()).context("invalid request settings")?;
    let harvester = Harvester::new(Arc::new(fetcher), config.harvest_settings())
        .with_progress(Arc::new(LogProgress::new()));

    let controls = harvester.controls();
    engine_info!("{}", controls.status());
    control::spawn_stdin_reader(controls.clone());
    tokio::spawn(control::stop_on_ctrl_c(controls));

    let source = DelimitedIdFile {
        path: config.ids_path.clone(),
        has_header: config.ids_have_header,
        delimiter: ',',
    };
    let store = JsonlCommentStore::new(&config.output_path);
    let summary = harvester
        .run(&source, store)
        .await
        .context("harvest aborted")?;

    print_summary(&summary, &config);
    Ok(())
}

fn print_summary(summary: &RunSummary, config: &FileConfig) {
    println!(
        "{} content ids: {} completed, {} failed, {} cancelled, {} not started{}",
        summary.content_ids,
        summary.completed,
        summary.failed,
        summary.cancelled,
        summary.not_started,
        if summary.stopped { " (stopped)" } else { "" }
    );
    println!(
        "{} comments harvested, {} new written to {}, {} already stored",
        summary.comments_harvested,
        summary.comments_written,
        config.output_path.display(),
        summary.duplicates_skipped
    );
    if summary.write_errors > 0 {
        println!("{} batches could not be written; see the log", summary.write_errors);
    }
}
