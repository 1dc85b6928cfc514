//! `bulletin`: downloads the central bank's bulletin workbooks and
//! extracts their tables to CSV.

mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use bulletin_core::RunReport;
use bulletin_engine::{ensure_usable, run_blocking};
use bulletin_logging::{bulletin_error, bulletin_info, LogScope};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use config::ConfigFile;

#[derive(Parser)]
#[command(
    name = "bulletin",
    about = "Fetch the bank and financial-entity bulletins and extract their tables",
    version
)]
struct Cli {
    /// RON settings file (defaults to ./bulletin.ron when present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for downloads and CSV output.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the whole pipeline once (default).
    Run,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    let log = LogScope::facade("bulletin");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(cli.config, cli.output, &log),
    }
}

fn run(config_path: Option<PathBuf>, output: Option<PathBuf>, log: &LogScope) -> ExitCode {
    let file = match ConfigFile::load(config_path.as_deref()) {
        Ok(file) => file,
        Err(err) => {
            bulletin_error!(log, "{err}");
            return ExitCode::FAILURE;
        }
    };
    let mut config = file.into_pipeline_config();
    bulletin_info!(
        log,
        "bulletin {} starting against {}",
        env!("CARGO_PKG_VERSION"),
        config.base_url
    );
    if let Some(dir) = output {
        config.download_dir = dir;
    }
    config.clock = Arc::new(|| chrono::Utc::now().to_rfc3339());

    match run_blocking(config, log.child("pipeline")).and_then(ensure_usable) {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            bulletin_error!(log, "{err}");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(report: &RunReport) {
    println!(
        "Downloaded {}/{} bulletins, extracted {} tables.",
        report.downloaded.len(),
        report.requested,
        report.tables.len()
    );
    for table in &report.tables {
        println!("  {}", table.path.display());
    }
    if !report.missing.is_empty() {
        println!("Missing: {}", report.missing.join(", "));
    }
    if let Some(reason) = &report.fallback_reason {
        println!("Used previously known links: {reason}.");
    }
}
