//! Rebound CLI
//!
//! Replays scripted pull gestures against the reference compositor on a
//! virtual clock and reports how each one resolved.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rebound_refresh::{PullDirection, RefreshConfiguration};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod report;
mod runner;
mod scenario;

use runner::RunOptions;
use scenario::Scenario;

#[derive(Parser)]
#[command(name = "rebound")]
#[command(author, version, about = "Replay pull-to-refresh gestures headlessly")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON gesture scenario
    Run {
        /// Scenario file
        scenario: PathBuf,

        /// Refresh configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the pull direction
        #[arg(short, long, value_enum)]
        direction: Option<Direction>,

        /// Duration of the simulated refresh
        #[arg(long, default_value_t = 2000)]
        refresh_ms: u64,

        /// Frame interval
        #[arg(long, default_value_t = 16)]
        tick_ms: u64,

        /// Write the JSON report to this relative path instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the default refresh configuration
    Config {
        #[arg(short, long, value_enum)]
        direction: Option<Direction>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    TopDown,
    BottomUp,
}

impl From<Direction> for PullDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::TopDown => PullDirection::TopDown,
            Direction::BottomUp => PullDirection::BottomUp,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            scenario,
            config,
            direction,
            refresh_ms,
            tick_ms,
            report,
        } => {
            let mut refresh_config = match config {
                Some(path) => RefreshConfiguration::from_path(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => RefreshConfiguration::default(),
            };
            if let Some(direction) = direction {
                refresh_config = refresh_config.with_direction(direction.into());
            }
            let options = RunOptions {
                config: refresh_config,
                refresh_ms,
                tick_ms,
            };
            let scenario = Scenario::from_path(&scenario)?;
            run(&scenario, &options, report)
        }
        Commands::Config { direction } => {
            let config = match direction {
                Some(direction) => RefreshConfiguration::for_direction(direction.into()),
                None => RefreshConfiguration::default(),
            };
            print!("{}", config.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run(scenario: &Scenario, options: &RunOptions, report_path: Option<PathBuf>) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .context("failed to start runtime")?;
    let report = runtime.block_on(runner::run(scenario, options))?;

    match report_path {
        Some(path) => {
            report.write_to_path(&path)?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => report.write_to_writer(&mut std::io::stdout().lock())?,
    }

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
