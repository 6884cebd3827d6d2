//! Batch image generator CLI.
//!
//! Reads `config.toml` and `elements.toml` from the configuration directory
//! (default `~/.venice`) and generates the configured number of images.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use batchgen::engine::{RunSummary, StopReason};
use batchgen::exit_codes;
use batchgen::io::init::{GeneratorPaths, InitOptions, init_generator};
use batchgen::io::progress::{LogProgress, ProgressSink, TerminalProgress};
use batchgen::io::signal::install_interrupt_flag;
use batchgen::logging;
use batchgen::start::{StartOptions, check_service, load_client, start_run};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "batchgen",
    version,
    about = "Batch image generation against the Venice image API"
)]
struct Cli {
    /// Configuration directory [default: ~/.venice].
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Write `config.toml` and `elements.toml` templates if missing.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
        /// API key to put in the new `config.toml`.
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Probe the API endpoint and report whether it is reachable.
    Check,
    /// Generate the configured batch of images.
    Run {
        /// Log progress lines instead of redrawing the terminal.
        #[arg(long)]
        plain: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(matches!(cli.command, Command::Run { plain: true }));
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => GeneratorPaths::default_dir()?,
    };
    let paths = GeneratorPaths::new(config_dir);
    match cli.command {
        Command::Init { force, api_key } => cmd_init(&paths, InitOptions { force, api_key }),
        Command::Check => cmd_check(&paths),
        Command::Run { plain } => cmd_run(paths, plain),
    }
}

fn cmd_init(paths: &GeneratorPaths, options: InitOptions) -> Result<i32> {
    let report = init_generator(paths, &options)?;
    let describe = |wrote: bool| if wrote { "written" } else { "kept" };
    println!(
        "{}: {}",
        paths.config_path.display(),
        describe(report.wrote_config)
    );
    println!(
        "{}: {}",
        paths.elements_path.display(),
        describe(report.wrote_elements)
    );
    Ok(exit_codes::OK)
}

fn cmd_check(paths: &GeneratorPaths) -> Result<i32> {
    let (config, client) = load_client(paths)?;
    let credentials = config.credentials();
    check_service(&client, &credentials)?;
    println!("{}: reachable", credentials.endpoint());
    Ok(exit_codes::OK)
}

fn cmd_run(paths: GeneratorPaths, plain: bool) -> Result<i32> {
    let progress: Box<dyn ProgressSink> = if plain {
        Box::new(LogProgress)
    } else {
        Box::new(TerminalProgress::new())
    };
    let summary = start_run(StartOptions {
        paths,
        progress: progress.as_ref(),
        interrupted: install_interrupt_flag()?,
        started_at: chrono::Utc::now().timestamp(),
    })?;
    drop(progress);
    println!(
        "\n{}: {} images saved, {} failed attempts",
        summary.stop.describe(),
        summary.produced,
        summary.failed_attempts
    );
    Ok(exit_code(&summary))
}

fn exit_code(summary: &RunSummary) -> i32 {
    match summary.stop {
        StopReason::Completed => exit_codes::OK,
        StopReason::AuthRejected => exit_codes::AUTH,
        StopReason::Interrupted => exit_codes::INTERRUPTED,
        StopReason::CircuitOpen => exit_codes::CIRCUIT_OPEN,
    }
}
