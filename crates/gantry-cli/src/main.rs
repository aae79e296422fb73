//! Gantry CLI entrypoint.

use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;
mod version;


use commands::Commands;
use config::CliConfig;
use gantry_builder::DockerEngine;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(author, version, about = "Test matrix expansion and concurrent image builds", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold().for_stderr(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Matrix { file } => {
            let input = handlers::read_input(file.as_deref())?;
            handlers::matrix(&config, &input, &mut stdout)
        }
        Commands::Build(args) => {
            // version flags never need the job list
            let input = if args.tool_version || args.version_test.is_some() {
                String::new()
            } else {
                handlers::read_input(None)?
            };
            let engine = DockerEngine::new();
            let mut stderr = std::io::stderr();
            handlers::build(&args, &config, &engine, &input, &mut stdout, &mut stderr).await
        }
        Commands::Pair { file } => {
            let input = handlers::read_input(file.as_deref())?;
            handlers::pair(&input, &mut stdout)
        }
    }
}
