use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::filter::EnvFilter;

mod commands;
mod config;

use commands::disasm::DisasmCommand;
use commands::run::RunCommand;

#[derive(Parser)]
#[command(name = "marten", version, about = "Marten bytecode VM")]
struct Cli {
    /// Config file (defaults to the nearest marten.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bytecode module
    Run(RunCommand),
    /// Print a module's functions and instructions
    Disasm(DisasmCommand),
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(cmd) => {
            let config = config::load_config(cli.config.as_deref())?;
            cmd.run(&config)
        }
        Commands::Disasm(cmd) => {
            cmd.run()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
