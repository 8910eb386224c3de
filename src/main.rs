//! trace-diagram - headless network trace and schematic diagram export
//!
//! Traces a subnetwork or a start point on the configured trace service,
//! exports the resulting diagram and shows the traced features of a map
//! fixture.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Network trace and schematic diagram export
#[derive(Parser, Debug)]
#[command(name = "trace-diagram")]
#[command(about = "Trace utility networks and export schematic diagrams", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// List subnetworks available for tracing
    Candidates,
    /// Trace, build and export a diagram
    Generate(cli::GenerateArgs),
    /// Resolve the start point under a map position
    Pick(cli::PickArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: cli::ConfigSubcommand,
    },
    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = cli::init_logging(args.debug);
    if let Some(ref log_path) = log_file {
        eprintln!(
            "Debug logging enabled. Logs written to: {}",
            log_path.display()
        );
    }

    match args.command {
        Command::Candidates => cli::handle_candidates().await,
        Command::Generate(generate) => cli::handle_generate(generate).await,
        Command::Pick(pick) => cli::handle_pick(pick).await,
        Command::Config { subcommand } => cli::handle_config_command(subcommand),
        Command::Version => {
            cli::display_version();
            Ok(())
        }
    }
}
