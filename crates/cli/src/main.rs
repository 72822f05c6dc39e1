use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing::Level;

mod commands;
mod config;

use commands::*;

/// auditwatch - health-and-audit analysis engine for application event streams
#[derive(Parser)]
#[command(name = "auditwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rule-driven analysis and alarming over a stream of operation events")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "auditwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the engine and feed it events from stdin until Ctrl-C
    Start,

    /// Validate a configuration file
    ValidateConfig,

    /// Inspect or reload the rules currently on disk
    Rules {
        #[command(subcommand)]
        action: RuleAction,
    },

    /// Inspect the analyzers storage would bring up
    Analyzers {
        #[command(subcommand)]
        action: AnalyzerAction,
    },
}

#[derive(Subcommand)]
enum RuleAction {
    /// List every rule definition
    List,

    /// Reload one program's rules from storage
    Reload {
        /// Application name the rules belong to
        program: String,
    },
}

#[derive(Subcommand)]
enum AnalyzerAction {
    /// List the analyzers storage currently names, and their state
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    match cli.command {
        Commands::Start => start_command(cli.config).await?,
        Commands::ValidateConfig => validate_config_command(cli.config).await?,
        Commands::Rules { action } => match action {
            RuleAction::List => rules_list_command(cli.config).await?,
            RuleAction::Reload { program } => rules_reload_command(cli.config, program).await?,
        },
        Commands::Analyzers { action } => match action {
            AnalyzerAction::List => analyzers_list_command(cli.config).await?,
        },
    }

    Ok(())
}

fn init_logging(verbose: bool, debug: bool) {
    let level = if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    println!("{}", style("auditwatch").bold().cyan());
}
