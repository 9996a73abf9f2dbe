//! Spine: inspect and drive a Knowledge Spine from the shell.
//!
//! # Usage
//!
//! ```text
//! spine init [--store <dir>] [--max-chain-depth <n>] [--force]
//! spine project create <name> --mission <text>
//! spine project list [--json]
//! spine project status <project> [--json]
//! spine project set-status <project> <active|paused|completed>
//! spine handoffs <project> [--json]
//! spine decisions <project> [--json]
//! spine log <project> [--json]
//! spine agents [--json]
//! spine route --instruction <text> [--output-type <type>] [--agent <name>] [--json]
//! spine search <query> [--project <project>] [--json]
//! ```
//!
//! `<project>` is a project id or an unambiguous project name.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    agents::AgentsArgs,
    history::{DecisionsArgs, HandoffsArgs, LogArgs},
    init::InitArgs,
    project::ProjectCommand,
    route::RouteArgs,
    search::SearchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "spine",
    version,
    about = "Inspect the Knowledge Spine shared by a team of agents",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.spine/config.yaml and create the record store.
    Init(InitArgs),

    /// Create, list and inspect projects.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// List a project's handoffs in the order they were recorded.
    Handoffs(HandoffsArgs),

    /// List a project's decisions.
    Decisions(DecisionsArgs),

    /// Print a project's continuity log.
    Log(LogArgs),

    /// List registered agent contracts.
    Agents(AgentsArgs),

    /// Explain which agent a task would be routed to, without running it.
    Route(RouteArgs),

    /// Search artifact content.
    Search(SearchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Project { command } => commands::project::run(command),
        Commands::Handoffs(args) => args.run(),
        Commands::Decisions(args) => args.run(),
        Commands::Log(args) => args.run(),
        Commands::Agents(args) => args.run(),
        Commands::Route(args) => args.run(),
        Commands::Search(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
