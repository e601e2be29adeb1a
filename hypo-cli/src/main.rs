use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::ConfigFlags;

#[derive(Parser)]
#[command(name = "hypo", about = "Query experiment group assignments and report events")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    flags: ConfigFlags,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the group assignment for an experiment
    Assign(commands::assign::AssignArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Report an analytics event
    Event(commands::event::EventArgs),
    /// Show or replace the persisted user id
    User(commands::user::UserArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Assign(args) => commands::assign::run(args, &cli.flags).await,
        Commands::Config(args) => commands::config::run(args, &cli.flags),
        Commands::Event(args) => commands::event::run(args, &cli.flags).await,
        Commands::User(args) => commands::user::run(args, &cli.flags),
    }
}
