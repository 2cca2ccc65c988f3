//! `rotas`: safety-inspection routes and the SharePoint adherence table.
//!
//! # Usage
//!
//! ```text
//! rotas route create --date 2025-03-10 --time 08:30 --sector Xarope --technician ... \
//!     --maintenance ... --production ... [--guests "Envase, Utilidades"] [--notes ...]
//! rotas route list [--status pending|confirmed|completed|cancelled] [--json]
//! rotas route show <id> [--json]
//! rotas route confirm <id> --responsible <name> [--all-present] [--notes ...]
//! rotas route complete <id> [--notes ...]
//! rotas route cancel <id> --notes <reason>
//! rotas route retry
//! rotas sync [--json]
//! rotas stats [--json]
//! rotas resolve
//! rotas daemon start|stop|status|sync
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, resolve::ResolveArgs, route::RouteCommand, stats::StatsArgs,
    sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "rotas",
    version,
    about = "Schedule safety-inspection routes and sync the adherence workbook",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create and move routes through their lifecycle.
    Route {
        #[command(subcommand)]
        command: RouteCommand,
    },

    /// Pull the remote adherence table once.
    Sync(SyncArgs),

    /// Adherence statistics (from the daemon when running, else a fresh pull).
    Stats(StatsArgs),

    /// Walk the site → drive → file → worksheet → table chain and report.
    Resolve(ResolveArgs),

    /// Manage the background puller.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    match cli.command {
        Commands::Route { command } => {
            init_tracing();
            commands::route::run(command)
        }
        Commands::Sync(args) => {
            init_tracing();
            args.run()
        }
        Commands::Stats(args) => {
            init_tracing();
            args.run()
        }
        Commands::Resolve(args) => {
            init_tracing();
            args.run()
        }
        // `daemon start` installs its own subscriber.
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}

/// Library logs go to stderr so `--json` output stays clean.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
