//! `rotas stats`: adherence statistics.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use rotas_daemon::{request, DaemonError, DaemonRequest};
use rotas_sync::{AdherenceStats, Pipeline};

use super::{graph_config, home};

#[derive(Tabled)]
struct GuestRow {
    #[tabled(rename = "guest sector")]
    sector: String,
    #[tabled(rename = "routes")]
    count: usize,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatsArgs {
    pub fn run(self) -> Result<()> {
        let stats = load_stats()?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("failed to render stats JSON")?
            );
            return Ok(());
        }

        let pct = format!("{}%", stats.completion_pct);
        let pct = if stats.completion_pct >= 80 {
            pct.green()
        } else if stats.completion_pct >= 50 {
            pct.yellow()
        } else {
            pct.red()
        };
        println!("Routes:            {}", stats.total);
        println!("Completed:         {}", stats.completed);
        println!("Pending:           {}", stats.pending);
        println!("Completion:        {pct}");
        println!("Sectors inspected: {}", stats.sectors_inspected);
        if !stats.guest_sectors.is_empty() {
            let mut table = Table::new(stats.guest_sectors.iter().map(|g| GuestRow {
                sector: g.sector.clone(),
                count: g.count,
            }));
            table.with(Style::rounded());
            println!("\nGuest sectors\n{table}");
        }
        Ok(())
    }
}

/// Ask the daemon for its snapshot's statistics; pull directly when it is
/// not running.
fn load_stats() -> Result<AdherenceStats> {
    let home = home()?;
    match request(&home, &DaemonRequest::new("stats")) {
        Ok(payload) => {
            serde_json::from_value(payload).context("daemon returned malformed statistics")
        }
        Err(DaemonError::DaemonNotRunning { .. }) => {
            let pipeline = Pipeline::from_config(&graph_config()?);
            pipeline.run().context("adherence pull failed")?;
            Ok(pipeline.orchestrator().statistics())
        }
        Err(err) => Err(err).context("failed to query daemon statistics"),
    }
}
