//! `rotas sync`: pull the remote adherence table once.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use rotas_core::types::AdherenceRecord;
use rotas_sync::Pipeline;

use super::graph_config;

/// Arguments for `rotas sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Emit the pulled records as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "route")]
    route: String,
    #[tabled(rename = "sector")]
    sector: String,
    #[tabled(rename = "technician")]
    technician: String,
    #[tabled(rename = "planned")]
    planned: String,
    #[tabled(rename = "all present")]
    all_present: String,
    #[tabled(rename = "status")]
    status: String,
}

impl From<&AdherenceRecord> for RecordRow {
    fn from(r: &AdherenceRecord) -> Self {
        Self {
            route: r.route_number.clone(),
            sector: r.sector.clone(),
            technician: r.safety_technician.clone(),
            planned: r.planned_date.clone(),
            all_present: r.all_present.to_string(),
            status: r.status.to_string(),
        }
    }
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let config = graph_config()?;
        let pipeline = Pipeline::from_config(&config);
        let report = pipeline.run().context("adherence pull failed")?;
        let snapshot = pipeline.orchestrator().snapshot();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot).context("failed to render records JSON")?
            );
            return Ok(());
        }

        println!(
            "✓ pulled {} adherence rows at {}",
            report.records,
            report.synced_at.format("%Y-%m-%d %H:%M:%S")
        );
        if !snapshot.records.is_empty() {
            let mut table = Table::new(snapshot.records.iter().map(RecordRow::from));
            table.with(Style::rounded());
            println!("{table}");
        }
        Ok(())
    }
}
