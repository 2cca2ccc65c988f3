//! `rotas resolve`: check configuration against the live workbook.

use anyhow::{Context, Result};
use clap::Args;

use rotas_graph::GraphClient;

use super::graph_config;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Emit the resolved identifiers as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ResolveArgs {
    pub fn run(self) -> Result<()> {
        let config = graph_config()?;
        let client = GraphClient::from_config(&config);
        let session = client
            .session()
            .context("could not reach the adherence table")?;
        let address = &session.address;

        if self.json {
            let payload = serde_json::json!({
                "site_id": address.site_id,
                "drive_id": address.drive_id,
                "item_id": address.item_id,
                "worksheet_id": address.worksheet_id,
                "table_id": address.table_id,
                "table_name": address.table_name,
                "token_expires_at": session.token.expires_at,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to render JSON")?
            );
            return Ok(());
        }

        println!("✓ token valid until {}", session.token.expires_at.format("%H:%M:%S"));
        println!("✓ site       {} ({})", config.site_name, address.site_id);
        println!("✓ drive      {}", address.drive_id);
        println!("✓ file       {} ({})", config.file_path, address.item_id);
        println!("✓ worksheet  {}", address.worksheet_id);
        println!("✓ table      {} ({})", address.table_name, address.table_id);
        Ok(())
    }
}
