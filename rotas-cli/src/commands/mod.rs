pub mod daemon;
pub mod resolve;
pub mod route;
pub mod stats;
pub mod sync;

use anyhow::{Context, Result};
use rotas_graph::GraphConfig;

/// Graph settings from the environment (after `.env`), with a pointer to
/// what is missing.
pub fn graph_config() -> Result<GraphConfig> {
    GraphConfig::from_env().context("SharePoint access is not configured")
}

pub fn home() -> Result<std::path::PathBuf> {
    rotas_core::registry::home().context("could not determine home directory")
}
