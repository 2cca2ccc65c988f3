//! Shared sync pipeline entrypoint used by CLI and daemon.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rotas_graph::{GraphClient, GraphConfig};

use crate::error::SyncError;
use crate::publish::AdherencePublisher;
use crate::pull::SyncOrchestrator;

/// Result of one pull run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub records: usize,
    pub synced_at: DateTime<Utc>,
}

/// One Graph client shared by the pull and push sides, so both reuse the
/// same cached token and resolved address.
pub struct Pipeline {
    client: Arc<GraphClient>,
    orchestrator: SyncOrchestrator,
    publisher: Arc<AdherencePublisher>,
}

impl Pipeline {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self {
            orchestrator: SyncOrchestrator::new(client.clone()),
            publisher: Arc::new(AdherencePublisher::new(client.clone())),
            client,
        }
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        Self::new(Arc::new(GraphClient::from_config(config)))
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    pub fn publisher(&self) -> Arc<AdherencePublisher> {
        self.publisher.clone()
    }

    /// Run one pull.
    ///
    /// This is the canonical sync entrypoint for both `rotas sync` and the
    /// daemon's periodic puller. On error the previous snapshot is kept.
    pub fn run(&self) -> Result<SyncReport, SyncError> {
        let records = self.orchestrator.try_pull()?;
        let synced_at = self
            .orchestrator
            .snapshot()
            .synced_at
            .unwrap_or_else(Utc::now);
        Ok(SyncReport {
            records: records.len(),
            synced_at,
        })
    }
}
