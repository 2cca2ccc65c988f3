//! Push side: append one adherence row per confirmation.

use std::sync::Arc;

use rotas_core::types::AdherenceRecord;
use rotas_graph::GraphClient;

use crate::error::SyncError;
use crate::mapper;

/// Where confirmed adherence records go. The route service only sees this.
pub trait AdherenceSink: Send + Sync {
    /// Append `record` remotely, returning the remote row id.
    ///
    /// Not idempotent: calling twice appends two rows.
    fn publish(&self, record: &AdherenceRecord) -> Result<String, SyncError>;
}

pub struct AdherencePublisher {
    client: Arc<GraphClient>,
}

impl AdherencePublisher {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }
}

impl AdherenceSink for AdherencePublisher {
    fn publish(&self, record: &AdherenceRecord) -> Result<String, SyncError> {
        mapper::validate(record)?;
        let record = record.clone().normalized();

        let session = self.client.session()?;
        let row = mapper::to_remote_row(&record);
        match self.client.add_row(&session, &row) {
            Ok(row_id) => {
                tracing::info!(
                    "published adherence row for route {} (row {row_id}, {})",
                    record.route_number,
                    record.status
                );
                Ok(row_id)
            }
            Err(failure) => {
                tracing::error!(
                    "adherence row for route {} was not appended: {failure}",
                    record.route_number
                );
                Err(SyncError::Publish(failure))
            }
        }
    }
}
