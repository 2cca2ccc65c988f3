//! Pull side: the whole remote adherence table into an in-memory snapshot.
//!
//! A pull either completes and swaps the snapshot in one write, or fails and
//! leaves the previous snapshot exactly as it was. Readers never observe a
//! half-applied pull.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rotas_core::types::{AdherenceRecord, AdherenceStatus};
use rotas_graph::GraphClient;

use crate::error::SyncError;
use crate::mapper;
use crate::stats::AdherenceStats;

/// Default interval between background pulls.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Last successful pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<AdherenceRecord>,
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub record_count: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub seconds_since_sync: Option<i64>,
}

pub struct SyncOrchestrator {
    client: Arc<GraphClient>,
    snapshot: RwLock<Snapshot>,
}

impl SyncOrchestrator {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self {
            client,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Pull every row. On failure: log, keep the previous snapshot, return
    /// an empty list.
    pub fn pull_all(&self) -> Vec<AdherenceRecord> {
        match self.try_pull() {
            Ok(records) => records,
            Err(err) => {
                tracing::error!("adherence pull failed, keeping previous snapshot: {err}");
                Vec::new()
            }
        }
    }

    /// [`pull_all`](Self::pull_all) with the failure reported to the caller.
    pub fn try_pull(&self) -> Result<Vec<AdherenceRecord>, SyncError> {
        let session = self.client.session()?;
        let rows = self.client.fetch_rows(&session)?;
        let records: Vec<AdherenceRecord> =
            rows.iter().map(|cells| mapper::from_remote_row(cells)).collect();

        let synced_at = Utc::now();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Snapshot {
            records: records.clone(),
            synced_at: Some(synced_at),
        };
        tracing::info!(
            "pulled {} adherence rows from table '{}'",
            records.len(),
            session.address.table_name
        );
        Ok(records)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> SyncStatus {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        SyncStatus {
            record_count: snapshot.records.len(),
            last_sync: snapshot.synced_at,
            seconds_since_sync: snapshot.synced_at.map(|t| (now - t).num_seconds()),
        }
    }

    pub fn find_route(&self, route_number: &str) -> Option<AdherenceRecord> {
        self.filtered(|r| r.route_number == route_number)
            .into_iter()
            .next()
    }

    /// Exact sector match.
    pub fn by_sector(&self, sector: &str) -> Vec<AdherenceRecord> {
        self.filtered(|r| r.sector == sector)
    }

    pub fn by_status(&self, status: AdherenceStatus) -> Vec<AdherenceRecord> {
        self.filtered(|r| r.status == status)
    }

    pub fn statistics(&self) -> AdherenceStats {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        AdherenceStats::compute(&snapshot.records)
    }

    fn filtered(&self, keep: impl Fn(&AdherenceRecord) -> bool) -> Vec<AdherenceRecord> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .iter()
            .filter(|r| keep(r))
            .cloned()
            .collect()
    }
}
