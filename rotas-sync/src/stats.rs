//! Aggregate adherence statistics over a pulled snapshot.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use rotas_core::types::{AdherenceRecord, AdherenceStatus};

/// Separator used in the "CONVIDADOS" cell.
pub const GUEST_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorCount {
    pub sector: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AdherenceStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Rounded to the nearest whole percent; 0 for an empty snapshot.
    pub completion_pct: u32,
    pub sectors_inspected: usize,
    /// How often each sector appeared as a guest, most frequent first.
    pub guest_sectors: Vec<SectorCount>,
}

impl AdherenceStats {
    pub fn compute(records: &[AdherenceRecord]) -> Self {
        let total = records.len();
        let completed = records
            .iter()
            .filter(|r| r.status == AdherenceStatus::Concluido)
            .count();
        let pending = records
            .iter()
            .filter(|r| r.status == AdherenceStatus::Pendente)
            .count();
        let completion_pct = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };

        let sectors: BTreeSet<&str> = records.iter().map(|r| r.sector.as_str()).collect();

        let mut guests: HashMap<&str, usize> = HashMap::new();
        for record in records.iter().filter(|r| !r.guests.is_empty()) {
            for sector in record.guests.split(GUEST_SEPARATOR) {
                let sector = sector.trim();
                if !sector.is_empty() {
                    *guests.entry(sector).or_default() += 1;
                }
            }
        }
        let mut guest_sectors: Vec<SectorCount> = guests
            .into_iter()
            .map(|(sector, count)| SectorCount {
                sector: sector.to_string(),
                count,
            })
            .collect();
        guest_sectors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.sector.cmp(&b.sector)));

        Self {
            total,
            completed,
            pending,
            completion_pct,
            sectors_inspected: sectors.len(),
            guest_sectors,
        }
    }
}
