//! Positional mapping between [`AdherenceRecord`] and the 10-column table row.
//!
//! | # | Column            | Field               |
//! |---|-------------------|---------------------|
//! | 0 | N° ROTA           | `route_number`      |
//! | 1 | SETOR             | `sector`            |
//! | 2 | TÉCNICO SST       | `safety_technician` |
//! | 3 | MANUTENÇÃO        | `maintenance`       |
//! | 4 | PRODUÇÃO          | `production`        |
//! | 5 | CONVIDADOS        | `guests`            |
//! | 6 | TODOS PRESENTES?  | `all_present`       |
//! | 7 | DATA PLANEJADA    | `planned_date`      |
//! | 8 | DATA REALIZADA    | `actual_date`       |
//! | 9 | STATUS            | `status`            |

use serde_json::Value;

use rotas_core::types::{AdherenceRecord, AdherenceStatus, PresenceFlag};

use crate::error::SyncError;

pub const COLUMN_COUNT: usize = 10;

pub const COLUMNS: [&str; COLUMN_COUNT] = [
    "N° ROTA",
    "SETOR",
    "TÉCNICO SST",
    "MANUTENÇÃO",
    "PRODUÇÃO",
    "CONVIDADOS",
    "TODOS PRESENTES?",
    "DATA PLANEJADA",
    "DATA REALIZADA",
    "STATUS",
];

/// The status column is never trusted: it always follows the presence flag.
pub fn derive_status(flag: PresenceFlag) -> AdherenceStatus {
    AdherenceStatus::from_presence(flag)
}

/// Record → row, in table column order. Status is recomputed.
pub fn to_remote_row(record: &AdherenceRecord) -> [String; COLUMN_COUNT] {
    [
        record.route_number.clone(),
        record.sector.clone(),
        record.safety_technician.clone(),
        record.maintenance.clone(),
        record.production.clone(),
        record.guests.clone(),
        record.all_present.as_str().to_string(),
        record.planned_date.clone(),
        record.actual_date.clone(),
        derive_status(record.all_present).as_str().to_string(),
    ]
}

/// Row → record. Short rows are padded with empty cells; extra cells are
/// ignored. The stored status cell is discarded in favour of the flag.
pub fn from_remote_row(cells: &[Value]) -> AdherenceRecord {
    let cell = |i: usize| cells.get(i).map(cell_text).unwrap_or_default();
    let all_present = PresenceFlag::parse_lenient(&cell(6));
    AdherenceRecord {
        route_number: cell(0),
        sector: cell(1),
        safety_technician: cell(2),
        maintenance: cell(3),
        production: cell(4),
        guests: cell(5),
        all_present,
        planned_date: cell(7),
        actual_date: cell(8),
        status: derive_status(all_present),
    }
}

/// Mandatory fields, checked in order: route number, sector, technician,
/// planned date. The first blank one is reported.
pub fn validate(record: &AdherenceRecord) -> Result<(), SyncError> {
    let required = [
        ("route_number", &record.route_number),
        ("sector", &record.sector),
        ("safety_technician", &record.safety_technician),
        ("planned_date", &record.planned_date),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(SyncError::Validation { field });
        }
    }
    Ok(())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
