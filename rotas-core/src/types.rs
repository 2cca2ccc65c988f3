//! Domain types for inspection routes and their remote adherence rows.
//!
//! Routes are locally owned and serialized to the YAML registry; adherence
//! records mirror one row of the remote "Aderência" table.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Numeric identity of a locally scheduled route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteId(pub u64);

impl RouteId {
    /// Stable string key used as "N° ROTA" in the remote table.
    pub fn route_number(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for RouteId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl RouteStatus {
    pub fn all() -> &'static [RouteStatus] {
        &[
            RouteStatus::Pending,
            RouteStatus::Confirmed,
            RouteStatus::Completed,
            RouteStatus::Cancelled,
        ]
    }

    pub fn can_transition_to(self, next: RouteStatus) -> bool {
        matches!(
            (self, next),
            (RouteStatus::Pending, RouteStatus::Confirmed)
                | (RouteStatus::Pending, RouteStatus::Cancelled)
                | (RouteStatus::Confirmed, RouteStatus::Completed)
                | (RouteStatus::Confirmed, RouteStatus::Cancelled)
        )
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteStatus::Pending => write!(f, "pending"),
            RouteStatus::Confirmed => write!(f, "confirmed"),
            RouteStatus::Completed => write!(f, "completed"),
            RouteStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The "TODOS PRESENTES?" column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PresenceFlag {
    #[serde(rename = "SIM")]
    Sim,
    #[default]
    #[serde(rename = "NÃO")]
    Nao,
}

impl PresenceFlag {
    pub fn from_bool(all_present: bool) -> Self {
        if all_present {
            PresenceFlag::Sim
        } else {
            PresenceFlag::Nao
        }
    }

    pub fn is_yes(self) -> bool {
        self == PresenceFlag::Sim
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PresenceFlag::Sim => "SIM",
            PresenceFlag::Nao => "NÃO",
        }
    }

    /// Accepts the spreadsheet's loose spellings; anything unrecognised is `NÃO`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SIM" | "S" | "YES" | "Y" | "TRUE" | "1" | "X" => PresenceFlag::Sim,
            _ => PresenceFlag::Nao,
        }
    }
}

impl fmt::Display for PresenceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote row status. Always derived from [`PresenceFlag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdherenceStatus {
    #[serde(rename = "CONCLUÍDO")]
    Concluido,
    #[serde(rename = "PENDENTE")]
    Pendente,
}

impl AdherenceStatus {
    pub fn from_presence(flag: PresenceFlag) -> Self {
        if flag.is_yes() {
            AdherenceStatus::Concluido
        } else {
            AdherenceStatus::Pendente
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdherenceStatus::Concluido => "CONCLUÍDO",
            AdherenceStatus::Pendente => "PENDENTE",
        }
    }

    /// Parses the exact remote labels (the unaccented spelling is tolerated).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "CONCLUÍDO" | "CONCLUIDO" => Some(AdherenceStatus::Concluido),
            "PENDENTE" => Some(AdherenceStatus::Pendente),
            _ => None,
        }
    }
}

impl fmt::Display for AdherenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Operator submission for a new route, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RouteDraft {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub sector: String,
    pub safety_technician: String,
    pub maintenance_rep: String,
    pub production_rep: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guests: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub responsible: String,
    pub confirmed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub all_present: PresenceFlag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub reason: String,
}

/// A scheduled safety inspection of one factory sector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub date: String,
    pub time: String,
    pub sector: String,
    pub safety_technician: String,
    pub maintenance_rep: String,
    pub production_rep: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guests: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: RouteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<Cancellation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Remote rows
// ---------------------------------------------------------------------------

/// One row of the remote adherence table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdherenceRecord {
    pub route_number: String,
    pub sector: String,
    pub safety_technician: String,
    pub maintenance: String,
    pub production: String,
    #[serde(default)]
    pub guests: String,
    pub all_present: PresenceFlag,
    pub planned_date: String,
    #[serde(default)]
    pub actual_date: String,
    pub status: AdherenceStatus,
}

impl AdherenceRecord {
    /// Re-derive `status` from `all_present`.
    pub fn normalized(mut self) -> Self {
        self.status = AdherenceStatus::from_presence(self.all_present);
        self
    }
}

/// An adherence row that could not be pushed when its route was confirmed.
///
/// The route keeps its `confirmed` status; the entry is replayed by
/// `route retry` and dropped once the push succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPublish {
    pub route_id: RouteId,
    pub record: AdherenceRecord,
    pub error: String,
    pub failed_at: DateTime<Utc>,
    #[serde(default = "one")]
    pub attempts: u32,
}

fn one() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Registry root
// ---------------------------------------------------------------------------

/// Root of the YAML route registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRegistry {
    pub version: u32,
    pub next_id: u64,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_publishes: Vec<FailedPublish>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RouteRegistry {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: 1,
            next_id: 1,
            routes: Vec::new(),
            failed_publishes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Hand out the next route id. Ids are never reused.
    pub fn allocate_id(&mut self) -> RouteId {
        let id = RouteId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn get(&self, id: RouteId) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: RouteId) -> Option<&mut Route> {
        self.routes.iter_mut().find(|r| r.id == id)
    }

    pub fn with_status(&self, status: RouteStatus) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(move |r| r.status == status)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_number_is_decimal_id() {
        assert_eq!(RouteId(42).route_number(), "42");
        assert_eq!(RouteId::from(7).to_string(), "7");
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        for from in [RouteStatus::Completed, RouteStatus::Cancelled] {
            for to in RouteStatus::all() {
                assert!(!from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn presence_flag_serializes_with_accent() {
        let yaml = serde_yaml::to_string(&PresenceFlag::Nao).expect("serialize");
        assert_eq!(yaml.trim(), "NÃO");
        let flag: PresenceFlag = serde_yaml::from_str("SIM").expect("deserialize");
        assert_eq!(flag, PresenceFlag::Sim);
    }

    #[test]
    fn lenient_presence_parsing() {
        assert_eq!(PresenceFlag::parse_lenient(" sim "), PresenceFlag::Sim);
        assert_eq!(PresenceFlag::parse_lenient("TRUE"), PresenceFlag::Sim);
        assert_eq!(PresenceFlag::parse_lenient("NÃO"), PresenceFlag::Nao);
        assert_eq!(PresenceFlag::parse_lenient(""), PresenceFlag::Nao);
    }

    #[test]
    fn allocate_id_is_monotonic() {
        let mut reg = RouteRegistry::new(Utc::now());
        assert_eq!(reg.allocate_id(), RouteId(1));
        assert_eq!(reg.allocate_id(), RouteId(2));
        assert_eq!(reg.next_id, 3);
    }
}
