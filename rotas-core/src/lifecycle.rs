//! Route state machine.
//!
//! ```text
//! pending ──confirm──▶ confirmed ──complete──▶ completed
//!    │                     │
//!    └──────cancel─────────┴──────cancel─────▶ cancelled
//! ```
//!
//! Every function here is pure over a `&mut Route`: on `Err` the route is left
//! exactly as it was. Persistence, locking, publishing and notifications live
//! in the route service of `rotas-sync`.

use chrono::{DateTime, Utc};

use crate::error::LifecycleError;
use crate::types::{
    AdherenceRecord, AdherenceStatus, Cancellation, Completion, Confirmation, PresenceFlag, Route,
    RouteDraft, RouteId, RouteStatus,
};

/// Build a new `pending` route from an operator submission.
pub fn create(id: RouteId, draft: RouteDraft, now: DateTime<Utc>) -> Result<Route, LifecycleError> {
    validate_draft(&draft)?;
    Ok(Route {
        id,
        date: draft.date.trim().to_string(),
        time: draft.time.trim().to_string(),
        sector: draft.sector.trim().to_string(),
        safety_technician: draft.safety_technician.trim().to_string(),
        maintenance_rep: draft.maintenance_rep.trim().to_string(),
        production_rep: draft.production_rep.trim().to_string(),
        guests: non_blank(draft.guests.as_deref()),
        notes: non_blank(draft.notes.as_deref()),
        status: RouteStatus::Pending,
        confirmation: None,
        completion: None,
        cancellation: None,
        created_at: now,
        updated_at: now,
    })
}

/// Field checks in submission order; the first failing field is reported.
pub fn validate_draft(draft: &RouteDraft) -> Result<(), LifecycleError> {
    if !is_iso_date(draft.date.trim()) {
        return Err(LifecycleError::Validation { field: "date" });
    }
    if !is_clock_time(draft.time.trim()) {
        return Err(LifecycleError::Validation { field: "time" });
    }
    let required = [
        ("sector", &draft.sector),
        ("safety_technician", &draft.safety_technician),
        ("maintenance_rep", &draft.maintenance_rep),
        ("production_rep", &draft.production_rep),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(LifecycleError::Validation { field });
        }
    }
    Ok(())
}

/// Reject `from -> to` unless the transition table allows it.
pub fn check_transition(from: RouteStatus, to: RouteStatus) -> Result<(), LifecycleError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition { from, to })
    }
}

/// `pending -> confirmed`.
///
/// Returns the adherence record to publish for this confirmation. It is the
/// only place such a record is produced, so a route yields at most one.
pub fn confirm(
    route: &mut Route,
    responsible: &str,
    notes: Option<&str>,
    all_present: PresenceFlag,
    now: DateTime<Utc>,
) -> Result<AdherenceRecord, LifecycleError> {
    check_transition(route.status, RouteStatus::Confirmed)?;
    if responsible.trim().is_empty() {
        return Err(LifecycleError::Validation {
            field: "responsible",
        });
    }

    route.status = RouteStatus::Confirmed;
    route.confirmation = Some(Confirmation {
        responsible: responsible.trim().to_string(),
        confirmed_at: now,
        notes: non_blank(notes),
        all_present,
    });
    touch(route, now);

    adherence_record(route).ok_or(LifecycleError::InvalidTransition {
        from: RouteStatus::Pending,
        to: RouteStatus::Confirmed,
    })
}

/// `confirmed -> completed`.
pub fn complete(
    route: &mut Route,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    check_transition(route.status, RouteStatus::Completed)?;
    route.status = RouteStatus::Completed;
    route.completion = Some(Completion {
        completed_at: now,
        notes: non_blank(notes),
    });
    touch(route, now);
    Ok(())
}

/// `pending | confirmed -> cancelled`. Notes are mandatory.
pub fn cancel(route: &mut Route, notes: &str, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    check_transition(route.status, RouteStatus::Cancelled)?;
    if notes.trim().is_empty() {
        return Err(LifecycleError::NotesRequired);
    }
    route.status = RouteStatus::Cancelled;
    route.cancellation = Some(Cancellation {
        cancelled_at: now,
        reason: notes.trim().to_string(),
    });
    touch(route, now);
    Ok(())
}

/// Derive the remote row for a confirmed route. `None` before confirmation.
pub fn adherence_record(route: &Route) -> Option<AdherenceRecord> {
    let confirmation = route.confirmation.as_ref()?;
    Some(AdherenceRecord {
        route_number: route.id.route_number(),
        sector: route.sector.clone(),
        safety_technician: route.safety_technician.clone(),
        maintenance: route.maintenance_rep.clone(),
        production: route.production_rep.clone(),
        guests: route.guests.clone().unwrap_or_default(),
        all_present: confirmation.all_present,
        planned_date: route.date.clone(),
        actual_date: confirmation.confirmed_at.format("%Y-%m-%d").to_string(),
        status: AdherenceStatus::from_presence(confirmation.all_present),
    })
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

// updated_at never moves backwards, even if the caller's clock does.
fn touch(route: &mut Route, now: DateTime<Utc>) {
    route.updated_at = now.max(route.updated_at);
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_iso_date(value: &str) -> bool {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() && value.len() == 10
}

fn is_clock_time(value: &str) -> bool {
    chrono::NaiveTime::parse_from_str(value, "%H:%M").is_ok() && value.len() == 5
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
