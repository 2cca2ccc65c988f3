//! State-machine properties across every route status.
//!
//! Each `#[case]` builds its own route, no shared state.

use chrono::{Duration, Utc};
use rotas_core::{
    lifecycle, AdherenceStatus, LifecycleError, PresenceFlag, Route, RouteDraft, RouteId,
    RouteStatus,
};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn draft(sector: &str) -> RouteDraft {
    RouteDraft {
        date: "2026-03-02".to_string(),
        time: "08:30".to_string(),
        sector: sector.to_string(),
        safety_technician: "João Silva".to_string(),
        maintenance_rep: "Carlos Souza".to_string(),
        production_rep: "Ana Lima".to_string(),
        guests: None,
        notes: Some("  ".to_string()),
    }
}

fn route_in(status: RouteStatus) -> Route {
    let now = Utc::now();
    let mut route = lifecycle::create(RouteId(9), draft("Envase"), now).expect("create");
    match status {
        RouteStatus::Pending => {}
        RouteStatus::Confirmed => {
            lifecycle::confirm(&mut route, "Maria", None, PresenceFlag::Sim, now).expect("confirm");
        }
        RouteStatus::Completed => {
            lifecycle::confirm(&mut route, "Maria", None, PresenceFlag::Sim, now).expect("confirm");
            lifecycle::complete(&mut route, None, now).expect("complete");
        }
        RouteStatus::Cancelled => {
            lifecycle::cancel(&mut route, "weather", now).expect("cancel");
        }
    }
    route
}

// ---------------------------------------------------------------------------
// 1. Terminal states reject everything and stay unchanged
// ---------------------------------------------------------------------------

#[rstest]
#[case(RouteStatus::Completed)]
#[case(RouteStatus::Cancelled)]
fn terminal_routes_reject_every_transition(#[case] status: RouteStatus) {
    let mut route = route_in(status);
    let before = route.clone();
    let now = Utc::now() + Duration::minutes(5);

    let confirm = lifecycle::confirm(&mut route, "Pedro", Some("late"), PresenceFlag::Sim, now);
    assert!(matches!(confirm, Err(LifecycleError::InvalidTransition { from, .. }) if from == status));
    assert_eq!(route, before);

    let complete = lifecycle::complete(&mut route, Some("again"), now);
    assert!(matches!(complete, Err(LifecycleError::InvalidTransition { .. })));
    assert_eq!(route, before);

    let cancel = lifecycle::cancel(&mut route, "too late", now);
    assert!(matches!(cancel, Err(LifecycleError::InvalidTransition { .. })));
    assert_eq!(route, before);
}

// ---------------------------------------------------------------------------
// 2. Cancellation
// ---------------------------------------------------------------------------

#[rstest]
#[case(RouteStatus::Pending)]
#[case(RouteStatus::Confirmed)]
fn cancel_with_notes_succeeds_from_open_states(#[case] status: RouteStatus) {
    let mut route = route_in(status);
    lifecycle::cancel(&mut route, "linha parada", Utc::now()).expect("cancel");
    assert_eq!(route.status, RouteStatus::Cancelled);
    assert_eq!(
        route.cancellation.as_ref().map(|c| c.reason.as_str()),
        Some("linha parada")
    );
}

#[rstest]
#[case(RouteStatus::Pending, "")]
#[case(RouteStatus::Confirmed, "\t ")]
fn cancel_without_notes_is_rejected(#[case] status: RouteStatus, #[case] notes: &str) {
    let mut route = route_in(status);
    let before = route.clone();
    let err = lifecycle::cancel(&mut route, notes, Utc::now()).unwrap_err();
    assert_eq!(err, LifecycleError::NotesRequired);
    assert_eq!(route, before);
}

// ---------------------------------------------------------------------------
// 3. Confirmation derives the adherence status
// ---------------------------------------------------------------------------

#[rstest]
#[case(PresenceFlag::Sim, AdherenceStatus::Concluido)]
#[case(PresenceFlag::Nao, AdherenceStatus::Pendente)]
fn confirm_derives_status_from_presence(
    #[case] flag: PresenceFlag,
    #[case] expected: AdherenceStatus,
) {
    let mut route = lifecycle::create(RouteId(3), draft("Xarope"), Utc::now()).expect("create");
    let record = lifecycle::confirm(&mut route, "Maria", None, flag, Utc::now()).expect("confirm");
    assert_eq!(record.sector, "Xarope");
    assert_eq!(record.all_present, flag);
    assert_eq!(record.status, expected);
}

#[test]
fn confirm_stamps_metadata_and_keeps_audit_order() {
    let created = Utc::now();
    let mut route = lifecycle::create(RouteId(4), draft("Caldeira"), created).expect("create");
    assert!(route.notes.is_none(), "blank notes are dropped");

    // A clock that runs backwards must not make updated_at precede created_at.
    let skewed = created - Duration::hours(1);
    lifecycle::confirm(&mut route, " Maria ", Some("ok"), PresenceFlag::Sim, skewed)
        .expect("confirm");
    let confirmation = route.confirmation.as_ref().expect("confirmation");
    assert_eq!(confirmation.responsible, "Maria");
    assert_eq!(confirmation.notes.as_deref(), Some("ok"));
    assert!(route.updated_at >= route.created_at);
}

#[test]
fn confirm_requires_responsible_party() {
    let mut route = route_in(RouteStatus::Pending);
    let err = lifecycle::confirm(&mut route, "", None, PresenceFlag::Sim, Utc::now()).unwrap_err();
    assert_eq!(err, LifecycleError::Validation { field: "responsible" });
    assert_eq!(route.status, RouteStatus::Pending);
    assert!(lifecycle::adherence_record(&route).is_none());
}
