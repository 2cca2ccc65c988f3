//! Registry error-message, atomic-write-safety, and persistence integration tests.

use assert_fs::prelude::*;
use chrono::Utc;
use predicates::prelude::predicate;
use rotas_core::{lifecycle, registry, RegistryError, RouteDraft, RouteRegistry, RouteStatus};
use std::fs;

fn draft() -> RouteDraft {
    RouteDraft {
        date: "2026-01-15".to_string(),
        time: "14:00".to_string(),
        sector: "Xarope".to_string(),
        safety_technician: "João Silva".to_string(),
        maintenance_rep: "Carlos".to_string(),
        production_rep: "Ana".to_string(),
        guests: Some("Qualidade".to_string()),
        notes: None,
    }
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".rotas");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("routes.yaml"), b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = registry::load_at(home.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("routes.yaml"), "must contain file path, got: {err}");
}

#[test]
fn load_wrong_type_yaml_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".rotas/routes.yaml")
        .write_str("- this is a list, not a mapping\n")
        .expect("write");

    let err = registry::load_at(home.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::save_at(home.path(), &RouteRegistry::new(Utc::now())).expect("save");

    let yaml_path = registry::registry_path_at(home.path());
    let original_bytes = fs::read(&yaml_path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = yaml_path.with_file_name("routes.yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    assert_eq!(original_bytes, fs::read(&yaml_path).expect("read after crash"));
    assert!(registry::load_at(home.path()).is_ok(), "registry still loads");
}

// ---------------------------------------------------------------------------
// 3. Persistence of lifecycle state
// ---------------------------------------------------------------------------

#[test]
fn routes_and_counter_survive_save_and_load() {
    let home = assert_fs::TempDir::new().expect("home tempdir");
    let mut reg = registry::load_at(home.path()).expect("load empty");

    let id = reg.allocate_id();
    let mut route = lifecycle::create(id, draft(), Utc::now()).expect("create");
    lifecycle::cancel(&mut route, "chuva", Utc::now()).expect("cancel");
    reg.routes.push(route);
    registry::save_at(home.path(), &reg).expect("save");

    home.child(".rotas/routes.yaml").assert(predicate::path::exists());
    home.child(".rotas/routes.yaml")
        .assert(predicate::str::contains("status: cancelled"));

    let loaded = registry::load_at(home.path()).expect("reload");
    assert_eq!(loaded.next_id, 2);
    let route = loaded.get(id).expect("route persisted");
    assert_eq!(route.status, RouteStatus::Cancelled);
    assert_eq!(route.cancellation.as_ref().map(|c| c.reason.as_str()), Some("chuva"));
    assert_eq!(loaded.with_status(RouteStatus::Cancelled).count(), 1);
}
