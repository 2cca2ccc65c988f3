use std::sync::Arc;

use rotas_core::types::{AdherenceStatus, PresenceFlag};
use rotas_graph::test_support::{healthy_workbook, test_config, Method, ScriptedTransport, ROWS_SUFFIX, TOKEN_SUFFIX};
use rotas_graph::{GraphClient, HttpFailure};
use rotas_sync::{Pipeline, SyncError, SyncOrchestrator};
use serde_json::{json, Value};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn row(number: u64, sector: &str, guests: &str, present: &str) -> Vec<Value> {
    vec![
        json!(number),
        json!(sector),
        json!("Ana"),
        json!("Bruno"),
        json!("Carla"),
        json!(guests),
        json!(present),
        json!("2025-03-10"),
        json!(""),
        json!("PENDENTE"),
    ]
}

fn orchestrator(transport: Arc<ScriptedTransport>) -> SyncOrchestrator {
    SyncOrchestrator::new(Arc::new(GraphClient::new(&test_config(), transport)))
}

fn xarope_workbook() -> ScriptedTransport {
    healthy_workbook(vec![
        row(1, "Xarope", "Envase, Utilidades", "SIM"),
        row(2, "Xarope", "Envase", "NÃO"),
        row(3, "Envase", "", "SIM"),
    ])
}

#[test]
fn xarope_rows_derive_status_from_presence() {
    init_logs();
    let sync = orchestrator(Arc::new(xarope_workbook()));

    let records = sync.pull_all();
    assert_eq!(records.len(), 3);

    let xarope = sync.by_sector("Xarope");
    assert_eq!(xarope.len(), 2);
    assert_eq!(xarope[0].all_present, PresenceFlag::Sim);
    assert_eq!(xarope[0].status, AdherenceStatus::Concluido);
    assert_eq!(xarope[1].all_present, PresenceFlag::Nao);
    assert_eq!(xarope[1].status, AdherenceStatus::Pendente);
}

#[test]
fn snapshot_queries_and_statistics() {
    let sync = orchestrator(Arc::new(xarope_workbook()));
    assert_eq!(sync.status().record_count, 0);
    assert!(sync.status().last_sync.is_none());

    sync.pull_all();

    let status = sync.status();
    assert_eq!(status.record_count, 3);
    assert!(status.last_sync.is_some());
    assert!(status.seconds_since_sync.unwrap_or(-1) >= 0);

    assert_eq!(sync.find_route("2").map(|r| r.sector), Some("Xarope".into()));
    assert!(sync.find_route("99").is_none());
    assert_eq!(sync.by_status(AdherenceStatus::Concluido).len(), 2);
    assert!(sync.by_sector("xarope").is_empty());

    let stats = sync.statistics();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completion_pct, 67);
    assert_eq!(stats.guest_sectors[0].sector, "Envase");
    assert_eq!(stats.guest_sectors[0].count, 2);
}

#[test]
fn token_timeout_returns_empty_and_keeps_previous_snapshot() {
    init_logs();
    let transport = Arc::new(xarope_workbook());
    let sync = orchestrator(transport.clone());
    sync.pull_all();
    let before = sync.snapshot();
    assert_eq!(before.records.len(), 3);

    // Force a fresh token request that times out.
    transport.set(
        Method::PostForm,
        TOKEN_SUFFIX,
        Err(HttpFailure::Transport("timed out".into())),
    );
    let client = GraphClient::new(&test_config(), transport.clone());
    let cold = SyncOrchestrator::new(Arc::new(client));
    assert!(cold.pull_all().is_empty());
    assert!(cold.snapshot().synced_at.is_none());

    // The warm orchestrator still has a cached token; break the rows call instead.
    transport.set(
        Method::Get,
        ROWS_SUFFIX,
        Err(HttpFailure::Transport("timed out".into())),
    );
    assert!(sync.pull_all().is_empty());
    assert_eq!(sync.snapshot(), before);
}

#[test]
fn pipeline_run_reports_graph_failure() {
    let transport = xarope_workbook();
    transport.set(Method::Get, "/sites?search=SST", Ok(json!({ "value": [] })));
    let pipeline = Pipeline::new(Arc::new(GraphClient::new(&test_config(), Arc::new(transport))));

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, SyncError::Graph(_)), "{err}");
    assert!(pipeline.orchestrator().snapshot().records.is_empty());
}

#[test]
fn pipeline_run_counts_rows() {
    let pipeline = Pipeline::new(Arc::new(GraphClient::new(
        &test_config(),
        Arc::new(xarope_workbook()),
    )));
    let report = pipeline.run().expect("run");
    assert_eq!(report.records, 3);
    assert_eq!(
        pipeline.orchestrator().snapshot().synced_at,
        Some(report.synced_at)
    );
}
