use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rotas_daemon::{
    request, request_status, request_stop, request_sync, DaemonError, DaemonRequest,
};
use rotas_graph::test_support::{healthy_workbook, test_config};
use rotas_graph::GraphClient;
use rotas_sync::Pipeline;
use serde_json::{json, Value};
use tempfile::TempDir;

fn row(number: u64, sector: &str, present: &str) -> Vec<Value> {
    vec![
        json!(number),
        json!(sector),
        json!("Ana"),
        json!("Bruno"),
        json!("Carla"),
        json!(""),
        json!(present),
        json!("2025-03-10"),
        json!(""),
        json!(""),
    ]
}

async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    tokio::task::spawn_blocking(f).await.expect("join")
}

async fn wait_for_first_pull(home: PathBuf) -> Value {
    for _ in 0..50 {
        let home = home.clone();
        if let Ok(status) = blocking(move || request_status(&home)).await {
            if status["sync_runs"].as_u64().unwrap_or(0) >= 1 {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("daemon never completed its first pull");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn daemon_pulls_on_start_answers_queries_and_stops() {
    let home = TempDir::new().expect("home");
    let transport = healthy_workbook(vec![row(1, "Xarope", "SIM"), row(2, "Envase", "NÃO")]);
    let client = GraphClient::new(&test_config(), Arc::new(transport));
    let pipeline = Arc::new(Pipeline::new(Arc::new(client)));

    let daemon = tokio::spawn(rotas_daemon::run(
        home.path().to_path_buf(),
        pipeline,
        Duration::from_secs(3600),
    ));

    let status = wait_for_first_pull(home.path().to_path_buf()).await;
    assert_eq!(status["record_count"], json!(2));
    assert_eq!(status["sync_failures"], json!(0));

    let h = home.path().to_path_buf();
    let summary = blocking(move || request_sync(&h)).await.expect("sync");
    assert_eq!(summary["records"], json!(2));
    assert_eq!(summary["source"], json!("socket"));

    let h = home.path().to_path_buf();
    let envase = blocking(move || request(&h, &DaemonRequest::with_arg("sector", "Envase")))
        .await
        .expect("sector");
    assert_eq!(envase["total"], json!(1));
    assert_eq!(envase["records"][0]["status"], json!("PENDENTE"));

    let h = home.path().to_path_buf();
    let err = blocking(move || request(&h, &DaemonRequest::new("bogus")))
        .await
        .unwrap_err();
    assert!(matches!(err, DaemonError::Protocol(_)));

    let h = home.path().to_path_buf();
    blocking(move || request_stop(&h)).await.expect("stop");
    tokio::time::timeout(Duration::from_secs(5), daemon)
        .await
        .expect("daemon exits")
        .expect("join")
        .expect("clean shutdown");

    assert!(!home.path().join(".rotas").join("daemon.sock").exists());
}

#[test]
fn client_reports_not_running_without_socket() {
    let home = TempDir::new().expect("home");
    let err = request_sync(home.path()).unwrap_err();
    assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
}
