use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use rotas_core::registry;
use rotas_core::types::AdherenceStatus;
use rotas_sync::{Pipeline, SyncReport};

use crate::config::{DaemonConfig, ENV_LOG_FORMAT};
use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Outcome counters for the pull loop, shared by the processor and `status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncHistory {
    pub runs: u64,
    pub failures: u64,
    /// Unix seconds of the last successful pull (0 before the first one).
    pub last_sync_at_unix: u64,
    pub last_error: Option<String>,
}

struct SyncJob {
    source: &'static str,
    respond_to: oneshot::Sender<Result<SyncSummary, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub source: String,
    pub records: usize,
    pub synced_at: DateTime<Utc>,
    pub duration_ms: u128,
}

/// Everything a socket client handler needs.
#[derive(Clone)]
struct DaemonState {
    home: PathBuf,
    pipeline: Arc<Pipeline>,
    history: Arc<RwLock<SyncHistory>>,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    interval: Duration,
    started_at_unix: u64,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path, config: DaemonConfig) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let pipeline = Arc::new(Pipeline::from_config(&config.graph));
    runtime.block_on(run(home.to_path_buf(), pipeline, config.interval))
}

/// Run the daemon runtime: periodic puller, sync processor, socket server
/// and ctrl-c handler. Returns once any of them asks for shutdown.
pub async fn run(
    home: PathBuf,
    pipeline: Arc<Pipeline>,
    interval: Duration,
) -> Result<(), DaemonError> {
    registry::rotas_dir_at(&home)?;

    let history = Arc::new(RwLock::new(SyncHistory::default()));
    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let state = DaemonState {
        home: home.clone(),
        pipeline: pipeline.clone(),
        history: history.clone(),
        sync_tx: sync_tx.clone(),
        shutdown_tx: shutdown_tx.clone(),
        interval,
        started_at_unix: unix_seconds_now(),
    };
    tracing::info!(
        interval_secs = interval.as_secs(),
        socket = %socket_path(&home).display(),
        "rotas daemon starting",
    );

    let puller_handle = {
        let shutdown = shutdown_tx.clone();
        let sync_tx = sync_tx.clone();
        tokio::spawn(async move {
            let result = puller_task(interval, sync_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result =
                sync_processor_task(pipeline, history, sync_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = socket_server_task(state, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (puller_result, processor_result, socket_result, signal_result) =
        tokio::join!(puller_handle, processor_handle, socket_handle, signal_handle);

    handle_join("puller", puller_result)?;
    handle_join("sync_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Pull once immediately, then every `interval`.
async fn puller_task(
    interval: Duration,
    sync_tx: mpsc::Sender<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                match enqueue_sync(&sync_tx, "timer").await {
                    Ok(summary) => {
                        tracing::info!(
                            records = summary.records,
                            duration_ms = summary.duration_ms,
                            "periodic pull completed",
                        );
                    }
                    Err(DaemonError::ChannelClosed(_)) => break,
                    Err(err) => {
                        // The snapshot is untouched; the next tick tries again.
                        tracing::error!(error = %err, "periodic pull failed");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Single consumer of the job queue, so pulls never overlap.
async fn sync_processor_task(
    pipeline: Arc<Pipeline>,
    history: Arc<RwLock<SyncHistory>>,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();

                let pipeline = pipeline.clone();
                let sync_result = tokio::task::spawn_blocking(move || pipeline.run())
                    .await
                    .map_err(|err| DaemonError::Protocol(format!("sync task join error: {err}")))?;

                let outcome = record_outcome(&history, sync_result).await.map(|report| {
                    build_sync_summary(job.source, report, started.elapsed())
                });
                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn record_outcome(
    history: &RwLock<SyncHistory>,
    result: Result<SyncReport, rotas_sync::SyncError>,
) -> Result<SyncReport, String> {
    let mut history = history.write().await;
    history.runs += 1;
    match result {
        Ok(report) => {
            history.last_sync_at_unix = u64::try_from(report.synced_at.timestamp()).unwrap_or(0);
            history.last_error = None;
            Ok(report)
        }
        Err(err) => {
            let message = err.to_string();
            history.failures += 1;
            history.last_error = Some(message.clone());
            Err(message)
        }
    }
}

async fn socket_server_task(
    state: DaemonState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&state.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(stream: UnixStream, state: DaemonState) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = dispatch(&state, &request).await;
        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

/// Answer one request. Query commands read the snapshot only; `sync` goes
/// through the job queue like the periodic puller.
async fn dispatch(state: &DaemonState, request: &DaemonRequest) -> DaemonResponse {
    let orchestrator = state.pipeline.orchestrator();
    match request.cmd.as_str() {
        "status" => DaemonResponse::ok(build_status_payload(state).await),
        "sync" => match enqueue_sync(&state.sync_tx, "socket").await {
            Ok(summary) => DaemonResponse::ok(json!(summary)),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        "data" => {
            let snapshot = orchestrator.snapshot();
            DaemonResponse::ok(json!({
                "total": snapshot.records.len(),
                "synced_at": snapshot.synced_at,
                "records": snapshot.records,
            }))
        }
        "stats" => DaemonResponse::ok(json!(orchestrator.statistics())),
        "find" => match request.arg.as_deref() {
            Some(number) => {
                let record = orchestrator.find_route(number);
                DaemonResponse::ok(json!({ "found": record.is_some(), "record": record }))
            }
            None => DaemonResponse::error("find requires a route number"),
        },
        "sector" => match request.arg.as_deref() {
            Some(sector) => {
                let records = orchestrator.by_sector(sector);
                DaemonResponse::ok(json!({ "total": records.len(), "records": records }))
            }
            None => DaemonResponse::error("sector requires a sector name"),
        },
        "status_filter" => match request.arg.as_deref().and_then(AdherenceStatus::parse) {
            Some(status) => {
                let records = orchestrator.by_status(status);
                DaemonResponse::ok(json!({ "total": records.len(), "records": records }))
            }
            None => DaemonResponse::error("status_filter requires CONCLUÍDO or PENDENTE"),
        },
        "stop" => {
            let _ = state.shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

async fn build_status_payload(state: &DaemonState) -> Value {
    let history = state.history.read().await.clone();
    let sync = state.pipeline.orchestrator().status();

    json!({
        "running": true,
        "started_at_unix": state.started_at_unix,
        "last_sync_at_unix": history.last_sync_at_unix,
        "seconds_since_sync": sync.seconds_since_sync,
        "record_count": sync.record_count,
        "sync_runs": history.runs,
        "sync_failures": history.failures,
        "last_error": history.last_error,
        "interval_secs": state.interval.as_secs(),
        "socket": socket_path(&state.home).display().to_string(),
    })
}

async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    source: &'static str,
) -> Result<SyncSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Protocol)
}

fn build_sync_summary(source: &'static str, report: SyncReport, duration: Duration) -> SyncSummary {
    SyncSummary {
        source: source.to_string(),
        records: report.records,
        synced_at: report.synced_at,
        duration_ms: duration.as_millis(),
    }
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// `ROTAS_LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let json = std::env::var(ENV_LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
