use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use tempfile::TempDir;

fn rotas_bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rotas"))
}

/// Settings pointing every Graph call at a closed local port, so pulls fail
/// fast without touching the network.
fn unreachable_graph(cmd: &mut Command, home: &Path) {
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .current_dir(home)
        .env("ROTAS_TENANT_ID", "tenant")
        .env("ROTAS_CLIENT_ID", "client")
        .env("ROTAS_CLIENT_SECRET", "secret")
        .env("ROTAS_SITE_NAME", "SST")
        .env("ROTAS_FILE_PATH", "/General/ROTAS/Gestão SST.xlsm")
        .env("ROTAS_GRAPH_BASE", "http://127.0.0.1:9/v1.0")
        .env("ROTAS_LOGIN_BASE", "http://127.0.0.1:9");
}

struct DaemonProcess {
    child: Child,
    binary: PathBuf,
    home: PathBuf,
}

impl DaemonProcess {
    fn start(binary: PathBuf, home: PathBuf) -> Self {
        let mut cmd = Command::new(&binary);
        unreachable_graph(&mut cmd, &home);
        let child = cmd
            .args(["daemon", "start"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");

        Self {
            child,
            binary,
            home,
        }
    }

    fn stop(&mut self) {
        let _ = Command::new(&self.binary)
            .env("HOME", &self.home)
            .env("USERPROFILE", &self.home)
            .args(["daemon", "stop"])
            .status();

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            sleep(Duration::from_millis(50));
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

fn daemon_status(binary: &Path, home: &Path) -> Option<serde_json::Value> {
    let output = Command::new(binary)
        .env("HOME", home)
        .env("USERPROFILE", home)
        .args(["daemon", "status"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    serde_json::from_slice(&output.stdout).ok()
}

#[test]
fn status_reports_not_running_without_daemon() {
    let home = TempDir::new().expect("home");
    let status = daemon_status(&rotas_bin_path(), home.path()).expect("status output");
    assert_eq!(status["running"], serde_json::Value::Bool(false));
}

#[test]
fn daemon_survives_failing_pulls_and_stops_on_request() {
    let home = TempDir::new().expect("home");
    let binary = rotas_bin_path();
    let mut daemon = DaemonProcess::start(binary.clone(), home.path().to_path_buf());

    // The first pull runs immediately and fails against the closed port.
    let deadline = Instant::now() + Duration::from_secs(15);
    let mut last = None;
    while Instant::now() < deadline {
        if let Some(status) = daemon_status(&binary, home.path()) {
            if status["sync_failures"].as_u64().unwrap_or(0) >= 1 {
                last = Some(status);
                break;
            }
        }
        sleep(Duration::from_millis(100));
    }
    let status = last.expect("daemon reported a failed pull");
    assert_eq!(status["running"], serde_json::Value::Bool(true));
    assert_eq!(status["record_count"], serde_json::json!(0));
    assert!(status["last_error"]
        .as_str()
        .unwrap_or_default()
        .contains("authentication failed"));

    daemon.stop();
    let status = daemon_status(&binary, home.path()).expect("status output");
    assert_eq!(status["running"], serde_json::Value::Bool(false));
}
