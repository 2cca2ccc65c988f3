use std::path::{Path, PathBuf};

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn rotas_root(home: &Path) -> PathBuf {
    home.join(".rotas")
}

pub fn socket_path(home: &Path) -> PathBuf {
    rotas_root(home).join(DAEMON_SOCKET)
}
