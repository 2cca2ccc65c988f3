//! rotas daemon runtime: periodic puller + sync processor + socket server.

pub mod config;
mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use config::DaemonConfig;
pub use error::DaemonError;
pub use protocol::{
    request, request_status, request_stop, request_sync, send_request, DaemonRequest,
    DaemonResponse,
};
pub use runtime::{init_tracing, run, start_blocking, SyncHistory, SyncSummary};
