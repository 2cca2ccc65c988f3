//! Error types for rotas-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{RouteId, RouteStatus};

/// All errors that can arise from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; carries the file path and line context from serde_yaml.
    #[error("failed to parse route registry at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.rotas/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Rejections raised by the route state machine. Always local and synchronous.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: RouteStatus, to: RouteStatus },

    #[error("cancellation requires non-empty notes")]
    NotesRequired,

    #[error("field '{field}' is missing or malformed")]
    Validation { field: &'static str },

    #[error("route {0} not found")]
    RouteNotFound(RouteId),
}
