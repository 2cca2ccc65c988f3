//! Error types for rotas-sync.

use thiserror::Error;

use rotas_core::error::{LifecycleError, RegistryError};
use rotas_graph::{GraphError, HttpFailure};

/// All errors that can arise from sync, publish and route-service operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Token or resolver-chain failure.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A mandatory adherence field was empty. Raised before any network call.
    #[error("adherence field '{field}' is required")]
    Validation { field: &'static str },

    /// The row append call itself failed.
    #[error("failed to append adherence row: {0}")]
    Publish(#[source] HttpFailure),

    /// Rejected by the route state machine.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Local registry could not be read or written.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}
