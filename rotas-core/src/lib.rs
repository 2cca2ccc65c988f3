//! Rotas core library: route domain types, the route state machine and registry persistence.
//!
//! - [`types`]: newtypes, routes, adherence records
//! - [`lifecycle`]: pure route state machine
//! - [`registry`]: load / save of `~/.rotas/routes.yaml`
//! - [`error`]: [`RegistryError`], [`LifecycleError`]

pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod types;

pub use error::{LifecycleError, RegistryError};
pub use types::{
    AdherenceRecord, AdherenceStatus, Cancellation, Completion, Confirmation, FailedPublish,
    PresenceFlag, Route, RouteDraft, RouteId, RouteRegistry, RouteStatus,
};
