//! # rotas-sync
//!
//! Both directions of the adherence sync plus the route service that drives
//! the push side.
//!
//! - [`pull`]: [`SyncOrchestrator`] keeps the last full pull as a snapshot
//! - [`publish`]: [`AdherencePublisher`] appends one row per confirmation
//! - [`mapper`]: record ↔ 10-column row
//! - [`routes`]: [`RouteService`], transitions with registry locking
//! - [`pipeline`]: [`Pipeline`], the entrypoint shared by CLI and daemon

pub mod error;
pub mod mapper;
pub mod notify;
pub mod pipeline;
pub mod publish;
pub mod pull;
pub mod routes;
pub mod stats;

pub use error::SyncError;
pub use notify::{LogDispatcher, Notification, NotificationDispatcher, NotificationKind};
pub use pipeline::{Pipeline, SyncReport};
pub use publish::{AdherencePublisher, AdherenceSink};
pub use pull::{Snapshot, SyncOrchestrator, SyncStatus, DEFAULT_SYNC_INTERVAL_SECS};
pub use routes::{ConfirmOutcome, PublishOutcome, RetryReport, RouteService};
pub use stats::{AdherenceStats, SectorCount};
