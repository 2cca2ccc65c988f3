//! Route service: state machine + registry + publish + notify.
//!
//! Every mutating call runs load → transition → save while holding the
//! registry's file lock, so two transitions on the same route cannot both
//! succeed, whether they come from one process or two. Publishing and
//! notifications happen after the transition is saved and can never undo it.
//!
//! The adherence row is written to the failed-publish worklist in the same
//! save as the confirmation and leaves it only after a successful push. A row
//! is therefore never lost; if the registry becomes unwritable right after a
//! successful push, the row stays queued and a retry may add it twice.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use rotas_core::error::LifecycleError;
use rotas_core::lifecycle;
use rotas_core::registry;
use rotas_core::types::{
    AdherenceRecord, FailedPublish, PresenceFlag, Route, RouteDraft, RouteId, RouteRegistry,
    RouteStatus,
};

use crate::error::SyncError;
use crate::notify::{notify_all, LogDispatcher, Notification, NotificationDispatcher};
use crate::publish::AdherenceSink;

/// Reported instead of a network error when no sink is configured.
pub const SINK_NOT_CONFIGURED: &str = "adherence publishing is not configured";

/// Worklist error of a row saved together with its confirmation, before the
/// first push attempt has finished.
pub const PUBLISH_PENDING: &str = "publish not attempted yet";

/// What happened to the adherence row of a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published { row_id: String },
    Queued { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOutcome {
    pub route: Route,
    pub record: AdherenceRecord,
    pub publish: PublishOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryReport {
    pub published: Vec<(RouteId, String)>,
    pub still_failing: Vec<FailedPublish>,
}

pub struct RouteService {
    home: PathBuf,
    sink: Option<Arc<dyn AdherenceSink>>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    contacts: Vec<String>,
}

impl RouteService {
    /// A service over the registry under `home`. Without a sink every
    /// confirmation is queued for `retry_failed_publishes`.
    pub fn new(home: impl Into<PathBuf>, sink: Option<Arc<dyn AdherenceSink>>) -> Self {
        Self {
            home: home.into(),
            sink,
            dispatcher: Arc::new(LogDispatcher),
            contacts: Vec::new(),
        }
    }

    pub fn with_notifications(
        mut self,
        dispatcher: Arc<dyn NotificationDispatcher>,
        contacts: Vec<String>,
    ) -> Self {
        self.dispatcher = dispatcher;
        self.contacts = contacts;
        self
    }

    pub fn create(&self, draft: RouteDraft) -> Result<Route, SyncError> {
        let route = registry::update_at(&self.home, |reg| -> Result<Route, SyncError> {
            let id = RouteId(reg.next_id);
            let route = lifecycle::create(id, draft, Utc::now())?;
            reg.allocate_id();
            reg.routes.push(route.clone());
            Ok(route)
        })?;
        tracing::info!(
            "route {} scheduled for {} {} in {}",
            route.id,
            route.date,
            route.time,
            route.sector
        );
        notify_all(
            self.dispatcher.as_ref(),
            &self.contacts,
            &Notification::scheduled(&route),
        );
        Ok(route)
    }

    /// All routes in id order, optionally filtered by status.
    pub fn list(&self, status: Option<RouteStatus>) -> Result<Vec<Route>, SyncError> {
        let reg = self.load()?;
        let mut routes: Vec<Route> = reg
            .routes
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();
        routes.sort_by_key(|r| r.id);
        Ok(routes)
    }

    pub fn show(&self, id: RouteId) -> Result<Route, SyncError> {
        self.load()?
            .get(id)
            .cloned()
            .ok_or(SyncError::Lifecycle(LifecycleError::RouteNotFound(id)))
    }

    /// `pending -> confirmed`, then one publish attempt.
    ///
    /// The transition is saved before publishing; a publish failure is queued
    /// and reported in the outcome, not as an `Err`. Once the confirmation is
    /// saved this returns `Ok`, even if the follow-up worklist save fails.
    pub fn confirm(
        &self,
        id: RouteId,
        responsible: &str,
        notes: Option<&str>,
        all_present: PresenceFlag,
    ) -> Result<ConfirmOutcome, SyncError> {
        let _lock = registry::lock_at(&self.home)?;
        let mut reg = self.load()?;
        let route = route_mut(&mut reg, id)?;
        let record = lifecycle::confirm(route, responsible, notes, all_present, Utc::now())?;
        let route = route.clone();
        reg.failed_publishes.push(FailedPublish {
            route_id: id,
            record: record.clone(),
            error: PUBLISH_PENDING.to_string(),
            failed_at: Utc::now(),
            attempts: 0,
        });
        registry::save_at(&self.home, &reg)?;
        tracing::info!("route {id} confirmed (all present: {all_present})");

        let publish = match self.push(&record) {
            Ok(row_id) => {
                reg.failed_publishes.retain(|entry| entry.route_id != id);
                if let Err(err) = registry::save_at(&self.home, &reg) {
                    tracing::error!(
                        "route {id} published as row {row_id} but is still queued ({err}); \
                         remove it from the worklist before retrying"
                    );
                }
                PublishOutcome::Published { row_id }
            }
            Err(error) => {
                tracing::warn!("route {id} stays confirmed; adherence row queued: {error}");
                if let Some(entry) = reg.failed_publishes.iter_mut().find(|e| e.route_id == id) {
                    entry.error = error.clone();
                    entry.failed_at = Utc::now();
                    entry.attempts = 1;
                }
                if let Err(err) = registry::save_at(&self.home, &reg) {
                    tracing::warn!("route {id}: could not record the publish error ({err})");
                }
                PublishOutcome::Queued { error }
            }
        };

        notify_all(
            self.dispatcher.as_ref(),
            &self.contacts,
            &Notification::confirmed(&route),
        );
        Ok(ConfirmOutcome {
            route,
            record,
            publish,
        })
    }

    /// `confirmed -> completed`.
    pub fn complete(&self, id: RouteId, notes: Option<&str>) -> Result<Route, SyncError> {
        self.transition(id, |route| lifecycle::complete(route, notes, Utc::now()))
    }

    /// `pending | confirmed -> cancelled`. Notes are mandatory.
    pub fn cancel(&self, id: RouteId, notes: &str) -> Result<Route, SyncError> {
        self.transition(id, |route| lifecycle::cancel(route, notes, Utc::now()))
    }

    pub fn failed_publishes(&self) -> Result<Vec<FailedPublish>, SyncError> {
        Ok(self.load()?.failed_publishes)
    }

    /// Replay every queued adherence row once. Successes leave the worklist;
    /// failures stay with their error and attempt count updated.
    ///
    /// Each success is saved before the next row is pushed, so a registry
    /// write failure leaves at most one published row still queued.
    pub fn retry_failed_publishes(&self) -> Result<RetryReport, SyncError> {
        let _lock = registry::lock_at(&self.home)?;
        let mut reg = self.load()?;
        let mut report = RetryReport::default();

        for entry in reg.failed_publishes.clone() {
            match self.push(&entry.record) {
                Ok(row_id) => {
                    reg.failed_publishes.retain(|e| e.route_id != entry.route_id);
                    registry::save_at(&self.home, &reg).inspect_err(|err| {
                        tracing::error!(
                            "route {} published as row {row_id} but is still queued ({err})",
                            entry.route_id
                        );
                    })?;
                    tracing::info!("queued row for route {} published", entry.route_id);
                    report.published.push((entry.route_id, row_id));
                }
                Err(error) => {
                    if let Some(queued) = reg
                        .failed_publishes
                        .iter_mut()
                        .find(|e| e.route_id == entry.route_id)
                    {
                        queued.error = error;
                        queued.failed_at = Utc::now();
                        queued.attempts += 1;
                        report.still_failing.push(queued.clone());
                    }
                }
            }
        }
        if !report.still_failing.is_empty() {
            registry::save_at(&self.home, &reg)?;
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn transition(
        &self,
        id: RouteId,
        apply: impl FnOnce(&mut Route) -> Result<(), LifecycleError>,
    ) -> Result<Route, SyncError> {
        let route = registry::update_at(&self.home, |reg| -> Result<Route, SyncError> {
            let route = route_mut(reg, id)?;
            apply(route)?;
            Ok(route.clone())
        })?;
        tracing::info!("route {id} is now {}", route.status);
        Ok(route)
    }

    fn push(&self, record: &AdherenceRecord) -> Result<String, String> {
        match &self.sink {
            Some(sink) => sink.publish(record).map_err(|e| e.to_string()),
            None => Err(SINK_NOT_CONFIGURED.to_string()),
        }
    }

    fn load(&self) -> Result<RouteRegistry, SyncError> {
        Ok(registry::load_at(&self.home)?)
    }
}

fn route_mut(reg: &mut RouteRegistry, id: RouteId) -> Result<&mut Route, SyncError> {
    reg.get_mut(id)
        .ok_or(SyncError::Lifecycle(LifecycleError::RouteNotFound(id)))
}
