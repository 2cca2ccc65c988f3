//! Notification seam: route scheduled / route confirmed.
//!
//! Delivery (email, chat, ...) is somebody else's job. The route service only
//! calls [`NotificationDispatcher::send`] and logs a `false`.

use std::env;

use rotas_core::types::{PresenceFlag, Route, RouteId};

/// Comma-separated contact list read at startup.
pub const ENV_ALERT_CONTACTS: &str = "ROTAS_ALERT_CONTACTS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    RouteScheduled,
    RouteConfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub route_id: RouteId,
    pub sector: String,
    pub date: String,
    pub time: String,
    pub responsible: Option<String>,
    pub all_present: Option<PresenceFlag>,
}

impl Notification {
    pub fn scheduled(route: &Route) -> Self {
        Self {
            kind: NotificationKind::RouteScheduled,
            route_id: route.id,
            sector: route.sector.clone(),
            date: route.date.clone(),
            time: route.time.clone(),
            responsible: None,
            all_present: None,
        }
    }

    pub fn confirmed(route: &Route) -> Self {
        let confirmation = route.confirmation.as_ref();
        Self {
            kind: NotificationKind::RouteConfirmed,
            route_id: route.id,
            sector: route.sector.clone(),
            date: route.date.clone(),
            time: route.time.clone(),
            responsible: confirmation.map(|c| c.responsible.clone()),
            all_present: confirmation.map(|c| c.all_present),
        }
    }

    pub fn subject(&self) -> String {
        match self.kind {
            NotificationKind::RouteScheduled => {
                format!("Nova Rota de Segurança Agendada - {}", self.route_id)
            }
            NotificationKind::RouteConfirmed => {
                format!("Rota de Segurança Confirmada - {}", self.route_id)
            }
        }
    }
}

pub trait NotificationDispatcher: Send + Sync {
    /// Deliver one notification. `false` means it was not delivered.
    fn send(&self, contact: &str, notification: &Notification) -> bool;
}

/// Default dispatcher: writes the notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn send(&self, contact: &str, notification: &Notification) -> bool {
        tracing::info!(
            "notify {contact}: {} ({} {} {})",
            notification.subject(),
            notification.sector,
            notification.date,
            notification.time
        );
        true
    }
}

/// Send to every contact; returns how many deliveries succeeded.
pub fn notify_all(
    dispatcher: &dyn NotificationDispatcher,
    contacts: &[String],
    notification: &Notification,
) -> usize {
    let mut delivered = 0;
    for contact in contacts {
        if dispatcher.send(contact, notification) {
            delivered += 1;
        } else {
            tracing::warn!(
                "notification '{}' to {contact} was not delivered",
                notification.subject()
            );
        }
    }
    delivered
}

pub fn parse_contacts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Contacts from [`ENV_ALERT_CONTACTS`]; empty when unset.
pub fn contacts_from_env() -> Vec<String> {
    env::var(ENV_ALERT_CONTACTS)
        .map(|raw| parse_contacts(&raw))
        .unwrap_or_default()
}
