/// User-facing notification side channel
///
/// Store actions report failures here instead of propagating them to the
/// caller. Every notification is also logged.
use crate::logger::{self, LogTag};
use crate::observable::Observable;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    /// Whether the UI should pop it up immediately
    pub display: bool,
}

impl NotificationPayload {
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity: Severity::Error,
            display: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub display: bool,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct NotificationStore {
    notifications: Observable<Vec<Notification>>,
    next_id: AtomicU64,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self, payload: NotificationPayload) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        let line = format!("{}: {}", payload.title, payload.message);
        match payload.severity {
            Severity::Error => logger::warning(LogTag::Notifications, &line),
            _ => logger::info(LogTag::Notifications, &line),
        }

        self.notifications.update(|list| {
            list.push(Notification {
                id,
                title: payload.title,
                message: payload.message,
                severity: payload.severity,
                display: payload.display,
                date: Utc::now(),
            })
        });
        id
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.get()
    }

    pub fn count(&self) -> usize {
        self.notifications.with(|list| list.len())
    }

    pub fn dismiss(&self, id: u64) {
        self.notifications.update(|list| list.retain(|n| n.id != id));
    }

    pub fn clear(&self) {
        self.notifications.set(Vec::new());
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Vec<Notification>> {
        self.notifications.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_and_dismiss() {
        let store = NotificationStore::new();
        let first = store.notify(NotificationPayload::error("Transactions", "boom"));
        let second = store.notify(NotificationPayload::error("DeFi", "bang"));

        assert_eq!(store.count(), 2);
        assert_ne!(first, second);

        store.dismiss(first);
        let remaining = store.notifications();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "DeFi");
    }
}
