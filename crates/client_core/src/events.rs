use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use shared::domain::{Partner, PartnerId};
use tokio::{
    sync::{broadcast, Mutex},
    time::Instant,
};

use crate::upload::BatchUploadReport;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Debug, Clone)]
pub enum DashboardEvent {
    PartnersLoaded {
        seq: u64,
        page: u32,
        total_elements: u64,
    },
    PartnersFailed {
        seq: u64,
        message: String,
    },
    StaleResponseDiscarded {
        seq: u64,
    },
    PartnerSaved(Partner),
    PartnerOnboarded(Partner),
    LoaderConfigsLoaded {
        partner_id: PartnerId,
        count: usize,
    },
    LoaderConfigsFailed {
        partner_id: PartnerId,
        message: String,
    },
    UploadFinished(BatchUploadReport),
    Notification(Notification),
}

/// Fan-out point shared by every controller of one dashboard: a broadcast
/// channel for state changes plus the list of dismissible notifications.
pub struct EventHub {
    events: broadcast::Sender<DashboardEvent>,
    notifications: Mutex<VecDeque<Notification>>,
    next_notification_id: AtomicU64,
    notification_ttl: Duration,
}

impl EventHub {
    pub fn new(notification_ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            events,
            notifications: Mutex::new(VecDeque::new()),
            next_notification_id: AtomicU64::new(1),
            notification_ttl,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: DashboardEvent) {
        let _ = self.events.send(event);
    }

    pub async fn notify(&self, kind: NotificationKind, message: impl Into<String>) -> u64 {
        let now = Instant::now();
        let notification = Notification {
            id: self.next_notification_id.fetch_add(1, Ordering::Relaxed),
            kind,
            message: message.into(),
            expires_at: now + self.notification_ttl,
        };
        let id = notification.id;
        {
            let mut guard = self.notifications.lock().await;
            guard.retain(|n| n.expires_at > now);
            guard.push_back(notification.clone());
        }
        self.emit(DashboardEvent::Notification(notification));
        id
    }

    pub async fn dismiss(&self, id: u64) -> bool {
        let mut guard = self.notifications.lock().await;
        let before = guard.len();
        guard.retain(|n| n.id != id);
        guard.len() != before
    }

    /// Drops expired notifications and returns the rest, oldest first.
    pub async fn active_notifications(&self) -> Vec<Notification> {
        let now = Instant::now();
        let mut guard = self.notifications.lock().await;
        guard.retain(|n| n.expires_at > now);
        guard.iter().cloned().collect()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(Duration::from_secs(4))
    }
}
