use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;
use ulid::Ulid;

use crate::model::{TimeWindow, format_clock};

const CHANNEL_CAPACITY: usize = 256;

/// Outbound message produced by the booking workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    BookingConfirmed {
        booking_id: Ulid,
        room_id: Ulid,
        room_name: String,
        user_id: Ulid,
        date: NaiveDate,
        window: TimeWindow,
    },
    BookingCancelled {
        booking_id: Ulid,
        room_id: Ulid,
        user_id: Ulid,
    },
}

impl Notification {
    pub fn user_id(&self) -> Ulid {
        match self {
            Notification::BookingConfirmed { user_id, .. }
            | Notification::BookingCancelled { user_id, .. } => *user_id,
        }
    }
}

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Delivery capability handed to the engine. Failures are reported back but
/// never undo the booking that triggered them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Drop any per-user delivery state once the user is deleted.
    async fn forget_user(&self, _user_id: Ulid) {}
}

/// Delivers every notification to each inner notifier in order.
/// All of them run; the first failure is returned.
pub struct Fanout {
    targets: Vec<Arc<dyn Notifier>>,
}

impl Fanout {
    pub fn new(targets: Vec<Arc<dyn Notifier>>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl Notifier for Fanout {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut first_err = None;
        for target in &self.targets {
            if let Err(e) = target.notify(notification).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn forget_user(&self, user_id: Ulid) {
        for target in &self.targets {
            target.forget_user(user_id).await;
        }
    }
}

/// Writes every notification as a structured log line.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::BookingConfirmed {
                booking_id,
                room_name,
                user_id,
                date,
                window,
                ..
            } => info!(
                %booking_id,
                %user_id,
                room = %room_name,
                %date,
                start = %format_clock(window.start),
                end = %format_clock(window.end),
                "booking confirmed"
            ),
            Notification::BookingCancelled {
                booking_id,
                room_id,
                user_id,
            } => info!(%booking_id, %room_id, %user_id, "booking cancelled"),
        }
        Ok(())
    }
}

/// Broadcast hub keyed by user: each user's subscribers see their own notifications.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notification>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a user. Creates the channel if needed.
    pub fn subscribe(&self, user_id: Ulid) -> broadcast::Receiver<Notification> {
        let sender = self
            .channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening; a channel whose
    /// subscribers have all gone is dropped.
    pub fn send(&self, notification: &Notification) {
        let user_id = notification.user_id();
        if let Some(sender) = self.channels.get(&user_id)
            && sender.send(notification.clone()).is_ok()
        {
            return;
        }
        self.channels.remove_if(&user_id, |_, s| s.receiver_count() == 0);
    }

    /// Remove a user's channel, closing every open subscription.
    pub fn remove(&self, user_id: &Ulid) {
        self.channels.remove(user_id);
    }

    #[cfg(test)]
    pub fn has_channel(&self, user_id: &Ulid) -> bool {
        self.channels.contains_key(user_id)
    }
}

#[async_trait]
impl Notifier for NotifyHub {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.send(notification);
        Ok(())
    }

    async fn forget_user(&self, user_id: Ulid) {
        self.remove(&user_id);
    }
}
