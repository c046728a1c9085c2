//! Bounded in-memory store for system notifications
//!
//! System notifications are the sink of last resort: the dispatcher
//! records one when every ordinary channel of a task fails, and the SMTP
//! relay records one when every upstream account is exhausted.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use common_types::{MessageType, PushRequest, Strategy, Style};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Read-state of a stored notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationStatus {
    /// Not yet acknowledged
    Unread,
    /// Acknowledged by an operator
    Read,
}

/// A stored system notification
#[derive(Debug, Clone, Serialize)]
pub struct SystemNotification {
    /// Store-assigned id
    pub id: String,
    /// Title of the failed message
    pub title: String,
    /// Body of the failed message
    pub message: String,
    /// Severity of the original request
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Strategy of the original request
    pub strategy: Strategy,
    /// Style of the original request
    pub style: Style,
    /// Originating component
    pub source: String,
    /// Task the notification belongs to, empty for relay failures
    pub task_id: String,
    /// Why the notification was recorded
    pub reason: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Read-state
    pub status: NotificationStatus,
}

/// Aggregate counters over the stored notifications
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationStatistics {
    /// Number of stored notifications
    pub total: usize,
    /// Unread notifications
    pub unread: usize,
    /// Read notifications
    pub read: usize,
    /// Counts keyed by message severity
    pub by_type: HashMap<String, usize>,
}

/// Bounded notification store
///
/// Holds at most `max_size` records; inserting at the cap evicts the
/// strictly oldest record by creation time.
#[derive(Debug)]
pub struct NotificationStore {
    notifications: Mutex<HashMap<String, SystemNotification>>,
    max_size: usize,
}

impl NotificationStore {
    /// Creates a store bounded at `max_size` records
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            notifications: Mutex::new(HashMap::new()),
            max_size,
        }
    }

    /// Records a notification for the given request, returning its id
    pub fn add(&self, task_id: &str, request: &PushRequest, reason: &str) -> String {
        let id = generate_id();
        let notification = SystemNotification {
            id: id.clone(),
            title: request.content.title.clone(),
            message: request.content.msg.clone(),
            message_type: request.message_type,
            strategy: request.strategy,
            style: request.style,
            source: "push-gateway".to_string(),
            task_id: task_id.to_string(),
            reason: reason.to_string(),
            created_at: Utc::now(),
            status: NotificationStatus::Unread,
        };

        let mut notifications = self.notifications.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.max_size > 0 && notifications.len() >= self.max_size {
            Self::evict_oldest(&mut notifications);
        }
        notifications.insert(id.clone(), notification);
        id
    }

    /// Returns a snapshot of one notification
    #[must_use]
    pub fn get(&self, id: &str) -> Option<SystemNotification> {
        let notifications = self.notifications.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        notifications.get(id).cloned()
    }

    /// Lists notifications, newest first, optionally filtered by status
    #[must_use]
    pub fn list(&self, status: Option<NotificationStatus>) -> Vec<SystemNotification> {
        let notifications = self.notifications.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut listed: Vec<SystemNotification> = notifications
            .values()
            .filter(|n| status.is_none_or(|s| n.status == s))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed
    }

    /// Marks one notification read; returns whether it existed
    pub fn mark_read(&self, id: &str) -> bool {
        let mut notifications = self.notifications.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        notifications.get_mut(id).is_some_and(|n| {
            n.status = NotificationStatus::Read;
            true
        })
    }

    /// Marks every unread notification read, returning the count changed
    pub fn mark_all_read(&self) -> usize {
        let mut notifications = self.notifications.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut count = 0;
        for notification in notifications.values_mut() {
            if notification.status == NotificationStatus::Unread {
                notification.status = NotificationStatus::Read;
                count += 1;
            }
        }
        count
    }

    /// Deletes one notification; returns whether it existed
    pub fn delete(&self, id: &str) -> bool {
        let mut notifications = self.notifications.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        notifications.remove(id).is_some()
    }

    /// Deletes every notification, returning the count removed
    pub fn clear(&self) -> usize {
        let mut notifications = self.notifications.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let count = notifications.len();
        notifications.clear();
        count
    }

    /// Number of unread notifications
    #[must_use]
    pub fn unread_count(&self) -> usize {
        let notifications = self.notifications.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        notifications
            .values()
            .filter(|n| n.status == NotificationStatus::Unread)
            .count()
    }

    /// Aggregate counters over the store
    #[must_use]
    pub fn statistics(&self) -> NotificationStatistics {
        let notifications = self.notifications.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stats = NotificationStatistics {
            total: notifications.len(),
            ..NotificationStatistics::default()
        };
        for notification in notifications.values() {
            match notification.status {
                NotificationStatus::Unread => stats.unread += 1,
                NotificationStatus::Read => stats.read += 1,
            }
            *stats
                .by_type
                .entry(notification.message_type.to_string())
                .or_default() += 1;
        }
        stats
    }

    /// Number of stored notifications
    #[must_use]
    pub fn len(&self) -> usize {
        self.notifications
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_oldest(notifications: &mut HashMap<String, SystemNotification>) {
        let oldest = notifications
            .values()
            .min_by_key(|n| n.created_at)
            .map(|n| n.id.clone());
        if let Some(id) = oldest {
            notifications.remove(&id);
        }
    }
}

fn generate_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("notify_{}_{suffix}", Utc::now().format("%Y%m%d%H%M%S"))
}
