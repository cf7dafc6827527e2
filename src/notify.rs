//! User feedback: transient notifications and confirmation prompts
//!
//! Remote failures never escape an operation boundary. They are turned into
//! notifications here, and destructive operations ask a [`Confirmer`] first.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A transient toast message
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    created_at: Instant,
}

impl Notification {
    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

/// Queue of transient notifications, shared by the controller and dispatcher
#[derive(Clone)]
pub struct Notifications {
    queue: Arc<Mutex<VecDeque<Notification>>>,
    ttl: Duration,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            ttl,
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message.into());
    }

    fn push(&self, level: NotificationLevel, message: String) {
        match level {
            NotificationLevel::Success => tracing::info!("{}", message),
            NotificationLevel::Error => tracing::warn!("{}", message),
        }
        self.queue().push_back(Notification {
            level,
            message,
            created_at: Instant::now(),
        });
    }

    /// Notifications that have not yet expired, oldest first
    pub fn visible(&self) -> Vec<Notification> {
        let mut queue = self.queue();
        queue.retain(|n| n.created_at.elapsed() < self.ttl);
        queue.iter().cloned().collect()
    }

    /// Remove and return everything queued, expired or not
    pub fn drain(&self) -> Vec<Notification> {
        self.queue().drain(..).collect()
    }

    pub fn last(&self) -> Option<Notification> {
        self.queue().back().cloned()
    }
}

/// What the user is asked to confirm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmPrompt {
    /// Discard the draft of a tab and reload it from the server
    Reload { file: String },
    /// Leave the workspace while some tabs have unsaved changes
    LeaveWithUnsaved { dirty: Vec<String> },
    /// Run a remote table operation
    RemoteOperation { operation: String, model: String },
    /// Delete a file on the server, closing its open tabs
    Delete { file: String },
    /// Run a project-wide maintenance job
    Maintenance { task: String },
}

/// Answers confirmation prompts
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

impl<F> Confirmer for F
where
    F: Fn(&ConfirmPrompt) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self(prompt)
    }
}

/// Confirmer that accepts everything
pub struct AlwaysConfirm;

impl Confirmer for AlwaysConfirm {
    fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let notifications = Notifications::default();
        notifications.success("saved");
        notifications.error("failed");

        let last = notifications.last().unwrap();
        assert!(last.is_error());
        assert_eq!(last.message, "failed");

        let drained = notifications.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].level, NotificationLevel::Success);
        assert!(notifications.drain().is_empty());
    }

    #[test]
    fn test_expired_notifications_are_hidden() {
        let notifications = Notifications::new(Duration::ZERO);
        notifications.success("gone");
        assert!(notifications.visible().is_empty());
    }

    #[test]
    fn test_clones_share_queue() {
        let notifications = Notifications::default();
        let other = notifications.clone();
        other.error("shared");
        assert_eq!(notifications.visible().len(), 1);
    }

    #[test]
    fn test_closure_confirmer() {
        let deny = |_: &ConfirmPrompt| false;
        let prompt = ConfirmPrompt::Reload {
            file: "core-Bootstrap".to_string(),
        };
        assert!(!deny.confirm(&prompt));
        assert!(AlwaysConfirm.confirm(&prompt));
    }
}
