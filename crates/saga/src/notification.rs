//! User notification collaborator.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::UserId;

use crate::error::{Result, SagaError};

/// Kind of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    PaymentSucceeded,
    PaymentFailed,
    PaymentTimedOut,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PaymentSucceeded => "payment_succeeded",
            NotificationKind::PaymentFailed => "payment_failed",
            NotificationKind::PaymentTimedOut => "payment_timed_out",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends a notification to a user.
///
/// Callers treat failures as non-fatal.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn notify(
        &self,
        user_id: &UserId,
        kind: NotificationKind,
        title: &str,
        message: &str,
        data: serde_json::Value,
    ) -> Result<()>;
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Default)]
struct RecordingState {
    attempts: usize,
    sent: Vec<SentNotification>,
    fail: bool,
}

/// In-memory notifier for testing and the relay binary.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<RwLock<RecordingState>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to reject every message.
    pub fn set_fail(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail = fail;
    }

    /// Returns the notifications delivered so far.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }

    /// Returns how many notify calls were made, including rejected ones.
    pub fn attempts(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .attempts
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn notify(
        &self,
        user_id: &UserId,
        kind: NotificationKind,
        title: &str,
        message: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.attempts += 1;

        if state.fail {
            return Err(SagaError::Notification(format!(
                "{kind} for {user_id} rejected"
            )));
        }

        state.sent.push(SentNotification {
            user_id: user_id.clone(),
            kind,
            title: title.to_string(),
            message: message.to_string(),
            data,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_fails() {
        let notifier = RecordingNotifier::new();
        let user = UserId::new("user-1");

        notifier
            .notify(
                &user,
                NotificationKind::PaymentSucceeded,
                "Payment received",
                "ok",
                serde_json::json!({}),
            )
            .await
            .unwrap();
        notifier.set_fail(true);
        let result = notifier
            .notify(
                &user,
                NotificationKind::PaymentFailed,
                "Payment failed",
                "no",
                serde_json::Value::Null,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(notifier.attempts(), 2);
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.sent()[0].kind, NotificationKind::PaymentSucceeded);
    }
}
