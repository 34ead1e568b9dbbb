//! Asynchronous notification dispatch.
//!
//! The engines never deliver notifications themselves. After a state change
//! has been durably committed they enqueue a job on a durable queue and move
//! on; a background worker delivers with bounded retries and exponential
//! backoff. An enqueue failure is logged and never rolls back or fails the
//! triggering operation.

pub mod email;
pub mod worker;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use atelier_core::{ChatRoomId, NotificationJobId, OrderId, OrderStatus, UserId};

use crate::db::{NotificationJobRepository, RepositoryError};

pub use email::{EmailError, EmailSender};
pub use worker::NotificationWorker;

/// A notification job as stored on the queue.
///
/// The serialized form is the queue payload; the tag doubles as the wire
/// job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NotificationJob {
    /// An order moved to a new status (including the initial REVIEW on
    /// creation).
    OrderStatusChanged {
        /// Addressee: the order's owner.
        user_id: UserId,
        /// The order that changed.
        order_id: OrderId,
        /// The status it moved to.
        status: OrderStatus,
    },
    /// A new message arrived in a chat room the addressee owns.
    ChatMessage {
        /// Addressee: the room's order owner.
        user_id: UserId,
        /// The room the message was posted to.
        chat_room_id: ChatRoomId,
        /// Truncated message text.
        preview: String,
    },
}

impl NotificationJob {
    /// The queue job type string.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OrderStatusChanged { .. } => "order-status-changed",
            Self::ChatMessage { .. } => "chat-message",
        }
    }

    /// The user the notification is addressed to.
    #[must_use]
    pub const fn addressee(&self) -> UserId {
        match self {
            Self::OrderStatusChanged { user_id, .. } | Self::ChatMessage { user_id, .. } => {
                *user_id
            }
        }
    }
}

/// Retry behavior for a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total delivery attempts before the job is marked failed.
    pub attempts: u32,
    /// Base delay; attempt n waits `base_delay * 2^(n-1)`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

/// Errors that can occur while enqueueing a notification.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The queue's backing store rejected the write.
    #[error("queue error: {0}")]
    Queue(#[from] RepositoryError),
}

/// Fire-and-forget notification queue.
///
/// Implementations must make the job durable before returning; delivery
/// itself is at-least-once and happens out of band.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Enqueue a job for later delivery.
    async fn enqueue(
        &self,
        job: NotificationJob,
        retry: RetryPolicy,
    ) -> Result<NotificationJobId, DispatchError>;
}

/// Production dispatcher backed by the `notification_jobs` table.
#[derive(Clone)]
pub struct PgNotificationQueue {
    pool: sqlx::PgPool,
}

impl PgNotificationQueue {
    /// Create a new queue over a connection pool.
    #[must_use]
    pub const fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationDispatcher for PgNotificationQueue {
    async fn enqueue(
        &self,
        job: NotificationJob,
        retry: RetryPolicy,
    ) -> Result<NotificationJobId, DispatchError> {
        let repo = NotificationJobRepository::new(&self.pool);
        Ok(repo.enqueue(&job, retry).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_payload_carries_kebab_case_type_tag() {
        let job = NotificationJob::OrderStatusChanged {
            user_id: UserId::generate(),
            order_id: OrderId::generate(),
            status: OrderStatus::Processing,
        };

        let payload = serde_json::to_value(&job).expect("serialize");
        assert_eq!(payload["type"], "order-status-changed");
        assert_eq!(payload["status"], "PROCESSING");
    }

    #[test]
    fn test_job_roundtrips_through_payload() {
        let job = NotificationJob::ChatMessage {
            user_id: UserId::generate(),
            chat_room_id: ChatRoomId::generate(),
            preview: "Can the legs be tapered?".to_string(),
        };

        let payload = serde_json::to_value(&job).expect("serialize");
        let parsed: NotificationJob = serde_json::from_value(payload).expect("deserialize");
        assert_eq!(parsed, job);
    }

    #[test]
    fn test_kind_matches_payload_tag() {
        let job = NotificationJob::ChatMessage {
            user_id: UserId::generate(),
            chat_room_id: ChatRoomId::generate(),
            preview: String::new(),
        };
        let payload = serde_json::to_value(&job).expect("serialize");
        assert_eq!(payload["type"], job.kind());
    }

    #[test]
    fn test_default_retry_policy() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.base_delay, Duration::from_secs(5));
    }
}
