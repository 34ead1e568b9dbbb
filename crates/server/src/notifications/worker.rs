//! Background delivery worker for the notification queue.
//!
//! Polls the `notification_jobs` table, delivers each claimed job, and
//! either marks it delivered, reschedules it with exponential backoff, or
//! marks it failed once its attempts are exhausted. Runs as a long-lived
//! tokio task spawned at startup.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::db::notifications::QueuedNotification;
use crate::db::{NotificationJobRepository, RepositoryError, UserRepository};
use crate::notifications::{EmailError, EmailSender, NotificationJob};

/// How many jobs one poll claims at most.
const CLAIM_BATCH_SIZE: i64 = 20;

/// Errors from a single delivery attempt.
#[derive(Debug, Error)]
enum DeliveryError {
    /// Addressee lookup failed or the user is gone.
    #[error("addressee not found")]
    AddresseeNotFound,

    /// Database error during delivery.
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    /// SMTP delivery failed.
    #[error("email error: {0}")]
    Email(#[from] EmailError),
}

/// Background worker draining the notification queue.
pub struct NotificationWorker {
    pool: PgPool,
    mailer: Option<EmailSender>,
    poll_interval: Duration,
}

impl NotificationWorker {
    /// Create a new worker.
    ///
    /// With no `mailer`, deliveries are logged instead of emailed; useful in
    /// development and tests.
    #[must_use]
    pub const fn new(pool: PgPool, mailer: Option<EmailSender>, poll_interval: Duration) -> Self {
        Self {
            pool,
            mailer,
            poll_interval,
        }
    }

    /// Run the polling loop forever.
    pub async fn run(self) {
        info!(interval = ?self.poll_interval, "Notification worker started");
        let mut ticker = tokio::time::interval(self.poll_interval);
        // A slow SMTP relay shouldn't cause a burst of catch-up polls.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.drain_due().await {
                error!(error = %e, "Notification poll failed");
            }
        }
    }

    /// Claim and process all currently due jobs.
    ///
    /// # Errors
    ///
    /// Returns an error only if claiming fails; per-job failures are
    /// absorbed into the retry bookkeeping.
    pub async fn drain_due(&self) -> Result<usize, RepositoryError> {
        let repo = NotificationJobRepository::new(&self.pool);
        let jobs = repo.claim_due(CLAIM_BATCH_SIZE).await?;
        let count = jobs.len();

        for job in jobs {
            self.process_job(job).await;
        }

        Ok(count)
    }

    /// Deliver one claimed job and record the outcome.
    #[instrument(skip(self, queued), fields(job_id = %queued.id, kind = queued.job.kind()))]
    async fn process_job(&self, queued: QueuedNotification) {
        debug!(attempt = queued.attempts, "Processing notification job");
        let repo = NotificationJobRepository::new(&self.pool);

        match self.deliver(&queued.job).await {
            Ok(()) => {
                info!(user_id = %queued.job.addressee(), "Notification delivered");
                if let Err(e) = repo.mark_delivered(queued.id).await {
                    error!(error = %e, "Failed to mark job delivered");
                }
            }
            Err(delivery_err) => {
                let reason = delivery_err.to_string();
                if queued.attempts >= queued.max_attempts {
                    error!(error = %reason, attempts = queued.attempts, "Notification failed for good");
                    if let Err(e) = repo.mark_failed(queued.id, &reason).await {
                        error!(error = %e, "Failed to mark job failed");
                    }
                } else {
                    let delay = backoff_delay(
                        Duration::from_secs(u64::try_from(queued.backoff_base_secs).unwrap_or(0)),
                        queued.attempts,
                    );
                    warn!(error = %reason, retry_in = ?delay, "Notification delivery failed, will retry");
                    let next = Utc::now()
                        + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                    if let Err(e) = repo.reschedule(queued.id, &reason, next).await {
                        error!(error = %e, "Failed to reschedule job");
                    }
                }
            }
        }
    }

    /// Deliver a job to its addressee.
    async fn deliver(&self, job: &NotificationJob) -> Result<(), DeliveryError> {
        let users = UserRepository::new(&self.pool);
        let addressee = users
            .find_user(job.addressee())
            .await?
            .ok_or(DeliveryError::AddresseeNotFound)?;

        let (subject, body) = compose(job);

        match &self.mailer {
            Some(mailer) => {
                mailer.send(&addressee.email, &subject, &body).await?;
            }
            None => {
                info!(
                    to = %addressee.email,
                    subject = %subject,
                    "SMTP not configured, logging notification instead"
                );
            }
        }

        Ok(())
    }
}

/// Compose subject and body for a job.
fn compose(job: &NotificationJob) -> (String, String) {
    match job {
        NotificationJob::OrderStatusChanged {
            order_id, status, ..
        } => (
            format!("Your order is now {status}"),
            format!("Order {order_id} has moved to status {status}."),
        ),
        NotificationJob::ChatMessage {
            chat_room_id,
            preview,
            ..
        } => (
            "New message on your order".to_string(),
            format!("A new message was posted in room {chat_room_id}:\n\n{preview}"),
        ),
    }
}

/// Delay before the next attempt: `base * 2^(attempt-1)`.
fn backoff_delay(base: Duration, attempt: i32) -> Duration {
    let exponent = attempt.saturating_sub(1).clamp(0, 16);
    base.saturating_mul(2u32.saturating_pow(u32::try_from(exponent).unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use atelier_core::{OrderId, OrderStatus, UserId};

    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(5));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(20));
    }

    #[test]
    fn test_backoff_handles_degenerate_attempts() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(5));
        assert_eq!(backoff_delay(base, -3), Duration::from_secs(5));
    }

    #[test]
    fn test_compose_status_change_mentions_status() {
        let job = NotificationJob::OrderStatusChanged {
            user_id: UserId::generate(),
            order_id: OrderId::generate(),
            status: OrderStatus::Processing,
        };
        let (subject, body) = compose(&job);
        assert!(subject.contains("PROCESSING"));
        assert!(body.contains("PROCESSING"));
    }
}
