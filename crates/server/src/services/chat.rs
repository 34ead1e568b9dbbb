//! Chat room engine.
//!
//! Owns message append and room closure. Closure is the coupling point
//! with the order lifecycle: `OrderService::update_status` reads the closed
//! flag this engine sets; nothing here ever touches an order's status.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use atelier_core::{Actor, ChatRoomId, Operation, authorize};

use crate::db::RepositoryError;
use crate::gateway::ChatGateway;
use crate::models::{MessageWithAuthor, RoomWithMessages};
use crate::notifications::{NotificationDispatcher, NotificationJob, RetryPolicy};

use super::ServiceError;

/// Longest message prefix carried in a chat notification.
const PREVIEW_MAX_LENGTH: usize = 80;

/// Chat room engine.
#[derive(Clone)]
pub struct ChatService {
    gateway: Arc<dyn ChatGateway>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    retry: RetryPolicy,
}

impl ChatService {
    /// Create a new chat service.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            dispatcher,
            retry,
        }
    }

    /// Append a message to an open room.
    ///
    /// The closed-room gate is checked before ownership: a closed room
    /// rejects everyone, admins included. When the author is not the room's
    /// order owner, the owner is notified with a preview.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for empty content,
    /// `ServiceError::NotFound` for an unknown room,
    /// `ServiceError::Forbidden` for a closed room or a policy denial, and
    /// `ServiceError::Storage` if a query fails.
    #[instrument(skip(self, content), fields(actor_id = %actor.id))]
    pub async fn send_message(
        &self,
        room_id: ChatRoomId,
        actor: Actor,
        content: &str,
    ) -> Result<MessageWithAuthor, ServiceError> {
        if content.trim().is_empty() {
            return Err(ServiceError::Validation(
                "message content must not be empty".to_string(),
            ));
        }

        let room = self
            .gateway
            .find_room(room_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Chat room not found".to_string()))?;

        if room.room.is_closed {
            return Err(ServiceError::Forbidden(
                "Cannot send message to closed chat room".to_string(),
            ));
        }

        if !authorize(actor, room.order.user_id, Operation::SendMessage).is_allowed() {
            return Err(ServiceError::Forbidden(
                "Not authorized to access this chat room".to_string(),
            ));
        }

        let message = self
            .gateway
            .append_message(room_id, actor.id, content)
            .await?;

        if actor.id != room.order.user_id {
            self.notify(NotificationJob::ChatMessage {
                user_id: room.order.user_id,
                chat_room_id: room_id,
                preview: preview(content),
            })
            .await;
        }

        Ok(message)
    }

    /// Close a room, storing its summary.
    ///
    /// An administrative act: the policy denies REGULAR users regardless of
    /// ownership, so the denial is decided before the room is even loaded.
    /// Closure is terminal and not idempotent; closing twice is an error.
    /// Returns the closed room with its full message history.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Forbidden` for non-admin callers or an
    /// already-closed room, `ServiceError::NotFound` for an unknown room,
    /// `ServiceError::Conflict` after a doubly-lost race, and
    /// `ServiceError::Storage` if a query fails.
    #[instrument(skip(self, summary), fields(actor_id = %actor.id))]
    pub async fn close_chat(
        &self,
        room_id: ChatRoomId,
        actor: Actor,
        summary: &str,
    ) -> Result<RoomWithMessages, ServiceError> {
        // close-chat denies REGULAR independent of ownership, so the
        // decision needs no resource owner.
        if !authorize(actor, actor.id, Operation::CloseChat).is_allowed() {
            return Err(ServiceError::Forbidden(
                "Only admins can close chat rooms".to_string(),
            ));
        }

        let mut retried = false;
        loop {
            let room = self
                .gateway
                .find_room(room_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Chat room not found".to_string()))?;

            if room.room.is_closed {
                return Err(ServiceError::Forbidden(
                    "Chat room is already closed".to_string(),
                ));
            }

            match self.gateway.close_room(room_id, summary).await {
                Ok(_closed) => {
                    return self
                        .gateway
                        .find_room_with_messages(room_id)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound("Chat room not found".to_string())
                        });
                }
                Err(RepositoryError::Conflict(reason)) => {
                    // The re-read above will surface "already closed" on the
                    // next pass.
                    if retried {
                        return Err(ServiceError::Conflict(reason));
                    }
                    debug!(room_id = %room_id, "Conditional close lost a race, retrying");
                    retried = true;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Get a room with its parent order and ordered message history.
    ///
    /// Chat reads are served straight from storage; there is deliberately
    /// no cache in front of them.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown room,
    /// `ServiceError::Forbidden` on policy denial, and
    /// `ServiceError::Storage` if a query fails.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn get_room(
        &self,
        room_id: ChatRoomId,
        actor: Actor,
    ) -> Result<RoomWithMessages, ServiceError> {
        let room = self
            .gateway
            .find_room_with_messages(room_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Chat room not found".to_string()))?;

        if !authorize(actor, room.order.user_id, Operation::Read).is_allowed() {
            return Err(ServiceError::Forbidden(
                "Not authorized to access this chat room".to_string(),
            ));
        }

        Ok(room)
    }

    /// Enqueue a notification after a committed state change.
    ///
    /// The state change already stands; an enqueue failure is logged and
    /// absorbed, never propagated.
    async fn notify(&self, job: NotificationJob) {
        if let Err(e) = self.dispatcher.enqueue(job, self.retry).await {
            warn!(error = %e, "Failed to enqueue notification for committed change");
        }
    }
}

/// Truncate message content for a notification preview.
fn preview(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.len() <= PREVIEW_MAX_LENGTH {
        return trimmed.to_string();
    }

    // Break at a space when one is close enough, mid-word otherwise.
    let cut = trimmed
        .char_indices()
        .take_while(|(i, _)| *i <= PREVIEW_MAX_LENGTH)
        .last()
        .map_or(PREVIEW_MAX_LENGTH, |(i, _)| i);
    let truncated = &trimmed[..cut];
    truncated.rfind(' ').map_or_else(
        || format!("{truncated}..."),
        |space_idx| format!("{}...", &truncated[..space_idx]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_content_unchanged() {
        assert_eq!(preview("Can the legs be tapered?"), "Can the legs be tapered?");
    }

    #[test]
    fn test_preview_trims_whitespace() {
        assert_eq!(preview("  hello  "), "hello");
    }

    #[test]
    fn test_preview_long_content_truncated_with_ellipsis() {
        let content = "word ".repeat(40);
        let p = preview(&content);
        assert!(p.len() <= PREVIEW_MAX_LENGTH + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn test_preview_does_not_split_multibyte_chars() {
        let content = "ä".repeat(120);
        let p = preview(&content);
        assert!(p.ends_with("..."));
        assert!(p.chars().all(|c| c == 'ä' || c == '.'));
    }
}
