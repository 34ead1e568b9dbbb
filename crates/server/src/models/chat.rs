//! Chat room and message domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{ChatRoomId, MessageId, OrderId, UserId};

use super::order::Order;
use super::user::UserSummary;

/// The negotiation channel bound 1:1 to an order.
///
/// Starts open; closure is terminal and gates the order's move to
/// PROCESSING.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    /// Unique room ID.
    pub id: ChatRoomId,
    /// The order this room negotiates.
    pub order_id: OrderId,
    /// Whether the room has been closed. Closed rooms accept no messages.
    pub is_closed: bool,
    /// Closing summary, set exactly once at closure.
    pub summary: Option<String>,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
}

/// A room joined with its parent order, the shape the engines load for
/// authorization (the policy needs the order's owner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoomWithOrder {
    #[serde(flatten)]
    pub room: ChatRoom,
    /// The parent order.
    pub order: Order,
}

/// A single message in a chat room. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID.
    pub id: MessageId,
    /// Room the message belongs to.
    pub chat_room_id: ChatRoomId,
    /// Author of the message.
    pub user_id: UserId,
    /// Message text. Never empty.
    pub content: String,
    /// When the message was created. Messages are ordered by this ascending.
    pub created_at: DateTime<Utc>,
}

/// A message joined with its author's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageWithAuthor {
    #[serde(flatten)]
    pub message: Message,
    /// The author.
    pub author: UserSummary,
}

/// Full room snapshot: the room, its parent order, and the ordered message
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomWithMessages {
    #[serde(flatten)]
    pub room: ChatRoom,
    /// The parent order.
    pub order: Order,
    /// Messages ordered by creation time ascending.
    pub messages: Vec<MessageWithAuthor>,
}

#[cfg(test)]
mod tests {
    use atelier_core::UserRole;

    use super::*;

    #[test]
    fn test_message_with_author_serialization() {
        let author_id = UserId::generate();
        let message = MessageWithAuthor {
            message: Message {
                id: MessageId::generate(),
                chat_room_id: ChatRoomId::generate(),
                user_id: author_id,
                content: "Can the legs be tapered?".to_string(),
                created_at: Utc::now(),
            },
            author: UserSummary {
                id: author_id,
                email: "maker@example.com".to_string(),
                role: UserRole::Regular,
            },
        };

        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["content"], "Can the legs be tapered?");
        assert_eq!(json["author"]["email"], "maker@example.com");
        assert_eq!(json["author"]["role"], "REGULAR");
    }
}
