//! Order domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{OrderId, OrderStatus, UserId};

use super::chat::ChatRoom;

/// A unit of requested custom work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Free-form description of the requested work.
    pub description: String,
    /// Arbitrary key-value document describing the work in detail.
    pub specifications: serde_json::Value,
    /// Requested quantity. Always positive.
    pub quantity: i32,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// User who placed the order.
    pub user_id: UserId,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

/// An order joined with its negotiation channel.
///
/// Every order has exactly one chat room, created in the same transaction,
/// so this is the shape most reads return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithRoom {
    #[serde(flatten)]
    pub order: Order,
    /// The order's negotiation channel.
    pub chat_room: ChatRoom,
}

/// Input for creating an order, already validated by the lifecycle engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    /// User placing the order.
    pub user_id: UserId,
    /// Free-form description of the requested work.
    pub description: String,
    /// Arbitrary key-value document describing the work in detail.
    pub specifications: serde_json::Value,
    /// Requested quantity.
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_with_room_flattens_order_fields() {
        let order_id = OrderId::generate();
        let snapshot = OrderWithRoom {
            order: Order {
                id: order_id,
                description: "Walnut desk".to_string(),
                specifications: serde_json::json!({"finish": "oil"}),
                quantity: 1,
                status: OrderStatus::Review,
                user_id: UserId::generate(),
                created_at: Utc::now(),
            },
            chat_room: ChatRoom {
                id: atelier_core::ChatRoomId::generate(),
                order_id,
                is_closed: false,
                summary: None,
                created_at: Utc::now(),
            },
        };

        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(json["description"], "Walnut desk");
        assert_eq!(json["status"], "REVIEW");
        assert_eq!(json["chat_room"]["is_closed"], false);
    }
}
