//! Persistence gateway traits.
//!
//! The engines never talk to Postgres directly; they go through these
//! traits, injected at construction time. Production wires in the sqlx
//! repositories from [`crate::db`]; the integration tests substitute
//! in-memory fakes with call counters.
//!
//! Conditional writes (`update_order_status`, `close_room`) are the
//! concurrency primitive: they fail with [`RepositoryError::Conflict`] when
//! the expected precondition no longer holds, and the engines treat that as
//! a signal to re-read and re-validate.

use async_trait::async_trait;

use atelier_core::{ChatRoomId, OrderId, OrderStatus, UserId};

use crate::db::RepositoryError;
use crate::models::{
    ChatRoom, ChatRoomWithOrder, MessageWithAuthor, NewOrder, Order, OrderWithRoom,
    RoomWithMessages,
};

/// Durable storage operations the order lifecycle engine needs.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Persist a new order together with its open chat room, atomically.
    async fn create_order_with_room(
        &self,
        new_order: NewOrder,
    ) -> Result<OrderWithRoom, RepositoryError>;

    /// Load an order joined with its chat room.
    async fn find_order(&self, id: OrderId) -> Result<Option<OrderWithRoom>, RepositoryError>;

    /// List orders, newest first. `owner` of `None` means all orders.
    async fn list_orders(
        &self,
        owner: Option<UserId>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<OrderWithRoom>, RepositoryError>;

    /// Conditionally move an order from `expected` to `new_status`.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the stored status no
    /// longer equals `expected`, and [`RepositoryError::NotFound`] if the
    /// order does not exist.
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
    ) -> Result<Order, RepositoryError>;
}

/// Durable storage operations the chat room engine needs.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Load a room joined with its parent order.
    async fn find_room(&self, id: ChatRoomId)
    -> Result<Option<ChatRoomWithOrder>, RepositoryError>;

    /// Load a room with its parent order and full ascending message history.
    async fn find_room_with_messages(
        &self,
        id: ChatRoomId,
    ) -> Result<Option<RoomWithMessages>, RepositoryError>;

    /// Conditionally close an open room and store the summary.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the room is already
    /// closed, and [`RepositoryError::NotFound`] if it does not exist.
    async fn close_room(&self, id: ChatRoomId, summary: &str)
    -> Result<ChatRoom, RepositoryError>;

    /// Append an immutable message, returning it joined with its author.
    async fn append_message(
        &self,
        room_id: ChatRoomId,
        author_id: UserId,
        content: &str,
    ) -> Result<MessageWithAuthor, RepositoryError>;
}
