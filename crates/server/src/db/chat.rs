//! Database operations for chat rooms and messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use atelier_core::{ChatRoomId, MessageId, OrderId, OrderStatus, UserId, UserRole};

use super::RepositoryError;
use crate::gateway::ChatGateway;
use crate::models::{
    ChatRoom, ChatRoomWithOrder, Message, MessageWithAuthor, Order, RoomWithMessages, UserSummary,
};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for room-joined-with-order queries.
#[derive(Debug, sqlx::FromRow)]
struct RoomWithOrderRow {
    id: ChatRoomId,
    order_id: OrderId,
    is_closed: bool,
    summary: Option<String>,
    created_at: DateTime<Utc>,
    description: String,
    specifications: serde_json::Value,
    quantity: i32,
    status: OrderStatus,
    user_id: UserId,
    order_created_at: DateTime<Utc>,
}

impl From<RoomWithOrderRow> for ChatRoomWithOrder {
    fn from(row: RoomWithOrderRow) -> Self {
        Self {
            room: ChatRoom {
                id: row.id,
                order_id: row.order_id,
                is_closed: row.is_closed,
                summary: row.summary,
                created_at: row.created_at,
            },
            order: Order {
                id: row.order_id,
                description: row.description,
                specifications: row.specifications,
                quantity: row.quantity,
                status: row.status,
                user_id: row.user_id,
                created_at: row.order_created_at,
            },
        }
    }
}

/// Internal row type for bare chat room queries.
#[derive(Debug, sqlx::FromRow)]
struct ChatRoomRow {
    id: ChatRoomId,
    order_id: OrderId,
    is_closed: bool,
    summary: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ChatRoomRow> for ChatRoom {
    fn from(row: ChatRoomRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            is_closed: row.is_closed,
            summary: row.summary,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for message-joined-with-author queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageWithAuthorRow {
    id: MessageId,
    chat_room_id: ChatRoomId,
    user_id: UserId,
    content: String,
    created_at: DateTime<Utc>,
    author_email: String,
    author_role: UserRole,
}

impl From<MessageWithAuthorRow> for MessageWithAuthor {
    fn from(row: MessageWithAuthorRow) -> Self {
        Self {
            message: Message {
                id: row.id,
                chat_room_id: row.chat_room_id,
                user_id: row.user_id,
                content: row.content,
                created_at: row.created_at,
            },
            author: UserSummary {
                id: row.user_id,
                email: row.author_email,
                role: row.author_role,
            },
        }
    }
}

const ROOM_WITH_ORDER_COLUMNS: &str = r"
    r.id, r.order_id, r.is_closed, r.summary, r.created_at,
    o.description, o.specifications, o.quantity, o.status, o.user_id, o.created_at AS order_created_at
";

// =============================================================================
// Repository
// =============================================================================

/// Repository for chat database operations.
pub struct ChatRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ChatRepository<'a> {
    /// Create a new chat repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a room joined with its parent order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_room(
        &self,
        id: ChatRoomId,
    ) -> Result<Option<ChatRoomWithOrder>, RepositoryError> {
        let row: Option<RoomWithOrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ROOM_WITH_ORDER_COLUMNS}
            FROM chat_rooms r
            JOIN orders o ON o.id = r.order_id
            WHERE r.id = $1
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Load a room with its parent order and full message history.
    ///
    /// Messages are ordered by creation time ascending, which equals commit
    /// order within a room.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn find_room_with_messages(
        &self,
        id: ChatRoomId,
    ) -> Result<Option<RoomWithMessages>, RepositoryError> {
        let Some(with_order) = self.find_room(id).await? else {
            return Ok(None);
        };

        let messages = self.list_messages(id).await?;

        Ok(Some(RoomWithMessages {
            room: with_order.room,
            order: with_order.order,
            messages,
        }))
    }

    /// List a room's messages with their authors, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_messages(
        &self,
        room_id: ChatRoomId,
    ) -> Result<Vec<MessageWithAuthor>, RepositoryError> {
        let rows: Vec<MessageWithAuthorRow> = sqlx::query_as(
            r"
            SELECT m.id, m.chat_room_id, m.user_id, m.content, m.created_at,
                   u.email AS author_email, u.role AS author_role
            FROM messages m
            JOIN users u ON u.id = m.user_id
            WHERE m.chat_room_id = $1
            ORDER BY m.created_at ASC
            ",
        )
        .bind(room_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Conditionally close an open room and store its summary.
    ///
    /// The closed-flag check and the write are a single statement; a room
    /// can only ever be closed once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the room doesn't exist,
    /// `RepositoryError::Conflict` if it is already closed, and
    /// `RepositoryError::Database` for other failures.
    pub async fn close_room(
        &self,
        id: ChatRoomId,
        summary: &str,
    ) -> Result<ChatRoom, RepositoryError> {
        let row: Option<ChatRoomRow> = sqlx::query_as(
            r"
            UPDATE chat_rooms
            SET is_closed = TRUE, summary = $2
            WHERE id = $1 AND is_closed = FALSE
            RETURNING id, order_id, is_closed, summary, created_at
            ",
        )
        .bind(id)
        .bind(summary)
        .fetch_optional(self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM chat_rooms WHERE id = $1)")
                .bind(id)
                .fetch_one(self.pool)
                .await?;

        if exists {
            Err(RepositoryError::Conflict(format!(
                "chat room {id} is already closed"
            )))
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    /// Append a message and return it joined with its author.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails (including a
    /// foreign-key failure when the room does not exist).
    pub async fn append_message(
        &self,
        room_id: ChatRoomId,
        author_id: UserId,
        content: &str,
    ) -> Result<MessageWithAuthor, RepositoryError> {
        let row: MessageWithAuthorRow = sqlx::query_as(
            r"
            WITH inserted AS (
                INSERT INTO messages (id, chat_room_id, user_id, content)
                VALUES ($1, $2, $3, $4)
                RETURNING id, chat_room_id, user_id, content, created_at
            )
            SELECT i.id, i.chat_room_id, i.user_id, i.content, i.created_at,
                   u.email AS author_email, u.role AS author_role
            FROM inserted i
            JOIN users u ON u.id = i.user_id
            ",
        )
        .bind(MessageId::generate())
        .bind(room_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}

// =============================================================================
// Gateway implementation
// =============================================================================

/// Production [`ChatGateway`] backed by Postgres.
#[derive(Clone)]
pub struct PgChatGateway {
    pool: PgPool,
}

impl PgChatGateway {
    /// Create a new gateway over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatGateway for PgChatGateway {
    async fn find_room(
        &self,
        id: ChatRoomId,
    ) -> Result<Option<ChatRoomWithOrder>, RepositoryError> {
        ChatRepository::new(&self.pool).find_room(id).await
    }

    async fn find_room_with_messages(
        &self,
        id: ChatRoomId,
    ) -> Result<Option<RoomWithMessages>, RepositoryError> {
        ChatRepository::new(&self.pool)
            .find_room_with_messages(id)
            .await
    }

    async fn close_room(
        &self,
        id: ChatRoomId,
        summary: &str,
    ) -> Result<ChatRoom, RepositoryError> {
        ChatRepository::new(&self.pool).close_room(id, summary).await
    }

    async fn append_message(
        &self,
        room_id: ChatRoomId,
        author_id: UserId,
        content: &str,
    ) -> Result<MessageWithAuthor, RepositoryError> {
        ChatRepository::new(&self.pool)
            .append_message(room_id, author_id, content)
            .await
    }
}
