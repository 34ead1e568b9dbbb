//! Database operations for orders and their chat rooms.
//!
//! Queries use the runtime-checked sqlx API with explicit row types; rows
//! are converted into domain models at the boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use atelier_core::{ChatRoomId, OrderId, OrderStatus, UserId};

use super::RepositoryError;
use crate::gateway::OrderGateway;
use crate::models::{ChatRoom, NewOrder, Order, OrderWithRoom};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    description: String,
    specifications: serde_json::Value,
    quantity: i32,
    status: OrderStatus,
    user_id: UserId,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            description: row.description,
            specifications: row.specifications,
            quantity: row.quantity,
            status: row.status,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for chat room queries.
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

/// Internal row type for order-joined-with-room queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderWithRoomRow {
    id: OrderId,
    description: String,
    specifications: serde_json::Value,
    quantity: i32,
    status: OrderStatus,
    user_id: UserId,
    created_at: DateTime<Utc>,
    room_id: ChatRoomId,
    is_closed: bool,
    summary: Option<String>,
    room_created_at: DateTime<Utc>,
}

impl From<OrderWithRoomRow> for OrderWithRoom {
    fn from(row: OrderWithRoomRow) -> Self {
        Self {
            order: Order {
                id: row.id,
                description: row.description,
                specifications: row.specifications,
                quantity: row.quantity,
                status: row.status,
                user_id: row.user_id,
                created_at: row.created_at,
            },
            chat_room: ChatRoom {
                id: row.room_id,
                order_id: row.id,
                is_closed: row.is_closed,
                summary: row.summary,
                created_at: row.room_created_at,
            },
        }
    }
}

const ORDER_WITH_ROOM_COLUMNS: &str = r"
    o.id, o.description, o.specifications, o.quantity, o.status, o.user_id, o.created_at,
    r.id AS room_id, r.is_closed, r.summary, r.created_at AS room_created_at
";

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new order and its open chat room in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either insert fails; nothing is
    /// committed in that case.
    pub async fn create_order_with_room(
        &self,
        new_order: NewOrder,
    ) -> Result<OrderWithRoom, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order_row: OrderRow = sqlx::query_as(
            r"
            INSERT INTO orders (id, user_id, description, specifications, quantity, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, description, specifications, quantity, status, user_id, created_at
            ",
        )
        .bind(OrderId::generate())
        .bind(new_order.user_id)
        .bind(&new_order.description)
        .bind(&new_order.specifications)
        .bind(new_order.quantity)
        .bind(OrderStatus::Review)
        .fetch_one(&mut *tx)
        .await?;

        let room_row: ChatRoomRow = sqlx::query_as(
            r"
            INSERT INTO chat_rooms (id, order_id)
            VALUES ($1, $2)
            RETURNING id, order_id, is_closed, summary, created_at
            ",
        )
        .bind(ChatRoomId::generate())
        .bind(order_row.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(OrderWithRoom {
            order: order_row.into(),
            chat_room: room_row.into(),
        })
    }

    /// Load an order joined with its chat room.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_order(&self, id: OrderId) -> Result<Option<OrderWithRoom>, RepositoryError> {
        let row: Option<OrderWithRoomRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_WITH_ROOM_COLUMNS}
            FROM orders o
            JOIN chat_rooms r ON r.order_id = o.id
            WHERE o.id = $1
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List orders, newest first, optionally restricted to one owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_orders(
        &self,
        owner: Option<UserId>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<OrderWithRoom>, RepositoryError> {
        let rows: Vec<OrderWithRoomRow> = if let Some(owner) = owner {
            sqlx::query_as(&format!(
                r"
                SELECT {ORDER_WITH_ROOM_COLUMNS}
                FROM orders o
                JOIN chat_rooms r ON r.order_id = o.id
                WHERE o.user_id = $1
                ORDER BY o.created_at DESC
                OFFSET $2 LIMIT $3
                "
            ))
            .bind(owner)
            .bind(offset)
            .bind(limit)
            .fetch_all(self.pool)
            .await?
        } else {
            sqlx::query_as(&format!(
                r"
                SELECT {ORDER_WITH_ROOM_COLUMNS}
                FROM orders o
                JOIN chat_rooms r ON r.order_id = o.id
                ORDER BY o.created_at DESC
                OFFSET $1 LIMIT $2
                "
            ))
            .bind(offset)
            .bind(limit)
            .fetch_all(self.pool)
            .await?
        };

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Conditionally move an order from `expected` to `new_status`.
    ///
    /// The status check and the write are a single statement, so two
    /// concurrent updates cannot both commit conflicting transitions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist,
    /// `RepositoryError::Conflict` if the stored status no longer equals
    /// `expected`, and `RepositoryError::Database` for other failures.
    pub async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r"
            UPDATE orders
            SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING id, description, specifications, quantity, status, user_id, created_at
            ",
        )
        .bind(id)
        .bind(expected)
        .bind(new_status)
        .fetch_optional(self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool)
            .await?;

        if exists {
            Err(RepositoryError::Conflict(format!(
                "order {id} is no longer in status {expected}"
            )))
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}

// =============================================================================
// Gateway implementation
// =============================================================================

/// Production [`OrderGateway`] backed by Postgres.
#[derive(Clone)]
pub struct PgOrderGateway {
    pool: PgPool,
}

impl PgOrderGateway {
    /// Create a new gateway over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderGateway for PgOrderGateway {
    async fn create_order_with_room(
        &self,
        new_order: NewOrder,
    ) -> Result<OrderWithRoom, RepositoryError> {
        OrderRepository::new(&self.pool)
            .create_order_with_room(new_order)
            .await
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderWithRoom>, RepositoryError> {
        OrderRepository::new(&self.pool).find_order(id).await
    }

    async fn list_orders(
        &self,
        owner: Option<UserId>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<OrderWithRoom>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .list_orders(owner, offset, limit)
            .await
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        OrderRepository::new(&self.pool)
            .update_order_status(id, expected, new_status)
            .await
    }
}
