//! Read-through snapshot cache for single-order lookups.
//!
//! Backed by `moka` with a bounded TTL and capacity. The cache stores raw
//! snapshots, not authorization decisions: every read re-runs the access
//! policy, hit or miss. Chat rooms are deliberately not cached; their data
//! changes too often for a TTL cache to pay off.

use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use atelier_core::OrderId;

use crate::models::OrderWithRoom;

/// In-process cache of order snapshots keyed by order ID.
#[derive(Clone)]
pub struct OrderCache {
    inner: Cache<OrderId, OrderWithRoom>,
}

impl OrderCache {
    /// Create a cache holding at most `capacity` snapshots for `ttl` each.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self { inner }
    }

    /// Look up a snapshot.
    pub async fn get(&self, id: OrderId) -> Option<OrderWithRoom> {
        let hit = self.inner.get(&id).await;
        if hit.is_some() {
            debug!(order_id = %id, "Order cache hit");
        }
        hit
    }

    /// Store a snapshot.
    pub async fn insert(&self, id: OrderId, snapshot: OrderWithRoom) {
        self.inner.insert(id, snapshot).await;
    }

    /// Drop a snapshot so the next read goes to storage.
    pub async fn invalidate(&self, id: OrderId) {
        self.inner.invalidate(&id).await;
    }
}

#[cfg(test)]
mod tests {
    use atelier_core::{ChatRoomId, OrderStatus, UserId};
    use chrono::Utc;

    use crate::models::{ChatRoom, Order};

    use super::*;

    fn snapshot(id: OrderId) -> OrderWithRoom {
        OrderWithRoom {
            order: Order {
                id,
                description: "Test order".to_string(),
                specifications: serde_json::json!({}),
                quantity: 1,
                status: OrderStatus::Review,
                user_id: UserId::generate(),
                created_at: Utc::now(),
            },
            chat_room: ChatRoom {
                id: ChatRoomId::generate(),
                order_id: id,
                is_closed: false,
                summary: None,
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_insert_then_get_returns_snapshot() {
        let cache = OrderCache::new(10, Duration::from_secs(60));
        let id = OrderId::generate();
        cache.insert(id, snapshot(id)).await;

        let hit = cache.get(id).await.expect("hit");
        assert_eq!(hit.order.id, id);
    }

    #[tokio::test]
    async fn test_invalidate_removes_snapshot() {
        let cache = OrderCache::new(10, Duration::from_secs(60));
        let id = OrderId::generate();
        cache.insert(id, snapshot(id)).await;
        cache.invalidate(id).await;

        assert!(cache.get(id).await.is_none());
    }

    #[tokio::test]
    async fn test_miss_on_unknown_id() {
        let cache = OrderCache::new(10, Duration::from_secs(60));
        assert!(cache.get(OrderId::generate()).await.is_none());
    }
}
