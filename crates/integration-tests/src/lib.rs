//! Integration test support for Atelier.
//!
//! The engines take their collaborators as injected trait objects, so the
//! tests here run them against in-memory fakes: a gateway with call
//! counters (to observe cache behavior) and injectable write conflicts (to
//! observe retry behavior), and a dispatcher that records every enqueued
//! notification.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p atelier-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use atelier_core::{
    Actor, ChatRoomId, MessageId, NotificationJobId, OrderId, OrderStatus, UserId, UserRole,
};
use atelier_server::cache::OrderCache;
use atelier_server::db::RepositoryError;
use atelier_server::gateway::{ChatGateway, OrderGateway};
use atelier_server::models::{
    ChatRoom, ChatRoomWithOrder, Message, MessageWithAuthor, NewOrder, Order, OrderWithRoom,
    RoomWithMessages, UserSummary,
};
use atelier_server::notifications::{
    DispatchError, NotificationDispatcher, NotificationJob, RetryPolicy,
};
use atelier_server::services::{ChatService, OrderService};

// =============================================================================
// In-memory gateway
// =============================================================================

#[derive(Default)]
struct StoreInner {
    users: HashMap<UserId, UserSummary>,
    orders: HashMap<OrderId, Order>,
    rooms: HashMap<ChatRoomId, ChatRoom>,
    room_by_order: HashMap<OrderId, ChatRoomId>,
    messages: Vec<Message>,
}

/// In-memory stand-in for the Postgres gateways.
///
/// Implements both gateway traits over one shared store so an order created
/// through the order engine is visible to the chat engine.
#[derive(Default)]
pub struct InMemoryGateway {
    inner: Mutex<StoreInner>,
    clock: AtomicUsize,
    find_order_calls: AtomicUsize,
    injected_update_conflicts: AtomicUsize,
    injected_close_conflicts: AtomicUsize,
}

impl InMemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user and return an actor for them.
    pub fn register_user(&self, email: &str, role: UserRole) -> Actor {
        let id = UserId::generate();
        let mut inner = self.inner.lock().expect("store lock");
        inner.users.insert(
            id,
            UserSummary {
                id,
                email: email.to_string(),
                role,
            },
        );
        Actor::new(id, role)
    }

    /// How many times `find_order` reached this gateway.
    pub fn find_order_calls(&self) -> usize {
        self.find_order_calls.load(Ordering::SeqCst)
    }

    /// Make the next `n` conditional status updates fail with a conflict.
    pub fn inject_update_conflicts(&self, n: usize) {
        self.injected_update_conflicts.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` conditional room closes fail with a conflict.
    pub fn inject_close_conflicts(&self, n: usize) {
        self.injected_close_conflicts.store(n, Ordering::SeqCst);
    }

    /// Strictly increasing timestamps so ordering assertions are stable.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        DateTime::<Utc>::UNIX_EPOCH
            + TimeDelta::try_seconds(1_700_000_000).expect("in range")
            + TimeDelta::microseconds(i64::try_from(tick).expect("in range"))
    }

    fn take_injected(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn room_with_order(inner: &StoreInner, id: ChatRoomId) -> Option<ChatRoomWithOrder> {
        let room = inner.rooms.get(&id)?.clone();
        let order = inner.orders.get(&room.order_id)?.clone();
        Some(ChatRoomWithOrder { room, order })
    }

    fn message_with_author(inner: &StoreInner, message: &Message) -> MessageWithAuthor {
        let author = inner
            .users
            .get(&message.user_id)
            .cloned()
            .expect("message author is registered");
        MessageWithAuthor {
            message: message.clone(),
            author,
        }
    }
}

#[async_trait]
impl OrderGateway for InMemoryGateway {
    async fn create_order_with_room(
        &self,
        new_order: NewOrder,
    ) -> Result<OrderWithRoom, RepositoryError> {
        let order_created = self.next_timestamp();
        let room_created = self.next_timestamp();
        let mut inner = self.inner.lock().expect("store lock");

        let order = Order {
            id: OrderId::generate(),
            description: new_order.description,
            specifications: new_order.specifications,
            quantity: new_order.quantity,
            status: OrderStatus::Review,
            user_id: new_order.user_id,
            created_at: order_created,
        };
        let room = ChatRoom {
            id: ChatRoomId::generate(),
            order_id: order.id,
            is_closed: false,
            summary: None,
            created_at: room_created,
        };

        inner.orders.insert(order.id, order.clone());
        inner.rooms.insert(room.id, room.clone());
        inner.room_by_order.insert(order.id, room.id);

        Ok(OrderWithRoom {
            order,
            chat_room: room,
        })
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderWithRoom>, RepositoryError> {
        self.find_order_calls.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().expect("store lock");

        let Some(order) = inner.orders.get(&id).cloned() else {
            return Ok(None);
        };
        let room_id = inner.room_by_order.get(&id).expect("order has a room");
        let chat_room = inner.rooms.get(room_id).expect("room exists").clone();

        Ok(Some(OrderWithRoom { order, chat_room }))
    }

    async fn list_orders(
        &self,
        owner: Option<UserId>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<OrderWithRoom>, RepositoryError> {
        let inner = self.inner.lock().expect("store lock");

        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|order| owner.is_none_or(|owner| order.user_id == owner))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = usize::try_from(offset).unwrap_or(0);
        let limit = usize::try_from(limit).unwrap_or(0);

        Ok(orders
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|order| {
                let room_id = inner.room_by_order.get(&order.id).expect("order has a room");
                let chat_room = inner.rooms.get(room_id).expect("room exists").clone();
                OrderWithRoom { order, chat_room }
            })
            .collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        if Self::take_injected(&self.injected_update_conflicts) {
            return Err(RepositoryError::Conflict(
                "injected status conflict".to_string(),
            ));
        }

        let mut inner = self.inner.lock().expect("store lock");
        let Some(order) = inner.orders.get_mut(&id) else {
            return Err(RepositoryError::NotFound);
        };
        if order.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "order {id} is no longer in status {expected}"
            )));
        }

        order.status = new_status;
        Ok(order.clone())
    }
}

#[async_trait]
impl ChatGateway for InMemoryGateway {
    async fn find_room(
        &self,
        id: ChatRoomId,
    ) -> Result<Option<ChatRoomWithOrder>, RepositoryError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(Self::room_with_order(&inner, id))
    }

    async fn find_room_with_messages(
        &self,
        id: ChatRoomId,
    ) -> Result<Option<RoomWithMessages>, RepositoryError> {
        let inner = self.inner.lock().expect("store lock");
        let Some(with_order) = Self::room_with_order(&inner, id) else {
            return Ok(None);
        };

        let mut messages: Vec<&Message> = inner
            .messages
            .iter()
            .filter(|m| m.chat_room_id == id)
            .collect();
        messages.sort_by_key(|m| m.created_at);

        Ok(Some(RoomWithMessages {
            room: with_order.room,
            order: with_order.order,
            messages: messages
                .into_iter()
                .map(|m| Self::message_with_author(&inner, m))
                .collect(),
        }))
    }

    async fn close_room(
        &self,
        id: ChatRoomId,
        summary: &str,
    ) -> Result<ChatRoom, RepositoryError> {
        if Self::take_injected(&self.injected_close_conflicts) {
            return Err(RepositoryError::Conflict(
                "injected close conflict".to_string(),
            ));
        }

        let mut inner = self.inner.lock().expect("store lock");
        let Some(room) = inner.rooms.get_mut(&id) else {
            return Err(RepositoryError::NotFound);
        };
        if room.is_closed {
            return Err(RepositoryError::Conflict(format!(
                "chat room {id} is already closed"
            )));
        }

        room.is_closed = true;
        room.summary = Some(summary.to_string());
        Ok(room.clone())
    }

    async fn append_message(
        &self,
        room_id: ChatRoomId,
        author_id: UserId,
        content: &str,
    ) -> Result<MessageWithAuthor, RepositoryError> {
        let created_at = self.next_timestamp();
        let mut inner = self.inner.lock().expect("store lock");

        if !inner.rooms.contains_key(&room_id) {
            return Err(RepositoryError::NotFound);
        }

        let message = Message {
            id: MessageId::generate(),
            chat_room_id: room_id,
            user_id: author_id,
            content: content.to_string(),
            created_at,
        };
        inner.messages.push(message.clone());

        Ok(Self::message_with_author(&inner, &message))
    }
}

// =============================================================================
// Recording dispatcher
// =============================================================================

/// Dispatcher fake that records every enqueued job.
#[derive(Default)]
pub struct RecordingDispatcher {
    jobs: Mutex<Vec<NotificationJob>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything enqueued so far, oldest first.
    pub fn jobs(&self) -> Vec<NotificationJob> {
        self.jobs.lock().expect("jobs lock").clone()
    }

    /// Make every subsequent enqueue fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn enqueue(
        &self,
        job: NotificationJob,
        _retry: RetryPolicy,
    ) -> Result<NotificationJobId, DispatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::Queue(RepositoryError::DataCorruption(
                "queue unavailable".to_string(),
            )));
        }

        self.jobs.lock().expect("jobs lock").push(job);
        Ok(NotificationJobId::generate())
    }
}

// =============================================================================
// Test context
// =============================================================================

/// Both engines wired to shared fakes.
pub struct TestContext {
    pub gateway: Arc<InMemoryGateway>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub orders: OrderService,
    pub chat: ChatService,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let gateway = Arc::new(InMemoryGateway::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let cache = OrderCache::new(1000, Duration::from_secs(60));
        let retry = RetryPolicy::default();

        let orders = OrderService::new(gateway.clone(), cache, dispatcher.clone(), retry);
        let chat = ChatService::new(gateway.clone(), dispatcher.clone(), retry);

        Self {
            gateway,
            dispatcher,
            orders,
            chat,
        }
    }

    /// Register a REGULAR user.
    pub fn regular_user(&self, email: &str) -> Actor {
        self.gateway.register_user(email, UserRole::Regular)
    }

    /// Register an ADMIN user.
    pub fn admin_user(&self, email: &str) -> Actor {
        self.gateway.register_user(email, UserRole::Admin)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
