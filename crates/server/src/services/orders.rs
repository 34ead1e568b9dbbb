//! Order lifecycle engine.
//!
//! Owns the order status state machine and the rule coupling it to the
//! chat room: an order may not move to PROCESSING while its room is open.
//! A status update flows through:
//! 1. Authorize through the shared policy
//! 2. Load current state
//! 3. Validate the requested change (closure gate, transition table)
//! 4. Commit through a conditional write
//! 5. Enqueue the notification
//! 6. Invalidate the cached snapshot

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use atelier_core::{Actor, Operation, OrderId, OrderStatus, authorize};

use crate::cache::OrderCache;
use crate::db::RepositoryError;
use crate::gateway::OrderGateway;
use crate::models::{NewOrder, OrderWithRoom};
use crate::notifications::{NotificationDispatcher, NotificationJob, RetryPolicy};

use super::ServiceError;

/// Raw input for [`OrderService::create`].
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// Free-form description of the requested work.
    pub description: String,
    /// Arbitrary key-value document describing the work in detail.
    pub specifications: serde_json::Value,
    /// Requested quantity. Must be positive.
    pub quantity: i32,
}

/// Order lifecycle engine.
#[derive(Clone)]
pub struct OrderService {
    gateway: Arc<dyn OrderGateway>,
    cache: OrderCache,
    dispatcher: Arc<dyn NotificationDispatcher>,
    retry: RetryPolicy,
}

impl OrderService {
    /// Create a new order service.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        cache: OrderCache,
        dispatcher: Arc<dyn NotificationDispatcher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            cache,
            dispatcher,
            retry,
        }
    }

    /// Create an order with its open chat room, both in one transaction.
    ///
    /// The owner is the acting user. The cache is not touched; it fills
    /// lazily on the first read.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an empty description or a
    /// non-positive quantity, `ServiceError::Forbidden` on policy denial,
    /// and `ServiceError::Storage` if the write fails.
    #[instrument(skip(self, input), fields(actor_id = %actor.id))]
    pub async fn create(
        &self,
        actor: Actor,
        input: CreateOrder,
    ) -> Result<OrderWithRoom, ServiceError> {
        if input.description.trim().is_empty() {
            return Err(ServiceError::Validation(
                "description must not be empty".to_string(),
            ));
        }
        if input.quantity <= 0 {
            return Err(ServiceError::Validation(
                "quantity must be a positive number".to_string(),
            ));
        }

        if !authorize(actor, actor.id, Operation::Create).is_allowed() {
            return Err(ServiceError::Forbidden(
                "Not authorized to create orders".to_string(),
            ));
        }

        let created = self
            .gateway
            .create_order_with_room(NewOrder {
                user_id: actor.id,
                description: input.description,
                specifications: input.specifications,
                quantity: input.quantity,
            })
            .await?;

        self.notify(NotificationJob::OrderStatusChanged {
            user_id: created.order.user_id,
            order_id: created.order.id,
            status: created.order.status,
        })
        .await;

        Ok(created)
    }

    /// List orders visible to the actor, newest first.
    ///
    /// ADMIN sees every order; REGULAR sees only their own.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for negative `offset`/`limit` and
    /// `ServiceError::Storage` if the query fails.
    #[instrument(skip(self), fields(actor_id = %actor.id, role = %actor.role))]
    pub async fn list(
        &self,
        actor: Actor,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<OrderWithRoom>, ServiceError> {
        if offset < 0 {
            return Err(ServiceError::Validation(
                "offset must not be negative".to_string(),
            ));
        }
        if limit < 0 {
            return Err(ServiceError::Validation(
                "limit must not be negative".to_string(),
            ));
        }

        let owner = if actor.role.is_admin() {
            None
        } else {
            Some(actor.id)
        };

        Ok(self.gateway.list_orders(owner, offset, limit).await?)
    }

    /// Get one order with its chat room, through the read-through cache.
    ///
    /// Cached snapshots are raw: the access policy runs on every call, hit
    /// or miss. On a hit the gateway is not touched at all.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown ID,
    /// `ServiceError::Forbidden` on policy denial (independent of cache
    /// state), and `ServiceError::Storage` if the load fails.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn get(&self, id: OrderId, actor: Actor) -> Result<OrderWithRoom, ServiceError> {
        if let Some(snapshot) = self.cache.get(id).await {
            Self::authorize_read(actor, &snapshot)?;
            return Ok(snapshot);
        }

        let snapshot = self
            .gateway
            .find_order(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        Self::authorize_read(actor, &snapshot)?;

        self.cache.insert(id, snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Advance an order to `new_status`.
    ///
    /// Admin only. Moving to PROCESSING additionally requires the order's
    /// chat room to be closed. The write is a compare-and-swap on the
    /// current status; losing the race re-reads and re-validates once
    /// before surfacing `ServiceError::Conflict`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown ID,
    /// `ServiceError::Forbidden` for non-admin callers,
    /// `ServiceError::GatingViolation` if the room is still open,
    /// `ServiceError::InvalidTransition` for an edge outside the table,
    /// `ServiceError::Conflict` after a doubly-lost race, and
    /// `ServiceError::Storage` if a query fails.
    #[instrument(skip(self), fields(actor_id = %actor.id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        id: OrderId,
        actor: Actor,
        new_status: OrderStatus,
    ) -> Result<OrderWithRoom, ServiceError> {
        // update-status denies REGULAR independent of ownership, so the
        // decision needs no resource owner and precedes the load.
        if !authorize(actor, actor.id, Operation::UpdateStatus).is_allowed() {
            return Err(ServiceError::Forbidden(
                "Only admins can update order status".to_string(),
            ));
        }

        // One automatic retry: a lost conditional write is equivalent to
        // re-reading and re-validating against the new state.
        let mut retried = false;
        loop {
            let current = self
                .gateway
                .find_order(id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

            if new_status == OrderStatus::Processing && !current.chat_room.is_closed {
                return Err(ServiceError::GatingViolation);
            }

            if !current.order.status.can_transition_to(new_status) {
                return Err(ServiceError::InvalidTransition {
                    from: current.order.status,
                    to: new_status,
                });
            }

            match self
                .gateway
                .update_order_status(id, current.order.status, new_status)
                .await
            {
                Ok(updated) => {
                    self.notify(NotificationJob::OrderStatusChanged {
                        user_id: updated.user_id,
                        order_id: updated.id,
                        status: updated.status,
                    })
                    .await;

                    // Synchronous invalidation: part of this commit path, so
                    // readers going through this engine never see the old
                    // snapshot after we return.
                    self.cache.invalidate(id).await;

                    return Ok(OrderWithRoom {
                        order: updated,
                        chat_room: current.chat_room,
                    });
                }
                Err(RepositoryError::Conflict(reason)) => {
                    if retried {
                        return Err(ServiceError::Conflict(reason));
                    }
                    debug!(order_id = %id, "Conditional status write lost a race, retrying");
                    retried = true;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    fn authorize_read(actor: Actor, snapshot: &OrderWithRoom) -> Result<(), ServiceError> {
        if authorize(actor, snapshot.order.user_id, Operation::Read).is_allowed() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Not authorized to access this order".to_string(),
            ))
        }
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
