//! The access policy shared by the order and chat engines.
//!
//! Both engines authorize against the same pure function so the two resource
//! types cannot drift apart. The policy has no I/O and no side effects: it
//! takes the acting identity, the owner of the resource being touched, and
//! the named operation, and answers allow or deny.

use serde::{Deserialize, Serialize};

use crate::types::{UserId, UserRole};

/// The authenticated identity performing an operation.
///
/// Produced by the authentication layer upstream of this service; the core
/// only ever authorizes, it never authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The user's ID.
    pub id: UserId,
    /// The user's role.
    pub role: UserRole,
}

impl Actor {
    /// Create an actor from its parts.
    #[must_use]
    pub const fn new(id: UserId, role: UserRole) -> Self {
        Self { id, role }
    }
}

/// Operations the policy knows how to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read an order or a chat room.
    Read,
    /// Create a new order.
    Create,
    /// Append a message to a chat room.
    SendMessage,
    /// Advance an order's status.
    UpdateStatus,
    /// Close a chat room.
    CloseChat,
}

impl Operation {
    /// Operations a REGULAR user may perform on resources they own.
    const fn allowed_for_owner(self) -> bool {
        matches!(self, Self::Read | Self::Create | Self::SendMessage)
    }
}

/// Outcome of a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    /// Whether the decision permits the operation.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decide whether `actor` may perform `operation` on the resource owned by
/// `owner_id`.
///
/// Rules, uniform across orders and chat rooms:
/// - ADMIN: allowed everything on every resource.
/// - REGULAR: allowed only on resources they own, and only for
///   read / create / send-message. Status updates and chat closure are
///   administrative acts and are always denied, ownership notwithstanding.
#[must_use]
pub fn authorize(actor: Actor, owner_id: UserId, operation: Operation) -> Decision {
    match actor.role {
        UserRole::Admin => Decision::Allow,
        UserRole::Regular => {
            if actor.id == owner_id && operation.allowed_for_owner() {
                Decision::Allow
            } else {
                Decision::Deny
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OPERATIONS: [Operation; 5] = [
        Operation::Read,
        Operation::Create,
        Operation::SendMessage,
        Operation::UpdateStatus,
        Operation::CloseChat,
    ];

    fn regular(id: UserId) -> Actor {
        Actor::new(id, UserRole::Regular)
    }

    fn admin(id: UserId) -> Actor {
        Actor::new(id, UserRole::Admin)
    }

    #[test]
    fn test_admin_allowed_everything() {
        let owner = UserId::generate();
        let someone_else = admin(UserId::generate());
        for op in ALL_OPERATIONS {
            assert_eq!(authorize(someone_else, owner, op), Decision::Allow);
        }
    }

    #[test]
    fn test_regular_owner_allowed_read_create_send() {
        let owner = UserId::generate();
        let actor = regular(owner);
        for op in [Operation::Read, Operation::Create, Operation::SendMessage] {
            assert_eq!(authorize(actor, owner, op), Decision::Allow);
        }
    }

    #[test]
    fn test_regular_owner_denied_administrative_operations() {
        let owner = UserId::generate();
        let actor = regular(owner);
        for op in [Operation::UpdateStatus, Operation::CloseChat] {
            assert_eq!(authorize(actor, owner, op), Decision::Deny);
        }
    }

    #[test]
    fn test_regular_non_owner_denied_everything() {
        let owner = UserId::generate();
        let actor = regular(UserId::generate());
        for op in ALL_OPERATIONS {
            assert_eq!(authorize(actor, owner, op), Decision::Deny);
        }
    }

    #[test]
    fn test_decision_is_allowed() {
        assert!(Decision::Allow.is_allowed());
        assert!(!Decision::Deny.is_allowed());
    }
}
