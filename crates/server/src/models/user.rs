//! User identity as seen by this service.
//!
//! Registration and credential management live in the identity service; the
//! broker only ever reads users to attribute messages and address
//! notifications.

use serde::{Deserialize, Serialize};

use atelier_core::{UserId, UserRole};

/// The slice of a user the broker exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// Unique user ID.
    pub id: UserId,
    /// Email address, used as the notification delivery target.
    pub email: String,
    /// Role assigned by the identity service.
    pub role: UserRole,
}
