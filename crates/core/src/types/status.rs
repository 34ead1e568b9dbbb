//! Order status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// Status only ever moves forward: REVIEW -> PROCESSING -> COMPLETED.
/// There are no backward edges and no skips; COMPLETED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Under negotiation; the chat room is the active channel.
    Review,
    /// Accepted for work. Requires the chat room to be closed first.
    Processing,
    /// Finished. Terminal state.
    Completed,
}

impl OrderStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Review, Self::Processing) | (Self::Processing, Self::Completed)
        )
    }

    /// Whether this status has no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Review => write!(f, "REVIEW"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REVIEW" => Ok(Self::Review),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Error returned when a status string is not recognized.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid order status: {0}")]
pub struct ParseStatusError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 3] = [
        OrderStatus::Review,
        OrderStatus::Processing,
        OrderStatus::Completed,
    ];

    #[test]
    fn test_forward_edges_allowed() {
        assert!(OrderStatus::Review.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_skip_transition_rejected() {
        assert!(!OrderStatus::Review.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Review));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Review));
    }

    #[test]
    fn test_self_transitions_rejected() {
        for status in ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_completed_is_only_terminal_state() {
        for status in ALL {
            let has_exit = ALL.iter().any(|&next| status.can_transition_to(next));
            assert_eq!(has_exit, !status.is_terminal());
        }
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let json = serde_json::to_string(&OrderStatus::Processing).expect("serialize");
        assert_eq!(json, "\"PROCESSING\"");
    }

    #[test]
    fn test_status_display_roundtrip() {
        for status in ALL {
            let parsed: OrderStatus = status.to_string().parse().expect("parse");
            assert_eq!(parsed, status);
        }
    }
}
