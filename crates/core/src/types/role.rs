//! User roles.

use serde::{Deserialize, Serialize};

/// Role attached to every authenticated user.
///
/// The role is immutable for the lifetime of a session; role changes are an
/// administrative concern outside this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Customer role: may create orders and interact with their own.
    Regular,
    /// Reviewer role: full access to every order and chat room.
    Admin,
}

impl UserRole {
    /// Whether this role carries administrative privileges.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regular => write!(f, "REGULAR"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGULAR" => Ok(Self::Regular),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Error returned when a role string is not recognized.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid user role: {0}")]
pub struct ParseRoleError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display_roundtrip() {
        for role in [UserRole::Regular, UserRole::Admin] {
            let parsed: UserRole = role.to_string().parse().expect("parse");
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_role_rejects_unknown() {
        assert!("superuser".parse::<UserRole>().is_err());
        assert!("admin".parse::<UserRole>().is_err(), "roles are uppercase");
    }

    #[test]
    fn test_role_serializes_screaming_snake() {
        let json = serde_json::to_string(&UserRole::Regular).expect("serialize");
        assert_eq!(json, "\"REGULAR\"");
    }

    #[test]
    fn test_is_admin() {
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Regular.is_admin());
    }
}
