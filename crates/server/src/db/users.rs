//! Database operations for users.
//!
//! Users are written by the identity service; the broker only needs to read
//! them for message attribution and notification addressing. The single
//! insert here exists for the CLI seed command.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use atelier_core::{UserId, UserRole};

use super::RepositoryError;
use crate::models::UserSummary;

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    role: UserRole,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserSummary {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            role: row.role,
        }
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_user(&self, id: UserId) -> Result<Option<UserSummary>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT id, email, role, created_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a user. Used by the CLI seed command only.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already taken and
    /// `RepositoryError::Database` for other failures.
    pub async fn create_user(
        &self,
        email: &str,
        role: UserRole,
    ) -> Result<UserSummary, RepositoryError> {
        let row: UserRow = sqlx::query_as(
            r"
            INSERT INTO users (id, email, role)
            VALUES ($1, $2, $3)
            RETURNING id, email, role, created_at
            ",
        )
        .bind(UserId::generate())
        .bind(email)
        .bind(role)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("email {email} is already registered"))
            }
            _ => RepositoryError::Database(e),
        })?;

        Ok(row.into())
    }
}
