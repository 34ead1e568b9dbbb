//! Seed command for local development.
//!
//! Inserts one requester and one reviewer so the API can be exercised
//! without the identity service.

use atelier_core::UserRole;
use atelier_server::db::{self, RepositoryError, UserRepository};

use super::CommandError;

/// Seed demo users.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn run() -> Result<(), CommandError> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let users = UserRepository::new(&pool);

    for (email, role) in [
        ("requester@example.com", UserRole::Regular),
        ("reviewer@example.com", UserRole::Admin),
    ] {
        match users.create_user(email, role).await {
            Ok(user) => tracing::info!(id = %user.id, email = %user.email, "Seeded user"),
            Err(RepositoryError::Conflict(_)) => {
                tracing::info!(email = %email, "User already seeded, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
