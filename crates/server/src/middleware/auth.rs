//! Actor extraction for route handlers.
//!
//! The broker never authenticates. The authentication proxy in front of it
//! verifies credentials and forwards the resulting identity as trusted
//! headers; this extractor only parses them into an [`Actor`]. Requests
//! reaching this service without the headers are misrouted and rejected
//! with 401.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};

use atelier_core::{Actor, UserId, UserRole};

/// Header carrying the verified user ID.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the verified user role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Extractor that requires a verified actor identity.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireActor(actor): RequireActor) -> impl IntoResponse {
///     format!("Hello, {}!", actor.id)
/// }
/// ```
pub struct RequireActor(pub Actor);

/// Error returned when the identity headers are missing or malformed.
#[derive(Debug)]
pub struct ActorRejection(String);

impl IntoResponse for ActorRejection {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, self.0).into_response()
    }
}

impl<S> FromRequestParts<S> for RequireActor
where
    S: Send + Sync,
{
    type Rejection = ActorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(parts, ACTOR_ID_HEADER)?
            .parse::<uuid::Uuid>()
            .map_err(|_| ActorRejection(format!("malformed {ACTOR_ID_HEADER} header")))?;

        let role = header_value(parts, ACTOR_ROLE_HEADER)?
            .parse::<UserRole>()
            .map_err(|_| ActorRejection(format!("malformed {ACTOR_ROLE_HEADER} header")))?;

        Ok(Self(Actor::new(UserId::new(id), role)))
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ActorRejection> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ActorRejection(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| ActorRejection(format!("malformed {name} header")))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(builder: axum::http::request::Builder) -> Result<Actor, ActorRejection> {
        let request = builder.body(()).expect("request");
        let (mut parts, ()) = request.into_parts();
        RequireActor::from_request_parts(&mut parts, &())
            .await
            .map(|RequireActor(actor)| actor)
    }

    #[tokio::test]
    async fn test_extracts_actor_from_headers() {
        let id = uuid::Uuid::new_v4();
        let actor = extract(
            Request::builder()
                .header(ACTOR_ID_HEADER, id.to_string())
                .header(ACTOR_ROLE_HEADER, "ADMIN"),
        )
        .await
        .expect("actor");

        assert_eq!(actor.id, UserId::new(id));
        assert_eq!(actor.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_rejects_missing_headers() {
        assert!(extract(Request::builder()).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_unknown_role() {
        let result = extract(
            Request::builder()
                .header(ACTOR_ID_HEADER, uuid::Uuid::new_v4().to_string())
                .header(ACTOR_ROLE_HEADER, "WIZARD"),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rejects_malformed_id() {
        let result = extract(
            Request::builder()
                .header(ACTOR_ID_HEADER, "not-a-uuid")
                .header(ACTOR_ROLE_HEADER, "REGULAR"),
        )
        .await;
        assert!(result.is_err());
    }
}
