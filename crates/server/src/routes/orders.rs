//! Order routes.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use atelier_core::{OrderId, OrderStatus};

use crate::error::AppError;
use crate::middleware::RequireActor;
use crate::models::OrderWithRoom;
use crate::services::CreateOrder;
use crate::state::AppState;

/// Body for `POST /orders/new`.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Free-form description of the requested work.
    pub description: String,
    /// Arbitrary key-value document describing the work in detail.
    pub specifications: serde_json::Value,
    /// Requested quantity.
    pub quantity: i32,
}

/// Query parameters for `GET /orders`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// 1-based page number (default 1).
    pub page: Option<i64>,
    /// Page size (default 10).
    pub count: Option<i64>,
}

/// Body for `PATCH /orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// Status to move the order to.
    pub status: OrderStatus,
}

/// `POST /orders/new` - create an order with its chat room.
pub async fn create(
    State(state): State<AppState>,
    RequireActor(actor): RequireActor,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderWithRoom>), AppError> {
    let created = state
        .orders()
        .create(
            actor,
            CreateOrder {
                description: body.description,
                specifications: body.specifications,
                quantity: body.quantity,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /orders` - list orders visible to the actor, newest first.
pub async fn list(
    State(state): State<AppState>,
    RequireActor(actor): RequireActor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderWithRoom>>, AppError> {
    let count = query.count.unwrap_or(10);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1).saturating_mul(count.max(0));

    let orders = state.orders().list(actor, offset, count).await?;
    Ok(Json(orders))
}

/// `GET /orders/{id}` - get one order.
pub async fn get(
    State(state): State<AppState>,
    RequireActor(actor): RequireActor,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithRoom>, AppError> {
    let order = state.orders().get(id, actor).await?;
    Ok(Json(order))
}

/// `PATCH /orders/{id}/status` - advance an order's status (admin only).
pub async fn update_status(
    State(state): State<AppState>,
    RequireActor(actor): RequireActor,
    Path(id): Path<OrderId>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<OrderWithRoom>, AppError> {
    let updated = state.orders().update_status(id, actor, body.status).await?;
    Ok(Json(updated))
}
