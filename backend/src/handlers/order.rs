//! HTTP handlers for order endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::models::{Order, OrderTracking, StockMovement};

use super::{MessageResponse, Path};
use crate::error::AppResult;
use crate::middleware::{require_admin, require_elevated, CurrentUser};
use crate::services::order::{CreateOrderInput, UpdateOrderInput};
use crate::AppState;

/// List orders that are not in the trash
pub async fn list_orders(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state.order_service().list_orders().await?;
    Ok(Json(orders))
}

/// List trashed orders
pub async fn list_trashed_orders(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state.order_service().list_trash().await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = state.order_service().get_order(order_id).await?;
    Ok(Json(order))
}

/// Create an order
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let order = state
        .order_service()
        .create_order(input, Some(current_user.0.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Update an order
pub async fn update_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<Json<Order>> {
    let order = state
        .order_service()
        .update_order(order_id, input, Some(current_user.0.user_id))
        .await?;
    Ok(Json(order))
}

/// Move an order to the trash
pub async fn delete_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    require_elevated(&current_user.0)?;
    let order = state
        .order_service()
        .soft_delete(order_id, Some(current_user.0.user_id))
        .await?;
    Ok(Json(order))
}

/// Restore an order from the trash
pub async fn restore_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    require_elevated(&current_user.0)?;
    let order = state
        .order_service()
        .restore(order_id, Some(current_user.0.user_id))
        .await?;
    Ok(Json(order))
}

/// Permanently delete an order and release its stock
pub async fn force_delete_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&current_user.0)?;
    state
        .order_service()
        .force_delete(order_id, Some(current_user.0.user_id))
        .await?;
    Ok(Json(MessageResponse::new("Order permanently deleted")))
}

/// Stock movements referencing an order
pub async fn get_order_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let movements = state.order_service().movements_for_order(order_id).await?;
    Ok(Json(movements))
}

/// Public order tracking page data
/// This endpoint is unauthenticated; the code is shared with the customer
pub async fn track_order(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<OrderTracking>> {
    let tracking = state.order_service().track_order(&code).await?;
    Ok(Json(tracking))
}
