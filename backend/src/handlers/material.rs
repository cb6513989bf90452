//! HTTP handlers for material and stock endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use shared::models::{Material, StockMovement};

use super::Path;
use crate::error::AppResult;
use crate::middleware::{require_elevated, CurrentUser};
use crate::services::material::{AdjustStockInput, CreateMaterialInput, UpdateMaterialInput};
use crate::AppState;

/// Result of a stock adjustment
#[derive(Debug, Serialize)]
pub struct AdjustStockResponse {
    pub material: Material,
    pub movement: StockMovement,
}

pub async fn list_materials(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Material>>> {
    let materials = state.material_service().list_materials().await?;
    Ok(Json(materials))
}

/// Materials at or below their low-stock threshold
pub async fn list_low_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Material>>> {
    let materials = state.material_service().low_stock().await?;
    Ok(Json(materials))
}

pub async fn get_material(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<Material>> {
    let material = state.material_service().get_material(material_id).await?;
    Ok(Json(material))
}

pub async fn create_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateMaterialInput>,
) -> AppResult<(StatusCode, Json<Material>)> {
    require_elevated(&current_user.0)?;
    let material = state
        .material_service()
        .create_material(input, Some(current_user.0.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(material)))
}

/// Direct edit; a quantity change is logged as a stock movement
pub async fn update_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
    Json(input): Json<UpdateMaterialInput>,
) -> AppResult<Json<Material>> {
    require_elevated(&current_user.0)?;
    let material = state
        .material_service()
        .update_material(material_id, input, Some(current_user.0.user_id))
        .await?;
    Ok(Json(material))
}

/// Move a material to the trash
pub async fn delete_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<Material>> {
    require_elevated(&current_user.0)?;
    let material = state
        .material_service()
        .soft_delete_material(material_id, Some(current_user.0.user_id))
        .await?;
    Ok(Json(material))
}

/// Restore a material from the trash
pub async fn restore_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<Material>> {
    require_elevated(&current_user.0)?;
    let material = state
        .material_service()
        .restore_material(material_id, Some(current_user.0.user_id))
        .await?;
    Ok(Json(material))
}

/// Manual stock adjustment
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<AdjustStockResponse>> {
    let (material, movement) = state
        .material_service()
        .adjust_stock(material_id, input, Some(current_user.0.user_id))
        .await?;
    Ok(Json(AdjustStockResponse { material, movement }))
}

/// Movement history of a material
pub async fn list_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let movements = state.material_service().list_movements(material_id).await?;
    Ok(Json(movements))
}
