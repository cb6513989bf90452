//! HTTP handlers for customer measurement history

use axum::{extract::State, Json};
use uuid::Uuid;

use shared::models::MeasurementEntry;

use super::Path;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::measurement;
use crate::AppState;

pub async fn get_measurement_history(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<Json<Vec<MeasurementEntry>>> {
    let history = measurement::history(&state.store(), customer_id).await?;
    Ok(Json(history))
}
