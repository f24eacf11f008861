//! Molt Risk Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{not_found, AppState, ErrorBody};
use molt_risk::MoltRiskSnapshot;

/// Get the current molt risk snapshot for one tank
pub async fn get_molt_risk(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(tank_id): Path<String>,
) -> Result<Json<MoltRiskSnapshot>, (StatusCode, Json<ErrorBody>)> {
    let state = state.read().await;
    let handle = state.tanks.get(&tank_id).ok_or_else(|| not_found("tank"))?;
    Ok(Json(handle.snapshot()))
}
