//! Per-Parameter Severity Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{not_found, AppState, ErrorBody};
use tank_monitor::SeverityMap;

/// Response for the severity endpoint
#[derive(Debug, Serialize)]
pub struct SeverityResponse {
    pub tank_id: String,
    /// Parameters currently outside their configured ranges
    pub parameters: SeverityMap,
}

/// Get the active per-parameter severities for one tank.
///
/// Parameters inside their ranges are absent from the map.
pub async fn get_severity(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(tank_id): Path<String>,
) -> Result<Json<SeverityResponse>, (StatusCode, Json<ErrorBody>)> {
    let state = state.read().await;
    let handle = state.tanks.get(&tank_id).ok_or_else(|| not_found("tank"))?;
    Ok(Json(SeverityResponse {
        tank_id,
        parameters: handle.severities(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Settings;

    #[tokio::test]
    async fn test_fresh_tank_has_no_active_severities() {
        let settings = Settings {
            tanks: vec!["tank-1".to_string()],
            ..Default::default()
        };
        let state = Arc::new(RwLock::new(AppState::new(&settings).unwrap()));

        let response = get_severity(State(state), Path("tank-1".to_string()))
            .await
            .unwrap();
        assert_eq!(response.0.tank_id, "tank-1");
        assert!(response.0.parameters.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tank_is_404() {
        let state = Arc::new(RwLock::new(AppState::empty()));
        let err = get_severity(State(state), Path("tank-9".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }
}
