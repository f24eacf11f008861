//! Alert Routes

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::AppState;
use tank_telemetry::{Alert, AlertSeverity};

/// Query parameters for alerts endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Filter by severity
    pub severity: Option<AlertSeverity>,
    /// Filter by tank id
    pub tank: Option<String>,
    /// Maximum number of records
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for alerts endpoint
#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub data: Vec<Alert>,
    pub count: usize,
}

/// Get recent alerts, newest first
pub async fn get_alerts(
    State(state): State<Arc<RwLock<AppState>>>,
    Query(params): Query<AlertQuery>,
) -> Json<AlertResponse> {
    let state = state.read().await;
    let alerts = state
        .alert_log
        .recent(params.limit, params.severity, params.tank.as_deref());

    Json(AlertResponse {
        count: alerts.len(),
        data: alerts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tank_telemetry::WaterParameter;

    fn state_with_alerts() -> Arc<RwLock<AppState>> {
        let state = AppState::empty();
        state.alert_log.record(Alert::threshold(
            "tank-1",
            WaterParameter::Ph,
            AlertSeverity::Warning,
            "pH 8.9 above safe range".to_string(),
            Utc::now(),
        ));
        state.alert_log.record(Alert::threshold(
            "tank-2",
            WaterParameter::Ammonia,
            AlertSeverity::Critical,
            "ammonia 1.2 above safe range".to_string(),
            Utc::now(),
        ));
        Arc::new(RwLock::new(state))
    }

    #[tokio::test]
    async fn test_get_alerts_newest_first() {
        let state = state_with_alerts();
        let response = get_alerts(
            State(state),
            Query(AlertQuery {
                severity: None,
                tank: None,
                limit: default_limit(),
            }),
        )
        .await;

        assert_eq!(response.0.count, 2);
        assert_eq!(response.0.data[0].id, "tank-2:ammonia");
        assert_eq!(response.0.data[1].id, "tank-1:ph");
    }

    #[tokio::test]
    async fn test_get_alerts_filters() {
        let state = state_with_alerts();
        let response = get_alerts(
            State(state.clone()),
            Query(AlertQuery {
                severity: Some(AlertSeverity::Critical),
                tank: None,
                limit: 10,
            }),
        )
        .await;
        assert_eq!(response.0.count, 1);
        assert_eq!(response.0.data[0].tank_id, "tank-2");

        let response = get_alerts(
            State(state),
            Query(AlertQuery {
                severity: None,
                tank: Some("tank-1".to_string()),
                limit: 10,
            }),
        )
        .await;
        assert_eq!(response.0.count, 1);
        assert_eq!(response.0.data[0].id, "tank-1:ph");
    }
}
