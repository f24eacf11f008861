//! Tank Monitoring API Server
//!
//! REST surface over the per-tank monitoring workers: recent alerts, molt
//! risk snapshots, and per-parameter severities.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use alert_dispatch::LogNotifier;
use metrics_exporter_prometheus::PrometheusBuilder;
use molt_risk::{MoltEvent, MoltState};
use tank_monitor::{
    ChannelMoltObservationSource, ChannelTelemetrySource, MonitorConfig, MonitorError,
    MonitorHandle, SharedThresholdsStore, TankMonitor,
};
use tank_telemetry::{AlertSeverity, Reading, TelemetryError, Thresholds};
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod log;
mod rate_limit;
mod routes;
mod settings;

pub use crate::log::AlertLog;
pub use rate_limit::{create_governor_config, RateLimitConfig};
pub use settings::{MoltPreset, Settings};

/// Server startup failures.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Metrics recorder error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Producer handles for one tank, used by the acquisition layer to feed
/// readings and detections into the pipeline.
pub struct TankInputs {
    pub readings: mpsc::Sender<Reading>,
    pub events: mpsc::Sender<MoltEvent>,
    pub thresholds: Arc<SharedThresholdsStore>,
}

/// Application state shared across handlers
pub struct AppState {
    /// Running monitor workers by tank id
    pub tanks: HashMap<String, MonitorHandle>,
    /// Producer side of each tank's input streams
    pub inputs: HashMap<String, TankInputs>,
    /// Recent dispatched alerts
    pub alert_log: Arc<AlertLog>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Spawn a monitor worker per configured tank and wire its alert feed
    /// into the shared log. Must be called from within a tokio runtime.
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let alert_log = Arc::new(AlertLog::new(settings.alert_log_capacity));
        let notifier = Arc::new(LogNotifier);

        let mut tanks = HashMap::new();
        let mut inputs = HashMap::new();
        for tank_id in &settings.tanks {
            let mut telemetry = ChannelTelemetrySource::new(64);
            let mut observations = ChannelMoltObservationSource::new(16);
            let store = Arc::new(SharedThresholdsStore::new(Thresholds::default())?);

            let mut config = MonitorConfig::new(tank_id.clone());
            config.molt = settings.molt_preset.molt_config();

            let readings = telemetry.sender();
            let events = observations.sender();
            let handle = TankMonitor::spawn(
                config,
                &mut telemetry,
                &mut observations,
                store.as_ref(),
                notifier.clone(),
            )?;

            forward_alerts(tank_id.clone(), handle.subscribe_alerts(), alert_log.clone());

            tanks.insert(tank_id.clone(), handle);
            inputs.insert(
                tank_id.clone(),
                TankInputs {
                    readings,
                    events,
                    thresholds: store,
                },
            );
        }

        Ok(Self {
            tanks,
            inputs,
            alert_log,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        })
    }

    /// State with no tanks, for embedding and tests.
    pub fn empty() -> Self {
        Self {
            tanks: HashMap::new(),
            inputs: HashMap::new(),
            alert_log: Arc::new(AlertLog::new(512)),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Drain a tank's alert feed into the shared log.
fn forward_alerts(
    tank_id: String,
    mut feed: broadcast::Receiver<tank_telemetry::Alert>,
    alert_log: Arc<AlertLog>,
) {
    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(alert) => {
                    metrics::counter!("moltwatch_alerts_dispatched_total").increment(1);
                    alert_log.record(alert);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("[{}] alert log fell behind, skipped {}", tank_id, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub tanks: Vec<TankHealth>,
    pub metrics: SystemMetrics,
}

/// Per-tank summary within the health response
#[derive(Debug, Serialize)]
pub struct TankHealth {
    pub tank_id: String,
    pub molt_state: MoltState,
    pub molt_severity: AlertSeverity,
}

/// System metrics
#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub tank_count: usize,
    pub alert_count: usize,
}

/// Create the application router
pub fn create_router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/alerts", get(routes::alerts::get_alerts))
        .route("/api/v1/tanks/:tank_id/molt", get(routes::molt::get_molt_risk))
        .route(
            "/api/v1/tanks/:tank_id/severity",
            get(routes::severity::get_severity),
        )
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<RwLock<AppState>>>) -> Json<HealthResponse> {
    let state = state.read().await;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut tanks: Vec<TankHealth> = state
        .tanks
        .values()
        .map(|handle| {
            let snapshot = handle.snapshot();
            TankHealth {
                tank_id: snapshot.tank_id,
                molt_state: snapshot.state,
                molt_severity: snapshot.severity,
            }
        })
        .collect();
    tanks.sort_by(|a, b| a.tank_id.cmp(&b.tank_id));

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        metrics: SystemMetrics {
            tank_count: tanks.len(),
            alert_count: state.alert_log.len(),
        },
        tanks,
    })
}

/// JSON body for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub(crate) fn not_found(what: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("{} not found", what),
        }),
    )
}

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Run the server
pub async fn run_server(settings: Settings) -> Result<(), ApiError> {
    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let state = Arc::new(RwLock::new(AppState::new(&settings)?));
    let governor_config = create_governor_config(&settings.rate_limit);

    let metrics_handle = prometheus.clone();
    let app = create_router(state)
        .route(
            "/metrics",
            get(move || std::future::ready(metrics_handle.render())),
        )
        .layer(GovernorLayer {
            config: governor_config,
        })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!("Starting API server on {}", settings.bind_addr);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_configured_tanks() {
        let settings = Settings {
            tanks: vec!["tank-a".to_string(), "tank-b".to_string()],
            ..Default::default()
        };
        let state = Arc::new(RwLock::new(AppState::new(&settings).unwrap()));

        let response = health_handler(State(state)).await;
        assert_eq!(response.0.status, "healthy");
        assert_eq!(response.0.metrics.tank_count, 2);
        assert_eq!(response.0.tanks[0].tank_id, "tank-a");
        assert_eq!(response.0.tanks[0].molt_state, MoltState::None);
    }

    #[tokio::test]
    async fn test_empty_state_health() {
        let state = Arc::new(RwLock::new(AppState::empty()));
        let response = health_handler(State(state)).await;
        assert_eq!(response.0.metrics.tank_count, 0);
        assert_eq!(response.0.metrics.alert_count, 0);
    }
}
