//! HTTP handlers module

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ButtonAction, ButtonPressRequest};

use super::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub sync_running: bool,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "thermo-gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sync_running: state.sync.is_running(),
        last_refresh: state.sync.last_refresh().await,
    })
}

/// GET /data - Last-known device readings from the cached snapshot.
/// Never touches the device; fields are null until the first successful
/// refresh.
pub async fn get_data(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sync.snapshot().await)
}

/// POST /button-press - Forward a dashboard button to the device.
/// Responds success regardless of delivery outcome; the dashboard polls
/// /data and shows whatever the device actually did.
pub async fn button_press(
    State(state): State<AppState>,
    Json(req): Json<ButtonPressRequest>,
) -> impl IntoResponse {
    match req.action {
        ButtonAction::IncreaseTargetTemp => state.sync.increase_target_temperature().await,
        ButtonAction::DecreaseTargetTemp => state.sync.decrease_target_temperature().await,
        ButtonAction::IncreaseRunningTime => state.sync.increase_running_time().await,
        ButtonAction::DecreaseRunningTime => state.sync.decrease_running_time().await,
    }

    Json(serde_json::json!({ "status": "success" }))
}
