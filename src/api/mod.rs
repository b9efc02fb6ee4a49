//! API module - HTTP handlers and routes

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::device::DeviceSync;

/// Shared handler state: the synchronizer injected at startup. No
/// ambient global; everything the handlers need travels through here.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<DeviceSync>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::health_check))
        // Dashboard data + controls
        .route("/data", get(handlers::get_data))
        .route("/button-press", post(handlers::button_press))
}
