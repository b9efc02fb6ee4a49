//! Data models for thermo-gateway

use serde::{Deserialize, Serialize};

// ============================================================================
// Device wire types
// ============================================================================

/// One response body from the device data endpoint. Every field is
/// optional on the wire; absent keys deserialize to `None`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReading {
    pub current_temperature: Option<f64>,
    pub current_humidity: Option<f64>,
    pub target_temperature: Option<f64>,
    pub running_time: Option<f64>,
}

/// The cached last-known device state, served on `GET /data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub current_temperature: Option<f64>,
    pub current_humidity: Option<f64>,
    pub target_temperature: Option<f64>,
    pub running_time: Option<f64>,
}

// ============================================================================
// Dashboard request types
// ============================================================================

/// Body of `POST /button-press`.
#[derive(Debug, Deserialize)]
pub struct ButtonPressRequest {
    pub action: ButtonAction,
}

/// The four dashboard buttons. Closed set: anything else is rejected at
/// the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ButtonAction {
    IncreaseTargetTemp,
    DecreaseTargetTemp,
    IncreaseRunningTime,
    DecreaseRunningTime,
}
