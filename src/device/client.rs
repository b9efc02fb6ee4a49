//! Device HTTP client
//!
//! Stateless transport wrapper around the controller's HTTP API. The
//! device owns the actual increment/decrement logic; this client's only
//! job is delivering the intent and reporting transport-level failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::DeviceError;
use crate::models::DeviceReading;

// ============================================================================
// Types
// ============================================================================

/// A one-way instruction to the device. Each variant maps to a fixed
/// action endpoint; the device applies the step size itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    IncreaseTargetTemperature,
    DecreaseTargetTemperature,
    IncreaseRunningTime,
    DecreaseRunningTime,
}

impl DeviceCommand {
    pub fn endpoint(&self) -> &'static str {
        match self {
            DeviceCommand::IncreaseTargetTemperature => "api/increase-target-temperature",
            DeviceCommand::DecreaseTargetTemperature => "api/decrease-target-temperature",
            DeviceCommand::IncreaseRunningTime => "api/increase-running-time",
            DeviceCommand::DecreaseRunningTime => "api/decrease-running-time",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCommand::IncreaseTargetTemperature => "increase-target-temperature",
            DeviceCommand::DecreaseTargetTemperature => "decrease-target-temperature",
            DeviceCommand::IncreaseRunningTime => "increase-running-time",
            DeviceCommand::DecreaseRunningTime => "decrease-running-time",
        }
    }
}

/// Transport seam between the synchronizer and the device. The HTTP
/// implementation below is the only production one; tests drive the
/// synchronizer through a recording fake.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Liveness probe with a bounded timeout. Construction-time use only.
    async fn probe(&self) -> bool;

    /// Fetch the current readings from the data endpoint.
    async fn fetch(&self) -> Result<DeviceReading, DeviceError>;

    /// Deliver a command. No body, no retry; non-2xx is an error.
    async fn send_command(&self, command: DeviceCommand) -> Result<(), DeviceError>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// reqwest-backed transport for the real device. Holds no mutable state,
/// so a single instance is freely shared across tasks.
pub struct HttpDeviceClient {
    api_base: String,
    client: Client,
    probe_timeout: Duration,
}

impl HttpDeviceClient {
    pub fn new(api_base: impl Into<String>, probe_timeout: Duration) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            api_base,
            client: Client::new(),
            probe_timeout,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }
}

#[async_trait]
impl DeviceTransport for HttpDeviceClient {
    async fn probe(&self) -> bool {
        let result = self
            .client
            .get(self.url("api/fetch_data"))
            .timeout(self.probe_timeout)
            .send()
            .await;

        matches!(result, Ok(res) if res.status().is_success())
    }

    async fn fetch(&self) -> Result<DeviceReading, DeviceError> {
        let res = self.client.get(self.url("api/fetch_data")).send().await?;

        if !res.status().is_success() {
            return Err(DeviceError::Status(res.status()));
        }

        let body = res.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| DeviceError::Parse(e.to_string()))
    }

    async fn send_command(&self, command: DeviceCommand) -> Result<(), DeviceError> {
        let res = self.client.post(self.url(command.endpoint())).send().await?;

        if !res.status().is_success() {
            return Err(DeviceError::Status(res.status()));
        }

        Ok(())
    }
}
