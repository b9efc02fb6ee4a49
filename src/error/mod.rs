//! Error handling module

use thiserror::Error;

/// Failures talking to the device after startup. All variants are
/// non-fatal: the refresh loop logs them and keeps the last-known
/// snapshot, and command delivery failures are swallowed at the
/// synchronizer boundary.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("device request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("device returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("unparseable device response: {0}")]
    Parse(String),
}

/// Startup-time construction failure. Fatal: the process must not come
/// up without a reachable device.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("device did not respond to liveness probe")]
    ProbeFailed,
}
