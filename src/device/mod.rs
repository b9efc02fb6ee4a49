//! Device communication: HTTP transport client and state synchronizer

pub mod client;
pub mod sync;

pub use client::{DeviceCommand, DeviceTransport, HttpDeviceClient};
pub use sync::DeviceSync;
