//! Configuration module

use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub device: DeviceConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the static dashboard files, served on unmatched
    /// paths when set.
    #[serde(default)]
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    /// Base address of the device HTTP API, e.g. `http://192.168.50.100`.
    pub api_base: String,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_refresh_interval_ms() -> u64 {
    250
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("THERMO").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;

        // Catch a bad device address at startup instead of on the first poll
        Url::parse(&config.device.api_base)
            .map_err(|e| anyhow::anyhow!("invalid device.api_base {:?}: {}", config.device.api_base, e))?;

        Ok(config)
    }
}
