use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
  alert::AlertConfig,
  door::DoorConfig,
  error::{GarageError, GarageResult},
  gateway::mqtt::MqttGatewayConfig,
  mqtt_client::MqttClientConfig,
};

pub const DEFAULT_CONFIG_PATH: &str = "sesame-config.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
  /// The MQTT configuration
  pub mqtt_client: MqttClientConfig,
  /// Where the device bridge publishes and listens
  pub gateway: MqttGatewayConfig,
  pub door: DoorConfig,
  pub alerts: AlertConfig,
  #[serde(default)]
  pub store: StoreConfig,
  /// Overrides the default `info` log level
  pub log_level: Option<log::LevelFilter>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
  /// The JSON snapshot file. The store is kept in memory only if unset.
  pub path: Option<PathBuf>,
}

impl Config {
  pub fn load(path: &Path) -> GarageResult<Config> {
    let config_error = |message: String| GarageError::Config {
      path: path.display().to_string(),
      message,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
    toml::from_str(&raw).map_err(|e| config_error(e.to_string()))
  }
}
