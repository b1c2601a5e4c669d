use serde::Deserialize;

use super::controller::config::DoorControllerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct DoorConfig {
  /// The MQTT topic JSON requests are received on
  pub command_topic: String,
  /// The MQTT topic the door's logical state is published (retained) to
  pub state_topic: String,
  /// The MQTT topic replies to requests are published to. Replies are skipped if unset.
  pub response_topic: Option<String>,

  #[serde(flatten)]
  pub controller: DoorControllerConfig,
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[test]
  fn controller_settings_sit_beside_the_topics() {
    let config: DoorConfig = toml::from_str(
      r#"
        command_topic = "sesame/door/command"
        state_topic = "sesame/door/state"
        stuck_timeout = 20
      "#,
    )
    .unwrap();

    assert_eq!(config.command_topic, "sesame/door/command");
    assert_eq!(config.response_topic, None);
    assert_eq!(config.controller.stuck_timeout, Duration::from_secs(20));
    assert_eq!(config.controller.logs_page_size, 10);
  }
}
