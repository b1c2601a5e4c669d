use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct DoorControllerConfig {
  #[serde_as(as = "DurationSeconds<u64>")]
  #[serde(default = "default_stuck_timeout")]
  /// How long an open/close may go unconfirmed before the door is declared stuck
  pub stuck_timeout: Duration,

  #[serde_as(as = "DurationMilliSeconds<u64>")]
  #[serde(default = "default_reference_time")]
  /// Expected opening time, used when none has been stored. Openings more than 10% slower raise an alert.
  pub reference_opening_time: Duration,

  #[serde_as(as = "DurationMilliSeconds<u64>")]
  #[serde(default = "default_reference_time")]
  /// Expected closing time, used when none has been stored. Closings more than 10% slower raise an alert.
  pub reference_closing_time: Duration,

  #[serde(default)]
  pub lock: LockConfig,

  #[serde(default = "default_logs_page_size")]
  pub logs_page_size: usize,

  #[serde(default = "default_durations_page_size")]
  pub durations_page_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
  /// If false the lock is never enforced
  #[serde(default)]
  pub enabled: bool,
  #[serde(default = "default_initially_locked")]
  pub initially_locked: bool,
}

impl Default for LockConfig {
  fn default() -> Self {
    LockConfig {
      enabled: false,
      initially_locked: default_initially_locked(),
    }
  }
}

impl Default for DoorControllerConfig {
  fn default() -> Self {
    DoorControllerConfig {
      stuck_timeout: default_stuck_timeout(),
      reference_opening_time: default_reference_time(),
      reference_closing_time: default_reference_time(),
      lock: LockConfig::default(),
      logs_page_size: default_logs_page_size(),
      durations_page_size: default_durations_page_size(),
    }
  }
}

fn default_stuck_timeout() -> Duration {
  Duration::from_secs(10)
}

fn default_reference_time() -> Duration {
  Duration::from_millis(20000)
}

fn default_initially_locked() -> bool {
  true
}

fn default_logs_page_size() -> usize {
  10
}

fn default_durations_page_size() -> usize {
  20
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_uses_defaults() {
    let config: DoorControllerConfig = toml::from_str("").unwrap();
    assert_eq!(config.stuck_timeout, Duration::from_secs(10));
    assert_eq!(config.reference_opening_time, Duration::from_millis(20000));
    assert_eq!(config.reference_closing_time, Duration::from_millis(20000));
    assert!(!config.lock.enabled);
    assert!(config.lock.initially_locked);
    assert_eq!(config.logs_page_size, 10);
    assert_eq!(config.durations_page_size, 20);
  }

  #[test]
  fn durations_are_read_in_their_units() {
    let config: DoorControllerConfig = toml::from_str(
      r#"
        stuck_timeout = 15
        reference_opening_time = 12500
        reference_closing_time = 9000

        [lock]
        enabled = true
        initially_locked = false
      "#,
    )
    .unwrap();

    assert_eq!(config.stuck_timeout, Duration::from_secs(15));
    assert_eq!(config.reference_opening_time, Duration::from_millis(12500));
    assert_eq!(config.reference_closing_time, Duration::from_millis(9000));
    assert!(config.lock.enabled);
    assert!(!config.lock.initially_locked);
  }
}
