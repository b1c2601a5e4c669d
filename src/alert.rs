use std::fmt;

use rumqttc::QoS;
use serde::Deserialize;

use crate::mqtt_client::{MqttPublish, PublishSender};

/// Something an operator should hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
  /// An open or close was never confirmed by the switches
  DoorStuck,
  /// Opening took noticeably longer than the reference duration
  MaintenanceNeeded,
  /// Closing took noticeably longer than the reference duration
  MaintenanceAlert,
  Lock,
  Unlock,
}

impl fmt::Display for Alert {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Alert::DoorStuck => write!(f, "doorstuck"),
      Alert::MaintenanceNeeded => write!(f, "maintenance"),
      Alert::MaintenanceAlert => write!(f, "maintenancealert"),
      Alert::Lock => write!(f, "lock"),
      Alert::Unlock => write!(f, "unlock"),
    }
  }
}

/// Fire and forget. Delivery failures are logged by the sink, never returned.
pub trait AlertSink: Send + Sync {
  fn notify(&self, alert: Alert);
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
  /// The MQTT topic alert events are published on
  pub alert_topic: String,
}

/// Publishes each alert's event name on the alert topic
#[derive(Debug)]
pub struct MqttAlertSink {
  alert_topic: String,
  mqtt_tx: PublishSender,
}

impl MqttAlertSink {
  pub fn new(config: AlertConfig, mqtt_tx: PublishSender) -> Self {
    MqttAlertSink {
      alert_topic: config.alert_topic,
      mqtt_tx,
    }
  }
}

impl AlertSink for MqttAlertSink {
  fn notify(&self, alert: Alert) {
    log::warn!("Raising alert: {}", alert);
    let publish = MqttPublish {
      topic: self.alert_topic.clone(),
      qos: QoS::AtLeastOnce,
      retain: false,
      payload: alert.to_string(),
    };
    if self.mqtt_tx.send(publish).is_err() {
      log::error!("Unable to deliver {} alert, MQTT channel closed", alert);
    }
  }
}

#[cfg(test)]
mod tests {
  use tokio::sync::mpsc;

  use super::*;

  #[test]
  fn alerts_publish_their_event_name() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = MqttAlertSink::new(
      AlertConfig {
        alert_topic: "sesame/alerts".to_owned(),
      },
      tx,
    );

    sink.notify(Alert::DoorStuck);

    let publish = rx.try_recv().unwrap();
    assert_eq!(publish.topic, "sesame/alerts");
    assert_eq!(publish.payload, "doorstuck");
  }

  #[test]
  fn delivery_failure_is_swallowed() {
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    let sink = MqttAlertSink::new(
      AlertConfig {
        alert_topic: "sesame/alerts".to_owned(),
      },
      tx,
    );

    sink.notify(Alert::MaintenanceNeeded);
  }
}
