use rumqttc::{AsyncClient, LastWill, MqttOptions, QoS};
use serde::Deserialize;
use tokio::sync::mpsc;

pub use self::{
  receiver::{MqttReceiver, PublishReceiver},
  sender::{MqttSender, PublishSender},
};
use crate::error::GarageResult;

pub mod receiver;
pub mod sender;

/// Requests queued in the client before the event loop picks them up
const REQUEST_CAPACITY: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct MqttClientConfig {
  pub broker_domain: String,
  #[serde(default = "default_broker_port")]
  pub broker_port: u16,
  pub client_id: String,
  pub username: Option<String>,
  pub password: Option<String>,
  /// Retained topic announcing whether the service is online
  pub availability_topic: String,
  #[serde(default = "default_online_availability")]
  pub online_availability: String,
  #[serde(default = "default_offline_availability")]
  pub offline_availability: String,
}

fn default_broker_port() -> u16 {
  1883
}

fn default_online_availability() -> String {
  "online".to_owned()
}

fn default_offline_availability() -> String {
  "offline".to_owned()
}

/// A message to publish, or one that was received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttPublish {
  pub topic: String,
  pub qos: QoS,
  pub retain: bool,
  pub payload: String,
}

pub struct MqttClient {
  pub receiver: MqttReceiver,
  pub sender: MqttSender,
  availability_topic: String,
  online_availability: String,
}

impl MqttClient {
  /// Create the client, returning a channel anything can publish through
  pub fn with_config(config: MqttClientConfig) -> (PublishSender, MqttClient) {
    let mut options = MqttOptions::new(config.client_id, config.broker_domain, config.broker_port);
    options.set_last_will(LastWill::new(
      config.availability_topic.clone(),
      config.offline_availability,
      QoS::AtLeastOnce,
      true,
    ));
    if let (Some(username), Some(password)) = (config.username, config.password) {
      options.set_credentials(username, password);
    }

    let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
    let (send_channel, publish_rx) = mpsc::unbounded_channel();

    let mqtt_client = MqttClient {
      receiver: MqttReceiver::new(client.clone(), event_loop),
      sender: MqttSender::new(client, publish_rx),
      availability_topic: config.availability_topic,
      online_availability: config.online_availability,
    };

    (send_channel, mqtt_client)
  }

  /// Announce our availability
  pub async fn announce(&self) -> GarageResult<()> {
    log::info!("Announcing availability on {}", self.availability_topic);
    self
      .sender
      .publish(MqttPublish {
        topic: self.availability_topic.clone(),
        qos: QoS::AtLeastOnce,
        retain: true,
        payload: self.online_availability.clone(),
      })
      .await
  }
}
