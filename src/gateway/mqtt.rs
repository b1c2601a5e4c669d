//! Device gateway bridged over MQTT.
//!
//! The device bridge publishes every property value retained on `{prefix}/{object}/{instance}/{property}`,
//! listens for executes on `{prefix}/{object}/{instance}/{property}/execute` and forwards switch observations
//! to `{prefix}/notifications/{opened|closed}`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use rumqttc::QoS;
use serde::Deserialize;
use serde_json::Value;
use tokio::{
  sync::{Notify, RwLock},
  task::JoinHandle,
};

use super::{DeviceGateway, Property};
use crate::{
  door::state::OptoSide,
  error::{GarageError, GarageResult},
  mqtt_client::{MqttPublish, PublishReceiver, PublishSender},
};

#[derive(Debug, Clone, Deserialize)]
pub struct MqttGatewayConfig {
  /// The topic everything the device bridge publishes sits under
  pub topic_prefix: String,
}

#[derive(Debug, Clone)]
pub struct MqttGateway {
  topic_prefix: String,
  /// Last value seen on each property topic
  properties: Arc<RwLock<HashMap<String, Value>>>,
  updated: Arc<Notify>,
  mqtt_tx: PublishSender,
}

impl MqttGateway {
  pub fn new(config: MqttGatewayConfig, mqtt_tx: PublishSender) -> Self {
    MqttGateway {
      topic_prefix: config.topic_prefix.trim_end_matches('/').to_owned(),
      properties: Arc::new(RwLock::new(HashMap::new())),
      updated: Arc::new(Notify::new()),
      mqtt_tx,
    }
  }

  /// Filter matching every property value topic
  pub fn property_filter(&self) -> String {
    format!("{}/+/+/+", self.topic_prefix)
  }

  pub fn property_topic(&self, object: u16, instance: u16, property: Property) -> String {
    format!("{}/{}/{}/{}", self.topic_prefix, object, instance, property)
  }

  pub fn notification_topic(&self, side: OptoSide) -> String {
    format!("{}/notifications/{}", self.topic_prefix, side)
  }

  /// Keep the property cache up to date from the property subscription
  pub fn listen(&self, mut property_rx: PublishReceiver) -> JoinHandle<()> {
    let gateway = self.clone();
    tokio::spawn(async move {
      while let Some(publish) = property_rx.recv().await {
        gateway.receive(publish).await;
      }
      log::debug!("Gateway property channel closed");
    })
  }

  async fn receive(&self, publish: MqttPublish) {
    // the bridge sends JSON scalars; anything else is kept as the raw string
    let value = serde_json::from_str::<Value>(&publish.payload).unwrap_or(Value::String(publish.payload));
    log::debug!("Property {} = {}", publish.topic, value);
    self.properties.write().await.insert(publish.topic, value);
    self.updated.notify_waiters();
  }

  /// Wait until all `properties` have been reported, giving up after `timeout`.
  ///
  /// Returns false on timeout.
  pub async fn wait_for(&self, properties: &[(u16, u16, Property)], timeout: Duration) -> bool {
    let topics: Vec<String> = properties
      .iter()
      .map(|(object, instance, property)| self.property_topic(*object, *instance, *property))
      .collect();

    tokio::time::timeout(timeout, async {
      loop {
        let notified = self.updated.notified();
        {
          let cache = self.properties.read().await;
          if topics.iter().all(|topic| cache.contains_key(topic)) {
            return;
          }
        }
        notified.await;
      }
    })
    .await
    .is_ok()
  }
}

impl DeviceGateway for MqttGateway {
  async fn read_property(&self, object: u16, instance: u16, property: Property) -> GarageResult<Option<Value>> {
    let topic = self.property_topic(object, instance, property);
    Ok(self.properties.read().await.get(&topic).cloned())
  }

  async fn trigger_property(&self, object: u16, instance: u16, property: Property) -> GarageResult<()> {
    let topic = format!("{}/execute", self.property_topic(object, instance, property));
    log::debug!("Executing {}", topic);
    self
      .mqtt_tx
      .send(MqttPublish {
        topic,
        qos: QoS::AtLeastOnce,
        retain: false,
        payload: String::new(),
      })
      .map_err(|_| GarageError::Gateway(format!("unable to execute {property}, MQTT channel closed")))
  }
}
