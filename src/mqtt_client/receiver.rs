use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use tokio::sync::mpsc;

use super::MqttPublish;
use crate::error::{GarageError, GarageResult};

pub type PublishReceiver = mpsc::UnboundedReceiver<MqttPublish>;

/// Drives the MQTT connection and fans incoming publishes out to subscribers
pub struct MqttReceiver {
  client: AsyncClient,
  event_loop: EventLoop,
  subscriptions: Vec<(String, mpsc::UnboundedSender<MqttPublish>)>,
}

impl MqttReceiver {
  pub fn new(client: AsyncClient, event_loop: EventLoop) -> Self {
    MqttReceiver {
      client,
      event_loop,
      subscriptions: Vec::new(),
    }
  }

  /// Subscribe to a topic filter, returning a channel of every matching publish
  pub async fn subscribe(&mut self, filter: String, qos: QoS) -> GarageResult<PublishReceiver> {
    log::info!("Subscribing to {}", filter);
    self.client.subscribe(filter.clone(), qos).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    self.subscriptions.push((filter, tx));
    Ok(rx)
  }

  /// Runs forever unless the connection fails
  pub async fn receive_messages(&mut self) -> GarageResult<()> {
    loop {
      let event = self.event_loop.poll().await?;
      if let Event::Incoming(Packet::Publish(publish)) = event {
        let payload = match String::from_utf8(publish.payload.to_vec()) {
          Ok(payload) => payload,
          Err(e) => {
            log::warn!("Dropping non UTF-8 payload on {}: {}", publish.topic, e);
            continue;
          }
        };

        let message = MqttPublish {
          topic: publish.topic,
          qos: publish.qos,
          retain: publish.retain,
          payload,
        };

        self.dispatch(message)?;
      }
    }
  }

  fn dispatch(&mut self, message: MqttPublish) -> GarageResult<()> {
    // drop subscribers that have gone away
    self.subscriptions.retain(|(_, tx)| !tx.is_closed());
    if self.subscriptions.is_empty() {
      return Err(GarageError::MqttClosed);
    }

    for (filter, tx) in &self.subscriptions {
      if rumqttc::matches(&message.topic, filter) {
        // a send can only fail if the subscriber just dropped, which the next dispatch cleans up
        let _ = tx.send(message.clone());
      }
    }

    Ok(())
  }
}
