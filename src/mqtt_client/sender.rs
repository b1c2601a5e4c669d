use rumqttc::AsyncClient;
use tokio::sync::mpsc;

use super::MqttPublish;
use crate::error::GarageResult;

/// Anything that wants to publish holds one of these
pub type PublishSender = mpsc::UnboundedSender<MqttPublish>;

/// Forwards queued publishes to the broker, in the order they were queued
pub struct MqttSender {
  client: AsyncClient,
  publish_rx: mpsc::UnboundedReceiver<MqttPublish>,
}

impl MqttSender {
  pub fn new(client: AsyncClient, publish_rx: mpsc::UnboundedReceiver<MqttPublish>) -> Self {
    MqttSender { client, publish_rx }
  }

  /// Publish directly, bypassing the queue
  pub async fn publish(&self, publish: MqttPublish) -> GarageResult<()> {
    log::debug!(
      "Publishing to {}{}: {}",
      publish.topic,
      if publish.retain { " (retained)" } else { "" },
      publish.payload
    );
    self
      .client
      .publish(publish.topic, publish.qos, publish.retain, publish.payload)
      .await?;
    Ok(())
  }

  /// Runs until every `PublishSender` has been dropped
  pub async fn send_messages(&mut self) -> GarageResult<()> {
    while let Some(publish) = self.publish_rx.recv().await {
      self.publish(publish).await?;
    }

    log::info!("Publish channel closed, sender stopping");
    Ok(())
  }
}
