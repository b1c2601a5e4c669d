use std::{fmt, sync::Arc};

pub use config::DoorConfig;
pub use controller::DoorController;
use log::{debug, info};
use rumqttc::QoS;
use tokio::task::JoinHandle;

use self::state::OptoSide;
use crate::{
  alert::AlertSink,
  error::{GarageError, GarageResult},
  gateway::DeviceGateway,
  mqtt_client::{MqttPublish, PublishReceiver, PublishSender},
};

pub mod config;
pub mod controller;
pub mod debouncer;
pub mod device;
pub mod evaluator;
pub mod notification;
pub mod request;
pub mod resolver;
pub mod response;
pub mod state;
pub mod stats;
#[cfg(test)]
mod testing;
pub mod watchdog;

/// The door as seen from MQTT: switch notifications and requests in, state and replies out
pub struct Door<G, A: ?Sized> {
  controller: Arc<DoorController<G, A>>,
  send_channel: PublishSender,
  command_topic: String,
  state_topic: String,
  response_topic: Option<String>,
}

impl<G, A: ?Sized> fmt::Display for Door<G, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Door ({})", self.command_topic)
  }
}

impl<G: DeviceGateway + 'static, A: AlertSink + ?Sized + 'static> Door<G, A> {
  pub fn new(
    command_topic: String,
    state_topic: String,
    response_topic: Option<String>,
    controller: Arc<DoorController<G, A>>,
    send_channel: PublishSender,
  ) -> Self {
    Door {
      controller,
      send_channel,
      command_topic,
      state_topic,
      response_topic,
    }
  }

  /// Publish the current logical state, retained
  pub async fn publish_state(&self) -> GarageResult<()> {
    let state = self.controller.state().await?;
    debug!("{} publishing state {}", self, state);
    self.publish(&self.state_topic, QoS::AtLeastOnce, true, state.to_string())
  }

  /// Serve until every channel closes.
  ///
  /// Each switch's notifications are handled in order on their own task. Requests each get a task.
  pub async fn listen(
    self: Arc<Self>,
    opened_rx: PublishReceiver,
    closed_rx: PublishReceiver,
    mut command_rx: PublishReceiver,
  ) -> GarageResult<()> {
    info!("{} initialised", &self);
    self.publish_state().await?;

    let opened = self.watch(OptoSide::Opened, opened_rx);
    let closed = self.watch(OptoSide::Closed, closed_rx);

    while let Some(publish) = command_rx.recv().await {
      if publish.topic != self.command_topic {
        continue;
      }

      let door = Arc::clone(&self);
      tokio::spawn(async move { door.on_request(&publish.payload).await });
    }

    // channel ended
    opened.abort();
    closed.abort();
    Err(GarageError::MqttClosed)
  }

  fn watch(self: &Arc<Self>, side: OptoSide, mut notification_rx: PublishReceiver) -> JoinHandle<()> {
    let door = Arc::clone(self);
    tokio::spawn(async move {
      while let Some(publish) = notification_rx.recv().await {
        door.on_notification(side, &publish.payload).await;
      }
      debug!("{} {} notification channel closed", door, side);
    })
  }

  async fn on_notification(&self, side: OptoSide, payload: &str) {
    match self.controller.on_notification(side, payload).await {
      Ok(record) => debug!("{} recorded {:?}", self, record),
      Err(GarageError::NotImportantState) => debug!("{} {} transition needs no reconciliation", self, side),
      Err(e) => {
        e.log(&format!("{self} {side} notification"));
        return;
      }
    }

    if let Err(e) = self.publish_state().await {
      e.log(&format!("{self} state"));
    }
  }

  async fn on_request(&self, payload: &str) {
    let envelope = match request::decode(payload) {
      Ok(envelope) => envelope,
      Err(e) => {
        e.log(&format!("{self} request"));
        return;
      }
    };

    debug!("{} got request {:?}", self, envelope.request);
    let is_command = envelope.request.is_command();
    let result = self.controller.handle(envelope.request).await;
    if let Err(e) = &result {
      e.log(&format!("{self} request"));
    }
    else if is_command {
      if let Err(e) = self.publish_state().await {
        e.log(&format!("{self} state"));
      }
    }

    if let Some(response_topic) = &self.response_topic {
      let reply = request::Reply::new(envelope.id, &result);
      match serde_json::to_string(&reply) {
        Ok(payload) => {
          if let Err(e) = self.publish(response_topic, QoS::AtLeastOnce, false, payload) {
            e.log(&format!("{self} reply"));
          }
        }
        Err(e) => GarageError::from(e).log(&format!("{self} reply")),
      }
    }
  }

  fn publish(&self, topic: &str, qos: QoS, retain: bool, payload: String) -> GarageResult<()> {
    self
      .send_channel
      .send(MqttPublish {
        topic: topic.to_owned(),
        qos,
        retain,
        payload,
      })
      .map_err(|_| GarageError::MqttClosed)
  }
}
