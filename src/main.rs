#![warn(rust_2018_idioms)]

use std::{path::PathBuf, sync::Arc, time::Duration};

use rumqttc::QoS;
use sesame_garage::{
  alert::MqttAlertSink,
  config::{Config, DEFAULT_CONFIG_PATH},
  door::{state::OptoSide, Door, DoorController},
  error::{GarageError, GarageResult},
  gateway::{mqtt::MqttGateway, Property, CLOSED_OPTO_INSTANCE, OPENED_OPTO_INSTANCE, OPTO_OBJECT},
  mqtt_client::MqttClient,
  store::Store,
};
use simple_logger::SimpleLogger;
use tokio::{self, time::sleep};

/// How long to wait for the device bridge's retained switch readings before serving without them
const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
  let path = std::env::args()
    .nth(1)
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

  let config = Config::load(&path);
  let level = config
    .as_ref()
    .ok()
    .and_then(|config| config.log_level)
    .unwrap_or(log::LevelFilter::Info);
  if let Err(e) = SimpleLogger::new()
    .with_level(level)
    .with_module_level("rumqttc", log::LevelFilter::Warn)
    .init()
  {
    eprintln!("unable to initialise logging: {e}");
  }

  let config = match config {
    Ok(config) => config,
    Err(e) => {
      e.log("Loading config");
      std::process::exit(1);
    }
  };

  let store = match open_store(config.store.path.clone()).await {
    Ok(store) => Arc::new(store),
    Err(e) => {
      e.log("Opening store");
      std::process::exit(1);
    }
  };

  loop {
    let err = run(&config, Arc::clone(&store)).await;
    log::error!("Error occurred, restarting in 5 seconds: {:?}", err);
    // wait some time for the broker to come back online
    sleep(Duration::from_secs(5)).await;
  }
}

async fn open_store(path: Option<PathBuf>) -> GarageResult<Store> {
  match path {
    Some(path) => Store::open(path).await,
    None => {
      log::warn!("No store path configured, history will be lost on exit");
      Ok(Store::in_memory())
    }
  }
}

/// Run the MQTT receiver and sender and react
/// Runs forever unless an error occurs
async fn run(config: &Config, store: Arc<Store>) -> GarageError {
  match serve(config, store).await {
    Ok(()) => GarageError::MqttClosed,
    Err(e) => e,
  }
}

async fn serve(config: &Config, store: Arc<Store>) -> GarageResult<()> {
  let (send_channel, mut client) = MqttClient::with_config(config.mqtt_client.clone());

  let gateway = MqttGateway::new(config.gateway.clone(), send_channel.clone());
  let alerts = Arc::new(MqttAlertSink::new(config.alerts.clone(), send_channel.clone()));

  let controller = Arc::new(DoorController::new(
    config.door.controller.clone(),
    store,
    gateway.clone(),
    alerts,
  ));
  controller.initialise().await?;

  let property_rx = client
    .receiver
    .subscribe(gateway.property_filter(), QoS::AtLeastOnce)
    .await?;
  let opened_rx = client
    .receiver
    .subscribe(gateway.notification_topic(OptoSide::Opened), QoS::AtLeastOnce)
    .await?;
  let closed_rx = client
    .receiver
    .subscribe(gateway.notification_topic(OptoSide::Closed), QoS::AtLeastOnce)
    .await?;
  let command_rx = client
    .receiver
    .subscribe(config.door.command_topic.clone(), QoS::AtLeastOnce)
    .await?;

  client.announce().await?;

  let mut receiver = client.receiver;
  let mut receive = tokio::spawn(async move { receiver.receive_messages().await });

  let mut sender = client.sender;
  let mut send = tokio::spawn(async move { sender.send_messages().await });

  let properties = gateway.listen(property_rx);

  let door = Arc::new(Door::new(
    config.door.command_topic.clone(),
    config.door.state_topic.clone(),
    config.door.response_topic.clone(),
    Arc::clone(&controller),
    send_channel,
  ));
  let mut serve = tokio::spawn(async move {
    let optos = [
      (OPTO_OBJECT, OPENED_OPTO_INSTANCE, Property::DigitalInputState),
      (OPTO_OBJECT, CLOSED_OPTO_INSTANCE, Property::DigitalInputState),
    ];
    if !gateway.wait_for(&optos, SYNC_TIMEOUT).await {
      log::warn!("Switch readings not received within {:?}", SYNC_TIMEOUT);
    }
    controller.synchronise().await?;

    door.listen(opened_rx, closed_rx, command_rx).await
  });

  // the tasks will only end if an error occurs (most likely MQTT broker disconnection)
  let result = tokio::select! {
    result = &mut receive => result,
    result = &mut send => result,
    result = &mut serve => result,
  };

  receive.abort();
  send.abort();
  serve.abort();
  properties.abort();

  result?
}
