use serde_json::Value;

use super::state::OptoSide;
use crate::{
  error::{GarageError, GarageResult},
  gateway::{
    DeviceGateway, Property, CLOSED_OPTO_INSTANCE, CLOSE_INSTANCE, DOOR_OBJECT, OPENED_OPTO_INSTANCE, OPEN_INSTANCE,
    OPTO_OBJECT, TRIGGER_INSTANCE,
  },
};

/// Typed access to the door's properties on the device gateway
#[derive(Debug)]
pub struct DoorDevice<G> {
  gateway: G,
}

impl<G: DeviceGateway> DoorDevice<G> {
  pub fn new(gateway: G) -> Self {
    DoorDevice { gateway }
  }

  /// Whether the switch currently reports its extreme as reached, `None` if the device hasn't reported it.
  ///
  /// The input reads `false` once the extreme is reached.
  pub async fn opto_reached(&self, side: OptoSide) -> GarageResult<Option<bool>> {
    let instance = match side {
      OptoSide::Opened => OPENED_OPTO_INSTANCE,
      OptoSide::Closed => CLOSED_OPTO_INSTANCE,
    };

    match self
      .gateway
      .read_property(OPTO_OBJECT, instance, Property::DigitalInputState)
      .await?
    {
      None | Some(Value::Null) => Ok(None),
      Some(Value::Bool(input_state)) => Ok(Some(!input_state)),
      Some(other) => Err(GarageError::Gateway(format!(
        "{side} switch reported a non boolean input state: {other}"
      ))),
    }
  }

  pub async fn open_counter(&self) -> GarageResult<Option<u64>> {
    self.read_number(OPEN_INSTANCE, Property::DoorCounter).await
  }

  pub async fn close_counter(&self) -> GarageResult<Option<u64>> {
    self.read_number(CLOSE_INSTANCE, Property::DoorCounter).await
  }

  /// Milliseconds the last opening took
  pub async fn opening_duration(&self) -> GarageResult<Option<u64>> {
    self.read_number(OPEN_INSTANCE, Property::DoorDuration).await
  }

  /// Milliseconds the last closing took
  pub async fn closing_duration(&self) -> GarageResult<Option<u64>> {
    self.read_number(CLOSE_INSTANCE, Property::DoorDuration).await
  }

  pub async fn reset_open_counter(&self) -> GarageResult<()> {
    self
      .gateway
      .trigger_property(DOOR_OBJECT, OPEN_INSTANCE, Property::DoorCounterReset)
      .await
  }

  pub async fn reset_close_counter(&self) -> GarageResult<()> {
    self
      .gateway
      .trigger_property(DOOR_OBJECT, CLOSE_INSTANCE, Property::DoorCounterReset)
      .await
  }

  /// Pulse the motor
  pub async fn operate(&self) -> GarageResult<()> {
    self
      .gateway
      .trigger_property(DOOR_OBJECT, TRIGGER_INSTANCE, Property::DoorTrigger)
      .await
  }

  async fn read_number(&self, instance: u16, property: Property) -> GarageResult<Option<u64>> {
    let value = self.gateway.read_property(DOOR_OBJECT, instance, property).await?;
    match value {
      None | Some(Value::Null) => Ok(None),
      Some(Value::Number(number)) => number
        .as_u64()
        .or_else(|| number.as_f64().filter(|n| *n >= 0.0).map(|n| n.round() as u64))
        .map(Some)
        .ok_or_else(|| GarageError::Gateway(format!("{property} is not a positive number: {number}"))),
      Some(Value::String(text)) => text
        .trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| GarageError::Gateway(format!("{property} is not a number: {text}"))),
      Some(other) => Err(GarageError::Gateway(format!("{property} is not a number: {other}"))),
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::door::testing::FakeGateway;

  #[tokio::test]
  async fn input_state_false_means_reached() {
    let gateway = FakeGateway::default();
    let device = DoorDevice::new(gateway.clone());

    assert_eq!(device.opto_reached(OptoSide::Opened).await.unwrap(), None);

    gateway.set_optos(Some(true), Some(false));
    assert_eq!(device.opto_reached(OptoSide::Opened).await.unwrap(), Some(false));
    assert_eq!(device.opto_reached(OptoSide::Closed).await.unwrap(), Some(true));
  }

  #[tokio::test]
  async fn numbers_are_read_leniently() {
    let gateway = FakeGateway::default();
    let device = DoorDevice::new(gateway.clone());

    gateway.set(DOOR_OBJECT, OPEN_INSTANCE, Property::DoorDuration, json!(11500));
    gateway.set(DOOR_OBJECT, CLOSE_INSTANCE, Property::DoorDuration, json!("9000"));
    gateway.set(DOOR_OBJECT, OPEN_INSTANCE, Property::DoorCounter, json!(4.0));

    assert_eq!(device.opening_duration().await.unwrap(), Some(11500));
    assert_eq!(device.closing_duration().await.unwrap(), Some(9000));
    assert_eq!(device.open_counter().await.unwrap(), Some(4));
    assert_eq!(device.close_counter().await.unwrap(), None);
  }

  #[tokio::test]
  async fn garbage_values_are_gateway_errors() {
    let gateway = FakeGateway::default();
    let device = DoorDevice::new(gateway.clone());

    gateway.set(DOOR_OBJECT, OPEN_INSTANCE, Property::DoorDuration, json!([1, 2]));
    gateway.set(OPTO_OBJECT, OPENED_OPTO_INSTANCE, Property::DigitalInputState, json!("on"));

    assert!(matches!(device.opening_duration().await, Err(GarageError::Gateway(_))));
    assert!(matches!(
      device.opto_reached(OptoSide::Opened).await,
      Err(GarageError::Gateway(_))
    ));
  }

  #[tokio::test]
  async fn operate_pulses_the_trigger() {
    let gateway = FakeGateway::default();
    let device = DoorDevice::new(gateway.clone());

    device.operate().await.unwrap();
    device.reset_close_counter().await.unwrap();

    assert_eq!(
      gateway.triggers(),
      vec![
        (DOOR_OBJECT, TRIGGER_INSTANCE, Property::DoorTrigger),
        (DOOR_OBJECT, CLOSE_INSTANCE, Property::DoorCounterReset)
      ]
    );
  }
}
