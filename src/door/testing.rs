//! Fakes for the door's collaborators

use std::{
  collections::HashMap,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};

use serde_json::{json, Value};

use crate::{
  alert::{Alert, AlertSink},
  error::{GarageError, GarageResult},
  gateway::{
    DeviceGateway, Property, CLOSED_OPTO_INSTANCE, CLOSE_INSTANCE, DOOR_OBJECT, OPENED_OPTO_INSTANCE, OPEN_INSTANCE,
    OPTO_OBJECT,
  },
};

type PropertyId = (u16, u16, Property);

#[derive(Debug, Default)]
struct Device {
  values: Mutex<HashMap<PropertyId, Value>>,
  triggers: Mutex<Vec<PropertyId>>,
  offline: AtomicBool,
}

/// A scriptable device server
#[derive(Debug, Default, Clone)]
pub struct FakeGateway(Arc<Device>);

impl FakeGateway {
  pub fn set(&self, object: u16, instance: u16, property: Property, value: Value) {
    self.0.values.lock().unwrap().insert((object, instance, property), value);
  }

  /// Set the raw switch inputs; `false` means the extreme is reached
  pub fn set_optos(&self, opened_input: Option<bool>, closed_input: Option<bool>) {
    let mut values = self.0.values.lock().unwrap();
    for (instance, input) in [(OPENED_OPTO_INSTANCE, opened_input), (CLOSED_OPTO_INSTANCE, closed_input)] {
      let id = (OPTO_OBJECT, instance, Property::DigitalInputState);
      match input {
        Some(input) => values.insert(id, json!(input)),
        None => values.remove(&id),
      };
    }
  }

  /// Door fully closed and at rest
  pub fn door_closed(&self) {
    self.set_optos(Some(true), Some(false));
  }

  /// Door fully open and at rest
  pub fn door_opened(&self) {
    self.set_optos(Some(false), Some(true));
  }

  pub fn set_opening_duration(&self, duration: u64) {
    self.set(DOOR_OBJECT, OPEN_INSTANCE, Property::DoorDuration, json!(duration));
  }

  pub fn set_closing_duration(&self, duration: u64) {
    self.set(DOOR_OBJECT, CLOSE_INSTANCE, Property::DoorDuration, json!(duration));
  }

  pub fn set_offline(&self, offline: bool) {
    self.0.offline.store(offline, Ordering::SeqCst);
  }

  pub fn triggers(&self) -> Vec<PropertyId> {
    self.0.triggers.lock().unwrap().clone()
  }

  fn check_online(&self) -> GarageResult<()> {
    if self.0.offline.load(Ordering::SeqCst) {
      Err(GarageError::Gateway("device server unreachable".to_owned()))
    }
    else {
      Ok(())
    }
  }
}

impl DeviceGateway for FakeGateway {
  async fn read_property(&self, object: u16, instance: u16, property: Property) -> GarageResult<Option<Value>> {
    self.check_online()?;
    Ok(self.0.values.lock().unwrap().get(&(object, instance, property)).cloned())
  }

  async fn trigger_property(&self, object: u16, instance: u16, property: Property) -> GarageResult<()> {
    self.check_online()?;
    self.0.triggers.lock().unwrap().push((object, instance, property));
    Ok(())
  }
}

/// Remembers every alert raised
#[derive(Debug, Default)]
pub struct RecordingAlerts(Mutex<Vec<Alert>>);

impl RecordingAlerts {
  pub fn raised(&self) -> Vec<Alert> {
    self.0.lock().unwrap().clone()
  }
}

impl AlertSink for RecordingAlerts {
  fn notify(&self, alert: Alert) {
    self.0.lock().unwrap().push(alert);
  }
}
