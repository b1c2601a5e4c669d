use std::{fmt, future::Future};

use serde_json::Value;

use crate::error::GarageResult;

pub mod mqtt;

/// Object type with the two limit switch inputs
pub const OPTO_OBJECT: u16 = 3200;
/// Object type with the door counters, durations and trigger
pub const DOOR_OBJECT: u16 = 13201;

/// Opto instance of the switch reached when fully open
pub const OPENED_OPTO_INSTANCE: u16 = 0;
/// Opto instance of the switch reached when fully closed
pub const CLOSED_OPTO_INSTANCE: u16 = 1;

/// Door instance measuring opening
pub const OPEN_INSTANCE: u16 = 0;
/// Door instance measuring closing
pub const CLOSE_INSTANCE: u16 = 1;
/// Door instance that pulses the motor
pub const TRIGGER_INSTANCE: u16 = 2;

/// A named property of a device object instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
  DigitalInputState,
  DoorCounter,
  DoorDuration,
  DoorCounterReset,
  DoorTrigger,
}

impl Property {
  pub fn as_str(&self) -> &'static str {
    match self {
      Property::DigitalInputState => "DigitalInputState",
      Property::DoorCounter => "DoorCounter",
      Property::DoorDuration => "DoorDuration",
      Property::DoorCounterReset => "DoorCounterReset",
      Property::DoorTrigger => "DoorTrigger",
    }
  }
}

impl fmt::Display for Property {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The remote device server. Every call is a single attempt; failures surface to the caller.
pub trait DeviceGateway: Send + Sync {
  /// Read a property value, `None` if the device hasn't reported it
  fn read_property(
    &self,
    object: u16,
    instance: u16,
    property: Property,
  ) -> impl Future<Output = GarageResult<Option<Value>>> + Send;

  /// Execute a property, e.g. pulse the door trigger
  fn trigger_property(
    &self,
    object: u16,
    instance: u16,
    property: Property,
  ) -> impl Future<Output = GarageResult<()>> + Send;
}
