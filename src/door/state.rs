use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::ConfigKey;

/// The last command issued to the door. Persisted so a restart doesn't lose an outstanding request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DoorCommand {
  None,
  Operate,
  Open,
  Close,
}

impl DoorCommand {
  /// True if the command expects a confirming sensor transition
  pub fn is_travelling(&self) -> bool {
    matches!(self, DoorCommand::Open | DoorCommand::Close)
  }
}

impl fmt::Display for DoorCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DoorCommand::None => write!(f, "none"),
      DoorCommand::Operate => write!(f, "operate"),
      DoorCommand::Open => write!(f, "open"),
      DoorCommand::Close => write!(f, "close"),
    }
  }
}

/// One of the two limit switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptoSide {
  /// Reached when the door is fully open
  Opened,
  /// Reached when the door is fully closed
  Closed,
}

impl OptoSide {
  /// The store key holding this switch's last confirmed reading
  pub fn config_key(&self) -> ConfigKey {
    match self {
      OptoSide::Opened => ConfigKey::DoorOpenedState,
      OptoSide::Closed => ConfigKey::DoorClosedState,
    }
  }

  /// The door command this switch confirms
  pub fn confirms(&self) -> DoorCommand {
    match self {
      OptoSide::Opened => DoorCommand::Open,
      OptoSide::Closed => DoorCommand::Close,
    }
  }
}

impl fmt::Display for OptoSide {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OptoSide::Opened => write!(f, "opened"),
      OptoSide::Closed => write!(f, "closed"),
    }
  }
}

/// The door's state as derived from the two switches. Never stored, always recomputed.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DoorLogicalState {
  Opened,
  Closed,
  Unknown,
}

impl DoorLogicalState {
  /// `opened`/`closed` are the stored "extreme reached" flags, `None` if never observed
  pub fn from_optos(opened: Option<bool>, closed: Option<bool>) -> Self {
    match (opened, closed) {
      (Some(true), Some(true)) => DoorLogicalState::Unknown,
      (Some(true), _) => DoorLogicalState::Opened,
      (_, Some(true)) => DoorLogicalState::Closed,
      _ => DoorLogicalState::Unknown,
    }
  }
}

impl fmt::Display for DoorLogicalState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DoorLogicalState::Opened => write!(f, "opened"),
      DoorLogicalState::Closed => write!(f, "closed"),
      DoorLogicalState::Unknown => write!(f, "unknown"),
    }
  }
}

/// An attempted door action, as recorded in the logs
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
  Operate,
  Open,
  Close,
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Action::Operate => write!(f, "operate"),
      Action::Open => write!(f, "open"),
      Action::Close => write!(f, "close"),
    }
  }
}
