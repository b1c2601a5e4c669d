use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;

use crate::{
  door::state::{Action, OptoSide},
  store::ConfigKey,
};

pub type GarageResult<T> = Result<T, GarageError>;

/// How an error should be treated by whoever receives it
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
  /// Expected noise from the sensors, dropped silently
  Ignorable,
  /// The request was refused and nothing was changed
  Rejection,
  /// A collaborator failed; the in-progress step was abandoned
  Upstream,
  /// The service can't start
  Fatal,
}

#[derive(Debug, Error)]
pub enum GarageError {
  #[error("duplicate {0} sensor notification")]
  DuplicateNotification(OptoSide),
  #[error("transition does not complete the outstanding command")]
  NotImportantState,

  #[error("the door is already open")]
  AlreadyOpen,
  #[error("the door is already closed")]
  AlreadyClosed,
  #[error("the door is not in a state that allows this command")]
  InvalidState,
  #[error("the door is locked")]
  Forbidden,
  #[error("reference duration must be a positive number of milliseconds, got {0}")]
  InvalidReferenceDuration(i64),

  #[error("device gateway error: {0}")]
  Gateway(String),
  #[error("device gateway has no {0} duration")]
  MissingDuration(Action),
  #[error("store has no value for {0}")]
  MissingConfig(ConfigKey),
  #[error("malformed sensor notification: {0}")]
  MalformedNotification(String),
  #[error("malformed request: {0}")]
  MalformedRequest(#[source] serde_json::Error),
  #[error("unable to persist store: {0}")]
  Persistence(#[source] std::io::Error),
  #[error(transparent)]
  Serialization(#[from] serde_json::Error),
  #[error(transparent)]
  MqttClient(#[from] rumqttc::ClientError),
  #[error(transparent)]
  MqttConnection(#[from] rumqttc::ConnectionError),
  #[error("the MQTT client has been closed")]
  MqttClosed,
  #[error(transparent)]
  JoinError(#[from] JoinError),

  #[error("unable to load {path}: {message}")]
  Config { path: String, message: String },
  #[error("unable to open store {path}: {message}")]
  StoreUnavailable { path: String, message: String },
}

impl GarageError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      GarageError::DuplicateNotification(_) | GarageError::NotImportantState => ErrorKind::Ignorable,
      GarageError::AlreadyOpen
      | GarageError::AlreadyClosed
      | GarageError::InvalidState
      | GarageError::Forbidden
      | GarageError::InvalidReferenceDuration(_) => ErrorKind::Rejection,
      GarageError::Gateway(_)
      | GarageError::MissingDuration(_)
      | GarageError::MissingConfig(_)
      | GarageError::MalformedNotification(_)
      | GarageError::MalformedRequest(_)
      | GarageError::Persistence(_)
      | GarageError::Serialization(_)
      | GarageError::MqttClient(_)
      | GarageError::MqttConnection(_)
      | GarageError::MqttClosed
      | GarageError::JoinError(_) => ErrorKind::Upstream,
      GarageError::Config { .. } | GarageError::StoreUnavailable { .. } => ErrorKind::Fatal,
    }
  }

  /// Log the error at the severity its kind calls for
  pub fn log(&self, context: &str) {
    match self.kind() {
      ErrorKind::Ignorable => log::debug!("{context}: {self}"),
      ErrorKind::Rejection => log::info!("{context} rejected: {self}"),
      ErrorKind::Upstream | ErrorKind::Fatal => log::error!("{context} failed: {self}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn noise_is_ignorable() {
    assert_eq!(
      GarageError::DuplicateNotification(OptoSide::Opened).kind(),
      ErrorKind::Ignorable
    );
    assert_eq!(GarageError::NotImportantState.kind(), ErrorKind::Ignorable);
  }

  #[test]
  fn refusals_are_rejections() {
    for error in [
      GarageError::AlreadyOpen,
      GarageError::AlreadyClosed,
      GarageError::InvalidState,
      GarageError::Forbidden,
    ] {
      assert_eq!(error.kind(), ErrorKind::Rejection);
    }
  }

  #[test]
  fn missing_duration_is_upstream() {
    assert_eq!(GarageError::MissingDuration(Action::Open).kind(), ErrorKind::Upstream);
    assert_eq!(GarageError::Gateway("offline".into()).kind(), ErrorKind::Upstream);
  }
}
