use serde::Deserialize;

use crate::error::{GarageError, GarageResult};

/// Observation callback body sent by the device server
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Notification {
  items: Vec<NotificationItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NotificationItem {
  value: InputValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InputValue {
  digital_input_state: bool,
}

/// Decode a switch observation into its raw `DigitalInputState`.
///
/// Anything that isn't a well formed observation with at least one item is rejected.
pub fn decode_input_state(payload: &str) -> GarageResult<bool> {
  let notification: Notification =
    serde_json::from_str(payload).map_err(|e| GarageError::MalformedNotification(e.to_string()))?;

  notification
    .items
    .first()
    .map(|item| item.value.digital_input_state)
    .ok_or_else(|| GarageError::MalformedNotification("notification has no items".to_owned()))
}
