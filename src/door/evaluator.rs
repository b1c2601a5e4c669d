use chrono::Utc;

use super::{device::DoorDevice, state::Action};
use crate::{
  alert::{Alert, AlertSink},
  error::{GarageError, GarageResult},
  gateway::DeviceGateway,
  store::{DurationRecord, Store},
};

/// True if `duration` is more than 10% over `reference`
pub fn exceeds_reference(duration: u64, reference: u64) -> bool {
  u128::from(duration) * 10 > u128::from(reference) * 11
}

/// Fetch the just completed `action`'s duration, alert if it ran long and record it.
///
/// A missing duration abandons the cycle without writing a record.
pub async fn evaluate<G: DeviceGateway, A: AlertSink + ?Sized>(
  device: &DoorDevice<G>,
  store: &Store,
  alerts: &A,
  action: Action,
  reference: u64,
) -> GarageResult<DurationRecord> {
  let (duration, alert) = match action {
    Action::Open => (device.opening_duration().await?, Alert::MaintenanceNeeded),
    Action::Close => (device.closing_duration().await?, Alert::MaintenanceAlert),
    Action::Operate => return Err(GarageError::MissingDuration(action)),
  };
  let duration = duration.ok_or(GarageError::MissingDuration(action))?;

  if exceeds_reference(duration, reference) {
    log::warn!("{} took {}ms, reference is {}ms", action, duration, reference);
    alerts.notify(alert);
  }

  let record = DurationRecord {
    timestamp: Utc::now(),
    action,
    duration,
  };
  store.append_duration(record.clone()).await?;
  log::info!("Recorded {} duration of {}ms", action, duration);

  Ok(record)
}
