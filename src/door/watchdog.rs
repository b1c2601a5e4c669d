use std::{
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
  time::Duration,
};

use super::state::DoorCommand;
use crate::{
  alert::{Alert, AlertSink},
  error::GarageResult,
  store::{ConfigKey, Store, Swap},
};

/// A single process wide deadline for the outstanding open/close.
///
/// Every arm or cancel starts a new generation. A timer only acts if its generation is still the
/// current one when it holds the store's write lock, so a stale timer can't fire after a newer request.
/// Timers are never aborted, an expiry that has started always runs its store write to completion.
#[derive(Debug)]
pub struct Watchdog {
  grace: Duration,
  generation: Arc<AtomicU64>,
}

impl Watchdog {
  pub fn new(grace: Duration) -> Self {
    Watchdog {
      grace,
      generation: Arc::new(AtomicU64::new(0)),
    }
  }

  pub fn arm<A: AlertSink + ?Sized + 'static>(&self, store: Arc<Store>, alerts: Arc<A>) {
    let grace = self.grace;
    let generation = Arc::clone(&self.generation);
    let armed = generation.fetch_add(1, Ordering::SeqCst) + 1;

    log::debug!("Watchdog armed for {:?}", grace);
    tokio::spawn(async move {
      tokio::time::sleep(grace).await;
      if generation.load(Ordering::SeqCst) != armed {
        return;
      }

      let current = || generation.load(Ordering::SeqCst) == armed;
      if let Err(e) = expire(&store, alerts.as_ref(), current).await {
        e.log("Watchdog");
      }
    });
  }

  /// Disarm, any pending timer becomes stale
  pub fn cancel(&self) {
    self.generation.fetch_add(1, Ordering::SeqCst);
  }
}

impl Drop for Watchdog {
  fn drop(&mut self) {
    self.cancel();
  }
}

/// The deadline passed. If the open/close is still outstanding the door is stuck: clear it and alert.
///
/// `current` is checked under the store's write lock; a timer that was superseded in the meantime changes nothing.
/// Returns true if the door was declared stuck.
pub async fn expire<A, F>(store: &Store, alerts: &A, current: F) -> GarageResult<bool>
where
  A: AlertSink + ?Sized,
  F: FnOnce() -> bool,
{
  let swap = store
    .update(ConfigKey::LastDoorCommand, |command: Option<&DoorCommand>| {
      command
        .filter(|command| command.is_travelling())
        .filter(|_| current())
        .map(|_| DoorCommand::None)
    })
    .await?;

  match swap {
    Swap::Changed { previous } => {
      log::warn!("Door stuck, {:?} was never confirmed", previous);
      alerts.notify(Alert::DoorStuck);
      Ok(true)
    }
    Swap::Unchanged => {
      log::debug!("Watchdog expired with nothing outstanding");
      Ok(false)
    }
  }
}
