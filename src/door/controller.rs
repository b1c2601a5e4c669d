use std::{
  fmt,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use chrono::{DateTime, Utc};

use self::config::DoorControllerConfig;
use super::{
  debouncer,
  device::DoorDevice,
  evaluator,
  notification,
  resolver,
  response::{
    ActionItem, CounterResponse, DurationItem, Link, Page, ReferenceDurationResponse, StateResponse, StatsResponse,
  },
  state::{Action, DoorCommand, DoorLogicalState, OptoSide},
  stats::Statistic,
  watchdog::Watchdog,
};
use crate::{
  alert::{Alert, AlertSink},
  error::{GarageError, GarageResult},
  gateway::DeviceGateway,
  store::{ActionRecord, ConfigKey, DurationRecord, Store, Swap},
};

pub mod config;

/// Owns everything the door's reconciliation needs: the store, the device, alerting, the lock and the watchdog.
pub struct DoorController<G, A: ?Sized> {
  store: Arc<Store>,
  device: DoorDevice<G>,
  alerts: Arc<A>,
  watchdog: Watchdog,
  lock_enabled: bool,
  locked: AtomicBool,
  reference_opening_time: u64,
  reference_closing_time: u64,
  logs_page_size: usize,
  durations_page_size: usize,
}

impl<G, A: ?Sized> fmt::Display for DoorController<G, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "DoorController")
  }
}

impl<G: DeviceGateway, A: AlertSink + ?Sized + 'static> DoorController<G, A> {
  pub fn new(config: DoorControllerConfig, store: Arc<Store>, gateway: G, alerts: Arc<A>) -> Self {
    DoorController {
      store,
      device: DoorDevice::new(gateway),
      alerts,
      watchdog: Watchdog::new(config.stuck_timeout),
      lock_enabled: config.lock.enabled,
      locked: AtomicBool::new(config.lock.initially_locked),
      reference_opening_time: config.reference_opening_time.as_millis() as u64,
      reference_closing_time: config.reference_closing_time.as_millis() as u64,
      logs_page_size: config.logs_page_size,
      durations_page_size: config.durations_page_size,
    }
  }

  /// Seed the store with the values the engine expects to find
  pub async fn initialise(&self) -> GarageResult<()> {
    self
      .store
      .insert_if_absent(ConfigKey::LastDoorCommand, DoorCommand::None)
      .await?;
    self
      .store
      .insert_if_absent(ConfigKey::ReferenceOpeningTime, self.reference_opening_time)
      .await?;
    self
      .store
      .insert_if_absent(ConfigKey::ReferenceClosingTime, self.reference_closing_time)
      .await?;
    Ok(())
  }

  /// Copy the switches' current readings from the device into the store
  pub async fn synchronise(&self) -> GarageResult<DoorLogicalState> {
    log::info!("{} synchronising door state", self);
    for side in [OptoSide::Opened, OptoSide::Closed] {
      match self.device.opto_reached(side).await? {
        Some(reached) => {
          self.store.set(side.config_key(), reached).await?;
        }
        None => log::warn!("{} {} switch has not reported a reading", self, side),
      }
    }

    let state = self.state().await?;
    log::info!("{} door is {}", self, state);
    Ok(state)
  }

  // Commands

  /// Pulse the motor, whatever the door is doing
  pub async fn operate(&self) -> GarageResult<()> {
    log::info!("{} received operate", self);
    self.check_lock()?;
    self.watchdog.cancel();

    self.issue(DoorCommand::Operate).await?;
    self.record_action(Action::Operate).await?;

    log::info!("{} operated door", self);
    Ok(())
  }

  /// Open the door, only if it's fully closed
  pub async fn open(&self) -> GarageResult<CounterResponse> {
    log::info!("{} received open", self);
    self.check_lock()?;
    self.watchdog.cancel();

    self.check_travel(OptoSide::Opened).await?;
    self.issue(DoorCommand::Open).await?;
    self.watchdog.arm(Arc::clone(&self.store), Arc::clone(&self.alerts));
    self.record_action(Action::Open).await?;
    let count = self.device.open_counter().await?;

    log::info!("{} opening door, counter at {:?}", self, count);
    Ok(CounterResponse {
      links: vec![Link::new("reset", "/doors/open/reset")],
      count,
    })
  }

  /// Close the door, only if it's fully open
  pub async fn close(&self) -> GarageResult<CounterResponse> {
    log::info!("{} received close", self);
    self.check_lock()?;
    self.watchdog.cancel();

    self.check_travel(OptoSide::Closed).await?;
    self.issue(DoorCommand::Close).await?;
    self.watchdog.arm(Arc::clone(&self.store), Arc::clone(&self.alerts));
    self.record_action(Action::Close).await?;
    let count = self.device.close_counter().await?;

    log::info!("{} closing door, counter at {:?}", self, count);
    Ok(CounterResponse {
      links: vec![Link::new("reset", "/doors/close/reset")],
      count,
    })
  }

  pub async fn reset_open_counter(&self) -> GarageResult<()> {
    self.device.reset_open_counter().await?;
    log::info!("{} reset the open counter", self);
    Ok(())
  }

  pub async fn reset_close_counter(&self) -> GarageResult<()> {
    self.device.reset_close_counter().await?;
    log::info!("{} reset the close counter", self);
    Ok(())
  }

  pub fn lock(&self) {
    self.locked.store(true, Ordering::SeqCst);
    log::info!("{} lock enabled", self);
    self.alerts.notify(Alert::Lock);
  }

  pub fn unlock(&self) {
    self.locked.store(false, Ordering::SeqCst);
    log::info!("{} lock disabled", self);
    self.alerts.notify(Alert::Unlock);
  }

  pub fn is_locked(&self) -> bool {
    self.locked.load(Ordering::SeqCst)
  }

  // Notifications

  /// Handle a raw switch observation from the device server
  pub async fn on_notification(&self, side: OptoSide, payload: &str) -> GarageResult<DurationRecord> {
    let input_state = notification::decode_input_state(payload)?;
    log::debug!("{} {} switch input changed to {}", self, side, input_state);
    self.confirm(side, input_state).await
  }

  /// Reconcile a switch reading with the outstanding command.
  ///
  /// Returns the duration recorded when the reading completes the outstanding open/close. Duplicates and
  /// transitions that don't complete it come back as ignorable errors.
  pub async fn confirm(&self, side: OptoSide, input_state: bool) -> GarageResult<DurationRecord> {
    let reached = !input_state;
    let debounce = debouncer::should_process(&self.store, side.config_key(), reached).await?;
    if !debounce.accept {
      return Err(GarageError::DuplicateNotification(side));
    }

    if !reached {
      // the door just left this extreme, nothing to reconcile
      return Err(GarageError::NotImportantState);
    }
    if debounce.previous.is_none() {
      log::debug!("{} first {} reading since the store was created", self, side);
    }

    let swap = self
      .store
      .update(ConfigKey::LastDoorCommand, |current: Option<&DoorCommand>| {
        current.map(|command| resolver::resolve(side, *command).next)
      })
      .await?;
    let outstanding = match swap {
      Swap::Changed {
        previous: Some(outstanding),
      } => outstanding,
      Swap::Changed { previous: None } | Swap::Unchanged => {
        return Err(GarageError::MissingConfig(ConfigKey::LastDoorCommand))
      }
    };

    let Some(action) = resolver::resolve(side, outstanding).capture
    else {
      log::info!("{} {} while {} was outstanding, not recording a duration", self, side, outstanding);
      return Err(GarageError::NotImportantState);
    };

    log::info!("{} successfully {}", self, side);
    let reference = self.reference_duration(action).await?.time;
    evaluator::evaluate(&self.device, &self.store, self.alerts.as_ref(), action, reference).await
  }

  // Queries

  pub async fn state(&self) -> GarageResult<DoorLogicalState> {
    let opened = self.store.get::<bool>(ConfigKey::DoorOpenedState).await?;
    let closed = self.store.get::<bool>(ConfigKey::DoorClosedState).await?;
    Ok(DoorLogicalState::from_optos(opened, closed))
  }

  pub async fn state_response(&self) -> GarageResult<StateResponse> {
    Ok(StateResponse {
      state: self.state().await?,
    })
  }

  pub async fn last_command(&self) -> GarageResult<Option<DoorCommand>> {
    self.store.get(ConfigKey::LastDoorCommand).await
  }

  pub async fn stats(&self) -> GarageResult<StatsResponse> {
    let since = self.stats_since().await?;
    Ok(StatsResponse {
      links: vec![Link::new("reset", "/doors/stats/reset")],
      since,
      count: self.store.duration_count(None, since).await,
      opening: self.store.summarise(Action::Open, since).await,
      closing: self.store.summarise(Action::Close, since).await,
    })
  }

  /// Restart the statistics window from now. History is kept.
  pub async fn reset_stats(&self) -> GarageResult<DateTime<Utc>> {
    let since = self.store.set(ConfigKey::StatsSince, Utc::now()).await?;
    log::info!("{} statistics reset, counting since {}", self, since);
    Ok(since)
  }

  /// A single statistic over the current window, 0 if no `action` cycles fall inside it
  pub async fn statistic(&self, action: Action, statistic: Statistic) -> GarageResult<f64> {
    let since = self.stats_since().await?;
    Ok(self.store.aggregate(action, statistic, since).await)
  }

  pub async fn logs(&self, start_index: Option<usize>, page_size: Option<usize>) -> Page<ActionItem> {
    let start_index = start_index.unwrap_or(0);
    let page_size = page_size.filter(|size| *size > 0).unwrap_or(self.logs_page_size);

    let total_count = self.store.action_count().await;
    let items = self
      .store
      .actions(start_index, page_size)
      .await
      .into_iter()
      .map(ActionItem::from)
      .collect();

    Page::new("/doors/logs", "", start_index, page_size, total_count, items)
  }

  pub async fn duration_logs(
    &self,
    start_index: Option<usize>,
    page_size: Option<usize>,
    filter: Option<Action>,
  ) -> Page<DurationItem> {
    let start_index = start_index.unwrap_or(0);
    let page_size = page_size
      .filter(|size| *size > 0)
      .unwrap_or(self.durations_page_size);

    let total_count = self.store.duration_count(filter, None).await;
    let items = self
      .store
      .durations(start_index, page_size, filter)
      .await
      .into_iter()
      .map(DurationItem::from)
      .collect();

    let query = filter.map(|action| format!("&filter={action}")).unwrap_or_default();
    Page::new("/durations/logs", &query, start_index, page_size, total_count, items)
  }

  /// The stored reference duration, seeding the configured default if none is stored
  pub async fn reference_duration(&self, action: Action) -> GarageResult<ReferenceDurationResponse> {
    let (key, default) = self.reference_key(action)?;
    if self.store.insert_if_absent(key, default).await? {
      log::debug!("{} seeded {} with {}ms", self, key, default);
    }

    let time = self
      .store
      .get::<u64>(key)
      .await?
      .ok_or(GarageError::MissingConfig(key))?;
    Ok(ReferenceDurationResponse { time })
  }

  pub async fn set_reference_duration(&self, action: Action, time: i64) -> GarageResult<ReferenceDurationResponse> {
    let (key, _) = self.reference_key(action)?;
    let time = u64::try_from(time)
      .ok()
      .filter(|time| *time > 0)
      .ok_or(GarageError::InvalidReferenceDuration(time))?;

    let time = self.store.set(key, time).await?;
    log::info!("{} {} set to {}ms", self, key, time);
    Ok(ReferenceDurationResponse { time })
  }

  fn reference_key(&self, action: Action) -> GarageResult<(ConfigKey, u64)> {
    match action {
      Action::Open => Ok((ConfigKey::ReferenceOpeningTime, self.reference_opening_time)),
      Action::Close => Ok((ConfigKey::ReferenceClosingTime, self.reference_closing_time)),
      Action::Operate => Err(GarageError::InvalidState),
    }
  }

  async fn stats_since(&self) -> GarageResult<Option<DateTime<Utc>>> {
    self.store.get(ConfigKey::StatsSince).await
  }

  fn check_lock(&self) -> GarageResult<()> {
    if self.lock_enabled && self.is_locked() {
      log::info!("{} is locked, ignoring command", self);
      Err(GarageError::Forbidden)
    }
    else {
      Ok(())
    }
  }

  /// The door must be resting at the opposite extreme to travel to `target`
  async fn check_travel(&self, target: OptoSide) -> GarageResult<()> {
    let (already_there, origin) = match target {
      OptoSide::Opened => (GarageError::AlreadyOpen, OptoSide::Closed),
      OptoSide::Closed => (GarageError::AlreadyClosed, OptoSide::Opened),
    };

    if self.device.opto_reached(target).await? == Some(true) {
      log::info!("{} door already {}, skipping", self, target);
      return Err(already_there);
    }

    if self.device.opto_reached(origin).await? != Some(true) {
      log::info!("{} door not {}, skipping", self, origin);
      return Err(GarageError::InvalidState);
    }

    Ok(())
  }

  /// Store `command` and pulse the motor. If the pulse fails the previous command is put back.
  async fn issue(&self, command: DoorCommand) -> GarageResult<()> {
    let previous = self.last_command().await?;
    self.store.set(ConfigKey::LastDoorCommand, command).await?;

    if let Err(e) = self.device.operate().await {
      if let Some(previous) = previous {
        if let Err(restore) = self.store.set(ConfigKey::LastDoorCommand, previous).await {
          log::error!("{} unable to restore {} after failed trigger: {}", self, previous, restore);
        }
      }
      return Err(e);
    }

    Ok(())
  }

  async fn record_action(&self, action: Action) -> GarageResult<()> {
    self
      .store
      .append_action(ActionRecord {
        timestamp: Utc::now(),
        action,
      })
      .await
  }
}
