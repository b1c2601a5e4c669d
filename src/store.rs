//! Durable key/value config plus the append-only action and duration logs.
//!
//! The whole store is one JSON snapshot. Every mutation is applied to a copy, written to disk, and only then
//! becomes visible, so a failed write leaves the last committed state in place.

use std::{collections::BTreeMap, fmt, io, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
  door::{
    state::Action,
    stats::{self, DurationStats, Statistic},
  },
  error::{GarageError, GarageResult},
};

/// Keys of the persisted config values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
  LastDoorCommand,
  ReferenceOpeningTime,
  ReferenceClosingTime,
  StatsSince,
  DoorOpenedState,
  DoorClosedState,
}

impl ConfigKey {
  pub fn as_str(&self) -> &'static str {
    match self {
      ConfigKey::LastDoorCommand => "lastDoorCommand",
      ConfigKey::ReferenceOpeningTime => "referenceOpeningTime",
      ConfigKey::ReferenceClosingTime => "referenceClosingTime",
      ConfigKey::StatsSince => "statsSince",
      ConfigKey::DoorOpenedState => "doorOpenedState",
      ConfigKey::DoorClosedState => "doorClosedState",
    }
  }
}

impl fmt::Display for ConfigKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One completed open or close cycle
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DurationRecord {
  pub timestamp: DateTime<Utc>,
  pub action: Action,
  /// Milliseconds, as measured by the device
  pub duration: u64,
}

/// One attempted operate/open/close
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActionRecord {
  pub timestamp: DateTime<Utc>,
  pub action: Action,
}

/// Result of [`Store::update`] and [`Store::swap_if_changed`]
#[derive(Debug, PartialEq, Eq)]
pub enum Swap<T> {
  /// The stored value already equalled the new one, nothing was written
  Unchanged,
  Changed { previous: Option<T> },
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct Snapshot {
  #[serde(default)]
  config: BTreeMap<String, Value>,
  #[serde(default)]
  durations: Vec<DurationRecord>,
  #[serde(default)]
  actions: Vec<ActionRecord>,
}

#[derive(Debug)]
pub struct Store {
  state: RwLock<Snapshot>,
  path: Option<PathBuf>,
}

impl Store {
  /// A store that lives only as long as the process
  pub fn in_memory() -> Store {
    Store {
      state: RwLock::new(Snapshot::default()),
      path: None,
    }
  }

  /// Open the store at `path`, starting empty if the file doesn't exist yet.
  ///
  /// A file that exists but can't be read or parsed is fatal.
  pub async fn open(path: PathBuf) -> GarageResult<Store> {
    let unavailable = |message: String| GarageError::StoreUnavailable {
      path: path.display().to_string(),
      message,
    };

    let snapshot = match tokio::fs::read_to_string(&path).await {
      Ok(raw) => serde_json::from_str::<Snapshot>(&raw).map_err(|e| unavailable(e.to_string()))?,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        log::info!("No store at {}, starting empty", path.display());
        Snapshot::default()
      }
      Err(e) => return Err(unavailable(e.to_string())),
    };

    log::debug!(
      "Opened store {} with {} durations and {} actions",
      path.display(),
      snapshot.durations.len(),
      snapshot.actions.len()
    );

    Ok(Store {
      state: RwLock::new(snapshot),
      path: Some(path),
    })
  }

  pub async fn get<T: DeserializeOwned>(&self, key: ConfigKey) -> GarageResult<Option<T>> {
    let state = self.state.read().await;
    match state.config.get(key.as_str()) {
      Some(value) => Ok(Some(T::deserialize(value)?)),
      None => Ok(None),
    }
  }

  /// Insert or update `key`, returning the written value
  pub async fn set<T: Serialize>(&self, key: ConfigKey, value: T) -> GarageResult<T> {
    let encoded = serde_json::to_value(&value)?;
    self
      .mutate(move |snapshot| {
        snapshot.config.insert(key.as_str().to_owned(), encoded);
        Ok(((), true))
      })
      .await?;
    Ok(value)
  }

  /// Returns true if the value was inserted
  pub async fn insert_if_absent<T: Serialize>(&self, key: ConfigKey, value: T) -> GarageResult<bool> {
    let encoded = serde_json::to_value(&value)?;
    self
      .mutate(move |snapshot| {
        if snapshot.config.contains_key(key.as_str()) {
          Ok((false, false))
        }
        else {
          snapshot.config.insert(key.as_str().to_owned(), encoded);
          Ok((true, true))
        }
      })
      .await
  }

  /// Store `value` under `key` unless it's already there. The comparison and the write happen under one lock.
  pub async fn swap_if_changed<T>(&self, key: ConfigKey, value: T) -> GarageResult<Swap<T>>
  where
    T: Serialize + DeserializeOwned + PartialEq,
  {
    self
      .update(key, move |current| if current == Some(&value) { None } else { Some(value) })
      .await
  }

  /// Replace the value under `key` with whatever `update` returns for the current one, atomically.
  ///
  /// Nothing is written if `update` returns `None`.
  pub async fn update<T, F>(&self, key: ConfigKey, update: F) -> GarageResult<Swap<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce(Option<&T>) -> Option<T>,
  {
    self
      .mutate(move |snapshot| {
        let previous = snapshot
          .config
          .get(key.as_str())
          .map(|stored| T::deserialize(stored))
          .transpose()?;

        match update(previous.as_ref()) {
          Some(next) => {
            snapshot.config.insert(key.as_str().to_owned(), serde_json::to_value(&next)?);
            Ok((Swap::Changed { previous }, true))
          }
          None => Ok((Swap::Unchanged, false)),
        }
      })
      .await
  }

  pub async fn append_duration(&self, record: DurationRecord) -> GarageResult<()> {
    self
      .mutate(move |snapshot| {
        snapshot.durations.push(record);
        Ok(((), true))
      })
      .await
  }

  pub async fn append_action(&self, record: ActionRecord) -> GarageResult<()> {
    self
      .mutate(move |snapshot| {
        snapshot.actions.push(record);
        Ok(((), true))
      })
      .await
  }

  /// Number of duration records matching `filter`, newer than `since` if given
  pub async fn duration_count(&self, filter: Option<Action>, since: Option<DateTime<Utc>>) -> usize {
    let state = self.state.read().await;
    state
      .durations
      .iter()
      .filter(|record| filter.map_or(true, |action| record.action == action))
      .filter(|record| since.map_or(true, |since| record.timestamp > since))
      .count()
  }

  /// A page of duration records, newest first
  pub async fn durations(&self, offset: usize, limit: usize, filter: Option<Action>) -> Vec<DurationRecord> {
    let state = self.state.read().await;
    let mut records: Vec<_> = state
      .durations
      .iter()
      .filter(|record| filter.map_or(true, |action| record.action == action))
      .cloned()
      .collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records.into_iter().skip(offset).take(limit).collect()
  }

  pub async fn action_count(&self) -> usize {
    self.state.read().await.actions.len()
  }

  /// A page of action records, newest first
  pub async fn actions(&self, offset: usize, limit: usize) -> Vec<ActionRecord> {
    let state = self.state.read().await;
    let mut records = state.actions.clone();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records.into_iter().skip(offset).take(limit).collect()
  }

  pub async fn aggregate(&self, action: Action, statistic: Statistic, since: Option<DateTime<Utc>>) -> f64 {
    let state = self.state.read().await;
    stats::aggregate(&state.durations, action, statistic, since)
  }

  pub async fn summarise(&self, action: Action, since: Option<DateTime<Utc>>) -> DurationStats {
    let state = self.state.read().await;
    stats::summarise(&state.durations, action, since)
  }

  async fn mutate<T, F>(&self, operation: F) -> GarageResult<T>
  where
    F: FnOnce(&mut Snapshot) -> GarageResult<(T, bool)>,
  {
    let mut state = self.state.write().await;
    let mut next = state.clone();
    let (result, changed) = operation(&mut next)?;

    if changed {
      self.persist(&next).await?;
      *state = next;
    }

    Ok(result)
  }

  async fn persist(&self, snapshot: &Snapshot) -> GarageResult<()> {
    let Some(path) = self.path.as_ref() else {
      return Ok(());
    };

    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        tokio::fs::create_dir_all(parent).await.map_err(GarageError::Persistence)?;
      }
    }

    let payload = serde_json::to_vec(snapshot)?;
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, payload)
      .await
      .map_err(GarageError::Persistence)?;
    tokio::fs::rename(&temp_path, path)
      .await
      .map_err(GarageError::Persistence)?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::door::state::DoorCommand;

  fn duration(action: Action, duration: u64, timestamp: DateTime<Utc>) -> DurationRecord {
    DurationRecord {
      timestamp,
      action,
      duration,
    }
  }

  #[tokio::test]
  async fn absent_keys_read_as_none() {
    let store = Store::in_memory();
    assert_eq!(store.get::<bool>(ConfigKey::DoorOpenedState).await.unwrap(), None);
  }

  #[tokio::test]
  async fn set_returns_the_value_and_overwrites() {
    let store = Store::in_memory();
    assert_eq!(
      store.set(ConfigKey::LastDoorCommand, DoorCommand::Open).await.unwrap(),
      DoorCommand::Open
    );
    store.set(ConfigKey::LastDoorCommand, DoorCommand::None).await.unwrap();
    assert_eq!(
      store.get(ConfigKey::LastDoorCommand).await.unwrap(),
      Some(DoorCommand::None)
    );
  }

  #[tokio::test]
  async fn insert_if_absent_keeps_existing_values() {
    let store = Store::in_memory();
    assert!(store.insert_if_absent(ConfigKey::ReferenceOpeningTime, 15000u64).await.unwrap());
    assert!(!store.insert_if_absent(ConfigKey::ReferenceOpeningTime, 20000u64).await.unwrap());
    assert_eq!(
      store.get::<u64>(ConfigKey::ReferenceOpeningTime).await.unwrap(),
      Some(15000)
    );
  }

  #[tokio::test]
  async fn swap_reports_the_previous_value() {
    let store = Store::in_memory();
    assert_eq!(
      store.swap_if_changed(ConfigKey::DoorClosedState, true).await.unwrap(),
      Swap::Changed { previous: None }
    );
    assert_eq!(
      store.swap_if_changed(ConfigKey::DoorClosedState, true).await.unwrap(),
      Swap::Unchanged
    );
    assert_eq!(
      store.swap_if_changed(ConfigKey::DoorClosedState, false).await.unwrap(),
      Swap::Changed { previous: Some(true) }
    );
  }

  #[tokio::test]
  async fn update_writes_only_when_asked() {
    let store = Store::in_memory();
    store.set(ConfigKey::LastDoorCommand, DoorCommand::Operate).await.unwrap();

    let untouched = store
      .update(ConfigKey::LastDoorCommand, |current: Option<&DoorCommand>| {
        current.filter(|command| command.is_travelling()).map(|_| DoorCommand::None)
      })
      .await
      .unwrap();
    assert_eq!(untouched, Swap::Unchanged);

    store.set(ConfigKey::LastDoorCommand, DoorCommand::Close).await.unwrap();
    let reset = store
      .update(ConfigKey::LastDoorCommand, |current: Option<&DoorCommand>| {
        current.filter(|command| command.is_travelling()).map(|_| DoorCommand::None)
      })
      .await
      .unwrap();
    assert_eq!(
      reset,
      Swap::Changed {
        previous: Some(DoorCommand::Close)
      }
    );
    assert_eq!(
      store.get(ConfigKey::LastDoorCommand).await.unwrap(),
      Some(DoorCommand::None)
    );
  }

  #[tokio::test]
  async fn pages_are_newest_first_and_filtered() {
    let store = Store::in_memory();
    let start = Utc::now();
    store.append_duration(duration(Action::Open, 100, start)).await.unwrap();
    store
      .append_duration(duration(Action::Close, 200, start + Duration::seconds(1)))
      .await
      .unwrap();
    store
      .append_duration(duration(Action::Open, 300, start + Duration::seconds(2)))
      .await
      .unwrap();

    let all = store.durations(0, 10, None).await;
    assert_eq!(all.iter().map(|r| r.duration).collect::<Vec<_>>(), vec![300, 200, 100]);

    let opens = store.durations(1, 10, Some(Action::Open)).await;
    assert_eq!(opens.iter().map(|r| r.duration).collect::<Vec<_>>(), vec![100]);

    assert_eq!(store.duration_count(Some(Action::Open), None).await, 2);
    assert_eq!(store.duration_count(None, Some(start)).await, 2);
  }

  #[tokio::test]
  async fn snapshot_survives_reopening() {
    let dir = std::env::temp_dir().join(format!("sesame-store-{}", std::process::id()));
    let path = dir.join("store.json");
    let _ = tokio::fs::remove_file(&path).await;

    {
      let store = Store::open(path.clone()).await.unwrap();
      store.set(ConfigKey::LastDoorCommand, DoorCommand::Close).await.unwrap();
      store
        .append_action(ActionRecord {
          timestamp: Utc::now(),
          action: Action::Close,
        })
        .await
        .unwrap();
    }

    let store = Store::open(path.clone()).await.unwrap();
    assert_eq!(
      store.get(ConfigKey::LastDoorCommand).await.unwrap(),
      Some(DoorCommand::Close)
    );
    assert_eq!(store.action_count().await, 1);

    let _ = tokio::fs::remove_dir_all(&dir).await;
  }

  #[tokio::test]
  async fn failed_write_keeps_the_committed_snapshot() {
    let dir = std::env::temp_dir().join(format!("sesame-unwritable-{}", std::process::id()));
    let _ = tokio::fs::remove_dir_all(&dir).await;
    let _ = tokio::fs::remove_file(&dir).await;

    let store = Store::open(dir.join("store.json")).await.unwrap();
    store.set(ConfigKey::LastDoorCommand, DoorCommand::Close).await.unwrap();

    // a plain file where the store's directory was
    tokio::fs::remove_dir_all(&dir).await.unwrap();
    tokio::fs::write(&dir, "").await.unwrap();

    let error = store
      .set(ConfigKey::LastDoorCommand, DoorCommand::Open)
      .await
      .unwrap_err();
    assert!(matches!(error, GarageError::Persistence(_)));
    assert_eq!(error.kind(), crate::error::ErrorKind::Upstream);
    assert_eq!(
      store.get(ConfigKey::LastDoorCommand).await.unwrap(),
      Some(DoorCommand::Close)
    );

    assert!(store
      .append_action(ActionRecord {
        timestamp: Utc::now(),
        action: Action::Open,
      })
      .await
      .is_err());
    assert_eq!(store.action_count().await, 0);

    let _ = tokio::fs::remove_file(&dir).await;
  }

  #[tokio::test]
  async fn unreadable_store_is_fatal() {
    let path = std::env::temp_dir().join(format!("sesame-corrupt-{}.json", std::process::id()));
    tokio::fs::write(&path, "not json").await.unwrap();

    let error = Store::open(path.clone()).await.unwrap_err();
    assert_eq!(error.kind(), crate::error::ErrorKind::Fatal);

    let _ = tokio::fs::remove_file(&path).await;
  }
}
