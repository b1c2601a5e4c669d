use crate::{
  error::GarageResult,
  store::{ConfigKey, Store, Swap},
};

/// Whether a switch reading is a genuine transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debounce {
  pub accept: bool,
  /// The reading stored before this one, `None` if never observed
  pub previous: Option<bool>,
}

/// Accept `reading` if it differs from the last stored reading for `key`, storing it.
///
/// A repeat of the stored reading is rejected and nothing is written.
pub async fn should_process(store: &Store, key: ConfigKey, reading: bool) -> GarageResult<Debounce> {
  let debounce = match store.swap_if_changed(key, reading).await? {
    Swap::Unchanged => Debounce {
      accept: false,
      previous: Some(reading),
    },
    Swap::Changed { previous } => Debounce {
      accept: true,
      previous,
    },
  };

  log::debug!("{} reading {} -> {:?}", key, reading, debounce);
  Ok(debounce)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn first_reading_is_accepted() {
    let store = Store::in_memory();
    assert_eq!(
      should_process(&store, ConfigKey::DoorOpenedState, false).await.unwrap(),
      Debounce {
        accept: true,
        previous: None
      }
    );
  }

  #[tokio::test]
  async fn only_the_first_of_identical_readings_is_accepted() {
    let store = Store::in_memory();

    let mut accepted = Vec::new();
    for _ in 0..5 {
      accepted.push(should_process(&store, ConfigKey::DoorClosedState, true).await.unwrap().accept);
    }

    assert_eq!(accepted, vec![true, false, false, false, false]);
  }

  #[tokio::test]
  async fn transitions_report_the_previous_reading() {
    let store = Store::in_memory();
    should_process(&store, ConfigKey::DoorClosedState, true).await.unwrap();

    let debounce = should_process(&store, ConfigKey::DoorClosedState, false).await.unwrap();
    assert_eq!(
      debounce,
      Debounce {
        accept: true,
        previous: Some(true)
      }
    );
    assert_eq!(store.get(ConfigKey::DoorClosedState).await.unwrap(), Some(false));
  }

  #[tokio::test]
  async fn keys_are_debounced_independently() {
    let store = Store::in_memory();
    assert!(should_process(&store, ConfigKey::DoorOpenedState, true).await.unwrap().accept);
    assert!(should_process(&store, ConfigKey::DoorClosedState, true).await.unwrap().accept);
  }
}
