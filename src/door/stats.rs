use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::Action;
use crate::store::DurationRecord;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
  Min,
  Max,
  Avg,
}

/// Min/max/average of one action's durations, in milliseconds
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct DurationStats {
  pub min: f64,
  pub max: f64,
  pub avg: f64,
}

/// Reduce the `action` records newer than `since` to a single statistic.
///
/// An empty selection yields 0. Averages are rounded to two decimal places.
pub fn aggregate<'a>(
  records: impl IntoIterator<Item = &'a DurationRecord>,
  action: Action,
  statistic: Statistic,
  since: Option<DateTime<Utc>>,
) -> f64 {
  let durations = records
    .into_iter()
    .filter(|record| record.action == action)
    .filter(|record| since.map_or(true, |since| record.timestamp > since))
    .map(|record| record.duration);

  match statistic {
    Statistic::Min => durations.min().map_or(0.0, |min| min as f64),
    Statistic::Max => durations.max().map_or(0.0, |max| max as f64),
    Statistic::Avg => {
      let (sum, count) = durations.fold((0u128, 0u64), |(sum, count), duration| {
        (sum + u128::from(duration), count + 1)
      });
      if count == 0 {
        0.0
      }
      else {
        round_hundredths(sum as f64 / count as f64)
      }
    }
  }
}

pub fn summarise<'a>(
  records: impl IntoIterator<Item = &'a DurationRecord> + Clone,
  action: Action,
  since: Option<DateTime<Utc>>,
) -> DurationStats {
  DurationStats {
    min: aggregate(records.clone(), action, Statistic::Min, since),
    max: aggregate(records.clone(), action, Statistic::Max, since),
    avg: aggregate(records, action, Statistic::Avg, since),
  }
}

fn round_hundredths(value: f64) -> f64 {
  (value * 100.0).round() / 100.0
}
