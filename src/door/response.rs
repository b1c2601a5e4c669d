use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
  state::{Action, DoorLogicalState},
  stats::DurationStats,
};
use crate::store::{ActionRecord, DurationRecord};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Link {
  pub rel: String,
  pub href: String,
}

impl Link {
  pub fn new(rel: &str, href: impl Into<String>) -> Self {
    Link {
      rel: rel.to_owned(),
      href: href.into(),
    }
  }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PageInfo {
  pub total_count: usize,
  pub items_count: usize,
  pub start_index: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
  #[serde(rename = "PageInfo")]
  pub page_info: PageInfo,
  pub links: Vec<Link>,
  pub items: Vec<T>,
}

impl<T> Page<T> {
  /// `base` is the page's href, `query` any extra query parameters appended to the prev/next links
  pub fn new(base: &str, query: &str, start_index: usize, page_size: usize, total_count: usize, items: Vec<T>) -> Self {
    Page {
      page_info: PageInfo {
        total_count,
        items_count: items.len(),
        start_index,
      },
      links: page_links(base, query, start_index, page_size, total_count),
      items,
    }
  }
}

/// `prev` when not on the first page, `next` when more items follow
pub fn page_links(base: &str, query: &str, start_index: usize, page_size: usize, total_count: usize) -> Vec<Link> {
  let mut links = Vec::new();

  if start_index > 0 {
    let prev = start_index.saturating_sub(page_size);
    links.push(Link::new(
      "prev",
      format!("{base}?startIndex={prev}&pageSize={page_size}{query}"),
    ));
  }

  if let Some(next) = start_index.checked_add(page_size).filter(|next| *next < total_count) {
    links.push(Link::new(
      "next",
      format!("{base}?startIndex={next}&pageSize={page_size}{query}"),
    ));
  }

  links
}

/// Reply to an accepted open or close
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CounterResponse {
  pub links: Vec<Link>,
  /// The device's open/close counter, `None` if it hasn't reported one
  pub count: Option<u64>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateResponse {
  pub state: DoorLogicalState,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StatsResponse {
  pub links: Vec<Link>,
  /// Start of the statistics window, `None` for the whole history
  pub since: Option<DateTime<Utc>>,
  /// Duration records inside the window
  pub count: usize,
  pub opening: DurationStats,
  pub closing: DurationStats,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDurationResponse {
  /// Milliseconds
  pub time: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ActionItem {
  pub date: DateTime<Utc>,
  pub action: Action,
}

impl From<ActionRecord> for ActionItem {
  fn from(record: ActionRecord) -> Self {
    ActionItem {
      date: record.timestamp,
      action: record.action,
    }
  }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DurationItem {
  pub date: DateTime<Utc>,
  pub action: Action,
  pub duration: u64,
}

impl From<DurationRecord> for DurationItem {
  fn from(record: DurationRecord) -> Self {
    DurationItem {
      date: record.timestamp,
      action: record.action,
      duration: record.duration,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rels(links: &[Link]) -> Vec<&str> {
    links.iter().map(|link| link.rel.as_str()).collect()
  }

  #[test]
  fn first_page_only_links_forward() {
    let links = page_links("/doors/logs", "", 0, 10, 25);
    assert_eq!(rels(&links), vec!["next"]);
    assert_eq!(links[0].href, "/doors/logs?startIndex=10&pageSize=10");
  }

  #[test]
  fn middle_page_links_both_ways() {
    let links = page_links("/durations/logs", "&filter=open", 5, 10, 25);
    assert_eq!(rels(&links), vec!["prev", "next"]);
    assert_eq!(links[0].href, "/durations/logs?startIndex=0&pageSize=10&filter=open");
    assert_eq!(links[1].href, "/durations/logs?startIndex=15&pageSize=10&filter=open");
  }

  #[test]
  fn last_page_only_links_back() {
    let links = page_links("/doors/logs", "", 20, 10, 25);
    assert_eq!(rels(&links), vec!["prev"]);
    assert!(page_links("/doors/logs", "", 0, 10, 10).is_empty());
  }

  #[test]
  fn huge_start_index_has_no_next_page() {
    let links = page_links("/doors/logs", "", usize::MAX, 10, 3);
    assert_eq!(rels(&links), vec!["prev"]);
    assert_eq!(
      links[0].href,
      format!("/doors/logs?startIndex={}&pageSize=10", usize::MAX - 10)
    );

    assert!(page_links("/doors/logs", "", 0, usize::MAX, 3).is_empty());
  }

  #[test]
  fn page_serialises_with_page_info() {
    let page = Page::new("/doors/logs", "", 0, 10, 1, vec![1]);
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["PageInfo"]["TotalCount"], 1);
    assert_eq!(json["PageInfo"]["ItemsCount"], 1);
    assert_eq!(json["PageInfo"]["StartIndex"], 0);
    assert_eq!(json["items"][0], 1);
  }
}
