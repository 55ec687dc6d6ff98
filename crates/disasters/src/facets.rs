//! Filters and aggregate counts over a flattened result set
//!
//! Front ends render these; nothing here draws anything.

use std::collections::{BTreeMap, BTreeSet};

use crate::flatten::FlatRow;

/// Label used when a row has no value for a grouped field
pub const UNKNOWN: &str = "Unknown";

/// Dropdown value meaning "no restriction"
pub const ALL: &str = "All";

/// Counts keyed by a pair of labels, ordered by key
pub type PairCounts = BTreeMap<(String, String), usize>;

/// Conjunctive filter on type, status and country. `None` lets everything through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFilter {
  pub disaster_type: Option<String>,
  pub status: Option<String>,
  pub country: Option<String>,
}

impl ResultFilter {
  /// Build from dropdown-style choices where blank or "All" means no restriction
  pub fn from_choices(disaster_type: Option<&str>, status: Option<&str>, country: Option<&str>) -> Self {
    Self { disaster_type: choice(disaster_type), status: choice(status), country: choice(country) }
  }

  pub fn is_unrestricted(&self) -> bool {
    self.disaster_type.is_none() && self.status.is_none() && self.country.is_none()
  }

  pub fn matches(&self, row: &FlatRow) -> bool {
    field_matches(&self.disaster_type, &row.disaster_type)
      && field_matches(&self.status, &row.status)
      && field_matches(&self.country, &row.country)
  }

  /// Rows passing the filter, in their original order
  pub fn apply<'a>(&self, rows: &'a [FlatRow]) -> Vec<&'a FlatRow> {
    rows.iter().filter(|row| self.matches(row)).collect()
  }
}

fn choice(value: Option<&str>) -> Option<String> {
  value.map(str::trim).filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(ALL)).map(str::to_string)
}

fn field_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
  match (wanted, actual) {
    (None, _) => true,
    (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual.trim()),
    (Some(_), None) => false,
  }
}

/// Distinct values available for each filter, sorted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
  pub types: Vec<String>,
  pub statuses: Vec<String>,
  pub countries: Vec<String>,
}

pub fn filter_options<'a>(rows: impl IntoIterator<Item = &'a FlatRow>) -> FilterOptions {
  let mut types = BTreeSet::new();
  let mut statuses = BTreeSet::new();
  let mut countries = BTreeSet::new();

  for row in rows {
    types.extend(row.disaster_type.clone());
    statuses.extend(row.status.clone());
    countries.extend(row.country.clone());
  }

  FilterOptions {
    types: types.into_iter().collect(),
    statuses: statuses.into_iter().collect(),
    countries: countries.into_iter().collect(),
  }
}

fn label(value: &Option<String>) -> String {
  value.as_deref().map(str::trim).filter(|v| !v.is_empty()).unwrap_or(UNKNOWN).to_string()
}

fn count_pairs<'a, F>(rows: impl IntoIterator<Item = &'a FlatRow>, key: F) -> PairCounts
where
  F: Fn(&FlatRow) -> (String, String),
{
  let mut counts = PairCounts::new();
  for row in rows {
    *counts.entry(key(row)).or_insert(0) += 1;
  }
  counts
}

/// Events per (country, status), the data behind the country heat map
pub fn status_by_country<'a>(rows: impl IntoIterator<Item = &'a FlatRow>) -> PairCounts {
  count_pairs(rows, |row| (label(&row.country), label(&row.status)))
}

/// Events per (type, status)
pub fn counts_by_type_and_status<'a>(rows: impl IntoIterator<Item = &'a FlatRow>) -> PairCounts {
  count_pairs(rows, |row| (label(&row.disaster_type), label(&row.status)))
}

/// Events per (`YYYY-MM`, status); iteration runs from the earliest month
pub fn monthly_frequency<'a>(rows: impl IntoIterator<Item = &'a FlatRow>) -> PairCounts {
  count_pairs(rows, |row| (row.date.format("%Y-%m").to_string(), label(&row.status)))
}

/// Number of distinct countries affected per disaster type
pub fn countries_per_type<'a>(rows: impl IntoIterator<Item = &'a FlatRow>) -> BTreeMap<String, usize> {
  let mut seen: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
  for row in rows {
    if let Some(country) = row.country.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
      seen.entry(label(&row.disaster_type)).or_default().insert(country.to_string());
    }
  }
  seen.into_iter().map(|(kind, countries)| (kind, countries.len())).collect()
}

/// Fixed display color per status, matched case-insensitively
pub fn status_palette(status: &str) -> Option<&'static str> {
  match status.trim().to_ascii_lowercase().as_str() {
    "ongoing" => Some("red"),
    "alert" => Some("yellow"),
    "past" => Some("skyblue"),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::flatten::parse_event_date;
  use crate::record::RecordId;

  fn row(id: &str, kind: &str, status: &str, country: Option<&str>, date: &str) -> FlatRow {
    FlatRow {
      id: RecordId::from(id),
      score: 0.5,
      title: Some(format!("{kind} {id}")),
      date: parse_event_date(date).unwrap(),
      date_text: date.to_string(),
      country: country.map(str::to_string),
      disaster_type: Some(kind.to_string()),
      status: Some(status.to_string()),
      description: None,
      columns: BTreeMap::new(),
    }
  }

  fn rows() -> Vec<FlatRow> {
    vec![
      row("1", "Flood", "ongoing", Some("Kenya"), "2024-05-01"),
      row("2", "Flood", "past", Some("Somalia"), "2024-04-12"),
      row("3", "Flood", "ongoing", Some("Kenya"), "2024-05-20"),
      row("4", "Earthquake", "alert", Some("Japan"), "2024-01-01"),
      row("5", "Drought", "ongoing", None, "2023-11-30"),
    ]
  }

  fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
  }

  #[test]
  fn test_all_means_no_restriction() {
    let filter = ResultFilter::from_choices(Some("All"), Some(" "), None);
    assert!(filter.is_unrestricted());
    assert_eq!(filter.apply(&rows()).len(), 5);
  }

  #[test]
  fn test_filters_combine() {
    let rows = rows();
    let filter = ResultFilter::from_choices(Some("flood"), Some("Ongoing"), None);
    let ids: Vec<&str> = filter.apply(&rows).iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);

    let filter = ResultFilter::from_choices(None, None, Some("Kenya"));
    assert_eq!(filter.apply(&rows).len(), 2);
  }

  #[test]
  fn test_missing_field_fails_a_specific_filter() {
    let rows = rows();
    let filter = ResultFilter::from_choices(Some("Drought"), None, Some("Kenya"));
    assert!(filter.apply(&rows).is_empty());
  }

  #[test]
  fn test_filter_options_are_sorted_and_unique() {
    let options = filter_options(&rows());
    assert_eq!(options.types, vec!["Drought", "Earthquake", "Flood"]);
    assert_eq!(options.statuses, vec!["alert", "ongoing", "past"]);
    assert_eq!(options.countries, vec!["Japan", "Kenya", "Somalia"]);
  }

  #[test]
  fn test_status_by_country() {
    let counts = status_by_country(&rows());
    assert_eq!(counts.get(&pair("Kenya", "ongoing")), Some(&2));
    assert_eq!(counts.get(&pair("Somalia", "past")), Some(&1));
    assert_eq!(counts.get(&pair(UNKNOWN, "ongoing")), Some(&1));
  }

  #[test]
  fn test_counts_by_type_and_status() {
    let counts = counts_by_type_and_status(&rows());
    assert_eq!(counts.get(&pair("Flood", "ongoing")), Some(&2));
    assert_eq!(counts.get(&pair("Flood", "past")), Some(&1));
    assert_eq!(counts.values().sum::<usize>(), 5);
  }

  #[test]
  fn test_countries_per_type_counts_distinct() {
    let counts = countries_per_type(&rows());
    assert_eq!(counts.get("Flood"), Some(&2));
    assert_eq!(counts.get("Earthquake"), Some(&1));
    assert_eq!(counts.get("Drought"), None);
  }

  #[test]
  fn test_monthly_frequency_runs_earliest_first() {
    let counts = monthly_frequency(&rows());
    let months: Vec<&str> = counts.keys().map(|(month, _)| month.as_str()).collect();
    assert_eq!(months, vec!["2023-11", "2024-01", "2024-04", "2024-05"]);
    assert_eq!(counts.get(&pair("2024-05", "ongoing")), Some(&2));
  }

  #[test]
  fn test_status_palette() {
    assert_eq!(status_palette("ongoing"), Some("red"));
    assert_eq!(status_palette("Alert"), Some("yellow"));
    assert_eq!(status_palette("past"), Some("skyblue"));
    assert_eq!(status_palette("unknown"), None);
  }
}
