//! Display formatting utilities for CLI output

use colored::*;
use std::collections::BTreeMap;

use crate::facets::{self, FilterOptions, PairCounts};
use crate::flatten::FlatRow;
use crate::summarizer::Summary;

const SUMMARY_WIDTH: usize = 80;
const TITLE_WIDTH: usize = 60;

/// Wrap text to fit within a specified width
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
  let mut lines = Vec::new();

  for paragraph in text.split('\n') {
    if paragraph.trim().is_empty() {
      lines.push(String::new());
      continue;
    }

    let mut current_line = String::new();
    for word in paragraph.split_whitespace() {
      if current_line.is_empty() {
        current_line = word.to_string();
      } else if current_line.chars().count() + 1 + word.chars().count() <= width {
        current_line.push(' ');
        current_line.push_str(word);
      } else {
        lines.push(std::mem::take(&mut current_line));
        current_line = word.to_string();
      }
    }

    if !current_line.is_empty() {
      lines.push(current_line);
    }
  }

  lines
}

/// Cut text to `width` characters, marking the cut
pub fn clip(text: &str, width: usize) -> String {
  if text.chars().count() <= width {
    text.to_string()
  } else {
    let kept: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
  }
}

/// Status text in its palette color; unknown statuses stay plain
pub fn paint_status(status: &str) -> ColoredString {
  match facets::status_palette(status) {
    Some("red") => status.red(),
    Some("yellow") => status.yellow(),
    Some("skyblue") => status.truecolor(135, 206, 235),
    _ => status.normal(),
  }
}

/// One ranked row as a single line
pub fn format_row(rank: usize, row: &FlatRow) -> String {
  let status = row.status.as_deref().unwrap_or(facets::UNKNOWN);
  let score = format!("{:.3}", row.score);
  let title = clip(row.title_or_default(), TITLE_WIDTH);
  let id = format!("[{}]", row.id);

  format!(
    "{:>2}. {} {} {:<12} {} {:<16} {} {}",
    rank,
    score.as_str().cyan(),
    row.date.format("%Y-%m-%d"),
    clip(row.disaster_type.as_deref().unwrap_or(facets::UNKNOWN), 12),
    paint_status(&format!("{status:<8}")),
    clip(row.country.as_deref().unwrap_or(facets::UNKNOWN), 16),
    title.as_str().bold(),
    id.as_str().dimmed()
  )
}

pub fn display_rows(rows: &[&FlatRow]) {
  if rows.is_empty() {
    println!("No matching disasters found.");
    return;
  }

  for (i, row) in rows.iter().enumerate() {
    println!("{}", format_row(i + 1, row));
  }
}

pub fn display_summary(id: &str, summary: &Summary) {
  println!();
  println!("{} {}", "Summary of".bold(), id.yellow());
  match summary {
    Summary::Text(text) => {
      for line in wrap_text(text, SUMMARY_WIDTH) {
        println!("  {line}");
      }
    }
    other => {
      let message = other.to_string();
      println!("  {}", message.as_str().dimmed());
    }
  }
}

pub fn display_options(options: &FilterOptions) {
  println!("{} {}", "Types:".bold(), options.types.join(", "));
  println!("{} {}", "Statuses:".bold(), options.statuses.join(", "));
  println!("{} {}", "Countries:".bold(), options.countries.join(", "));
}

/// Render pair counts as a table with one row per first key and one column per second key
pub fn format_pair_table(counts: &PairCounts, row_label: &str) -> Vec<String> {
  let mut columns: Vec<&str> = counts.keys().map(|(_, column)| column.as_str()).collect();
  columns.sort_unstable();
  columns.dedup();

  let mut grid: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
  for ((row, column), count) in counts {
    grid.entry(row.as_str()).or_default().insert(column.as_str(), *count);
  }

  let first_width = grid.keys().map(|k| k.chars().count()).chain([row_label.len()]).max().unwrap_or(0);
  let widths: Vec<usize> = columns.iter().map(|c| c.chars().count().max(3)).collect();

  let mut lines = Vec::with_capacity(grid.len() + 1);
  let mut header = format!("{row_label:<first_width$}");
  for (column, width) in columns.iter().zip(&widths) {
    header.push_str(&format!("  {column:>width$}"));
  }
  lines.push(header);

  for (row, cells) in &grid {
    let mut line = format!("{row:<first_width$}");
    for (column, width) in columns.iter().zip(&widths) {
      let count = cells.get(column).copied().unwrap_or(0);
      line.push_str(&format!("  {count:>width$}"));
    }
    lines.push(line);
  }

  lines
}

pub fn display_pair_table(title: &str, counts: &PairCounts, row_label: &str) {
  println!();
  println!("{}", title.bold());
  if counts.is_empty() {
    println!("  (no data)");
    return;
  }
  for line in format_pair_table(counts, row_label) {
    println!("  {line}");
  }
}

pub fn display_single_counts(title: &str, counts: &BTreeMap<String, usize>) {
  println!();
  println!("{}", title.bold());
  if counts.is_empty() {
    println!("  (no data)");
    return;
  }
  let width = counts.keys().map(|k| k.chars().count()).max().unwrap_or(0);
  for (key, count) in counts {
    println!("  {key:<width$}  {count}");
  }
}
