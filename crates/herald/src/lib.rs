//! Herald - console output for the disaster insights tools
//!
//! ## Features
//!
//! - Level-tagged stderr lines (info, warn, error, verbose, success)
//! - Multi-line message support with a prefix on every line
//! - Timestamped stage lines for the retrieval chain
//! - Headline banners for result sections
//! - Tracing subscriber setup shared by every binary
//!
//! Stdout is left to command output so results can be piped.

use chrono::Local;
use colored::*;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

const PREFIX_WIDTH: usize = 7;

/// Write every line of a message to stderr
pub fn log(message: &str) {
  for line in message.lines() {
    eprintln!("{line}");
  }
}

/// Format a colored prefix for log messages, padded so message text lines up
pub fn format_prefix(color: Color, tag: &str) -> String {
  let pad = PREFIX_WIDTH.saturating_sub(tag.len() + 2);
  format!("[{}]{:<pad$}", tag.color(color).bold(), "")
}

fn tagged(color: Color, tag: &str, message: &str) {
  let prefix = format_prefix(color, tag);
  for line in message.lines() {
    log(&format!("{prefix} {line}"));
  }
}

pub fn verbose(message: &str) {
  tagged(Color::Cyan, "verb", message);
}

/// General information
pub fn info(message: &str) {
  tagged(Color::Blue, "info", message);
}

/// Something needs attention but the interaction continues
pub fn warn(message: &str) {
  tagged(Color::Yellow, "warn", message);
}

/// Something went wrong
pub fn error(message: &str) {
  tagged(Color::Red, "error", message);
}

pub fn success(message: &str) {
  tagged(Color::Green, "sccs", message);
}

/// Timestamped line for one step of the retrieval chain (rewrite, embed, rank...)
pub fn stage(name: &str, message: &str) {
  let timestamp = Local::now().format("%H:%M:%S").to_string();
  let prefix = format!("[{}] [{}]", name.magenta().bold(), timestamp.cyan());
  for line in message.lines() {
    log(&format!("{prefix} {line}"));
  }
}

/// Rule line of the given length
pub fn rule(length: usize, fill: char) -> String {
  fill.to_string().repeat(length)
}

/// Section heading written to stdout, framed so it is easy to spot in long output
pub fn headline(title: &str) {
  let width = title.chars().count().max(40);
  println!("{}", rule(width, '=').blue());
  println!("{}", title.blue().bold());
  println!("{}", rule(width, '=').blue());
}

/// Filter directives used when `RUST_LOG` is not set
pub fn default_directives(verbose: bool) -> &'static str {
  if verbose {
    "disasters=debug,info"
  } else {
    "disasters=info,warn"
  }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the defaults.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing(verbose: bool) {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

  let _ = tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
    .with(filter)
    .try_init();
}

#[macro_export]
macro_rules! info {
  ($msg:expr) => {
    $crate::info($msg); // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! warn {
  ($msg:expr) => {
    $crate::warn($msg); // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! error {
  ($msg:expr) => {
    $crate::error($msg); // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! verbose {
  ($msg:expr) => {
    $crate::verbose($msg); // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! success {
  ($msg:expr) => {
    $crate::success($msg); // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! stage {
  ($name:expr, $msg:expr) => {
    $crate::stage($name, $msg); // LCOV_EXCL_LINE
  };
}
