//! Terminal rendering for the rolebook commands.
//!
//! Text output is made of marked lines: a heading, indented `label: value`
//! stats and one `+` or `-` line per role invocation. Errors and warnings go
//! to stderr. Colors are applied only when the target stream supports them.

use std::fmt::Display;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use rolebook_lib::value::Value;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// Separator between the two ends of a dependency.
pub const ARROW: &str = "→";

/// Leading mark of an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
  /// The command found nothing wrong.
  Done,
  Error,
  Warning,
  Heading,
  /// An invocation that will run.
  Run,
  /// An invocation that will not run.
  Skip,
}

impl Mark {
  pub fn symbol(self) -> &'static str {
    match self {
      Mark::Done => "✓",
      Mark::Error => "✗",
      Mark::Warning => "⚠",
      Mark::Heading => "•",
      Mark::Run => "+",
      Mark::Skip => "-",
    }
  }

  fn writes_to_stderr(self) -> bool {
    matches!(self, Mark::Error | Mark::Warning)
  }

  fn paint(self, text: &str) -> String {
    let stream = if self.writes_to_stderr() { Stream::Stderr } else { Stream::Stdout };
    match self {
      Mark::Done | Mark::Run => text.if_supports_color(stream, |s| s.green()).to_string(),
      Mark::Error => text.if_supports_color(stream, |s| s.red()).to_string(),
      Mark::Warning => text.if_supports_color(stream, |s| s.yellow()).to_string(),
      Mark::Heading => text.if_supports_color(stream, |s| s.blue()).to_string(),
      Mark::Skip => text.if_supports_color(stream, |s| s.dimmed()).to_string(),
    }
  }

  /// Whether the message itself takes the mark's color, not just the symbol.
  fn colors_message(self) -> bool {
    matches!(self, Mark::Error | Mark::Warning | Mark::Skip)
  }
}

/// Print `mark message`.
pub fn line(mark: Mark, message: impl Display) {
  let message = message.to_string();
  let message = if mark.colors_message() { mark.paint(&message) } else { message };
  let text = format!("{} {}", mark.paint(mark.symbol()), message);
  if mark.writes_to_stderr() {
    eprintln!("{text}");
  } else {
    println!("{text}");
  }
}

/// Print one invocation: `  + label detail` or `  - label (detail)`.
pub fn step(mark: Mark, label: &str, detail: &str) {
  let symbol = mark.paint(mark.symbol());
  match mark {
    Mark::Skip => println!("  {} {} {}", symbol, mark.paint(label), mark.paint(&format!("({detail})"))),
    _ if detail.is_empty() => println!("  {symbol} {label}"),
    _ => println!(
      "  {} {} {}",
      symbol,
      label,
      detail.if_supports_color(Stream::Stdout, |s| s.dimmed())
    ),
  }
}

pub fn stat(label: &str, value: impl Display) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Single-line rendering of a value. Null is spelled out so it is not
/// mistaken for an empty string.
pub fn inline_value(value: &Value) -> String {
  match value {
    Value::Null => "null".to_string(),
    other => other.to_string(),
  }
}

/// `[a, b]`, or nothing for no tags.
pub fn tag_list<'a>(tags: impl IntoIterator<Item = &'a String>) -> String {
  let tags: Vec<&str> = tags.into_iter().map(String::as_str).collect();
  if tags.is_empty() {
    String::new()
  } else {
    format!("[{}]", tags.join(", "))
  }
}
