//! Implementation of the `rolebook check` command.

use std::path::Path;

use anyhow::{Result, bail};

use rolebook_lib::check::{Severity, check};

use super::{load_inventory, load_manifest};
use crate::output::{self, Mark, OutputFormat};

pub fn cmd_check(manifest_path: &Path, inventory_path: &Path, format: OutputFormat) -> Result<()> {
  let manifest = load_manifest(manifest_path)?;
  let inventory = load_inventory(inventory_path)?;
  let report = check(&manifest, &inventory);

  if format.is_json() {
    output::json(&report)?;
  } else {
    for diagnostic in &report.diagnostics {
      match diagnostic.severity {
        Severity::Error => output::line(Mark::Error, diagnostic),
        Severity::Warning => output::line(Mark::Warning, diagnostic),
      }
    }
    if report.is_empty() {
      output::line(Mark::Done, format!("{}: no problems found", manifest_path.display()));
    }
  }

  if report.has_errors() {
    bail!(
      "{} error(s), {} warning(s)",
      report.count(Severity::Error),
      report.count(Severity::Warning)
    );
  }
  Ok(())
}
