//! Implementation of the `rolebook hosts` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use rolebook_lib::plan::target_hosts;

use super::{load_inventory, load_manifest};
use crate::output::{self, Mark, OutputFormat};

#[derive(Serialize)]
struct HostEntry {
  host: String,
  groups: Vec<String>,
}

pub fn cmd_hosts(manifest_path: &Path, inventory_path: &Path, limit: Option<&str>, format: OutputFormat) -> Result<()> {
  let manifest = load_manifest(manifest_path)?;
  let inventory = load_inventory(inventory_path)?;
  let hosts = target_hosts(&manifest, &inventory, limit).context("Failed to resolve hosts")?;

  let entries: Vec<HostEntry> = hosts
    .into_iter()
    .map(|host| HostEntry {
      groups: inventory.groups_of(&host),
      host,
    })
    .collect();

  if format.is_json() {
    return output::json(&entries);
  }

  if entries.is_empty() {
    output::line(Mark::Warning, format!("No hosts match '{}'", manifest.hosts));
    return Ok(());
  }

  output::line(Mark::Heading, format!("Hosts matching '{}': {}", manifest.hosts, entries.len()));
  for entry in &entries {
    println!("  {} ({})", entry.host, entry.groups.join(", "));
  }
  Ok(())
}
