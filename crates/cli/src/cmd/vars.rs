//! Implementation of the `rolebook vars` command.
//!
//! Prints the merged environment of one host with the layer each value came
//! from. Values are shown as written; templates are not rendered.

use std::path::Path;

use anyhow::{Context, Result};

use rolebook_lib::inventory::Vars;

use super::{load_inventory, load_manifest};
use crate::output::{self, Mark, OutputFormat, inline_value};

pub fn cmd_vars(host: &str, inventory_path: &Path, manifest_path: Option<&Path>, format: OutputFormat) -> Result<()> {
  let inventory = load_inventory(inventory_path)?;
  let play_vars = match manifest_path {
    Some(path) => load_manifest(path)?.vars,
    None => Vars::new(),
  };
  let env = inventory
    .environment(host, &play_vars)
    .with_context(|| format!("Failed to build environment for '{}'", host))?;

  if format.is_json() {
    return output::json(&env);
  }

  output::line(Mark::Heading, format!("{}: {} variable(s)", host, env.len()));
  for (name, entry) in env.iter() {
    println!("  {} = {}  [{}]", name, inline_value(&entry.value), entry.origin);
  }
  Ok(())
}
