//! Implementation of the `rolebook roles` command.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use rolebook_lib::manifest::Manifest;
use rolebook_lib::sequencer::{DependencyGraph, TagFilter, candidates};

use super::load_manifest;
use crate::output::{self, Mark, OutputFormat, tag_list};

#[derive(Serialize)]
struct RoleEntry<'a> {
  position: usize,
  role: &'a str,
  tags: &'a BTreeSet<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  when: Option<String>,
  after: BTreeSet<usize>,
  selected: bool,
}

pub fn cmd_roles(manifest_path: &Path, filter: &TagFilter, format: OutputFormat) -> Result<()> {
  let manifest = load_manifest(manifest_path)?;
  let (selected, filtered) = candidates(&manifest, filter).context("Failed to order role invocations")?;
  let graph = DependencyGraph::from_manifest(&manifest).context("Failed to build dependency graph")?;

  let entry = |position: usize, selected: bool| {
    let invocation = &manifest.roles[position];
    RoleEntry {
      position,
      role: &invocation.role,
      tags: &invocation.tags,
      when: (!invocation.when.is_empty()).then(|| invocation.when.to_string()),
      after: graph.dependencies_of(position),
      selected,
    }
  };

  let mut entries: Vec<RoleEntry<'_>> = selected.iter().map(|&p| entry(p, true)).collect();
  entries.extend(filtered.iter().map(|&p| entry(p, false)));

  if format.is_json() {
    return output::json(&entries);
  }

  print_text(&manifest, &entries);
  Ok(())
}

fn print_text(manifest: &Manifest, entries: &[RoleEntry<'_>]) {
  output::line(Mark::Heading, format!("Roles ({} ordering)", manifest.ordering));
  let selected = entries.iter().filter(|e| e.selected).count();
  output::stat("Selected", format!("{} of {}", selected, entries.len()));
  println!();

  for entry in entries {
    let label = format!("{}#{}", entry.role, entry.position);
    if !entry.selected {
      output::step(Mark::Skip, &label, "tags");
      continue;
    }
    let mut parts = Vec::new();
    if !entry.tags.is_empty() {
      parts.push(tag_list(entry.tags));
    }
    if let Some(when) = &entry.when {
      parts.push(format!("when: {}", when));
    }
    if !entry.after.is_empty() {
      let after: Vec<String> = entry.after.iter().map(|p| format!("#{p}")).collect();
      parts.push(format!("after: {}", after.join(", ")));
    }
    output::step(Mark::Run, &label, &parts.join(" "));
  }
}
