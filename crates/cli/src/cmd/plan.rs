//! Implementation of the `rolebook plan` command.
//!
//! Resolves the manifest for every targeted host and prints the steps that
//! would run, their parameters, and why the others were skipped.

use std::path::Path;

use anyhow::{Context, Result, bail};

use rolebook_lib::plan::{HostPlan, Plan, PlanOptions, plan};
use rolebook_lib::resolve::SkipReason;
use rolebook_lib::sequencer::TagFilter;

use super::{load_inventory, load_manifest};
use crate::output::{self, Mark, OutputFormat, inline_value, tag_list};

pub fn cmd_plan(
  manifest_path: &Path,
  inventory_path: &Path,
  filter: TagFilter,
  limit: Option<String>,
  format: OutputFormat,
) -> Result<()> {
  let manifest = load_manifest(manifest_path)?;
  let inventory = load_inventory(inventory_path)?;

  let options = PlanOptions { filter, limit };
  let plan = plan(&manifest, &inventory, &options).context("Failed to plan manifest")?;

  if format.is_json() {
    output::json(&plan)?;
  } else {
    print_text(&plan)?;
  }

  let failed = plan.failures().count();
  if failed > 0 {
    bail!("planning failed for {} of {} host(s)", failed, plan.hosts.len());
  }
  Ok(())
}

fn print_text(plan: &Plan) -> Result<()> {
  let fingerprint = plan.fingerprint().context("Failed to compute plan fingerprint")?;
  let title = if plan.name.is_empty() { &plan.pattern } else { &plan.name };
  output::line(Mark::Heading, format!("Plan: {} ({})", title, fingerprint.short()));
  output::stat("Hosts", &plan.pattern);
  if !plan.filter.include.is_empty() {
    output::stat("Tags", tag_list(&plan.filter.include));
  }
  if !plan.filter.skip.is_empty() {
    output::stat("Skip tags", tag_list(&plan.filter.skip));
  }

  if plan.hosts.is_empty() {
    println!();
    output::line(Mark::Warning, "No hosts matched");
    return Ok(());
  }

  for host in plan.hosts.values() {
    println!();
    print_host(host);
  }

  println!();
  let failed = plan.failures().count();
  if failed == 0 {
    output::line(Mark::Done, format!("{} host(s) planned", plan.hosts.len()));
  }
  Ok(())
}

fn print_host(host: &HostPlan) {
  println!("{}", host.host);

  for step in &host.steps {
    output::step(Mark::Run, &format!("{}#{}", step.role, step.position), &tag_list(&step.tags));
    for (name, value) in &step.params {
      println!("      {} = {}", name, inline_value(value));
    }
    for (name, value) in &step.publish {
      println!("      publishes {} = {}", name, inline_value(value));
    }
  }

  for skipped in &host.skipped {
    let reason = match &skipped.reason {
      SkipReason::Tags => "tags".to_string(),
      SkipReason::Guard { condition } => format!("when: {}", condition),
    };
    output::step(Mark::Skip, &format!("{}#{}", skipped.role, skipped.position), &reason);
  }

  if let Some(failure) = &host.failure {
    output::line(Mark::Error, format!("{}: {}", host.host, failure.error));
  }
}
