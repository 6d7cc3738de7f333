//! Per-host run plans.
//!
//! Planning applies the sequencer and the resolver to every host a manifest
//! targets. Hosts are planned independently; a failure aborts only the
//! remaining steps of the host it occurs on.

mod fingerprint;

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::environment::EnvironmentMap;
use crate::expr::ExprError;
use crate::inventory::{Inventory, InventoryError, resolve_pattern};
use crate::manifest::Manifest;
use crate::resolve::{ResolvedStep, Resolver, SkipReason, SkippedStep, StepError};
use crate::sequencer::{self, SequenceError, TagFilter};
use crate::value::Value;

pub use fingerprint::Fingerprint;

/// Errors that stop planning for every host.
#[derive(Debug, Error)]
pub enum PlanError {
  #[error(transparent)]
  Inventory(#[from] InventoryError),

  #[error(transparent)]
  Sequence(#[from] SequenceError),
}

/// Errors that stop planning for one host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
  #[error("'{value}' is not a valid value for '{variable}' (expected one of: {allowed})")]
  InvalidChoice {
    variable: String,
    value: Value,
    allowed: String,
  },

  #[error("cannot resolve '{variable}': {source}")]
  Lookup { variable: String, source: ExprError },

  #[error(transparent)]
  Step(#[from] StepError),
}

/// A host failure with the invocation it happened at, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostFailure {
  pub position: Option<usize>,
  pub role: Option<String>,
  #[serde(rename = "message", serialize_with = "serialize_display")]
  pub error: HostError,
}

impl From<HostError> for HostFailure {
  fn from(error: HostError) -> Self {
    let (position, role) = match &error {
      HostError::Step(step) => (Some(step.position), Some(step.role.clone())),
      _ => (None, None),
    };
    Self { position, role, error }
  }
}

fn serialize_display<S: Serializer, T: std::fmt::Display>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.collect_str(value)
}

/// The plan for one host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostPlan {
  pub host: String,
  pub steps: Vec<ResolvedStep>,
  pub skipped: Vec<SkippedStep>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<HostFailure>,
}

impl HostPlan {
  pub fn roles(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.role.as_str()).collect()
  }

  pub fn step(&self, role: &str) -> Option<&ResolvedStep> {
    self.steps.iter().find(|s| s.role == role)
  }
}

/// Options narrowing a plan.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
  pub filter: TagFilter,
  /// Additional host pattern intersected with the manifest's `hosts`.
  pub limit: Option<String>,
}

/// A complete plan for one manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
  pub name: String,
  pub pattern: String,
  pub filter: TagFilter,
  /// Candidate positions in sequence order.
  pub order: Vec<usize>,
  pub hosts: BTreeMap<String, HostPlan>,
}

impl Plan {
  /// Deterministic fingerprint of the plan's steps.
  pub fn fingerprint(&self) -> Result<Fingerprint, serde_json::Error> {
    Fingerprint::of(self)
  }

  pub fn failures(&self) -> impl Iterator<Item = (&str, &HostFailure)> {
    self
      .hosts
      .values()
      .filter_map(|h| h.failure.as_ref().map(|f| (h.host.as_str(), f)))
  }

  pub fn is_ok(&self) -> bool {
    self.failures().next().is_none()
  }

  pub fn host(&self, name: &str) -> Option<&HostPlan> {
    self.hosts.get(name)
  }
}

/// Hosts targeted by a manifest, narrowed by an optional limit pattern.
pub fn target_hosts(manifest: &Manifest, inventory: &Inventory, limit: Option<&str>) -> Result<Vec<String>, PlanError> {
  let mut hosts = resolve_pattern(inventory, &manifest.hosts)?;
  if let Some(limit) = limit {
    let allowed = resolve_pattern(inventory, limit)?;
    hosts.retain(|h| allowed.contains(h));
  }
  Ok(hosts)
}

/// Plan a manifest for every targeted host.
///
/// # Errors
///
/// Returns an error if a host pattern is invalid or the invocations cannot be
/// ordered. Per-host problems are recorded in the plan instead.
pub fn plan(manifest: &Manifest, inventory: &Inventory, options: &PlanOptions) -> Result<Plan, PlanError> {
  let hosts = target_hosts(manifest, inventory, options.limit.as_deref())?;
  let (candidates, filtered) = sequencer::candidates(manifest, &options.filter)?;

  let mut plan = Plan {
    name: manifest.name.clone(),
    pattern: manifest.hosts.clone(),
    filter: options.filter.clone(),
    order: candidates.clone(),
    hosts: BTreeMap::new(),
  };

  for host in hosts {
    let env = inventory.environment(&host, &manifest.vars)?;
    let host_plan = plan_host(manifest, &host, &env, &candidates, &filtered);
    plan.hosts.insert(host, host_plan);
  }

  info!(
    hosts = plan.hosts.len(),
    failed = plan.failures().count(),
    candidates = plan.order.len(),
    "planned manifest"
  );
  Ok(plan)
}

/// Plan one host from its environment map.
///
/// `candidates` are the sequenced positions that passed the tag filter and
/// `filtered` the ones it removed.
pub fn plan_host(
  manifest: &Manifest,
  host: &str,
  env: &EnvironmentMap,
  candidates: &[usize],
  filtered: &[usize],
) -> HostPlan {
  let resolver = Resolver::new(manifest, env);

  let mut skipped: Vec<SkippedStep> = filtered
    .iter()
    .map(|&position| SkippedStep {
      position,
      role: manifest.roles[position].role.clone(),
      reason: SkipReason::Tags,
    })
    .collect();

  if let Err(error) = check_choices(manifest, &resolver) {
    warn!(host, %error, "host failed");
    return HostPlan {
      host: host.to_string(),
      steps: Vec::new(),
      skipped,
      failure: Some(error.into()),
    };
  }

  let resolution = resolver.resolve(candidates);
  skipped.extend(resolution.skipped);
  skipped.sort_by_key(|s| s.position);

  let failure = resolution.failure.map(|err| HostFailure::from(HostError::from(err)));
  match &failure {
    Some(failure) => warn!(host, error = %failure.error, "host failed"),
    None => info!(
      host,
      steps = resolution.steps.len(),
      skipped = skipped.len(),
      "planned host"
    ),
  }

  HostPlan {
    host: host.to_string(),
    steps: resolution.steps,
    skipped,
    failure,
  }
}

/// A host's value for each exclusive choice must be one of the declared
/// alternatives. An unset choice is left to the guards.
fn check_choices(manifest: &Manifest, resolver: &Resolver<'_>) -> Result<(), HostError> {
  for choice in &manifest.exclusive {
    let value = resolver.lookup(&choice.variable).map_err(|source| HostError::Lookup {
      variable: choice.variable.clone(),
      source,
    })?;
    let Some(value) = value else {
      debug!(variable = %choice.variable, "exclusive choice is not set");
      continue;
    };
    if !choice.allows(&value) {
      return Err(HostError::InvalidChoice {
        variable: choice.variable.clone(),
        value,
        allowed: choice.values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "),
      });
    }
  }
  Ok(())
}
