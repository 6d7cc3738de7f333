//! Guard evaluation and parameter resolution for one host.
//!
//! Resolution runs in two passes over the sequenced candidates:
//!
//! 1. Selection walks the candidates in order, evaluates each guard, checks
//!    `requires`, renders publications and gathers contributions.
//! 2. Parameter resolution renders each selected invocation's `vars` with the
//!    publications made up to and including that invocation and the complete
//!    contribution lists.
//!
//! A selection failure leaves the host without any resolved step because
//! contributed lists are only complete once every candidate has been seen. A
//! parameter failure keeps the steps resolved before it.

mod scope;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::environment::EnvironmentMap;
use crate::expr::{ExprError, Scope};
use crate::manifest::{GuardOutcome, Manifest, RoleInvocation};
use crate::template;
use crate::value::Value;

pub use scope::VarScope;

/// Why an invocation failed for a host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepErrorKind {
  #[error("guard '{condition}': {source}")]
  Guard { condition: String, source: ExprError },

  #[error("parameter '{name}': {source}")]
  Param { name: String, source: ExprError },

  #[error("publication '{name}': {source}")]
  Publish { name: String, source: ExprError },

  #[error("contribution to '{target}': {source}")]
  Contribution { target: String, source: ExprError },

  #[error("required variable '{0}' is not in scope")]
  MissingRequirement(String),
}

/// A failure tied to one role invocation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("role invocation #{position} ({role}): {kind}")]
pub struct StepError {
  pub position: usize,
  pub role: String,
  pub kind: StepErrorKind,
}

/// An invocation that will run, with everything rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStep {
  pub position: usize,
  pub role: String,
  pub tags: BTreeSet<String>,
  pub params: BTreeMap<String, Value>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub publish: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SkipReason {
  /// Removed by the tag filter.
  Tags,
  /// The named condition evaluated false.
  Guard { condition: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStep {
  pub position: usize,
  pub role: String,
  pub reason: SkipReason,
}

/// The outcome of resolving one host.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Resolution {
  pub steps: Vec<ResolvedStep>,
  pub skipped: Vec<SkippedStep>,
  pub failure: Option<StepError>,
}

/// A selected invocation and the publications visible to it.
struct Selected {
  position: usize,
  published: BTreeMap<String, Value>,
  own_publish: BTreeMap<String, Value>,
}

/// Resolves a manifest's candidates against one host's environment.
pub struct Resolver<'a> {
  manifest: &'a Manifest,
  env: &'a EnvironmentMap,
  targets: BTreeSet<String>,
}

impl<'a> Resolver<'a> {
  pub fn new(manifest: &'a Manifest, env: &'a EnvironmentMap) -> Self {
    Self {
      manifest,
      env,
      targets: manifest.contribution_targets(),
    }
  }

  /// Look up a variable as the first invocation would see it.
  pub fn lookup(&self, name: &str) -> Result<Option<Value>, ExprError> {
    let (published, contributions) = (BTreeMap::new(), BTreeMap::new());
    VarScope::new(self.env, &published, &self.targets, &contributions).lookup(name)
  }

  /// Resolve `candidates`, given as manifest positions in sequence order.
  pub fn resolve(&self, candidates: &[usize]) -> Resolution {
    let mut resolution = Resolution::default();
    let mut contributions: BTreeMap<String, Vec<Value>> = BTreeMap::new();

    let selected = match self.select(candidates, &mut resolution.skipped, &mut contributions) {
      Ok(selected) => selected,
      Err(err) => {
        resolution.failure = Some(err);
        return resolution;
      }
    };

    for entry in selected {
      let invocation = &self.manifest.roles[entry.position];
      let scope = VarScope::new(self.env, &entry.published, &self.targets, &contributions);
      match render_map(&invocation.vars, &scope) {
        Ok(params) => resolution.steps.push(ResolvedStep {
          position: entry.position,
          role: invocation.role.clone(),
          tags: invocation.tags.clone(),
          params,
          publish: entry.own_publish,
        }),
        Err((name, source)) => {
          resolution.failure = Some(self.step_error(entry.position, StepErrorKind::Param { name, source }));
          break;
        }
      }
    }

    resolution
  }

  fn select(
    &self,
    candidates: &[usize],
    skipped: &mut Vec<SkippedStep>,
    contributions: &mut BTreeMap<String, Vec<Value>>,
  ) -> Result<Vec<Selected>, StepError> {
    let mut published: BTreeMap<String, Value> = BTreeMap::new();
    let mut produced: BTreeSet<String> = BTreeSet::new();
    let mut selected = Vec::new();

    for &position in candidates {
      let invocation = &self.manifest.roles[position];

      {
        let scope = VarScope::new(self.env, &published, &self.targets, contributions);
        match invocation.when.evaluate(&scope) {
          Ok(GuardOutcome::Pass) => {}
          Ok(GuardOutcome::Fail(condition)) => {
            debug!(position, role = %invocation.role, %condition, "guard is false, skipping");
            skipped.push(SkippedStep {
              position,
              role: invocation.role.clone(),
              reason: SkipReason::Guard { condition },
            });
            continue;
          }
          Err((condition, source)) => {
            return Err(self.step_error(position, StepErrorKind::Guard { condition, source }));
          }
        }
      }

      let own_publish = self
        .render_publications(invocation, &published, contributions)
        .map_err(|(name, source)| self.step_error(position, StepErrorKind::Publish { name, source }))?;

      published.extend(own_publish.clone());
      self.check_requires(position, invocation, &published, &produced)?;

      let scope = VarScope::new(self.env, &published, &self.targets, contributions);
      let mut fragments = Vec::new();
      for (target, value) in &invocation.contributes {
        let rendered = template::render_value(value, &scope).map_err(|source| {
          self.step_error(
            position,
            StepErrorKind::Contribution {
              target: target.clone(),
              source,
            },
          )
        })?;
        fragments.push((target.clone(), rendered));
      }
      for (target, rendered) in fragments {
        let items = contributions.entry(target).or_default();
        match rendered {
          Value::List(list) => items.extend(list),
          single => items.push(single),
        }
      }

      produced.extend(invocation.produces.iter().cloned());
      debug!(position, role = %invocation.role, "selected");
      selected.push(Selected {
        position,
        published: published.clone(),
        own_publish,
      });
    }

    Ok(selected)
  }

  /// Render an invocation's publications.
  ///
  /// An entry may reference a sibling entry and sees its rendered value; a
  /// reference to its own name sees the value published before. Entries are
  /// rendered once everything they reference among their siblings is.
  fn render_publications(
    &self,
    invocation: &RoleInvocation,
    published: &BTreeMap<String, Value>,
    contributions: &BTreeMap<String, Vec<Value>>,
  ) -> Result<BTreeMap<String, Value>, (String, ExprError)> {
    let mut pending: BTreeMap<&String, BTreeSet<String>> = BTreeMap::new();
    for (name, value) in &invocation.publish {
      let siblings = template::referenced_variables(value)
        .map_err(|err| (name.clone(), err))?
        .into_iter()
        .filter(|v| v != name && invocation.publish.contains_key(v))
        .collect();
      pending.insert(name, siblings);
    }

    let mut rendered: BTreeMap<String, Value> = BTreeMap::new();
    while !pending.is_empty() {
      let ready: Vec<&String> = pending
        .iter()
        .filter(|(_, siblings)| siblings.iter().all(|s| rendered.contains_key(s)))
        .map(|(name, _)| *name)
        .collect();
      let Some(&blocked) = pending.keys().next() else {
        break;
      };
      if ready.is_empty() {
        return Err((blocked.clone(), ExprError::RecursionLimit(blocked.clone())));
      }

      let mut visible = published.clone();
      visible.extend(rendered.iter().map(|(k, v)| (k.clone(), v.clone())));
      let scope = VarScope::new(self.env, &visible, &self.targets, contributions);
      for name in ready {
        let value = template::render_value(&invocation.publish[name], &scope).map_err(|err| (name.clone(), err))?;
        pending.remove(name);
        rendered.insert(name.clone(), value);
      }
    }
    Ok(rendered)
  }

  /// Every `requires` entry must be published, produced by an earlier
  /// selected invocation, or defined for the host.
  fn check_requires(
    &self,
    position: usize,
    invocation: &RoleInvocation,
    published: &BTreeMap<String, Value>,
    produced: &BTreeSet<String>,
  ) -> Result<(), StepError> {
    for name in &invocation.requires {
      if published.contains_key(name)
        || produced.contains(name)
        || self.targets.contains(name)
        || self.env.contains(name)
      {
        continue;
      }
      return Err(self.step_error(position, StepErrorKind::MissingRequirement(name.clone())));
    }
    Ok(())
  }

  fn step_error(&self, position: usize, kind: StepErrorKind) -> StepError {
    StepError {
      position,
      role: self.manifest.roles[position].role.clone(),
      kind,
    }
  }
}

/// Render every value of a map, naming the first entry that fails.
fn render_map(
  values: &BTreeMap<String, Value>,
  scope: &dyn Scope,
) -> Result<BTreeMap<String, Value>, (String, ExprError)> {
  values
    .iter()
    .map(|(name, value)| {
      template::render_value(value, scope)
        .map(|rendered| (name.clone(), rendered))
        .map_err(|err| (name.clone(), err))
    })
    .collect()
}
