//! Static checks over a manifest and its inventory.
//!
//! [`check`] never fails: everything it finds is reported as a
//! [`Diagnostic`]. Errors describe manifests that would plan wrongly for some
//! host; warnings describe manifests that plan but look suspicious.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::environment::EnvironmentMap;
use crate::expr::{Expr, ExprError};
use crate::inventory::Inventory;
use crate::manifest::{ExclusiveChoice, Manifest, Ordering, RoleInvocation};
use crate::plan::target_hosts;
use crate::resolve::Resolver;
use crate::sequencer::{DependencyGraph, SequenceError};
use crate::template;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Warning,
  Error,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Severity::Warning => f.write_str("warning"),
      Severity::Error => f.write_str("error"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  pub severity: Severity,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub position: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
  pub message: String,
}

impl Diagnostic {
  fn error(message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Error,
      position: None,
      role: None,
      message: message.into(),
    }
  }

  fn warning(message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Warning,
      ..Self::error(message)
    }
  }

  fn at(mut self, position: usize, invocation: &RoleInvocation) -> Self {
    self.position = Some(position);
    self.role = Some(invocation.role.clone());
    self
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (&self.position, &self.role) {
      (Some(position), Some(role)) => write!(f, "{}#{}: {}", role, position, self.message),
      _ => f.write_str(&self.message),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Report {
  pub diagnostics: Vec<Diagnostic>,
}

impl Report {
  pub fn has_errors(&self) -> bool {
    self.diagnostics.iter().any(|d| d.severity == Severity::Error)
  }

  pub fn count(&self, severity: Severity) -> usize {
    self.diagnostics.iter().filter(|d| d.severity == severity).count()
  }

  pub fn is_empty(&self) -> bool {
    self.diagnostics.is_empty()
  }
}

/// Check a manifest against an inventory.
pub fn check(manifest: &Manifest, inventory: &Inventory) -> Report {
  let mut report = Report::default();

  for choice in &manifest.exclusive {
    check_exclusive(manifest, choice, &mut report);
  }
  check_ordering(manifest, &mut report);
  check_tags(manifest, &mut report);

  match target_hosts(manifest, inventory, None) {
    Ok(hosts) => {
      if hosts.is_empty() {
        report
          .diagnostics
          .push(Diagnostic::warning(format!("pattern '{}' matches no hosts", manifest.hosts)));
      }
      let envs: BTreeMap<String, EnvironmentMap> = hosts
        .into_iter()
        .filter_map(|host| {
          let env = inventory.environment(&host, &manifest.vars).ok()?;
          Some((host, env))
        })
        .collect();
      check_host_choices(manifest, &envs, &mut report);
      check_references(manifest, &envs, &mut report);
    }
    Err(err) => report.diagnostics.push(Diagnostic::error(err.to_string())),
  }

  debug!(
    errors = report.count(Severity::Error),
    warnings = report.count(Severity::Warning),
    "checked manifest"
  );
  report
}

/// For every allowed value exactly one alternative's guard must hold.
///
/// Guards are split into their `and` terms. Terms that do not mention the
/// choice only narrow the selection further and are ignored; terms that mix
/// the choice with other variables cannot be decided and are errors. An
/// invocation is an alternative when its choice terms hold for some allowed
/// values and not for others.
fn check_exclusive(manifest: &Manifest, choice: &ExclusiveChoice, report: &mut Report) {
  let variable = &choice.variable;
  let mut referenced = false;
  let mut alternatives: Vec<(String, Vec<bool>)> = Vec::new();

  for (position, invocation) in manifest.roles.iter().enumerate() {
    let terms: Vec<&Expr> = invocation
      .when
      .conditions()
      .iter()
      .flat_map(|condition| condition.expr.conjuncts())
      .filter(|term| term.variables().contains(variable))
      .collect();
    if terms.is_empty() {
      continue;
    }
    referenced = true;

    if let Some(term) = terms.iter().find(|term| term.variables().len() > 1) {
      report.diagnostics.push(
        Diagnostic::error(format!("guard term '{term}' cannot be decided from '{variable}' alone"))
          .at(position, invocation),
      );
      continue;
    }

    let outcomes = choice
      .values
      .iter()
      .map(|value| {
        let scope = BTreeMap::from([(variable.clone(), value.clone())]);
        terms
          .iter()
          .try_fold(true, |holds, term| -> Result<bool, ExprError> { Ok(holds && term.eval_bool(&scope)?) })
      })
      .collect::<Result<Vec<bool>, ExprError>>();
    match outcomes {
      Ok(outcomes) if outcomes.contains(&true) && outcomes.contains(&false) => {
        alternatives.push((format!("{}#{}", invocation.role, position), outcomes));
      }
      Ok(_) => {}
      Err(err) => report.diagnostics.push(
        Diagnostic::error(format!("guard cannot be evaluated for '{variable}': {err}")).at(position, invocation),
      ),
    }
  }

  if !referenced {
    report.diagnostics.push(Diagnostic::warning(format!(
      "no guard references exclusive choice '{variable}'"
    )));
    return;
  }

  for (index, value) in choice.values.iter().enumerate() {
    let selected: Vec<&str> = alternatives
      .iter()
      .filter(|(_, outcomes)| outcomes[index])
      .map(|(label, _)| label.as_str())
      .collect();
    if selected.len() != 1 {
      let which = if selected.is_empty() {
        "none of the alternatives".to_string()
      } else {
        selected.join(", ")
      };
      report.diagnostics.push(Diagnostic::error(format!(
        "{variable} = '{value}' selects {which} (expected exactly one)"
      )));
    }
  }
}

fn check_host_choices(manifest: &Manifest, envs: &BTreeMap<String, EnvironmentMap>, report: &mut Report) {
  for (host, env) in envs {
    let resolver = Resolver::new(manifest, env);
    for choice in &manifest.exclusive {
      match resolver.lookup(&choice.variable) {
        Ok(Some(value)) if !choice.allows(&value) => report.diagnostics.push(Diagnostic::error(format!(
          "host '{host}': '{value}' is not a valid value for '{}'",
          choice.variable
        ))),
        Ok(_) => {}
        Err(err) => report.diagnostics.push(Diagnostic::error(format!(
          "host '{host}': cannot resolve '{}': {err}",
          choice.variable
        ))),
      }
    }
  }
}

fn check_ordering(manifest: &Manifest, report: &mut Report) {
  let graph = match DependencyGraph::from_manifest(manifest) {
    Ok(graph) => graph,
    Err(err) => {
      report.diagnostics.push(Diagnostic::error(err.to_string()));
      return;
    }
  };

  match manifest.ordering {
    Ordering::Dependencies => {
      if let Err(err @ SequenceError::Cycle(_)) = graph.order() {
        report.diagnostics.push(Diagnostic::error(err.to_string()));
      }
    }
    Ordering::Manifest => {
      for edge in graph.backward_edges() {
        let consumer = &manifest.roles[edge.to];
        let producer = &manifest.roles[edge.from];
        report.diagnostics.push(
          Diagnostic::error(format!(
            "reads '{}' before {}#{} produces it",
            edge.variable, producer.role, edge.from
          ))
          .at(edge.to, consumer),
        );
      }
    }
  }
}

fn check_tags(manifest: &Manifest, report: &mut Report) {
  for (position, invocation) in manifest.roles.iter().enumerate() {
    if invocation.tags.is_empty() {
      report.diagnostics.push(
        Diagnostic::warning("has no tags and only runs without an include filter or with 'all'")
          .at(position, invocation),
      );
    }
  }
}

/// Variables an invocation cannot do without.
fn required_variables(invocation: &RoleInvocation) -> Result<BTreeSet<String>, ExprError> {
  let mut names: BTreeSet<String> = invocation
    .when
    .conditions()
    .iter()
    .flat_map(|c| c.expr.required_variables())
    .collect();
  for value in invocation
    .vars
    .values()
    .chain(invocation.publish.values())
    .chain(invocation.contributes.values())
  {
    names.extend(template::required_variables(value)?);
  }
  Ok(names)
}

/// Warn about variables that are neither produced by the manifest nor defined
/// for every targeted host.
fn check_references(manifest: &Manifest, envs: &BTreeMap<String, EnvironmentMap>, report: &mut Report) {
  let mut provided: BTreeSet<String> = manifest.contribution_targets();
  for invocation in &manifest.roles {
    provided.extend(invocation.produced_variables());
  }

  for (position, invocation) in manifest.roles.iter().enumerate() {
    let names = match required_variables(invocation) {
      Ok(names) => names,
      Err(err) => {
        report
          .diagnostics
          .push(Diagnostic::error(err.to_string()).at(position, invocation));
        continue;
      }
    };

    for name in names.difference(&provided) {
      let missing: Vec<&str> = envs
        .iter()
        .filter(|(_, env)| !env.contains(name))
        .map(|(host, _)| host.as_str())
        .collect();
      if !missing.is_empty() {
        report.diagnostics.push(
          Diagnostic::warning(format!("'{name}' is undefined for hosts: {}", missing.join(", ")))
            .at(position, invocation),
        );
      }
    }
  }
}
