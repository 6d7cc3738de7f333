//! Manifest types for rolebook.
//!
//! The manifest is the static, version-controlled description of a run: which
//! hosts it targets, which roles it invokes in which order, how each
//! invocation is gated and which parameters it receives.
//!
//! # Structure
//!
//! ```yaml
//! name: Install and manage ownCloud instances
//! hosts: owncloud
//! exclusive:
//!   - variable: owncloud__database
//!     values: [mariadb, postgresql]
//! roles:
//!   - role: mariadb
//!     tags: [role::mariadb]
//!     when: owncloud__database == 'mariadb'
//!     vars:
//!       mariadb__dependent_databases:
//!         - database: "{{ owncloud__database_name }}"
//! ```
//!
//! # Data flow
//!
//! Besides `vars`, an invocation may `publish` variables for later
//! invocations and `contribute` fragments to shared list variables.
//! Publications (and `produces`) become edges of the dependency graph. The
//! sequencer follows that graph only under `ordering: dependencies`; by
//! default invocations run in document order and the graph is used to check
//! that nothing reads a variable before it is published. Contributions add
//! no edges and are collected in sequence order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::expr::{self, Expr, ExprError, Scope};
use crate::inventory::Vars;
use crate::value::Value;

/// How the sequencer orders invocations.
///
/// Execution order is fixed by manifest position unless a manifest opts in
/// to `ordering: dependencies`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ordering {
  /// Topological order of the data-flow graph, ties broken by position.
  Dependencies,
  /// Document order, exactly as written.
  #[default]
  Manifest,
}

impl fmt::Display for Ordering {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Ordering::Dependencies => f.write_str("dependencies"),
      Ordering::Manifest => f.write_str("manifest"),
    }
  }
}

/// A complete manifest (one play).
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
  /// Human readable description.
  #[serde(default)]
  pub name: String,
  /// Host pattern the manifest applies to.
  #[serde(default = "default_hosts")]
  pub hosts: String,
  #[serde(default)]
  pub ordering: Ordering,
  /// Play variables, the highest-precedence environment layer.
  #[serde(default)]
  pub vars: Vars,
  /// Variables whose values select between alternative invocations.
  #[serde(default)]
  pub exclusive: Vec<ExclusiveChoice>,
  /// Role invocations in document order.
  #[serde(default)]
  pub roles: Vec<RoleInvocation>,
}

fn default_hosts() -> String {
  crate::consts::ALL_GROUP.to_string()
}

/// A variable whose allowed values each select exactly one alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExclusiveChoice {
  pub variable: String,
  pub values: Vec<Value>,
}

impl ExclusiveChoice {
  pub fn allows(&self, value: &Value) -> bool {
    self.values.iter().any(|v| v.loose_eq(value))
  }
}

/// One role invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleInvocation {
  /// Identifier of the external role.
  pub role: String,
  #[serde(default, deserialize_with = "one_or_many_set")]
  pub tags: BTreeSet<String>,
  /// Guard condition; all conditions must hold.
  #[serde(default, skip_serializing_if = "Guard::is_empty")]
  pub when: Guard,
  /// The parameter bundle.
  #[serde(default, alias = "params")]
  pub vars: BTreeMap<String, Value>,
  /// Variables produced for later invocations.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub publish: BTreeMap<String, Value>,
  /// Fragments appended to shared list variables.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub contributes: BTreeMap<String, Value>,
  /// Variables that must be in scope when the invocation is reached.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub requires: Vec<String>,
  /// Variables produced by the role itself, beyond `publish`.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub produces: Vec<String>,
}

impl RoleInvocation {
  /// Create an invocation with only a role name.
  pub fn new(role: impl Into<String>) -> Self {
    Self {
      role: role.into(),
      tags: BTreeSet::new(),
      when: Guard::default(),
      vars: BTreeMap::new(),
      publish: BTreeMap::new(),
      contributes: BTreeMap::new(),
      requires: Vec::new(),
      produces: Vec::new(),
    }
  }

  /// Variables this invocation makes available to others.
  pub fn produced_variables(&self) -> BTreeSet<String> {
    self
      .produces
      .iter()
      .cloned()
      .chain(self.publish.keys().cloned())
      .collect()
  }

  /// Every top-level variable the invocation reads, including `requires`.
  pub fn referenced_variables(&self) -> Result<BTreeSet<String>, ExprError> {
    let mut names: BTreeSet<String> = self.requires.iter().cloned().collect();
    names.extend(self.when.variables());
    for value in self.vars.values().chain(self.publish.values()).chain(self.contributes.values()) {
      names.extend(crate::template::referenced_variables(value)?);
    }
    Ok(names)
  }
}

/// A guard: zero or more conditions that must all be true.
///
/// Accepts a single expression string or a list of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Guard {
  conditions: Vec<Condition>,
}

/// A parsed guard condition with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
  pub source: String,
  pub expr: Expr,
}

/// Outcome of evaluating a guard.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
  Pass,
  /// The first condition that was false.
  Fail(String),
}

impl Guard {
  /// Parse conditions from source strings.
  pub fn parse<S: AsRef<str>>(sources: &[S]) -> Result<Self, ExprError> {
    let conditions = sources
      .iter()
      .map(|s| {
        let source = s.as_ref().trim().to_string();
        expr::parse(&source).map(|expr| Condition { source, expr })
      })
      .collect::<Result<_, _>>()?;
    Ok(Self { conditions })
  }

  pub fn is_empty(&self) -> bool {
    self.conditions.is_empty()
  }

  pub fn conditions(&self) -> &[Condition] {
    &self.conditions
  }

  /// Evaluate conditions in order, stopping at the first false one.
  pub fn evaluate(&self, scope: &dyn Scope) -> Result<GuardOutcome, (String, ExprError)> {
    for condition in &self.conditions {
      let holds = condition
        .expr
        .eval_bool(scope)
        .map_err(|err| (condition.source.clone(), err))?;
      if !holds {
        return Ok(GuardOutcome::Fail(condition.source.clone()));
      }
    }
    Ok(GuardOutcome::Pass)
  }

  pub fn variables(&self) -> BTreeSet<String> {
    self.conditions.iter().flat_map(|c| c.expr.variables()).collect()
  }
}

impl fmt::Display for Guard {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sources: Vec<&str> = self.conditions.iter().map(|c| c.source.as_str()).collect();
    f.write_str(&sources.join(" and "))
  }
}

impl Serialize for Guard {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(self.conditions.iter().map(|c| &c.source))
  }
}

impl<'de> Deserialize<'de> for Guard {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let sources = OneOrMany::<GuardSource>::deserialize(deserializer)?.into_vec();
    let sources: Vec<String> = sources.into_iter().map(GuardSource::into_source).collect();
    Guard::parse(&sources).map_err(serde::de::Error::custom)
  }
}

/// `when: true` is as valid as `when: "true"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum GuardSource {
  Text(String),
  Bool(bool),
}

impl GuardSource {
  fn into_source(self) -> String {
    match self {
      GuardSource::Text(s) => s,
      GuardSource::Bool(b) => b.to_string(),
    }
  }
}

/// A YAML value that may be given as a single item or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
  One(T),
  Many(Vec<T>),
}

impl<T> OneOrMany<T> {
  fn into_vec(self) -> Vec<T> {
    match self {
      OneOrMany::One(item) => vec![item],
      OneOrMany::Many(items) => items,
    }
  }
}

fn one_or_many_set<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<String>, D::Error> {
  Ok(OneOrMany::<String>::deserialize(deserializer)?.into_vec().into_iter().collect())
}
