//! The per-host environment map.
//!
//! An [`EnvironmentMap`] is built by applying variable layers in increasing
//! precedence. A later layer replaces earlier values key by key; nested maps
//! are not merged. Every key remembers the layer that last set it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::expr::{ExprError, Scope};
use crate::value::Value;

/// Where a variable's value came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
  /// `all.vars` in the inventory.
  Global,
  /// A group's `vars`.
  Group(String),
  /// A host's `vars`.
  Host,
  /// The manifest's own `vars`.
  Play,
}

impl fmt::Display for Layer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Layer::Global => f.write_str("global"),
      Layer::Group(name) => write!(f, "group:{name}"),
      Layer::Host => f.write_str("host"),
      Layer::Play => f.write_str("play"),
    }
  }
}

impl Serialize for Layer {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// A variable with its origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
  pub value: Value,
  pub origin: Layer,
}

/// Merged variables for one host.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EnvironmentMap {
  entries: BTreeMap<String, Entry>,
}

impl EnvironmentMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Apply a layer on top of the current contents.
  pub fn apply_layer<'a>(&mut self, layer: &Layer, vars: impl IntoIterator<Item = (&'a String, &'a Value)>) {
    for (name, value) in vars {
      self.entries.insert(
        name.clone(),
        Entry {
          value: value.clone(),
          origin: layer.clone(),
        },
      );
    }
  }

  /// Set a single variable.
  pub fn insert(&mut self, name: impl Into<String>, value: Value, origin: Layer) {
    self.entries.insert(name.into(), Entry { value, origin });
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.entries.get(name).map(|e| &e.value)
  }

  pub fn origin(&self, name: &str) -> Option<&Layer> {
    self.entries.get(name).map(|e| &e.origin)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.entries.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
    self.entries.iter()
  }
}

/// Raw lookup without template rendering.
impl Scope for EnvironmentMap {
  fn lookup(&self, name: &str) -> Result<Option<Value>, ExprError> {
    Ok(self.get(name).cloned())
  }
}
