//! Inventory loading, group membership and per-host environment maps.

mod pattern;
mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::ALL_GROUP;
use crate::environment::{EnvironmentMap, Layer};

pub use pattern::resolve_pattern;
pub use types::*;

/// Errors that can occur while loading or querying an inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
  #[error("failed to read inventory {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid inventory: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("group '{group}' lists unknown child group '{child}'")]
  UnknownChild { group: String, child: String },

  #[error("group cycle detected: {}", .0.join(" -> "))]
  GroupCycle(Vec<String>),

  #[error("'{0}' is reserved and cannot be declared as a group")]
  ReservedGroup(String),

  #[error("host '{0}' is not in the inventory")]
  UnknownHost(String),

  #[error("pattern '{pattern}' names unknown host or group '{name}'")]
  UnknownPattern { pattern: String, name: String },

  #[error("empty host pattern")]
  EmptyPattern,
}

impl Inventory {
  /// Load and validate an inventory file.
  pub fn load(path: &Path) -> Result<Self, InventoryError> {
    let content = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let inventory = Self::from_yaml_str(&content)?;
    debug!(
      path = %path.display(),
      groups = inventory.groups.len(),
      hosts = inventory.host_names().len(),
      "loaded inventory"
    );
    Ok(inventory)
  }

  /// Parse and validate an inventory document.
  pub fn from_yaml_str(content: &str) -> Result<Self, InventoryError> {
    let inventory: Inventory = if content.trim().is_empty() {
      Inventory::default()
    } else {
      serde_yaml::from_str(content)?
    };
    inventory.validate()?;
    Ok(inventory)
  }

  /// Check group references and reject cycles in `children`.
  pub fn validate(&self) -> Result<(), InventoryError> {
    if self.groups.contains_key(ALL_GROUP) {
      return Err(InventoryError::ReservedGroup(ALL_GROUP.to_string()));
    }

    for (name, group) in &self.groups {
      for child in &group.children {
        if !self.groups.contains_key(child) {
          return Err(InventoryError::UnknownChild {
            group: name.clone(),
            child: child.clone(),
          });
        }
      }
    }

    // Depth-first walk with an explicit path to report the cycle.
    let mut finished = BTreeSet::new();
    for name in self.groups.keys() {
      let mut path = Vec::new();
      self.visit_group(name, &mut path, &mut finished)?;
    }

    Ok(())
  }

  fn visit_group<'a>(
    &'a self,
    name: &'a str,
    path: &mut Vec<&'a str>,
    finished: &mut BTreeSet<&'a str>,
  ) -> Result<(), InventoryError> {
    if finished.contains(name) {
      return Ok(());
    }
    if let Some(start) = path.iter().position(|p| *p == name) {
      let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
      cycle.push(name.to_string());
      return Err(InventoryError::GroupCycle(cycle));
    }

    path.push(name);
    if let Some(group) = self.groups.get(name) {
      for child in &group.children {
        self.visit_group(child, path, finished)?;
      }
    }
    path.pop();
    finished.insert(name);
    Ok(())
  }

  /// Every host the inventory declares, sorted by name.
  pub fn host_names(&self) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = self.hosts.keys().cloned().collect();
    for group in self.groups.values() {
      names.extend(group.hosts.iter().cloned());
    }
    names
  }

  pub fn has_host(&self, host: &str) -> bool {
    self.hosts.contains_key(host) || self.groups.values().any(|g| g.hosts.iter().any(|h| h == host))
  }

  /// Hosts that belong to a group, directly or through its children.
  ///
  /// Returns `None` for an unknown group.
  pub fn group_hosts(&self, group: &str) -> Option<BTreeSet<String>> {
    if group == ALL_GROUP {
      return Some(self.host_names());
    }

    let mut hosts = BTreeSet::new();
    let mut stack = vec![self.groups.get(group)?];
    let mut seen = BTreeSet::new();
    while let Some(def) = stack.pop() {
      hosts.extend(def.hosts.iter().cloned());
      for child in &def.children {
        if seen.insert(child.as_str())
          && let Some(child_def) = self.groups.get(child)
        {
          stack.push(child_def);
        }
      }
    }
    Some(hosts)
  }

  /// Depth of each group below `all`: top-level groups are 1, a child is one
  /// deeper than its deepest parent.
  fn group_depths(&self) -> BTreeMap<&str, usize> {
    let mut parents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, group) in &self.groups {
      for child in &group.children {
        parents.entry(child.as_str()).or_default().push(name.as_str());
      }
    }

    fn depth<'a>(
      name: &'a str,
      parents: &BTreeMap<&'a str, Vec<&'a str>>,
      memo: &mut BTreeMap<&'a str, usize>,
    ) -> usize {
      if let Some(&d) = memo.get(name) {
        return d;
      }
      let d = parents
        .get(name)
        .map(|ps| ps.iter().map(|&p| depth(p, parents, memo)).max().unwrap_or(0) + 1)
        .unwrap_or(1);
      memo.insert(name, d);
      d
    }

    let mut memo = BTreeMap::new();
    for name in self.groups.keys() {
      depth(name, &parents, &mut memo);
    }
    memo
  }

  /// Groups a host belongs to, ordered from least to most specific.
  ///
  /// Ordering is by depth, then by name. `all` is not included.
  pub fn groups_of(&self, host: &str) -> Vec<String> {
    let depths = self.group_depths();
    let mut groups: Vec<(usize, &str)> = self
      .groups
      .keys()
      .filter(|name| self.group_hosts(name).is_some_and(|hosts| hosts.contains(host)))
      .map(|name| (depths.get(name.as_str()).copied().unwrap_or(1), name.as_str()))
      .collect();
    groups.sort();
    groups.into_iter().map(|(_, name)| name.to_string()).collect()
  }

  /// Build the environment map for a host.
  ///
  /// Layers apply in increasing precedence: `all.vars`, each group's vars
  /// (least specific first), the host's vars, then `play_vars`.
  pub fn environment(&self, host: &str, play_vars: &Vars) -> Result<EnvironmentMap, InventoryError> {
    if !self.has_host(host) {
      return Err(InventoryError::UnknownHost(host.to_string()));
    }

    let mut env = EnvironmentMap::new();
    env.apply_layer(&Layer::Global, &self.all.vars);
    for group in self.groups_of(host) {
      if let Some(def) = self.groups.get(&group) {
        env.apply_layer(&Layer::Group(group.clone()), &def.vars);
      }
    }
    if let Some(def) = self.hosts.get(host) {
      env.apply_layer(&Layer::Host, &def.vars);
    }
    env.apply_layer(&Layer::Play, play_vars);

    debug!(host, vars = env.len(), "built environment map");
    Ok(env)
  }
}
