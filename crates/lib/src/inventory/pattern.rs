//! Host pattern resolution.
//!
//! Patterns select hosts from an inventory:
//!
//! - `name` selects a group (with its children) or a single host
//! - `all` or `*` selects every host
//! - `a:b` (or `a,b`) is the union of `a` and `b`
//! - `a:&b` keeps only hosts also in `b`
//! - `a:!b` removes the hosts in `b`
//!
//! Terms apply left to right.

use std::collections::BTreeSet;

use super::{Inventory, InventoryError};

/// Resolve a pattern to a sorted list of host names.
pub fn resolve_pattern(inventory: &Inventory, pattern: &str) -> Result<Vec<String>, InventoryError> {
  let terms: Vec<&str> = pattern
    .split([':', ','])
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .collect();
  if terms.is_empty() {
    return Err(InventoryError::EmptyPattern);
  }

  let mut selected: BTreeSet<String> = BTreeSet::new();
  for term in terms {
    if let Some(name) = term.strip_prefix('&') {
      let hosts = hosts_for(inventory, pattern, name)?;
      selected.retain(|h| hosts.contains(h));
    } else if let Some(name) = term.strip_prefix('!') {
      let hosts = hosts_for(inventory, pattern, name)?;
      selected.retain(|h| !hosts.contains(h));
    } else {
      selected.extend(hosts_for(inventory, pattern, term)?);
    }
  }

  Ok(selected.into_iter().collect())
}

fn hosts_for(inventory: &Inventory, pattern: &str, name: &str) -> Result<BTreeSet<String>, InventoryError> {
  let name = name.trim();
  if name == "*" {
    return Ok(inventory.host_names());
  }
  if let Some(hosts) = inventory.group_hosts(name) {
    return Ok(hosts);
  }
  if inventory.has_host(name) {
    return Ok(BTreeSet::from([name.to_string()]));
  }
  Err(InventoryError::UnknownPattern {
    pattern: pattern.to_string(),
    name: name.to_string(),
  })
}
