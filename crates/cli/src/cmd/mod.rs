mod check;
mod graph;
mod hosts;
mod plan;
mod roles;
mod vars;

use std::path::Path;

use anyhow::{Context, Result};

use rolebook_lib::inventory::Inventory;
use rolebook_lib::manifest::Manifest;

pub use check::cmd_check;
pub use graph::cmd_graph;
pub use hosts::cmd_hosts;
pub use plan::cmd_plan;
pub use roles::cmd_roles;
pub use vars::cmd_vars;

fn load_manifest(path: &Path) -> Result<Manifest> {
  Manifest::load(path).with_context(|| format!("Failed to load manifest: {}", path.display()))
}

fn load_inventory(path: &Path) -> Result<Inventory> {
  Inventory::load(path).with_context(|| format!("Failed to load inventory: {}", path.display()))
}
