//! Shared helpers for library integration tests.

use std::path::PathBuf;

use rolebook_lib::inventory::Inventory;
use rolebook_lib::manifest::Manifest;

/// Path to a file of the ownCloud demo.
pub fn demo_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("..")
    .join("..")
    .join("demos")
    .join("owncloud")
    .join(name)
}

pub fn owncloud_manifest() -> Manifest {
  Manifest::load(&demo_path("playbook.yml")).unwrap()
}

pub fn owncloud_inventory() -> Inventory {
  Inventory::load(&demo_path("inventory.yml")).unwrap()
}

/// The demo inventory with every host switched to one database engine.
pub fn inventory_with_database(engine: &str) -> Inventory {
  let mut inventory = owncloud_inventory();
  inventory.groups.remove("owncloud_postgresql");
  inventory
    .all
    .vars
    .insert("owncloud__database".to_string(), engine.into());
  inventory
}
