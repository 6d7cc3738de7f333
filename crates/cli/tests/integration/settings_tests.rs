use predicates::prelude::*;

use super::common::{TestEnv, step_roles};

#[test]
fn test_default_settings_file_sets_inventory() {
  let env = TestEnv::owncloud();
  let inventory = std::fs::read_to_string(&env.inventory_path).unwrap();
  env.write_file("inventories/production.yml", &inventory);
  std::fs::remove_file(&env.inventory_path).unwrap();
  env.write_file("config/rolebook/config.yml", "inventory: inventories/production.yml\n");
  assert!(env.settings_dir().join("config.yml").is_file());

  let plan = env.json(&["plan", "playbook.yml"]);
  assert_eq!(step_roles(&plan, "cloud1").len(), 7);
}

#[test]
fn test_explicit_settings_file_sets_tags() {
  let env = TestEnv::owncloud();
  let settings = env.write_file("ci.yml", "tags: [role::php]\nskip_tags: []\n");

  let plan = env.json(&["--config", settings.to_str().unwrap(), "plan", "playbook.yml"]);
  assert_eq!(step_roles(&plan, "cloud1"), ["php"]);
}

#[test]
fn test_environment_overrides_settings_file() {
  let env = TestEnv::owncloud();
  env.write_file("config/rolebook/config.yml", "inventory: missing.yml\ntags: [role::php]\n");

  let output = env
    .rolebook_cmd()
    .env("ROLEBOOK_INVENTORY", &env.inventory_path)
    .env("ROLEBOOK_TAGS", "role::nginx, role::logrotate")
    .args(["plan", "playbook.yml", "-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(step_roles(&plan, "cloud1"), ["nginx", "logrotate"]);
}

#[test]
fn test_flags_override_environment() {
  let env = TestEnv::owncloud();

  let output = env
    .rolebook_cmd()
    .env("ROLEBOOK_TAGS", "role::nginx")
    .env("ROLEBOOK_SKIP_TAGS", "skip::php")
    .args(["plan", "playbook.yml", "-t", "role::php,role::ferm", "-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  // The include list comes from the flag, the skip list from the environment.
  let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(step_roles(&plan, "cloud1"), ["ferm"]);
}

#[test]
fn test_inventory_flag_overrides_environment() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .env("ROLEBOOK_INVENTORY", "missing.yml")
    .args(["hosts", "playbook.yml", "-i", "inventory.yml"])
    .assert()
    .success()
    .stdout(predicate::str::contains("cloud1"));
}

#[test]
fn test_unknown_settings_key_fails() {
  let env = TestEnv::owncloud();
  env.write_file("config/rolebook/config.yml", "inventroy: inventory.yml\n");

  env
    .rolebook_cmd()
    .args(["hosts", "playbook.yml"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load settings"))
    .stderr(predicate::str::contains("unknown field"));
}

#[test]
fn test_log_level_from_environment() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .env("ROLEBOOK_LOG", "debug")
    .args(["roles", "playbook.yml"])
    .assert()
    .success()
    .stderr(predicate::str::contains("applied tag filter"));
}
