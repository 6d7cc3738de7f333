use predicates::prelude::*;

use super::common::TestEnv;

// =============================================================================
// roles
// =============================================================================

#[test]
fn test_roles_text_in_execution_order() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["roles", "playbook.yml"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Roles (manifest ordering)"))
    .stdout(predicate::str::contains("Selected: 8 of 8"))
    .stdout(predicate::str::contains(
      "+ mariadb#1 [role::mariadb, skip::mariadb] when: owncloud__database == 'mariadb'",
    ))
    .stdout(predicate::str::contains(
      "+ owncloud#5 [role::owncloud, skip::owncloud] after: #1, #2",
    ));
}

#[test]
fn test_roles_tag_filter_marks_removed_invocations() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["roles", "playbook.yml", "-t", "role::php"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Selected: 1 of 8"))
    .stdout(predicate::str::contains("+ php#3"))
    .stdout(predicate::str::contains("- ferm#0 (tags)"));
}

#[test]
fn test_roles_json_lists_dependencies() {
  let env = TestEnv::owncloud();
  let roles = env.json(&["roles", "playbook.yml"]);

  let roles = roles.as_array().unwrap();
  assert_eq!(roles.len(), 8);
  let owncloud = roles.iter().find(|r| r["role"] == "owncloud").unwrap();
  assert_eq!(owncloud["position"], 5);
  assert_eq!(owncloud["after"], serde_json::json!([1, 2]));
  assert_eq!(owncloud["selected"], true);
  assert!(owncloud.get("when").is_none());
}

// =============================================================================
// graph
// =============================================================================

#[test]
fn test_graph_text_lists_edges() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["graph", "playbook.yml"])
    .assert()
    .success()
    .stdout(predicate::str::contains("mariadb#1 → owncloud#5 (owncloud__database_host)"))
    .stdout(predicate::str::contains("postgresql#2 → owncloud#5 (owncloud__database_port)"))
    .stdout(predicate::str::contains("Order: ferm#0, mariadb#1"));
}

#[test]
fn test_graph_dot_output() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["graph", "playbook.yml", "--dot"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("digraph"))
    .stdout(predicate::str::contains("owncloud#5"));
}

#[test]
fn test_graph_cycle_is_reported_and_fails() {
  let env = TestEnv::from_fixture("cycle.yml");

  let output = env
    .rolebook_cmd()
    .args(["graph", "playbook.yml", "-o", "json"])
    .output()
    .unwrap();
  assert!(!output.status.success());

  let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(graph["cycle"], serde_json::json!(["a#0", "b#1"]));
  assert!(graph.get("order").is_none());
  assert_eq!(graph["edges"].as_array().unwrap().len(), 2);
}

#[test]
fn test_graph_dot_cycle_fails() {
  let env = TestEnv::from_fixture("cycle.yml");

  env
    .rolebook_cmd()
    .args(["graph", "playbook.yml", "--dot"])
    .assert()
    .failure()
    .stdout(predicate::str::starts_with("digraph"))
    .stdout(predicate::str::contains("a#0"))
    .stderr(predicate::str::contains("dependency cycle between roles: a#0 -> b#1"));
}

// =============================================================================
// hosts
// =============================================================================

#[test]
fn test_hosts_lists_targeted_hosts() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["hosts", "playbook.yml"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Hosts matching 'debops_service_owncloud': 2"))
    .stdout(predicate::str::contains("cloud2 (debops_service_owncloud, owncloud_postgresql)"))
    .stdout(predicate::str::contains("backup").not());
}

#[test]
fn test_hosts_json_with_limit() {
  let env = TestEnv::owncloud();
  let hosts = env.json(&["hosts", "playbook.yml", "-l", "owncloud_postgresql"]);

  assert_eq!(
    hosts,
    serde_json::json!([{ "host": "cloud2", "groups": ["debops_service_owncloud", "owncloud_postgresql"] }])
  );
}

// =============================================================================
// vars
// =============================================================================

#[test]
fn test_vars_shows_layer_of_each_value() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["vars", "cloud2"])
    .assert()
    .success()
    .stdout(predicate::str::contains("owncloud__database = postgresql  [group:owncloud_postgresql]"))
    .stdout(predicate::str::contains("owncloud__domain = cloud2.example.org  [host]"))
    .stdout(predicate::str::contains("owncloud__data_path = /srv/www/owncloud/data  [global]"))
    .stdout(predicate::str::contains(
      "owncloud__deploy_path = /srv/www/owncloud/sites/{{ owncloud__domain }}/public",
    ));
}

#[test]
fn test_vars_manifest_adds_play_layer() {
  let env = TestEnv::owncloud();
  env.write_file(
    "override.yml",
    "hosts: all\nvars:\n  owncloud__domain: override.example.org\nroles: []\n",
  );

  let vars = env.json(&["vars", "cloud1", "-m", "override.yml"]);
  assert_eq!(vars["owncloud__domain"]["value"], "override.example.org");
  assert_eq!(vars["owncloud__domain"]["origin"], "play");
  assert_eq!(vars["owncloud__database"]["origin"], "global");
}

#[test]
fn test_vars_unknown_host_fails() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["vars", "nosuchhost"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("host 'nosuchhost' is not in the inventory"));
}
