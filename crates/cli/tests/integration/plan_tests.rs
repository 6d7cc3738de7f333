use predicates::prelude::*;

use super::common::{TestEnv, step_roles};

#[test]
fn test_plan_text_lists_steps_and_skips() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["plan", "playbook.yml"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Plan: Install and manage ownCloud instances"))
    .stdout(predicate::str::contains("+ mariadb#1"))
    .stdout(predicate::str::contains("- postgresql#2 (when: owncloud__database == 'postgresql')"))
    .stdout(predicate::str::contains("owncloud__url = https://cloud1.example.org/"))
    .stdout(predicate::str::contains("publishes owncloud__database_port = 3306"))
    .stdout(predicate::str::contains("2 host(s) planned"));
}

#[test]
fn test_plan_json_per_host_roles() {
  let env = TestEnv::owncloud();
  let plan = env.json(&["plan", "playbook.yml"]);

  assert_eq!(plan["pattern"], "debops_service_owncloud");
  assert_eq!(
    step_roles(&plan, "cloud1"),
    ["ferm", "mariadb", "php", "nginx", "owncloud", "logrotate", "unattended_upgrades"]
  );
  assert_eq!(
    step_roles(&plan, "cloud2"),
    ["ferm", "postgresql", "php", "nginx", "owncloud", "logrotate"]
  );
  assert!(plan["hosts"].get("backup").is_none());
}

#[test]
fn test_plan_json_contribution_lists() {
  let env = TestEnv::owncloud();
  let plan = env.json(&["plan", "playbook.yml"]);

  let php = &plan["hosts"]["cloud1"]["steps"][2];
  assert_eq!(php["role"], "php");
  assert_eq!(
    php["params"]["php__packages"],
    serde_json::json!([
      "php-cli",
      "php-mysql",
      "php-gd",
      "php-curl",
      "php-intl",
      "php-zip",
      "php-xml",
      "php-mbstring"
    ])
  );
  assert_eq!(
    php["params"]["php__pools"],
    serde_json::json!([{ "name": "owncloud", "user": "owncloud" }])
  );

  let ferm = &plan["hosts"]["cloud2"]["steps"][0];
  assert_eq!(
    ferm["params"]["ferm__dependent_rules"],
    serde_json::json!([{ "name": "owncloud_http", "dport": ["http", "https"] }])
  );
}

#[test]
fn test_plan_json_records_skip_reasons() {
  let env = TestEnv::owncloud();
  let plan = env.json(&["plan", "playbook.yml", "--skip-tags", "skip::logrotate"]);

  let skipped = plan["hosts"]["cloud2"]["skipped"].as_array().unwrap();
  let reasons: Vec<(String, String)> = skipped
    .iter()
    .map(|s| (s["role"].as_str().unwrap().to_string(), s["reason"]["kind"].as_str().unwrap().to_string()))
    .collect();
  assert_eq!(
    reasons,
    [
      ("mariadb".to_string(), "guard".to_string()),
      ("logrotate".to_string(), "tags".to_string()),
      ("unattended_upgrades".to_string(), "guard".to_string()),
    ]
  );
}

#[test]
fn test_plan_tags_select_roles() {
  let env = TestEnv::owncloud();
  let plan = env.json(&["plan", "playbook.yml", "-t", "role::php,role::nginx"]);

  assert_eq!(step_roles(&plan, "cloud1"), ["php", "nginx"]);
  assert_eq!(plan["filter"]["include"], serde_json::json!(["role::nginx", "role::php"]));
}

#[test]
fn test_plan_skip_tags_drop_contributions() {
  let env = TestEnv::owncloud();
  let plan = env.json(&["plan", "playbook.yml", "--skip-tags", "skip::owncloud"]);

  let roles = step_roles(&plan, "cloud1");
  assert!(!roles.contains(&"owncloud".to_string()));
  let php = &plan["hosts"]["cloud1"]["steps"][2];
  assert_eq!(php["params"]["php__packages"], serde_json::json!(["php-cli", "php-mysql"]));
}

#[test]
fn test_plan_limit_narrows_hosts() {
  let env = TestEnv::owncloud();
  let plan = env.json(&["plan", "playbook.yml", "-l", "cloud2"]);

  let hosts: Vec<&String> = plan["hosts"].as_object().unwrap().keys().collect();
  assert_eq!(hosts, ["cloud2"]);
}

#[test]
fn test_plan_limit_outside_inventory_fails() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["plan", "playbook.yml", "-l", "nosuchhost"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("nosuchhost"));
}

#[test]
fn test_plan_undefined_variable_fails_host() {
  let env = TestEnv::owncloud();
  let inventory = std::fs::read_to_string(&env.inventory_path)
    .unwrap()
    .replace("    owncloud__database_user: owncloud\n", "");
  env.write_file("inventory.yml", &inventory);

  let output = env
    .rolebook_cmd()
    .args(["plan", "playbook.yml", "-o", "json"])
    .output()
    .unwrap();
  assert!(!output.status.success());

  let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let failure = &plan["hosts"]["cloud1"]["failure"];
  assert_eq!(failure["position"], 1);
  assert_eq!(failure["role"], "mariadb");
  assert!(failure["message"].as_str().unwrap().contains("owncloud__database_user"));
  assert_eq!(step_roles(&plan, "cloud1"), ["ferm"]);

  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("planning failed for 2 of 2 host(s)"), "stderr: {}", stderr);
}

#[test]
fn test_plan_invalid_choice_fails_host() {
  let env = TestEnv::from_fixture("invalid_choice.yml");

  env
    .rolebook_cmd()
    .args(["plan", "playbook.yml"])
    .assert()
    .failure()
    .stdout(predicate::str::contains("+ mariadb#0"))
    .stderr(predicate::str::contains(
      "web2: 'postgresql' is not a valid value for 'db' (expected one of: mariadb, sqlite)",
    ))
    .stderr(predicate::str::contains("planning failed for 1 of 2 host(s)"));
}

#[test]
fn test_plan_cycle_fails_before_hosts() {
  let env = TestEnv::from_fixture("cycle.yml");

  env
    .rolebook_cmd()
    .args(["plan", "playbook.yml"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency cycle between roles: a#0 -> b#1"));
}

#[test]
fn test_plan_is_deterministic() {
  let env = TestEnv::owncloud();

  let first = env.rolebook_cmd().args(["plan", "playbook.yml"]).output().unwrap();
  let second = env.rolebook_cmd().args(["plan", "playbook.yml"]).output().unwrap();
  assert!(first.status.success());
  assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_plan_verbose_logs_to_stderr() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["-v", "plan", "playbook.yml"])
    .assert()
    .success()
    .stderr(predicate::str::contains("planned host"));
}
