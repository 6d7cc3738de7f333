use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn test_check_clean_playbook() {
  let env = TestEnv::owncloud();

  env
    .rolebook_cmd()
    .args(["check", "playbook.yml"])
    .assert()
    .success()
    .stdout(predicate::str::contains("playbook.yml: no problems found"));
}

#[test]
fn test_check_overlapping_guards() {
  let env = TestEnv::from_fixture("overlapping.yml");

  env
    .rolebook_cmd()
    .args(["check", "playbook.yml"])
    .assert()
    .failure()
    .stderr(predicate::str::contains(
      "db = 'mariadb' selects mariadb#0, postgresql#1 (expected exactly one)",
    ))
    .stderr(predicate::str::contains(
      "db = 'postgresql' selects none of the alternatives (expected exactly one)",
    ))
    .stderr(predicate::str::contains("2 error(s), 0 warning(s)"));
}

#[test]
fn test_check_definedness_guard_is_not_an_alternative() {
  let env = TestEnv::from_fixture("overlapping.yml");
  env.write_file(
    "playbook.yml",
    r#"
hosts: web
exclusive:
  - variable: db
    values: [mariadb, postgresql]
roles:
  - role: mariadb
    tags: [role::mariadb]
    when: db == 'mariadb' and mariadb__enabled | default(true)
  - role: postgresql
    tags: [role::postgresql]
    when: db == 'postgresql'
  - role: app
    tags: [role::app]
    when: db is defined
"#,
  );

  env
    .rolebook_cmd()
    .args(["check", "playbook.yml"])
    .assert()
    .success()
    .stdout(predicate::str::contains("playbook.yml: no problems found"));
}

#[test]
fn test_check_json_report() {
  let env = TestEnv::from_fixture("invalid_choice.yml");

  let output = env
    .rolebook_cmd()
    .args(["check", "playbook.yml", "-o", "json"])
    .output()
    .unwrap();
  assert!(!output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let diagnostics = report.as_array().unwrap();
  assert_eq!(diagnostics.len(), 1);
  assert_eq!(diagnostics[0]["severity"], "error");
  assert_eq!(
    diagnostics[0]["message"],
    "host 'web2': 'postgresql' is not a valid value for 'db'"
  );
}

#[test]
fn test_check_cycle() {
  let env = TestEnv::from_fixture("cycle.yml");

  env
    .rolebook_cmd()
    .args(["check", "playbook.yml"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency cycle between roles: a#0 -> b#1"));
}

#[test]
fn test_check_backward_read_in_manifest_ordering() {
  let env = TestEnv::from_fixture("cycle.yml");
  env.write_file(
    "playbook.yml",
    r#"
hosts: web
ordering: manifest
roles:
  - role: consumer
    tags: [role::consumer]
    vars:
      endpoint: "{{ service_url }}"
  - role: producer
    tags: [role::producer]
    publish:
      service_url: http://localhost:8080
"#,
  );

  env
    .rolebook_cmd()
    .args(["check", "playbook.yml"])
    .assert()
    .failure()
    .stderr(predicate::str::contains(
      "consumer#0: reads 'service_url' before producer#1 produces it",
    ));
}

#[test]
fn test_check_warnings_do_not_fail() {
  let env = TestEnv::from_fixture("cycle.yml");
  env.write_file(
    "playbook.yml",
    r#"
hosts: web
roles:
  - role: app
    vars:
      listen: "{{ app_port }}"
"#,
  );

  env
    .rolebook_cmd()
    .args(["check", "playbook.yml"])
    .assert()
    .success()
    .stderr(predicate::str::contains("app#0: has no tags"))
    .stderr(predicate::str::contains("'app_port' is undefined for hosts: web1, web2"));
}

#[test]
fn test_check_invalid_manifest() {
  let env = TestEnv::from_fixture("cycle.yml");
  env.write_file("playbook.yml", "hosts: web\nroles:\n  - role: app\n    colour: blue\n");

  env
    .rolebook_cmd()
    .args(["check", "playbook.yml"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load manifest"))
    .stderr(predicate::str::contains("unknown field"));
}
