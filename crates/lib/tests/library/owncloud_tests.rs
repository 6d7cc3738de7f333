use rolebook_lib::check::check;
use rolebook_lib::plan::{PlanOptions, plan};
use rolebook_lib::resolve::SkipReason;
use rolebook_lib::sequencer::{self, TagFilter};
use rolebook_lib::value::Value;

use super::common::{owncloud_inventory, owncloud_manifest};

fn strings(items: &[&str]) -> Value {
  Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

#[test]
fn demo_manifest_checks_clean() {
  let report = check(&owncloud_manifest(), &owncloud_inventory());
  assert!(report.is_empty(), "{:#?}", report.diagnostics);
}

#[test]
fn demo_keeps_document_order() {
  let manifest = owncloud_manifest();
  assert_eq!(sequencer::sequence(&manifest).unwrap(), (0..manifest.roles.len()).collect::<Vec<_>>());
}

#[test]
fn targets_only_the_service_group() {
  let plan = plan(&owncloud_manifest(), &owncloud_inventory(), &PlanOptions::default()).unwrap();
  assert_eq!(plan.hosts.keys().collect::<Vec<_>>(), vec!["cloud1", "cloud2"]);
  assert!(plan.is_ok());
}

#[test]
fn mariadb_host_plan() {
  let plan = plan(&owncloud_manifest(), &owncloud_inventory(), &PlanOptions::default()).unwrap();
  let cloud1 = plan.host("cloud1").unwrap();

  assert_eq!(
    cloud1.roles(),
    vec!["ferm", "mariadb", "php", "nginx", "owncloud", "logrotate", "unattended_upgrades"]
  );
  assert_eq!(cloud1.skipped.len(), 1);
  assert_eq!(cloud1.skipped[0].role, "postgresql");

  let php = cloud1.step("php").unwrap();
  assert_eq!(
    php.params["php__packages"],
    strings(&[
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

  let owncloud = cloud1.step("owncloud").unwrap();
  assert_eq!(owncloud.params["owncloud__url"], Value::from("https://cloud1.example.org/"));
  let database = owncloud.params["owncloud__database_config"].as_map().unwrap();
  assert_eq!(database["engine"], Value::from("mariadb"));
  assert_eq!(database["host"], Value::from("localhost"));
  assert_eq!(database["port"], Value::Integer(3306));

  let mariadb = cloud1.step("mariadb").unwrap();
  assert_eq!(mariadb.publish["owncloud__database_port"], Value::Integer(3306));
}

#[test]
fn postgresql_host_plan() {
  let plan = plan(&owncloud_manifest(), &owncloud_inventory(), &PlanOptions::default()).unwrap();
  let cloud2 = plan.host("cloud2").unwrap();

  assert_eq!(cloud2.roles(), vec!["ferm", "postgresql", "php", "nginx", "owncloud", "logrotate"]);
  let skipped: Vec<_> = cloud2.skipped.iter().map(|s| (s.role.as_str(), &s.reason)).collect();
  assert_eq!(
    skipped,
    vec![
      (
        "mariadb",
        &SkipReason::Guard {
          condition: "owncloud__database == 'mariadb'".to_string()
        }
      ),
      (
        "unattended_upgrades",
        &SkipReason::Guard {
          condition: "owncloud__autoupdate | default(true) | bool".to_string()
        }
      ),
    ]
  );

  let postgresql = cloud2.step("postgresql").unwrap();
  assert_eq!(
    postgresql.params["postgresql__dependent_databases"],
    Value::List(vec![Value::Map(
      [
        ("name".to_string(), Value::from("owncloud")),
        ("owner".to_string(), Value::from("owncloud")),
      ]
      .into_iter()
      .collect()
    )])
  );

  let php = cloud2.step("php").unwrap();
  assert_eq!(php.params["php__packages"].as_list().unwrap()[1], Value::from("php-pgsql"));
}

#[test]
fn web_server_receives_templated_inventory_values() {
  let plan = plan(&owncloud_manifest(), &owncloud_inventory(), &PlanOptions::default()).unwrap();
  let nginx = plan.host("cloud2").unwrap().step("nginx").unwrap();
  let servers = nginx.params["nginx__servers"].as_list().unwrap();
  assert_eq!(servers.len(), 1);
  let server = servers[0].as_map().unwrap();
  assert_eq!(server["name"], Value::from("cloud2.example.org"));
  assert_eq!(
    server["root"],
    Value::from("/srv/www/owncloud/sites/cloud2.example.org/public")
  );
}

#[test]
fn firewall_sees_contributions_from_later_roles() {
  let plan = plan(&owncloud_manifest(), &owncloud_inventory(), &PlanOptions::default()).unwrap();
  let ferm = plan.host("cloud1").unwrap().step("ferm").unwrap();
  let rules = ferm.params["ferm__dependent_rules"].as_list().unwrap();
  assert_eq!(rules.len(), 1);
  assert_eq!(rules[0].as_map().unwrap()["name"], Value::from("owncloud_http"));
}

#[test]
fn filtering_out_a_contributor_drops_its_contribution() {
  let options = PlanOptions {
    filter: TagFilter::new(Vec::<String>::new(), ["skip::owncloud"]),
    limit: Some("cloud1".to_string()),
  };
  let plan = plan(&owncloud_manifest(), &owncloud_inventory(), &options).unwrap();
  let cloud1 = plan.host("cloud1").unwrap();
  assert!(cloud1.step("owncloud").is_none());
  assert_eq!(cloud1.step("php").unwrap().params["php__packages"], strings(&["php-cli", "php-mysql"]));
  assert_eq!(
    cloud1.step("ferm").unwrap().params["ferm__dependent_rules"],
    Value::List(vec![])
  );
}

#[test]
fn hosts_added_to_the_group_inherit_its_values() {
  let mut inventory = owncloud_inventory();
  inventory
    .groups
    .get_mut("debops_service_owncloud")
    .unwrap()
    .hosts
    .push("cloud3".to_string());

  let plan = plan(&owncloud_manifest(), &inventory, &PlanOptions::default()).unwrap();
  let cloud3 = plan.host("cloud3").unwrap();
  assert!(cloud3.failure.is_none());
  assert_eq!(
    cloud3.step("owncloud").unwrap().params["owncloud__url"],
    Value::from("https://cloud.example.org/")
  );
}

#[test]
fn undefined_parameter_aborts_the_rest_of_each_host() {
  let mut inventory = owncloud_inventory();
  inventory.all.vars.remove("owncloud__database_user");

  let plan = plan(&owncloud_manifest(), &inventory, &PlanOptions::default()).unwrap();
  assert!(!plan.is_ok());

  let cloud1 = plan.host("cloud1").unwrap();
  let failure = cloud1.failure.as_ref().unwrap();
  assert_eq!(failure.position, Some(1));
  assert_eq!(failure.role.as_deref(), Some("mariadb"));
  assert!(failure.error.to_string().contains("owncloud__database_user"));
  assert_eq!(cloud1.roles(), vec!["ferm"]);

  let cloud2 = plan.host("cloud2").unwrap();
  assert_eq!(cloud2.failure.as_ref().unwrap().role.as_deref(), Some("postgresql"));
}
