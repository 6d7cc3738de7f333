//! Properties every run of the ownCloud manifest must satisfy.

use std::collections::BTreeMap;

use rolebook_lib::environment::{EnvironmentMap, Layer};
use rolebook_lib::manifest::GuardOutcome;
use rolebook_lib::plan::{PlanOptions, plan};
use rolebook_lib::resolve::Resolver;
use rolebook_lib::sequencer::{self, TagFilter};
use rolebook_lib::value::Value;

use super::common::{inventory_with_database, owncloud_inventory, owncloud_manifest};

#[test]
fn exactly_one_database_alternative_per_allowed_value() {
  let manifest = owncloud_manifest();
  let choice = manifest.exclusive_choice("owncloud__database").unwrap();

  for value in &choice.values {
    let scope: BTreeMap<String, Value> = BTreeMap::from([("owncloud__database".to_string(), value.clone())]);
    let passing: Vec<&str> = manifest
      .roles
      .iter()
      .filter(|r| r.when.variables().contains("owncloud__database"))
      .filter(|r| r.when.evaluate(&scope).unwrap() == GuardOutcome::Pass)
      .map(|r| r.role.as_str())
      .collect();
    assert_eq!(passing, vec![value.as_str().unwrap()]);
  }
}

#[test]
fn database_selection_follows_the_environment() {
  let manifest = owncloud_manifest();
  for (engine, runs, skips) in [("mariadb", "mariadb", "postgresql"), ("postgresql", "postgresql", "mariadb")] {
    let plan = plan(&manifest, &inventory_with_database(engine), &PlanOptions::default()).unwrap();
    for host in plan.hosts.values() {
      assert!(host.step(runs).is_some(), "{engine}: {runs} should run on {}", host.host);
      assert!(host.step(skips).is_none(), "{engine}: {skips} should be skipped on {}", host.host);
    }
  }
}

#[test]
fn sequencing_is_deterministic() {
  let manifest = owncloud_manifest();
  let inventory = owncloud_inventory();
  let filter = TagFilter::new(["role::php", "role::owncloud", "role::mariadb"], ["skip::ferm"]);

  let first = sequencer::candidates(&manifest, &filter).unwrap();
  for _ in 0..10 {
    assert_eq!(sequencer::candidates(&manifest, &filter).unwrap(), first);
  }

  let options = PlanOptions {
    filter,
    limit: None,
  };
  let a = plan(&manifest, &inventory, &options).unwrap();
  let b = plan(&manifest, &inventory, &options).unwrap();
  assert_eq!(a, b);
  assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
}

#[test]
fn contributions_preserve_order_and_omit_no_selected_contributor() {
  let mut manifest = owncloud_manifest();
  // Every role contributes its own name to one shared list.
  for invocation in &mut manifest.roles {
    let name = invocation.role.clone();
    invocation
      .contributes
      .insert("audit__roles".to_string(), Value::List(vec![Value::from(name)]));
  }
  manifest.roles[0]
    .vars
    .insert("audit".to_string(), Value::from("{{ audit__roles }}"));

  let mut env: EnvironmentMap = owncloud_inventory().environment("cloud1", &manifest.vars).unwrap();
  env.insert("audit__roles", Value::List(vec![Value::from("base")]), Layer::Host);

  let (candidates, _) = sequencer::candidates(&manifest, &TagFilter::default()).unwrap();
  let resolution = Resolver::new(&manifest, &env).resolve(&candidates);
  assert!(resolution.failure.is_none());

  let mut expected = vec![Value::from("base")];
  expected.extend(resolution.steps.iter().map(|s| Value::from(s.role.as_str())));
  assert_eq!(resolution.steps[0].params["audit"], Value::List(expected));
  assert!(
    !resolution.steps[0].params["audit"]
      .as_list()
      .unwrap()
      .contains(&Value::from("postgresql"))
  );
}

#[test]
fn no_filter_equals_the_union_of_all_tags() {
  let manifest = owncloud_manifest();
  let inventory = owncloud_inventory();

  let unfiltered = plan(&manifest, &inventory, &PlanOptions::default()).unwrap();
  let union = plan(
    &manifest,
    &inventory,
    &PlanOptions {
      filter: TagFilter::new(manifest.tags(), Vec::<String>::new()),
      limit: None,
    },
  )
  .unwrap();

  assert_eq!(unfiltered.order, union.order);
  for (host, plan) in &unfiltered.hosts {
    assert_eq!(plan.steps, union.hosts[host].steps);
  }
}

#[test]
fn include_filter_selects_a_subsequence() {
  let manifest = owncloud_manifest();
  let (all, _) = sequencer::candidates(&manifest, &TagFilter::default()).unwrap();
  let (some, _) = sequencer::candidates(&manifest, &TagFilter::new(["role::nginx", "role::ferm"], Vec::<String>::new())).unwrap();
  assert_eq!(some, vec![0, 4]);
  assert!(some.iter().all(|p| all.contains(p)));
}
