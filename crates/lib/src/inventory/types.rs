//! Inventory document types.
//!
//! An inventory file looks like:
//!
//! ```yaml
//! all:
//!   vars:
//!     owncloud__database: mariadb
//! groups:
//!   owncloud:
//!     hosts: [cloud1, cloud2]
//!     children: [owncloud_pg]
//!     vars:
//!       owncloud__domain: cloud.example.org
//!   owncloud_pg:
//!     hosts: [cloud3]
//!     vars:
//!       owncloud__database: postgresql
//! hosts:
//!   cloud1:
//!     vars:
//!       owncloud__admin_username: admin
//! ```
//!
//! Hosts only need an entry under `hosts` when they carry host variables;
//! listing them in a group is enough to declare them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Variables keyed by name.
pub type Vars = BTreeMap<String, Value>;

/// A parsed inventory.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inventory {
  /// Global defaults applied to every host.
  #[serde(default)]
  pub all: GlobalDef,
  /// Named groups, keyed by group name.
  #[serde(default)]
  pub groups: BTreeMap<String, GroupDef>,
  /// Per-host definitions, keyed by host name.
  #[serde(default)]
  pub hosts: BTreeMap<String, HostDef>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalDef {
  #[serde(default)]
  pub vars: Vars,
}

/// A host group.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<GroupBody>")]
pub struct GroupDef {
  /// Hosts that are direct members of this group.
  pub hosts: Vec<String>,
  /// Groups whose hosts are also members of this group.
  pub children: Vec<String>,
  pub vars: Vars,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupBody {
  #[serde(default)]
  hosts: Vec<String>,
  #[serde(default)]
  children: Vec<String>,
  #[serde(default)]
  vars: Vars,
}

impl From<Option<GroupBody>> for GroupDef {
  fn from(body: Option<GroupBody>) -> Self {
    body
      .map(|b| GroupDef {
        hosts: b.hosts,
        children: b.children,
        vars: b.vars,
      })
      .unwrap_or_default()
  }
}

/// A host entry carrying host-level variables.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<HostBody>")]
pub struct HostDef {
  pub vars: Vars,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HostBody {
  #[serde(default)]
  vars: Vars,
}

impl From<Option<HostBody>> for HostDef {
  fn from(body: Option<HostBody>) -> Self {
    HostDef {
      vars: body.map(|b| b.vars).unwrap_or_default(),
    }
  }
}
