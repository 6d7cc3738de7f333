//! Variable scope used while resolving one host.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::consts::MAX_TEMPLATE_DEPTH;
use crate::environment::EnvironmentMap;
use crate::expr::{ExprError, Scope};
use crate::template;
use crate::value::Value;

/// Layered lookup: publications, then contribution targets, then the
/// environment map.
///
/// Environment values are rendered on lookup, so an inventory variable may
/// itself reference other variables. Nested rendering stops with
/// [`ExprError::RecursionLimit`] on a cycle or past the depth limit.
pub struct VarScope<'a> {
  env: &'a EnvironmentMap,
  published: &'a BTreeMap<String, Value>,
  targets: &'a BTreeSet<String>,
  contributions: &'a BTreeMap<String, Vec<Value>>,
  resolving: RefCell<Vec<String>>,
}

impl<'a> VarScope<'a> {
  pub fn new(
    env: &'a EnvironmentMap,
    published: &'a BTreeMap<String, Value>,
    targets: &'a BTreeSet<String>,
    contributions: &'a BTreeMap<String, Vec<Value>>,
  ) -> Self {
    Self {
      env,
      published,
      targets,
      contributions,
      resolving: RefCell::new(Vec::new()),
    }
  }

  fn env_value(&self, name: &str) -> Result<Option<Value>, ExprError> {
    let Some(raw) = self.env.get(name) else {
      return Ok(None);
    };

    {
      let mut resolving = self.resolving.borrow_mut();
      if resolving.len() >= MAX_TEMPLATE_DEPTH || resolving.iter().any(|n| n == name) {
        return Err(ExprError::RecursionLimit(name.to_string()));
      }
      resolving.push(name.to_string());
    }

    let rendered = template::render_value(raw, self);
    self.resolving.borrow_mut().pop();
    rendered.map(Some)
  }

  fn target_value(&self, name: &str) -> Result<Value, ExprError> {
    let mut items = match self.env_value(name)? {
      None | Some(Value::Null) => Vec::new(),
      Some(Value::List(items)) => items,
      Some(other) => {
        return Err(ExprError::TypeMismatch {
          op: "contribute".to_string(),
          left: "list",
          right: other.type_name(),
        });
      }
    };
    if let Some(contributed) = self.contributions.get(name) {
      items.extend(contributed.iter().cloned());
    }
    Ok(Value::List(items))
  }
}

impl Scope for VarScope<'_> {
  fn lookup(&self, name: &str) -> Result<Option<Value>, ExprError> {
    if let Some(value) = self.published.get(name) {
      return Ok(Some(value.clone()));
    }
    if self.targets.contains(name) {
      return self.target_value(name).map(Some);
    }
    self.env_value(name)
  }
}
