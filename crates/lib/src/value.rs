//! Dynamically typed configuration values.
//!
//! Inventory variables, role parameters and expression results all share the
//! [`Value`] type. It deserializes untagged from YAML or JSON so that plain
//! documents map straight onto it, and serializes back the same way.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A configuration value.
///
/// Maps are ordered by key so that serialized plans are deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Integer(i64),
  Float(f64),
  String(String),
  List(Vec<Value>),
  Map(BTreeMap<String, Value>),
}

impl Value {
  /// Name of the value's type, used in error messages.
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool(_) => "bool",
      Value::Integer(_) => "integer",
      Value::Float(_) => "float",
      Value::String(_) => "string",
      Value::List(_) => "list",
      Value::Map(_) => "map",
    }
  }

  /// Truthiness used by guard conditions.
  pub fn is_truthy(&self) -> bool {
    match self {
      Value::Null => false,
      Value::Bool(b) => *b,
      Value::Integer(i) => *i != 0,
      Value::Float(f) => *f != 0.0,
      Value::String(s) => !s.is_empty(),
      Value::List(l) => !l.is_empty(),
      Value::Map(m) => !m.is_empty(),
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[Value]> {
    match self {
      Value::List(l) => Some(l),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Map(m) => Some(m),
      _ => None,
    }
  }

  fn as_f64(&self) -> Option<f64> {
    match self {
      Value::Integer(i) => Some(*i as f64),
      Value::Float(f) => Some(*f),
      _ => None,
    }
  }

  /// Equality with integer/float coercion (`1 == 1.0`).
  pub fn loose_eq(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => self.as_f64() == other.as_f64(),
      (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y)),
      _ => self == other,
    }
  }

  /// Ordering between comparable values.
  ///
  /// Numbers compare numerically, strings lexically and lists element-wise.
  /// Anything else is incomparable and yields `None`.
  pub fn compare(&self, other: &Value) -> Option<Ordering> {
    match (self, other) {
      (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
      (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
        self.as_f64()?.partial_cmp(&other.as_f64()?)
      }
      (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
      (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
      (Value::List(a), Value::List(b)) => {
        for (x, y) in a.iter().zip(b) {
          match x.compare(y)? {
            Ordering::Equal => continue,
            ord => return Some(ord),
          }
        }
        Some(a.len().cmp(&b.len()))
      }
      _ => None,
    }
  }

  /// Membership test used by the `in` operator.
  ///
  /// Lists test element equality, strings test substrings and maps test keys.
  pub fn contains(&self, needle: &Value) -> Option<bool> {
    match self {
      Value::List(items) => Some(items.iter().any(|item| item.loose_eq(needle))),
      Value::String(haystack) => needle.as_str().map(|n| haystack.contains(n)),
      Value::Map(map) => needle.as_str().map(|k| map.contains_key(k)),
      _ => None,
    }
  }
}

impl fmt::Display for Value {
  /// Renders the value for string interpolation.
  ///
  /// Scalars render bare, null renders empty and collections render as
  /// compact JSON.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => Ok(()),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Integer(i) => write!(f, "{i}"),
      Value::Float(x) => write!(f, "{x}"),
      Value::String(s) => f.write_str(s),
      Value::List(_) | Value::Map(_) => {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
      }
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Integer(i)
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::List(items)
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(map: BTreeMap<String, Value>) -> Self {
    Value::Map(map)
  }
}
