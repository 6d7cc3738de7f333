//! Expression language shared by guard conditions and template references.
//!
//! A guard such as `owncloud__database == 'mariadb'` and the inside of a
//! template reference such as `{{ nginx__servers | default([]) }}` are both
//! [`Expr`]s. Expressions are parsed once and evaluated against a [`Scope`]
//! that supplies variable values.
//!
//! # Undefined variables
//!
//! Looking up a variable the scope does not know is an error
//! ([`ExprError::Undefined`]). Only the `default` filter and the
//! `is defined` / `is undefined` tests observe an undefined value without
//! failing.

mod filters;
mod lexer;
mod parser;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

use crate::value::Value;

pub use parser::parse;

/// Errors raised while parsing or evaluating expressions and templates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
  #[error("syntax error at position {position}: {message}")]
  Syntax { message: String, position: usize },

  #[error("unclosed template reference at position {0}")]
  UnclosedTemplate(usize),

  #[error("'{0}' is undefined")]
  Undefined(String),

  #[error("cannot apply '{op}' to {left} and {right}")]
  TypeMismatch {
    op: String,
    left: &'static str,
    right: &'static str,
  },

  #[error("cannot index {target} with {key}")]
  InvalidAccess { target: &'static str, key: String },

  #[error("unknown filter '{0}'")]
  UnknownFilter(String),

  #[error("filter '{filter}': {message}")]
  FilterArgs { filter: String, message: String },

  #[error("cannot negate {0}")]
  Negate(String),

  #[error("template recursion limit reached while resolving '{0}'")]
  RecursionLimit(String),
}

/// Source of variable values during evaluation.
pub trait Scope {
  /// Look up a top-level variable.
  ///
  /// Returns `Ok(None)` when the variable is not defined. Errors are reserved
  /// for variables that exist but cannot be produced (for example a value
  /// whose own template fails to resolve).
  fn lookup(&self, name: &str) -> Result<Option<Value>, ExprError>;
}

impl Scope for BTreeMap<String, Value> {
  fn lookup(&self, name: &str) -> Result<Option<Value>, ExprError> {
    Ok(self.get(name).cloned())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl CompareOp {
  fn symbol(self) -> &'static str {
    match self {
      CompareOp::Eq => "==",
      CompareOp::Ne => "!=",
      CompareOp::Lt => "<",
      CompareOp::Le => "<=",
      CompareOp::Gt => ">",
      CompareOp::Ge => ">=",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
  Defined,
  Undefined,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Literal(Value),
  List(Vec<Expr>),
  Var(String),
  /// `base.key` or `base[key]`.
  Index(Box<Expr>, Box<Expr>),
  Not(Box<Expr>),
  /// Unary minus.
  Neg(Box<Expr>),
  And(Box<Expr>, Box<Expr>),
  Or(Box<Expr>, Box<Expr>),
  Compare(CompareOp, Box<Expr>, Box<Expr>),
  In {
    needle: Box<Expr>,
    haystack: Box<Expr>,
    negated: bool,
  },
  Test {
    operand: Box<Expr>,
    test: TestKind,
    negated: bool,
  },
  Filter {
    input: Box<Expr>,
    name: String,
    args: Vec<Expr>,
  },
}

impl Expr {
  /// Evaluate the expression to a value.
  pub fn eval(&self, scope: &dyn Scope) -> Result<Value, ExprError> {
    match self {
      Expr::Literal(value) => Ok(value.clone()),
      Expr::List(items) => Ok(Value::List(
        items.iter().map(|item| item.eval(scope)).collect::<Result<_, _>>()?,
      )),
      Expr::Var(name) => scope.lookup(name)?.ok_or_else(|| ExprError::Undefined(name.clone())),
      Expr::Index(base, key) => {
        let target = base.eval(scope)?;
        let key_value = key.eval(scope)?;
        index(&target, &key_value).map_err(|err| match err {
          ExprError::Undefined(_) => ExprError::Undefined(self.to_string()),
          other => other,
        })
      }
      Expr::Not(inner) => Ok(Value::Bool(!inner.eval(scope)?.is_truthy())),
      Expr::Neg(inner) => match inner.eval(scope)? {
        Value::Integer(i) => i
          .checked_neg()
          .map(Value::Integer)
          .ok_or_else(|| ExprError::Negate(i.to_string())),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(ExprError::Negate(other.type_name().to_string())),
      },
      Expr::And(left, right) => {
        if !left.eval(scope)?.is_truthy() {
          return Ok(Value::Bool(false));
        }
        Ok(Value::Bool(right.eval(scope)?.is_truthy()))
      }
      Expr::Or(left, right) => {
        if left.eval(scope)?.is_truthy() {
          return Ok(Value::Bool(true));
        }
        Ok(Value::Bool(right.eval(scope)?.is_truthy()))
      }
      Expr::Compare(op, left, right) => {
        let l = left.eval(scope)?;
        let r = right.eval(scope)?;
        compare(*op, &l, &r).map(Value::Bool)
      }
      Expr::In {
        needle,
        haystack,
        negated,
      } => {
        let n = needle.eval(scope)?;
        let h = haystack.eval(scope)?;
        let found = h.contains(&n).ok_or_else(|| ExprError::TypeMismatch {
          op: "in".to_string(),
          left: n.type_name(),
          right: h.type_name(),
        })?;
        Ok(Value::Bool(found != *negated))
      }
      Expr::Test {
        operand,
        test,
        negated,
      } => {
        let defined = match operand.eval(scope) {
          Ok(_) => true,
          Err(ExprError::Undefined(_)) => false,
          Err(other) => return Err(other),
        };
        let result = match test {
          TestKind::Defined => defined,
          TestKind::Undefined => !defined,
        };
        Ok(Value::Bool(result != *negated))
      }
      Expr::Filter { input, name, args } => filters::apply(name, input, args, scope),
    }
  }

  /// Evaluate the expression and reduce the result to its truthiness.
  pub fn eval_bool(&self, scope: &dyn Scope) -> Result<bool, ExprError> {
    Ok(self.eval(scope)?.is_truthy())
  }

  /// The operands of a chain of top-level `and`s, or the expression itself.
  pub fn conjuncts(&self) -> Vec<&Expr> {
    match self {
      Expr::And(left, right) => {
        let mut terms = left.conjuncts();
        terms.extend(right.conjuncts());
        terms
      }
      other => vec![other],
    }
  }

  /// Names of the top-level variables the expression reads.
  pub fn variables(&self) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    self.collect_variables(&mut names, false);
    names
  }

  /// Variables whose absence makes evaluation fail.
  ///
  /// Operands of `default` and of definedness tests are left out. Short
  /// circuiting is not taken into account.
  pub fn required_variables(&self) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    self.collect_variables(&mut names, true);
    names
  }

  fn collect_variables(&self, names: &mut BTreeSet<String>, required_only: bool) {
    match self {
      Expr::Literal(_) => {}
      Expr::Var(name) => {
        names.insert(name.clone());
      }
      Expr::List(items) => items.iter().for_each(|item| item.collect_variables(names, required_only)),
      Expr::Index(a, b) | Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare(_, a, b) => {
        a.collect_variables(names, required_only);
        b.collect_variables(names, required_only);
      }
      Expr::In { needle, haystack, .. } => {
        needle.collect_variables(names, required_only);
        haystack.collect_variables(names, required_only);
      }
      Expr::Not(inner) | Expr::Neg(inner) => inner.collect_variables(names, required_only),
      Expr::Test { .. } if required_only => {}
      Expr::Test { operand, .. } => operand.collect_variables(names, required_only),
      Expr::Filter { input, name, args } => {
        if !(required_only && (name == "default" || name == "d")) {
          input.collect_variables(names, required_only);
        }
        args.iter().for_each(|arg| arg.collect_variables(names, required_only));
      }
    }
  }
}

impl std::str::FromStr for Expr {
  type Err = ExprError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse(s)
  }
}

impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Expr::Literal(Value::String(s)) => write!(f, "'{}'", s.replace('\'', "\\'")),
      Expr::Literal(Value::Null) => f.write_str("none"),
      Expr::Literal(value) => write!(f, "{value}"),
      Expr::List(items) => {
        f.write_str("[")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{item}")?;
        }
        f.write_str("]")
      }
      Expr::Var(name) => f.write_str(name),
      Expr::Index(base, key) => match key.as_ref() {
        Expr::Literal(Value::String(k)) if is_identifier(k) => write!(f, "{base}.{k}"),
        Expr::Literal(Value::Integer(i)) => write!(f, "{base}.{i}"),
        other => write!(f, "{base}[{other}]"),
      },
      Expr::Not(inner) => write!(f, "not {inner}"),
      Expr::Neg(inner) => match inner.as_ref() {
        Expr::Compare(..) | Expr::In { .. } | Expr::Test { .. } | Expr::Not(_) => write!(f, "-({inner})"),
        _ => write!(f, "-{inner}"),
      },
      Expr::And(a, b) => write!(f, "({a} and {b})"),
      Expr::Or(a, b) => write!(f, "({a} or {b})"),
      Expr::Compare(op, a, b) => write!(f, "{a} {} {b}", op.symbol()),
      Expr::In {
        needle,
        haystack,
        negated,
      } => {
        let op = if *negated { "not in" } else { "in" };
        write!(f, "{needle} {op} {haystack}")
      }
      Expr::Test {
        operand,
        test,
        negated,
      } => {
        let not = if *negated { "not " } else { "" };
        let name = match test {
          TestKind::Defined => "defined",
          TestKind::Undefined => "undefined",
        };
        write!(f, "{operand} is {not}{name}")
      }
      Expr::Filter { input, name, args } => {
        write!(f, "{input} | {name}")?;
        if !args.is_empty() {
          f.write_str("(")?;
          for (i, arg) in args.iter().enumerate() {
            if i > 0 {
              f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
          }
          f.write_str(")")?;
        }
        Ok(())
      }
    }
  }
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  chars.next().is_some_and(|c| c.is_alphabetic() || c == '_') && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn index(target: &Value, key: &Value) -> Result<Value, ExprError> {
  match (target, key) {
    (Value::Map(map), Value::String(k)) => map.get(k).cloned().ok_or_else(|| ExprError::Undefined(k.clone())),
    (Value::Map(map), Value::Integer(i)) => map
      .get(&i.to_string())
      .cloned()
      .ok_or_else(|| ExprError::Undefined(i.to_string())),
    (Value::List(items), Value::Integer(i)) => {
      let idx = if *i < 0 { items.len() as i64 + i } else { *i };
      usize::try_from(idx)
        .ok()
        .and_then(|idx| items.get(idx))
        .cloned()
        .ok_or_else(|| ExprError::Undefined(i.to_string()))
    }
    _ => Err(ExprError::InvalidAccess {
      target: target.type_name(),
      key: key.to_string(),
    }),
  }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExprError> {
  use std::cmp::Ordering;

  match op {
    CompareOp::Eq => Ok(left.loose_eq(right)),
    CompareOp::Ne => Ok(!left.loose_eq(right)),
    _ => {
      let ordering = left.compare(right).ok_or_else(|| ExprError::TypeMismatch {
        op: op.symbol().to_string(),
        left: left.type_name(),
        right: right.type_name(),
      })?;
      Ok(match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
      })
    }
  }
}
