//! Built-in filters (`value | name(args)`).

use crate::value::Value;

use super::{Expr, ExprError, Scope};

pub fn apply(name: &str, input: &Expr, args: &[Expr], scope: &dyn Scope) -> Result<Value, ExprError> {
  // `default` must see an undefined input instead of failing on it.
  if name == "default" || name == "d" {
    return default(name, input, args, scope);
  }

  let value = input.eval(scope)?;
  let args = args.iter().map(|arg| arg.eval(scope)).collect::<Result<Vec<_>, _>>()?;

  match name {
    "bool" => {
      expect_args(name, &args, 0)?;
      Ok(Value::Bool(to_bool(&value)))
    }
    "int" => {
      expect_args(name, &args, 0)?;
      to_int(&value).map(Value::Integer).ok_or_else(|| ExprError::FilterArgs {
        filter: name.to_string(),
        message: format!("cannot convert {} to integer", value.type_name()),
      })
    }
    "length" | "count" => {
      expect_args(name, &args, 0)?;
      let len = match &value {
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::String(s) => s.chars().count(),
        other => {
          return Err(ExprError::FilterArgs {
            filter: name.to_string(),
            message: format!("{} has no length", other.type_name()),
          });
        }
      };
      Ok(Value::Integer(len as i64))
    }
    "lower" | "upper" => {
      expect_args(name, &args, 0)?;
      let text = value.to_string();
      Ok(Value::String(if name == "lower" {
        text.to_lowercase()
      } else {
        text.to_uppercase()
      }))
    }
    "join" => {
      if args.len() > 1 {
        return Err(ExprError::FilterArgs {
          filter: name.to_string(),
          message: "expects at most one separator".to_string(),
        });
      }
      let separator = args.first().map(|s| s.to_string()).unwrap_or_default();
      let items = value.as_list().ok_or_else(|| ExprError::FilterArgs {
        filter: name.to_string(),
        message: format!("expects a list, got {}", value.type_name()),
      })?;
      Ok(Value::String(
        items.iter().map(|item| item.to_string()).collect::<Vec<_>>().join(&separator),
      ))
    }
    other => Err(ExprError::UnknownFilter(other.to_string())),
  }
}

/// `default(fallback)` replaces undefined input; `default(fallback, true)`
/// also replaces falsy input.
fn default(name: &str, input: &Expr, args: &[Expr], scope: &dyn Scope) -> Result<Value, ExprError> {
  let (fallback, on_falsy) = match args {
    [fallback] => (fallback, false),
    [fallback, flag] => (fallback, flag.eval(scope)?.is_truthy()),
    _ => {
      return Err(ExprError::FilterArgs {
        filter: name.to_string(),
        message: "expects a fallback value and an optional boolean".to_string(),
      });
    }
  };

  match input.eval(scope) {
    Ok(value) if on_falsy && !value.is_truthy() => fallback.eval(scope),
    Ok(value) => Ok(value),
    Err(ExprError::Undefined(_)) => fallback.eval(scope),
    Err(other) => Err(other),
  }
}

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<(), ExprError> {
  if args.len() == count {
    Ok(())
  } else {
    Err(ExprError::FilterArgs {
      filter: name.to_string(),
      message: format!("expects {count} argument(s), got {}", args.len()),
    })
  }
}

fn to_bool(value: &Value) -> bool {
  match value {
    Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "yes" | "y" | "true" | "on" | "1"),
    other => other.is_truthy(),
  }
}

fn to_int(value: &Value) -> Option<i64> {
  match value {
    Value::Integer(i) => Some(*i),
    Value::Float(f) => Some(f.trunc() as i64),
    Value::Bool(b) => Some(i64::from(*b)),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}
