//! Template parsing and rendering for parameter values.
//!
//! Strings in parameter bundles, publications and inventory variables may
//! reference other variables with `{{ expr }}`, where `expr` is any
//! [expression](crate::expr). References are resolved against a
//! [`Scope`] when a role invocation's parameters are resolved.
//!
//! # Typed references
//!
//! A string that consists of exactly one reference (surrounding whitespace
//! allowed) resolves to the referenced value itself, so
//! `"{{ owncloud__php__packages }}"` yields a list, not its JSON rendering.
//! Any other string interpolates the rendered values into the text.
//!
//! # Escaping
//!
//! `\{{` produces a literal `{{`.
//!
//! # Example
//!
//! ```
//! use rolebook_lib::template::{parse, Segment};
//!
//! let segments = parse("https://{{ owncloud__domain }}/").unwrap();
//! assert_eq!(segments.len(), 3);
//! assert!(matches!(&segments[1], Segment::Reference { source, .. } if source == "owncloud__domain"));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::expr::{self, Expr, ExprError, Scope};
use crate::value::Value;

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
  /// Literal text (no references)
  Literal(String),

  /// A `{{ ... }}` reference and its trimmed source text
  Reference { source: String, expr: Expr },
}

/// Whether `input` contains anything that needs rendering.
pub fn is_template(input: &str) -> bool {
  input.contains("{{")
}

/// Parse a string containing references into segments.
///
/// # Errors
///
/// Returns an error if a reference is unclosed or its expression is malformed.
pub fn parse(input: &str) -> Result<Vec<Segment>, ExprError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;
  let mut offset = 0;

  while let Some(start) = rest.find("{{") {
    if rest[..start].ends_with('\\') {
      // Escaped: \{{ -> {{ (literal)
      literal.push_str(&rest[..start - 1]);
      literal.push_str("{{");
      rest = &rest[start + 2..];
      offset += start + 2;
      continue;
    }

    literal.push_str(&rest[..start]);
    let body_start = start + 2;
    let close = find_close(&rest[body_start..]).ok_or(ExprError::UnclosedTemplate(offset + start))?;
    let source = rest[body_start..body_start + close].trim().to_string();

    let expr = expr::parse(&source).map_err(|err| match err {
      ExprError::Syntax { message, position } => ExprError::Syntax {
        message: format!("{message} in '{{{{ {source} }}}}'"),
        position: offset + body_start + position,
      },
      other => other,
    })?;

    if !literal.is_empty() {
      segments.push(Segment::Literal(std::mem::take(&mut literal)));
    }
    segments.push(Segment::Reference { source, expr });

    let consumed = body_start + close + 2;
    rest = &rest[consumed..];
    offset += consumed;
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Byte offset of the `}}` closing a reference body, skipping quoted text.
fn find_close(body: &str) -> Option<usize> {
  let bytes = body.as_bytes();
  let mut quote: Option<u8> = None;
  let mut i = 0;

  while i < bytes.len() {
    let b = bytes[i];
    match quote {
      Some(_) if b == b'\\' => i += 1,
      Some(q) if b == q => quote = None,
      Some(_) => {}
      None if b == b'\'' || b == b'"' => quote = Some(b),
      None if b == b'}' && bytes.get(i + 1) == Some(&b'}') => return Some(i),
      None => {}
    }
    i += 1;
  }

  None
}

/// Render a string against a scope.
///
/// # Errors
///
/// Returns an error if parsing fails or a reference cannot be evaluated.
pub fn render(input: &str, scope: &dyn Scope) -> Result<Value, ExprError> {
  if !is_template(input) {
    return Ok(Value::String(input.to_string()));
  }

  let segments = parse(input)?;
  render_segments(&segments, scope)
}

/// Render already-parsed segments.
pub fn render_segments(segments: &[Segment], scope: &dyn Scope) -> Result<Value, ExprError> {
  let references = segments
    .iter()
    .filter(|s| matches!(s, Segment::Reference { .. }))
    .count();
  let only_whitespace = segments.iter().all(|s| match s {
    Segment::Literal(text) => text.trim().is_empty(),
    Segment::Reference { .. } => true,
  });

  if references == 1 && only_whitespace {
    for segment in segments {
      if let Segment::Reference { expr, .. } = segment {
        return expr.eval(scope);
      }
    }
  }

  let mut output = String::new();
  for segment in segments {
    match segment {
      Segment::Literal(text) => output.push_str(text),
      Segment::Reference { expr, .. } => output.push_str(&expr.eval(scope)?.to_string()),
    }
  }
  Ok(Value::String(output))
}

/// Render every string inside a value, recursing through lists and maps.
///
/// Map keys are not rendered.
pub fn render_value(value: &Value, scope: &dyn Scope) -> Result<Value, ExprError> {
  match value {
    Value::String(s) => render(s, scope),
    Value::List(items) => Ok(Value::List(
      items
        .iter()
        .map(|item| render_value(item, scope))
        .collect::<Result<_, _>>()?,
    )),
    Value::Map(map) => Ok(Value::Map(
      map
        .iter()
        .map(|(k, v)| Ok((k.clone(), render_value(v, scope)?)))
        .collect::<Result<BTreeMap<_, _>, ExprError>>()?,
    )),
    other => Ok(other.clone()),
  }
}

/// Top-level variable names referenced anywhere inside a value.
///
/// # Errors
///
/// Returns an error if any string inside the value fails to parse.
pub fn referenced_variables(value: &Value) -> Result<BTreeSet<String>, ExprError> {
  let mut names = BTreeSet::new();
  collect_references(value, &mut names, Expr::variables)?;
  Ok(names)
}

/// Top-level variable names whose absence makes rendering fail.
///
/// See [`Expr::required_variables`].
pub fn required_variables(value: &Value) -> Result<BTreeSet<String>, ExprError> {
  let mut names = BTreeSet::new();
  collect_references(value, &mut names, Expr::required_variables)?;
  Ok(names)
}

fn collect_references(
  value: &Value,
  names: &mut BTreeSet<String>,
  roots: fn(&Expr) -> BTreeSet<String>,
) -> Result<(), ExprError> {
  match value {
    Value::String(s) if is_template(s) => {
      for segment in parse(s)? {
        if let Segment::Reference { expr, .. } = segment {
          names.extend(roots(&expr));
        }
      }
    }
    Value::List(items) => {
      for item in items {
        collect_references(item, names, roots)?;
      }
    }
    Value::Map(map) => {
      for v in map.values() {
        collect_references(v, names, roots)?;
      }
    }
    _ => {}
  }
  Ok(())
}
