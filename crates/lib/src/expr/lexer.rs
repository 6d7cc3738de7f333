//! Tokenizer for guard and template expressions.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
  Ident(String),
  Str(String),
  Int(i64),
  Float(f64),
  Dot,
  Comma,
  Pipe,
  Minus,
  LParen,
  RParen,
  LBracket,
  RBracket,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl Token {
  pub fn is_keyword(&self, keyword: &str) -> bool {
    matches!(self, Token::Ident(name) if name == keyword)
  }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
  pub token: Token,
  pub pos: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ExprError> {
  let mut tokens = Vec::new();
  let mut chars = input.char_indices().peekable();

  while let Some(&(pos, ch)) = chars.peek() {
    if ch.is_whitespace() {
      chars.next();
      continue;
    }

    let token = match ch {
      '.' => {
        chars.next();
        Token::Dot
      }
      ',' => {
        chars.next();
        Token::Comma
      }
      '|' => {
        chars.next();
        Token::Pipe
      }
      '-' => {
        chars.next();
        Token::Minus
      }
      '(' => {
        chars.next();
        Token::LParen
      }
      ')' => {
        chars.next();
        Token::RParen
      }
      '[' => {
        chars.next();
        Token::LBracket
      }
      ']' => {
        chars.next();
        Token::RBracket
      }
      '=' | '!' | '<' | '>' => {
        chars.next();
        let followed_by_eq = matches!(chars.peek(), Some((_, '=')));
        if followed_by_eq {
          chars.next();
        }
        match (ch, followed_by_eq) {
          ('=', true) => Token::Eq,
          ('!', true) => Token::Ne,
          ('<', true) => Token::Le,
          ('>', true) => Token::Ge,
          ('<', false) => Token::Lt,
          ('>', false) => Token::Gt,
          _ => {
            return Err(ExprError::Syntax {
              message: format!("unexpected '{ch}'"),
              position: pos,
            });
          }
        }
      }
      '\'' | '"' => {
        chars.next();
        let mut text = String::new();
        let mut closed = false;
        while let Some((_, c)) = chars.next() {
          if c == ch {
            closed = true;
            break;
          }
          if c == '\\'
            && let Some((_, escaped)) = chars.next()
          {
            text.push(match escaped {
              'n' => '\n',
              't' => '\t',
              other => other,
            });
            continue;
          }
          text.push(c);
        }
        if !closed {
          return Err(ExprError::Syntax {
            message: "unterminated string literal".to_string(),
            position: pos,
          });
        }
        Token::Str(text)
      }
      c if c.is_ascii_digit() => {
        // `a.0.1` indexes twice; never read a float straight after a dot.
        let after_dot = matches!(tokens.last(), Some(Spanned { token: Token::Dot, .. }));
        lex_number(input, &mut chars, pos, !after_dot)?
      }
      c if c.is_alphabetic() || c == '_' => {
        let mut ident = String::new();
        while let Some(&(_, c)) = chars.peek() {
          if c.is_alphanumeric() || c == '_' {
            ident.push(c);
            chars.next();
          } else {
            break;
          }
        }
        Token::Ident(ident)
      }
      other => {
        return Err(ExprError::Syntax {
          message: format!("unexpected '{other}'"),
          position: pos,
        });
      }
    };

    tokens.push(Spanned { token, pos });
  }

  Ok(tokens)
}

fn lex_number(
  input: &str,
  chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
  start: usize,
  allow_fraction: bool,
) -> Result<Token, ExprError> {
  let mut end = start;
  let mut is_float = false;

  while let Some(&(pos, c)) = chars.peek() {
    if c.is_ascii_digit() {
      end = pos + 1;
      chars.next();
    } else if c == '.' && allow_fraction && !is_float {
      // `1.x` is attribute access on a number, not a float; only take the dot
      // when a digit follows it.
      let next_is_digit = input[pos + 1..].chars().next().is_some_and(|n| n.is_ascii_digit());
      if !next_is_digit {
        break;
      }
      is_float = true;
      end = pos + 1;
      chars.next();
    } else {
      break;
    }
  }

  let text = &input[start..end];
  let invalid = || ExprError::Syntax {
    message: format!("invalid number '{text}'"),
    position: start,
  };

  if is_float {
    text.parse::<f64>().map(Token::Float).map_err(|_| invalid())
  } else {
    text.parse::<i64>().map(Token::Int).map_err(|_| invalid())
  }
}
