//! Recursive-descent parser for guard and template expressions.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons (`==`, `in`,
//! `is`, ...), unary minus, then postfix access and filters. A minus applies
//! to the whole postfix chain, so `-x | int` negates the filtered value.

use crate::consts::MAX_EXPR_DEPTH;
use crate::value::Value;

use super::lexer::{Spanned, Token, tokenize};
use super::{CompareOp, Expr, ExprError, TestKind};

pub fn parse(input: &str) -> Result<Expr, ExprError> {
  let tokens = tokenize(input)?;
  if tokens.is_empty() {
    return Err(ExprError::Syntax {
      message: "empty expression".to_string(),
      position: 0,
    });
  }

  let mut parser = Parser {
    tokens,
    index: 0,
    end: input.len(),
    depth: 0,
  };
  let expr = parser.parse_or()?;

  if let Some(extra) = parser.tokens.get(parser.index) {
    return Err(ExprError::Syntax {
      message: format!("unexpected trailing {:?}", extra.token),
      position: extra.pos,
    });
  }

  Ok(expr)
}

struct Parser {
  tokens: Vec<Spanned>,
  index: usize,
  end: usize,
  depth: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.index).map(|s| &s.token)
  }

  fn peek_at(&self, offset: usize) -> Option<&Token> {
    self.tokens.get(self.index + offset).map(|s| &s.token)
  }

  fn position(&self) -> usize {
    self.tokens.get(self.index).map(|s| s.pos).unwrap_or(self.end)
  }

  fn advance(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.index).map(|s| s.token.clone());
    if token.is_some() {
      self.index += 1;
    }
    token
  }

  fn error(&self, message: impl Into<String>) -> ExprError {
    ExprError::Syntax {
      message: message.into(),
      position: self.position(),
    }
  }

  fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
    match self.peek() {
      Some(token) if *token == expected => {
        self.index += 1;
        Ok(())
      }
      Some(token) => Err(self.error(format!("expected {expected:?}, found {token:?}"))),
      None => Err(self.error(format!("expected {expected:?}, found end of expression"))),
    }
  }

  fn eat_keyword(&mut self, keyword: &str) -> bool {
    if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
      self.index += 1;
      true
    } else {
      false
    }
  }

  fn expect_ident(&mut self) -> Result<String, ExprError> {
    match self.advance() {
      Some(Token::Ident(name)) => Ok(name),
      Some(other) => {
        self.index -= 1;
        Err(self.error(format!("expected a name, found {other:?}")))
      }
      None => Err(self.error("expected a name, found end of expression")),
    }
  }

  /// Run `parse` one nesting level deeper.
  fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Result<Expr, ExprError>) -> Result<Expr, ExprError> {
    if self.depth >= MAX_EXPR_DEPTH {
      return Err(self.error(format!("expression nested deeper than {MAX_EXPR_DEPTH} levels")));
    }
    self.depth += 1;
    let result = parse(self);
    self.depth -= 1;
    result
  }

  fn parse_or(&mut self) -> Result<Expr, ExprError> {
    self.nested(Self::parse_or_chain)
  }

  fn parse_or_chain(&mut self) -> Result<Expr, ExprError> {
    let mut left = self.parse_and()?;
    while self.eat_keyword("or") {
      let right = self.parse_and()?;
      left = Expr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn parse_and(&mut self) -> Result<Expr, ExprError> {
    let mut left = self.parse_not()?;
    while self.eat_keyword("and") {
      let right = self.parse_not()?;
      left = Expr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn parse_not(&mut self) -> Result<Expr, ExprError> {
    if self.eat_keyword("not") {
      let inner = self.nested(Self::parse_not)?;
      return Ok(Expr::Not(Box::new(inner)));
    }
    self.parse_comparison()
  }

  fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
    let left = self.parse_unary()?;

    let op = match self.peek() {
      Some(Token::Eq) => Some(CompareOp::Eq),
      Some(Token::Ne) => Some(CompareOp::Ne),
      Some(Token::Lt) => Some(CompareOp::Lt),
      Some(Token::Le) => Some(CompareOp::Le),
      Some(Token::Gt) => Some(CompareOp::Gt),
      Some(Token::Ge) => Some(CompareOp::Ge),
      _ => None,
    };
    if let Some(op) = op {
      self.index += 1;
      let right = self.parse_unary()?;
      return Ok(Expr::Compare(op, Box::new(left), Box::new(right)));
    }

    if self.eat_keyword("in") {
      let haystack = self.parse_postfix()?;
      return Ok(Expr::In {
        needle: Box::new(left),
        haystack: Box::new(haystack),
        negated: false,
      });
    }

    if self.peek().is_some_and(|t| t.is_keyword("not")) && self.peek_at(1).is_some_and(|t| t.is_keyword("in")) {
      self.index += 2;
      let haystack = self.parse_postfix()?;
      return Ok(Expr::In {
        needle: Box::new(left),
        haystack: Box::new(haystack),
        negated: true,
      });
    }

    if self.eat_keyword("is") {
      let negated = self.eat_keyword("not");
      let name = self.expect_ident()?;
      let test = match name.as_str() {
        "defined" => TestKind::Defined,
        "undefined" => TestKind::Undefined,
        other => return Err(self.error(format!("unknown test '{other}'"))),
      };
      return Ok(Expr::Test {
        operand: Box::new(left),
        test,
        negated,
      });
    }

    Ok(left)
  }

  fn parse_unary(&mut self) -> Result<Expr, ExprError> {
    if self.peek() != Some(&Token::Minus) {
      return self.parse_postfix();
    }
    self.index += 1;
    let operand = self.nested(Self::parse_unary)?;
    Ok(match operand {
      Expr::Literal(Value::Integer(i)) if i != i64::MIN => Expr::Literal(Value::Integer(-i)),
      Expr::Literal(Value::Float(f)) => Expr::Literal(Value::Float(-f)),
      other => Expr::Neg(Box::new(other)),
    })
  }

  fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
    let mut expr = self.parse_primary()?;

    loop {
      match self.peek() {
        Some(Token::Dot) => {
          self.index += 1;
          let key = match self.advance() {
            Some(Token::Ident(name)) => Value::String(name),
            Some(Token::Int(i)) => Value::Integer(i),
            _ => {
              self.index -= 1;
              return Err(self.error("expected attribute name after '.'"));
            }
          };
          expr = Expr::Index(Box::new(expr), Box::new(Expr::Literal(key)));
        }
        Some(Token::LBracket) => {
          self.index += 1;
          let key = self.parse_or()?;
          self.expect(Token::RBracket)?;
          expr = Expr::Index(Box::new(expr), Box::new(key));
        }
        Some(Token::Pipe) => {
          self.index += 1;
          let name = self.expect_ident()?;
          let args = if self.peek() == Some(&Token::LParen) {
            self.index += 1;
            self.parse_items(Token::RParen)?
          } else {
            Vec::new()
          };
          expr = Expr::Filter {
            input: Box::new(expr),
            name,
            args,
          };
        }
        _ => return Ok(expr),
      }
    }
  }

  /// Comma-separated expressions up to `close`, which is consumed.
  fn parse_items(&mut self, close: Token) -> Result<Vec<Expr>, ExprError> {
    let mut items = Vec::new();
    if self.peek() == Some(&close) {
      self.index += 1;
      return Ok(items);
    }
    loop {
      items.push(self.parse_or()?);
      if self.peek() == Some(&Token::Comma) {
        self.index += 1;
        // trailing comma
        if self.peek() == Some(&close) {
          self.index += 1;
          return Ok(items);
        }
        continue;
      }
      self.expect(close)?;
      return Ok(items);
    }
  }

  fn parse_primary(&mut self) -> Result<Expr, ExprError> {
    let position = self.position();
    match self.advance() {
      Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
      Some(Token::Int(i)) => Ok(Expr::Literal(Value::Integer(i))),
      Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
      Some(Token::Ident(name)) => Ok(match name.as_str() {
        "true" | "True" => Expr::Literal(Value::Bool(true)),
        "false" | "False" => Expr::Literal(Value::Bool(false)),
        "none" | "None" | "null" => Expr::Literal(Value::Null),
        "and" | "or" | "not" | "in" | "is" => {
          return Err(ExprError::Syntax {
            message: format!("unexpected keyword '{name}'"),
            position,
          });
        }
        _ => Expr::Var(name),
      }),
      Some(Token::LParen) => {
        let inner = self.parse_or()?;
        self.expect(Token::RParen)?;
        Ok(inner)
      }
      Some(Token::LBracket) => Ok(Expr::List(self.parse_items(Token::RBracket)?)),
      Some(other) => Err(ExprError::Syntax {
        message: format!("unexpected {other:?}"),
        position,
      }),
      None => Err(ExprError::Syntax {
        message: "unexpected end of expression".to_string(),
        position,
      }),
    }
  }
}
