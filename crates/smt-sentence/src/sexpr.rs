// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Minimal s-expression reader for solver model values

use crate::error::ConstantError;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    Atom(String),
    /// String literal, unescaped
    Str(String),
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn parse(text: &str) -> Result<SExpr, ConstantError> {
        let mut reader = Reader {
            chars: text.chars().collect(),
            pos: 0,
        };
        let expr = reader.expr()?;
        reader.skip_whitespace();
        if reader.pos != reader.chars.len() {
            return Err(ConstantError::Syntax(format!("trailing input in '{}'", text)));
        }
        Ok(expr)
    }

    pub fn atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Head atom of a list, e.g. `seq.unit` in `(seq.unit 1)`
    pub fn head(&self) -> Option<&str> {
        self.list().and_then(|items| items.first()).and_then(|h| h.atom())
    }
}

impl Display for SExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Atom(a) => write!(f, "{}", a),
            SExpr::Str(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            SExpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

impl Reader {
    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn expr(&mut self) -> Result<SExpr, ConstantError> {
        self.skip_whitespace();
        match self.chars.get(self.pos) {
            None => Err(ConstantError::Syntax("unexpected end of input".to_string())),
            Some('(') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_whitespace();
                    match self.chars.get(self.pos) {
                        Some(')') => {
                            self.pos += 1;
                            return Ok(SExpr::List(items));
                        }
                        None => return Err(ConstantError::Syntax("unclosed list".to_string())),
                        _ => items.push(self.expr()?),
                    }
                }
            }
            Some(')') => Err(ConstantError::Syntax("unexpected ')'".to_string())),
            Some('"') => {
                self.pos += 1;
                let mut text = String::new();
                loop {
                    match self.chars.get(self.pos) {
                        None => return Err(ConstantError::Syntax("unterminated string".to_string())),
                        Some('"') if self.chars.get(self.pos + 1) == Some(&'"') => {
                            text.push('"');
                            self.pos += 2;
                        }
                        Some('"') => {
                            self.pos += 1;
                            return Ok(SExpr::Str(text));
                        }
                        Some(c) => {
                            text.push(*c);
                            self.pos += 1;
                        }
                    }
                }
            }
            Some(_) => {
                let start = self.pos;
                while self.pos < self.chars.len()
                    && !self.chars[self.pos].is_whitespace()
                    && !matches!(self.chars[self.pos], '(' | ')' | '"')
                {
                    self.pos += 1;
                }
                Ok(SExpr::Atom(self.chars[start..self.pos].iter().collect()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nested_terms() {
        let expr = SExpr::parse("(Demo.Node_ctor 1 Demo.Node_tag (seq.unit \"a\"\"b\"))").unwrap();
        assert_eq!(expr.head(), Some("Demo.Node_ctor"));
        let items = expr.list().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[3].list().unwrap()[1], SExpr::Str("a\"b".to_string()));
        assert_eq!(expr.to_string(), "(Demo.Node_ctor 1 Demo.Node_tag (seq.unit \"a\"\"b\"))");
    }

    #[test]
    fn rejects_unbalanced_input() {
        assert!(SExpr::parse("(a b").is_err());
        assert!(SExpr::parse("a b").is_err());
    }
}
