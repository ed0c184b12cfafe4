//! Message selectors
//!
//! A selector is a conjunction of equality clauses:
//!
//! ```text
//! CorrelationId = 'ID:0190...' AND Tenant = acme
//! ```
//!
//! `CorrelationId` and `MessageId` address message fields; any other
//! identifier addresses a custom header. Literals are single-quoted (a quote
//! inside is doubled) or bare words.

use crate::message::Message;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Selector parse error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectorError {
    /// Nothing to parse
    #[error("selector is empty")]
    Empty,

    /// Malformed expression
    #[error("expected {expected} at position {position}")]
    Syntax {
        /// Character offset of the failure
        position: usize,
        /// What the parser wanted
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    CorrelationId,
    MessageId,
    Header(String),
}

impl Field {
    fn from_ident(ident: &str) -> Self {
        if ident.eq_ignore_ascii_case("CorrelationId") {
            Field::CorrelationId
        } else if ident.eq_ignore_ascii_case("MessageId") {
            Field::MessageId
        } else {
            Field::Header(ident.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    field: Field,
    value: String,
}

impl Clause {
    fn matches(&self, message: &Message) -> bool {
        match &self.field {
            Field::CorrelationId => message.correlation_id.as_deref() == Some(self.value.as_str()),
            Field::MessageId => message.id.as_str() == self.value,
            Field::Header(name) => message.header(name) == Some(self.value.as_str()),
        }
    }
}

/// Parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    expression: String,
    clauses: Vec<Clause>,
}

impl Selector {
    /// Parse a selector expression
    pub fn parse(expression: &str) -> Result<Self, SelectorError> {
        let clauses = Parser::new(expression).parse()?;
        Ok(Self {
            expression: expression.trim().to_string(),
            clauses,
        })
    }

    /// Selector matching replies correlated to `key`
    pub fn correlation(key: &str) -> Self {
        Self {
            expression: format!("CorrelationId = '{}'", key.replace('\'', "''")),
            clauses: vec![Clause {
                field: Field::CorrelationId,
                value: key.to_string(),
            }],
        }
    }

    /// Selector matching replies to a sent message
    pub fn reply_to(sent: &Message) -> Self {
        Self::correlation(sent.correlation_key())
    }

    /// Selector matching every message (plain queue consumption)
    pub fn all() -> Self {
        Self {
            expression: String::new(),
            clauses: Vec::new(),
        }
    }

    /// Evaluate against a message
    pub fn matches(&self, message: &Message) -> bool {
        self.clauses.iter().all(|clause| clause.matches(message))
    }

    /// Source expression
    pub fn as_str(&self) -> &str {
        &self.expression
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Vec<Clause>, SelectorError> {
        self.skip_whitespace();
        if self.at_end() {
            return Err(SelectorError::Empty);
        }

        let mut clauses = Vec::new();
        loop {
            clauses.push(self.clause()?);
            self.skip_whitespace();
            if self.at_end() {
                return Ok(clauses);
            }
            self.keyword_and()?;
        }
    }

    fn clause(&mut self) -> Result<Clause, SelectorError> {
        self.skip_whitespace();
        let ident = self.identifier()?;
        self.skip_whitespace();
        self.expect('=', "'='")?;
        self.skip_whitespace();
        let value = self.literal()?;

        Ok(Clause {
            field: Field::from_ident(&ident),
            value,
        })
    }

    fn identifier(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return Err(self.syntax("identifier")),
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn literal(&mut self) -> Result<String, SelectorError> {
        if self.peek() == Some('\'') {
            self.pos += 1;
            let mut value = String::new();
            loop {
                match self.peek() {
                    None => return Err(self.syntax("closing quote")),
                    Some('\'') if self.peek_at(1) == Some('\'') => {
                        value.push('\'');
                        self.pos += 2;
                    }
                    Some('\'') => {
                        self.pos += 1;
                        return Ok(value);
                    }
                    Some(c) => {
                        value.push(c);
                        self.pos += 1;
                    }
                }
            }
        }

        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.syntax("value"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn keyword_and(&mut self) -> Result<(), SelectorError> {
        let word: String = self.chars[self.pos..]
            .iter()
            .take_while(|c| !c.is_whitespace())
            .collect();
        if !word.eq_ignore_ascii_case("AND") {
            return Err(self.syntax("AND"));
        }
        self.pos += word.chars().count();
        if !self.peek().map_or(false, char::is_whitespace) {
            return Err(self.syntax("clause after AND"));
        }
        Ok(())
    }

    fn expect(&mut self, want: char, expected: &'static str) -> Result<(), SelectorError> {
        if self.peek() == Some(want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.syntax(expected))
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn syntax(&self, expected: &'static str) -> SelectorError {
        SelectorError::Syntax {
            position: self.pos,
            expected,
        }
    }
}
