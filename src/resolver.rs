//! Input-key resolution: which state slots feed a node.
//!
//! A node declares its inputs as a boolean expression over slot names, for
//! example `"document & (url | local_dir)"`. At execution time the
//! expression is evaluated against the keys present in the [`State`] and
//! yields the ordered list of slots that actually supply data.
//!
//! ## Grammar
//!
//! ```text
//! expr    := and ( '|' and )*
//! and     := primary ( '&' primary )*
//! primary := NAME | '(' expr ')'
//! NAME    := [A-Za-z0-9_.-]+
//! ```
//!
//! `&` binds tighter than `|`. An `&` group is satisfied when every operand
//! is, and yields all their keys. An `|` group yields the keys of its first
//! satisfied operand, scanning left to right.

use crate::error::NodeError;
use crate::state::State;

/// Resolves a node's input expression to concrete slot names.
///
/// Implementations must be deterministic: the same expression against the
/// same state yields the same list. An unsatisfiable expression is reported
/// as [`NodeError::MissingInputSlot`].
pub trait KeyResolver: Send + Sync {
    fn resolve(&self, expression: &str, state: &State) -> Result<Vec<String>, NodeError>;
}

/// The default [`KeyResolver`], evaluating `&` / `|` / parenthesised
/// expressions over the state's keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionResolver;

impl KeyResolver for ExpressionResolver {
    fn resolve(&self, expression: &str, state: &State) -> Result<Vec<String>, NodeError> {
        let parsed = InputExpression::parse(expression)?;
        parsed.resolve(state).ok_or_else(|| NodeError::MissingInputSlot {
            expression: expression.to_string(),
            available: state.keys().map(str::to_string).collect(),
        })
    }
}

/// A parsed input expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputExpression {
    Key(String),
    And(Vec<InputExpression>),
    Or(Vec<InputExpression>),
}

impl InputExpression {
    /// Parse and validate an expression.
    pub fn parse(expression: &str) -> Result<Self, NodeError> {
        let invalid = |reason: &str| NodeError::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let tokens = tokenize(expression).map_err(|r| invalid(&r))?;
        if tokens.is_empty() {
            return Err(invalid("expression is empty"));
        }

        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or().map_err(|r| invalid(&r))?;
        if let Some(tok) = parser.peek() {
            return Err(invalid(&format!("unexpected {tok} at token {}", parser.pos + 1)));
        }
        Ok(expr)
    }

    /// Evaluate against `state`. `None` when the expression is not satisfied.
    ///
    /// Keys are returned in order of appearance, without duplicates.
    pub fn resolve(&self, state: &State) -> Option<Vec<String>> {
        let mut keys = self.evaluate(state)?;
        let mut seen = std::collections::HashSet::new();
        keys.retain(|k| seen.insert(k.clone()));
        Some(keys)
    }

    fn evaluate(&self, state: &State) -> Option<Vec<String>> {
        match self {
            InputExpression::Key(name) => state.contains(name).then(|| vec![name.clone()]),
            InputExpression::And(operands) => {
                let mut keys = Vec::new();
                for op in operands {
                    keys.extend(op.evaluate(state)?);
                }
                Some(keys)
            }
            InputExpression::Or(operands) => operands.iter().find_map(|op| op.evaluate(state)),
        }
    }

    /// Every slot name mentioned in the expression, in order of appearance.
    pub fn slot_names(&self) -> Vec<&str> {
        match self {
            InputExpression::Key(name) => vec![name.as_str()],
            InputExpression::And(ops) | InputExpression::Or(ops) => {
                ops.iter().flat_map(|op| op.slot_names()).collect()
            }
        }
    }
}

// ── Tokenizer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    And,
    Or,
    Open,
    Close,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Name(n) => write!(f, "'{n}'"),
            Token::And => f.write_str("'&'"),
            Token::Or => f.write_str("'|'"),
            Token::Open => f.write_str("'('"),
            Token::Close => f.write_str("')'"),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '&' => {
                chars.next();
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Or);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            c if is_name_char(c) => {
                let mut end = i;
                while let Some(&(j, c)) = chars.peek() {
                    if !is_name_char(c) {
                        break;
                    }
                    end = j + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Name(input[i..end].to_string()));
            }
            other => return Err(format!("invalid character '{other}' at offset {i}")),
        }
    }

    Ok(tokens)
}

// ── Parser ───────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> Result<InputExpression, String> {
        let mut operands = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.next();
            operands.push(self.parse_and()?);
        }
        Ok(flatten(operands, InputExpression::Or))
    }

    fn parse_and(&mut self) -> Result<InputExpression, String> {
        let mut operands = vec![self.parse_primary()?];
        while self.peek() == Some(&Token::And) {
            self.next();
            operands.push(self.parse_primary()?);
        }
        Ok(flatten(operands, InputExpression::And))
    }

    fn parse_primary(&mut self) -> Result<InputExpression, String> {
        let at = self.pos + 1;
        match self.next() {
            Some(Token::Name(name)) => Ok(InputExpression::Key(name)),
            Some(Token::Open) => {
                if self.peek() == Some(&Token::Close) {
                    return Err(format!("empty parentheses at token {at}"));
                }
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(format!("unbalanced parenthesis opened at token {at}")),
                }
            }
            Some(tok) => Err(format!("expected a slot name, found {tok} at token {at}")),
            None => Err("expression ends with an operator".to_string()),
        }
    }
}

fn flatten(
    mut operands: Vec<InputExpression>,
    wrap: fn(Vec<InputExpression>) -> InputExpression,
) -> InputExpression {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        wrap(operands)
    }
}
