//! Restricted arithmetic for template placeholders.
//!
//! `{…}` groups in a template may hold plain arithmetic once numeric
//! variables have been substituted in.  Evaluation happens in two steps:
//!
//! 1. [`passes_gate`]: the text may contain only `0-9 + - * / . ( )` and
//!    spaces.  Anything else (an identifier left over, quotes, `%`, …) means
//!    the placeholder is never evaluated.
//! 2. [`eval_arith`]: a small lexer and precedence-climbing parser over
//!    numeric literals, `+ - * /`, unary signs and parentheses.
//!
//! Operator precedence (lowest → highest):
//!   additive  →  multiplicative  →  unary  →  primary
//!
//! Integer arithmetic stays integral (overflow is an error); a float operand
//! promotes the operation to float; `/` always produces a float.

use thiserror::Error;

use super::value::Value;

/// Nesting limit for parentheses and unary sign chains.
const MAX_DEPTH: usize = 200;

/// Reasons an arithmetic expression failed to evaluate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArithError {
    #[error("character {0:?} is not allowed in an expression")]
    Disallowed(char),
    #[error("malformed number `{0}`")]
    BadNumber(String),
    #[error("unexpected {0}")]
    Unexpected(String),
    #[error("expected ')'")]
    UnclosedParen,
    #[error("expression nested too deeply")]
    TooDeep,
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
}

/// The allow-list check: digits, `+ - * / . ( )` and spaces only.
pub fn passes_gate(src: &str) -> bool {
    src.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '.' | '(' | ')' | ' '))
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Value),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn read_number(&mut self) -> Result<Token, ArithError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9' | b'.')) {
            self.pos += 1;
        }
        // Only ASCII digits and dots were consumed.
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        number_token(text)
    }

    fn next_token(&mut self) -> Result<Token, ArithError> {
        self.skip_ws();
        let Some(ch) = self.peek() else {
            return Ok(Token::Eof);
        };
        if matches!(ch, b'0'..=b'9' | b'.') {
            return self.read_number();
        }
        self.pos += 1;
        match ch {
            b'+' => Ok(Token::Plus),
            b'-' => Ok(Token::Minus),
            b'*' => Ok(Token::Star),
            b'/' => Ok(Token::Slash),
            b'(' => Ok(Token::LParen),
            b')' => Ok(Token::RParen),
            c => Err(ArithError::Disallowed(c as char)),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ArithError> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = t == Token::Eof;
            tokens.push(t);
            if done {
                return Ok(tokens);
            }
        }
    }
}

/// Convert a run of digits and dots into a literal.  Decimal integers may
/// not carry leading zeros (`007`), but an all-zero run (`00`) is fine.
fn number_token(text: &str) -> Result<Token, ArithError> {
    let bad = || ArithError::BadNumber(text.to_owned());
    if text.contains('.') {
        return text.parse().map(|x| Token::Num(Value::Float(x))).map_err(|_| bad());
    }
    if text.len() > 1 && text.starts_with('0') && text.bytes().any(|b| b != b'0') {
        return Err(bad());
    }
    text.parse().map(|n| Token::Num(Value::Int(n))).map_err(|_| ArithError::Overflow)
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

static EOF: Token = Token::Eof;

// ── Parser ────────────────────────────────────────────────────────────────────

/// Evaluates while parsing.  Operator chains are folded left to right, so
/// only parentheses and unary signs recurse, and those are depth-limited.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0, depth: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&EOF)
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn descend(&mut self) -> Result<(), ArithError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ArithError::TooDeep);
        }
        Ok(())
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_complete(&mut self) -> Result<Value, ArithError> {
        let value = self.parse_additive()?;
        match self.peek() {
            Token::Eof => Ok(value),
            other => Err(ArithError::Unexpected(format!("{other:?}"))),
        }
    }

    fn parse_additive(&mut self) -> Result<Value, ArithError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Value, ArithError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Value, ArithError> {
        let negate = match self.peek() {
            Token::Minus => true,
            Token::Plus => false,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        self.descend()?;
        let inner = self.parse_unary()?;
        self.depth -= 1;
        if negate {
            neg(inner)
        } else {
            Ok(inner)
        }
    }

    fn parse_primary(&mut self) -> Result<Value, ArithError> {
        match self.advance() {
            Token::Num(v) => Ok(v),
            Token::LParen => {
                self.descend()?;
                let inner = self.parse_additive()?;
                if !self.eat(&Token::RParen) {
                    return Err(ArithError::UnclosedParen);
                }
                self.depth -= 1;
                Ok(inner)
            }
            Token::Eof => Err(ArithError::Unexpected("end of expression".into())),
            other => Err(ArithError::Unexpected(format!("{other:?}"))),
        }
    }
}

// ── Operations ────────────────────────────────────────────────────────────────

fn neg(v: Value) -> Result<Value, ArithError> {
    match v {
        Value::Int(n) => n.checked_neg().map(Value::Int).ok_or(ArithError::Overflow),
        Value::Float(x) => Ok(Value::Float(-x)),
        other => Err(ArithError::Unexpected(other.type_name().into())),
    }
}

fn apply(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, ArithError> {
    if let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) {
        let (a, b) = (*a, *b);
        let checked = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Div => return divide(a as f64, b as f64),
        };
        return checked.map(Value::Int).ok_or(ArithError::Overflow);
    }
    let (a, b) = (as_float(&lhs)?, as_float(&rhs)?);
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::Div => divide(a, b),
    }
}

fn divide(a: f64, b: f64) -> Result<Value, ArithError> {
    if b == 0.0 {
        return Err(ArithError::DivisionByZero);
    }
    Ok(Value::Float(a / b))
}

fn as_float(v: &Value) -> Result<f64, ArithError> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(x) => Ok(*x),
        other => Err(ArithError::Unexpected(other.type_name().into())),
    }
}

/// Parse and evaluate an arithmetic expression.
///
/// The caller is expected to have applied [`passes_gate`] first; any
/// character outside the allow-list is rejected here as well.
pub fn eval_arith(src: &str) -> Result<Value, ArithError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(tokens).parse_complete()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
