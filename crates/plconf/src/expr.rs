//! restricted expression evaluation
//!
//! Right-hand sides are never handed to an interpreter. [Evaluator::evaluate] substitutes `$name` references with the
//! values known so far, checks every character of the result against [is_allowed] and only then runs the small
//! arithmetic grammar below.
//!
//! ```text
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | power
//! power   := atom ('**' unary)?
//! atom    := number | '(' sum ')'
//! ```
//!
//! `**` is right associative and binds tighter than a leading minus (`-2 ** 2 == -4`). `/` always produces a decimal.
//! Nesting of parentheses and signs is limited to [MAX_DEPTH] levels.
use crate::parser::unquote;
use crate::store::Scope;
use crate::value::{parse_number, Value};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Deepest nesting of parentheses and unary signs the arithmetic parser accepts
pub const MAX_DEPTH: usize = 256;

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\w+)").expect("valid regex"));

/// Decide whether a scalar right-hand side is a literal or needs evaluation
///
/// Quoted strings and numbers are literals, anything containing a `$` sigil or an arithmetic operator is kept as a
/// [Value::Expression].
pub fn classify(rhs: &str) -> Value {
    let rhs = rhs.trim();

    if let Some(text) = unquote(rhs) {
        return Value::String(text);
    }

    if let Some(number) = parse_number(rhs) {
        return number;
    }

    if rhs.contains(['$', '+', '-', '*', '/']) {
        return Value::Expression(rhs.to_string());
    }

    Value::String(rhs.trim_matches(|c| c == '\'' || c == '"').to_string())
}

/// Variable name if `text` is exactly one `$name` reference
pub fn bare_reference(text: &str) -> Option<&str> {
    let name = text.trim().strip_prefix('$')?;
    let is_word = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    is_word.then_some(name)
}

/// Characters that may remain in an expression once all references are substituted
pub fn is_allowed(ch: char) -> bool {
    ch.is_ascii_digit() || ch.is_whitespace() || matches!(ch, '+' | '-' | '*' | '/' | '.' | '(' | ')')
}

/// Evaluates expressions against the variables of one namespace
#[derive(derive_new::new)]
pub struct Evaluator<'s> {
    scope: Option<&'s Scope>,
}

impl<'s> Evaluator<'s> {
    fn lookup(&self, name: &str) -> Option<&'s Value> {
        self.scope.and_then(|scope| scope.get(name))
    }

    /// Evaluate a scalar right-hand side
    ///
    /// A single reference to a variable that was not assigned yet fails with [EvalError::UndefinedReference], same as
    /// any expression using it.
    pub fn evaluate(&self, raw: &str) -> Result<Value, EvalError> {
        if let Some(name) = bare_reference(raw) {
            return match self.lookup(name) {
                None => Err(EvalError::UndefinedReference(name.to_string())),
                Some(value) if value.is_resolved() => Ok(value.clone()),
                Some(_) => Err(EvalError::Unresolved(name.to_string())),
            };
        }

        let substituted = self.substitute(raw)?;

        if let Some(ch) = substituted.chars().find(|ch| !is_allowed(*ch)) {
            return Err(EvalError::DisallowedCharacter {
                ch,
                expression: substituted,
            });
        }

        Ok(arithmetic(&substituted)?.into())
    }

    /// Replace every `$name` with the text of its value
    fn substitute(&self, raw: &str) -> Result<String, EvalError> {
        let mut failure = None;

        let substituted = REFERENCE.replace_all(raw, |captures: &Captures| {
            let name = &captures[1];
            let text = match self.lookup(name) {
                None => Err(EvalError::UndefinedReference(name.to_string())),
                Some(value) if !value.is_resolved() => Err(EvalError::Unresolved(name.to_string())),
                Some(value) => value
                    .substitution_text()
                    .ok_or_else(|| EvalError::NotScalar(name.to_string())),
            };

            text.unwrap_or_else(|err| {
                failure.get_or_insert(err);
                captures[0].to_string()
            })
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(substituted.into_owned()),
        }
    }

    /// Replace bare references inside array and hash literals
    ///
    /// Known variables are substituted by their value, unknown ones stay as the literal token text.
    pub fn resolve_references(&self, value: Value) -> Value {
        match value {
            Value::Expression(token) => match bare_reference(&token).and_then(|name| self.lookup(name)) {
                Some(known) if known.is_resolved() => known.clone(),
                _ => {
                    tracing::debug!(%token, "reference kept as text");
                    Value::String(token)
                }
            },
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.resolve_references(item))
                    .collect(),
            ),
            Value::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(key, item)| (key, self.resolve_references(item)))
                    .collect(),
            ),
            other => other,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("${0} is not defined yet")]
    UndefinedReference(String),
    #[error("${0} could not be evaluated itself")]
    Unresolved(String),
    #[error("${0} is not a scalar")]
    NotScalar(String),
    #[error("character {ch:?} is not allowed in {expression:?}")]
    DisallowedCharacter { ch: char, expression: String },
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("result out of range")]
    OutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(int) => int as f64,
            Number::Float(float) => float,
        }
    }

    fn integer_op(
        self,
        rhs: Number,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Number, EvalError> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => int_op(a, b)
                .map(Number::Int)
                .ok_or(EvalError::OutOfRange),
            (a, b) => finite(float_op(a.as_f64(), b.as_f64())),
        }
    }

    fn div(self, rhs: Number) -> Result<Number, EvalError> {
        if rhs.as_f64() == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        finite(self.as_f64() / rhs.as_f64())
    }

    fn pow(self, rhs: Number) -> Result<Number, EvalError> {
        match (self, rhs) {
            (Number::Int(base), Number::Int(exp)) if exp >= 0 => u32::try_from(exp)
                .ok()
                .and_then(|exp| base.checked_pow(exp))
                .map(Number::Int)
                .ok_or(EvalError::OutOfRange),
            (base, exp) => {
                if base.as_f64() == 0.0 && exp.as_f64() < 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                finite(base.as_f64().powf(exp.as_f64()))
            }
        }
    }

    fn neg(self) -> Result<Number, EvalError> {
        match self {
            Number::Int(int) => int.checked_neg().map(Number::Int).ok_or(EvalError::OutOfRange),
            Number::Float(float) => Ok(Number::Float(-float)),
        }
    }
}

fn finite(value: f64) -> Result<Number, EvalError> {
    if value.is_finite() {
        Ok(Number::Float(value))
    } else {
        Err(EvalError::OutOfRange)
    }
}

impl From<Number> for Value {
    fn from(number: Number) -> Self {
        match number {
            Number::Int(int) => Value::Integer(int),
            Number::Float(float) => Value::Decimal(float),
        }
    }
}

/// Evaluate an expression made of numbers, parentheses and `+ - * / **`
pub fn arithmetic(expression: &str) -> Result<Number, EvalError> {
    let mut parser = Arithmetic {
        input: expression.as_bytes(),
        pos: 0,
        depth: 0,
    };

    let result = parser.sum()?;
    parser.skip_whitespace();
    if parser.pos < parser.input.len() {
        return Err(parser.error("unexpected input"));
    }
    Ok(result)
}

struct Arithmetic<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Arithmetic<'a> {
    fn skip_whitespace(&mut self) {
        while self.input.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.input.get(self.pos).copied()
    }

    fn peek_pow(&mut self) -> bool {
        self.peek() == Some(b'*') && self.input.get(self.pos + 1) == Some(&b'*')
    }

    /// Every recursion (parentheses, signs, exponents) passes through [Self::unary]
    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn error(&self, message: &'static str) -> EvalError {
        EvalError::Syntax {
            offset: self.pos,
            message,
        }
    }

    fn sum(&mut self) -> Result<Number, EvalError> {
        let mut lhs = self.product()?;
        loop {
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    lhs = lhs.integer_op(self.product()?, i64::checked_add, |a, b| a + b)?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    lhs = lhs.integer_op(self.product()?, i64::checked_sub, |a, b| a - b)?;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn product(&mut self) -> Result<Number, EvalError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(b'*') if !self.peek_pow() => {
                    self.pos += 1;
                    lhs = lhs.integer_op(self.unary()?, i64::checked_mul, |a, b| a * b)?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    if self.input.get(self.pos) == Some(&b'/') {
                        return Err(self.error("floor division is not supported"));
                    }
                    lhs = lhs.div(self.unary()?)?;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Number, EvalError> {
        self.descend()?;
        let result = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                self.unary().and_then(Number::neg)
            }
            Some(b'+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        };
        self.depth -= 1;
        result
    }

    fn power(&mut self) -> Result<Number, EvalError> {
        let base = self.atom()?;
        if self.peek_pow() {
            self.pos += 2;
            return base.pow(self.unary()?);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Number, EvalError> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let inner = self.sum()?;
                if self.peek() != Some(b')') {
                    return Err(self.error("expected ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(b'0'..=b'9' | b'.') => self.number(),
            Some(_) => Err(self.error("expected a number")),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn number(&mut self) -> Result<Number, EvalError> {
        let start = self.pos;
        while self
            .input
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_digit() || *b == b'.')
        {
            self.pos += 1;
        }

        // the input only contains ascii at this point
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("invalid number"))?;

        match parse_number(text) {
            Some(Value::Integer(int)) => Ok(Number::Int(int)),
            Some(Value::Decimal(float)) => Ok(Number::Float(float)),
            _ => Err(EvalError::Syntax {
                offset: start,
                message: "invalid number",
            }),
        }
    }
}
