//! line-oriented statement parser
//!
//! A [LineParser] is created for every file and fed one line at a time. It only understands the handful of statement
//! forms that make up variable-definition files:
//!
//! ```perl
//! # Product: Widgets
//! $name = 'value';
//! @list = ('a', 2, $name);
//! %map = (
//!     key => 'value',   # comments are fine
//!     other => 1.5,
//! );
//! ```
//!
//! Anything else (`use strict;`, `require ...;`, `1;`, subroutines) is skipped without complaint. Variable references
//! inside literals and scalar expressions are kept as [Value::Expression] and resolved later against the
//! [crate::store::VariableStore].
//!
//! Hash keys are never resolved: `%h = ($k => 1);` has the key `$k`, while references in values and array items are.
use crate::diagnostics::Issue;
use crate::expr;
use crate::settings::NamespaceMode;
use crate::source::SourceFile;
use crate::value::Value;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s*Product\s*:\s*(\S.*?)\s*$").expect("valid regex"));
static SCALAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:my|our)\s+)?\$(\w+)\s*=(?:([^=~].*?))?;$").expect("valid regex")
});
static LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:my|our)\s+)?([@%])(\w+)\s*=\s*(qw\s*)?\((.*)$").expect("valid regex")
});
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:my|our)\s+)?[$@%]\w+\s*=(?:[^=~]|$)").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Scalar,
    Array,
    Hash,
}

/// One completed statement
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub namespace: String,
    pub name: String,
    pub kind: DeclarationKind,
    pub value: Value,
    /// 1-based line the statement starts on
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Namespace(String),
    Declaration(Declaration),
    Issue(Issue),
}

#[derive(Debug)]
enum State {
    Normal,
    InArray(Literal),
    InHash(Literal),
    /// inside `=pod` ... `=cut`
    Pod,
    /// after `__END__` or `__DATA__`
    End,
}

/// Buffered lines of a multi-line array or hash
#[derive(Debug)]
struct Literal {
    kind: DeclarationKind,
    name: String,
    line: usize,
    quote_words: bool,
    parts: Vec<String>,
}

impl Literal {
    fn into_state(self) -> State {
        match self.kind {
            DeclarationKind::Hash => State::InHash(self),
            _ => State::InArray(self),
        }
    }
}

pub struct LineParser<'a> {
    source: &'a SourceFile,
    mode: NamespaceMode,
    namespace: Option<String>,
    state: State,
    line: usize,
}

impl<'a> LineParser<'a> {
    pub fn new(source: &'a SourceFile, mode: NamespaceMode) -> Self {
        let namespace = match mode {
            NamespaceMode::Directory => Some(source.namespace.clone()),
            NamespaceMode::Marker => None,
        };

        Self {
            source,
            mode,
            namespace,
            state: State::Normal,
            line: 0,
        }
    }

    /// Consume the next line, returns the events of all statements completed by it
    pub fn feed(&mut self, line: &str) -> Vec<Event> {
        self.line += 1;
        let line = line.trim();

        match std::mem::replace(&mut self.state, State::Normal) {
            State::Normal => self.normal(line),
            State::InArray(literal) | State::InHash(literal) => {
                self.continue_literal(literal, line).into_iter().collect()
            }
            State::Pod => {
                if !line.starts_with("=cut") {
                    self.state = State::Pod;
                }
                vec![]
            }
            State::End => {
                self.state = State::End;
                vec![]
            }
        }
    }

    /// Report a literal that is still open at the end of the file
    pub fn finish(self) -> Option<Event> {
        match self.state {
            State::InArray(literal) | State::InHash(literal) => {
                Some(Event::Issue(Issue::UnterminatedLiteral {
                    path: self.source.path.clone(),
                    line: literal.line,
                    name: literal.name,
                }))
            }
            _ => None,
        }
    }

    fn normal(&mut self, line: &str) -> Vec<Event> {
        if line.is_empty() {
            return vec![];
        }

        if let Some(captures) = MARKER.captures(line) {
            return self.marker(&captures[1]).into_iter().collect();
        }

        if line.starts_with('#') {
            return vec![];
        }

        if line == "__END__" || line == "__DATA__" {
            self.state = State::End;
            return vec![];
        }

        if line.starts_with('=') {
            self.state = State::Pod;
            return vec![];
        }

        statements(strip_comment(line))
            .into_iter()
            .filter_map(|statement| self.statement(&statement))
            .collect()
    }

    fn statement(&mut self, code: &str) -> Option<Event> {
        if let Some(captures) = SCALAR.captures(code) {
            let rhs = captures.get(2).map_or("", |m| m.as_str().trim());
            if rhs.is_empty() {
                return Some(self.malformed(code));
            }
            return Some(self.declaration(
                DeclarationKind::Scalar,
                &captures[1],
                expr::classify(rhs),
                self.line,
            ));
        }

        if let Some(captures) = LIST.captures(code) {
            let kind = match &captures[1] {
                "%" => DeclarationKind::Hash,
                _ => DeclarationKind::Array,
            };
            let mut literal = Literal {
                kind,
                name: captures[2].to_string(),
                line: self.line,
                quote_words: captures.get(3).is_some(),
                parts: vec![],
            };
            let rest = captures.get(4).map_or("", |m| m.as_str());

            if let Some(body) = strip_close(rest) {
                literal.parts.push(body.to_string());
                return Some(self.complete(literal));
            }

            tracing::trace!(name = %literal.name, line = self.line, "multi-line literal");
            if !rest.trim().is_empty() {
                literal.parts.push(rest.to_string());
            }
            self.state = literal.into_state();
            return None;
        }

        if ASSIGNMENT.is_match(code) {
            return Some(self.malformed(code));
        }

        tracing::trace!(line = self.line, text = code, "skipping unrecognized statement");
        None
    }

    fn marker(&mut self, name: &str) -> Option<Event> {
        if self.mode != NamespaceMode::Marker {
            tracing::trace!(line = self.line, name, "ignoring namespace marker");
            return None;
        }

        tracing::debug!(path = %self.source.path.display(), namespace = name, "namespace marker");
        self.namespace = Some(name.to_string());
        Some(Event::Namespace(name.to_string()))
    }

    fn continue_literal(&mut self, mut literal: Literal, line: &str) -> Option<Event> {
        let code = strip_comment(line).trim();

        if let Some(body) = strip_close(code) {
            literal.parts.push(body.to_string());
            return Some(self.complete(literal));
        }

        if !code.is_empty() {
            literal.parts.push(code.to_string());
        }
        self.state = literal.into_state();
        None
    }

    fn complete(&self, literal: Literal) -> Event {
        let body = literal.parts.join(" ");
        let value = match literal.kind {
            DeclarationKind::Hash => parse_hash(&body, literal.quote_words),
            _ => parse_array(&body, literal.quote_words),
        };

        self.declaration(literal.kind, &literal.name, value, literal.line)
    }

    fn declaration(&self, kind: DeclarationKind, name: &str, value: Value, line: usize) -> Event {
        let Some(namespace) = &self.namespace else {
            return Event::Issue(Issue::OutsideNamespace {
                path: self.source.path.clone(),
                line,
                name: name.to_string(),
            });
        };

        tracing::trace!(%namespace, name, ?kind, line, "declaration");
        Event::Declaration(Declaration {
            namespace: namespace.clone(),
            name: name.to_string(),
            kind,
            value,
            line,
        })
    }

    fn malformed(&self, code: &str) -> Event {
        Event::Issue(Issue::MalformedStatement {
            path: self.source.path.clone(),
            line: self.line,
            text: code.to_string(),
        })
    }
}

/// Run a fresh [LineParser] over a whole file
pub fn parse_source(text: &str, source: &SourceFile, mode: NamespaceMode) -> Vec<Event> {
    let mut parser = LineParser::new(source, mode);
    let mut events: Vec<Event> = text.lines().flat_map(|line| parser.feed(line)).collect();
    events.extend(parser.finish());
    events
}

fn parse_array(body: &str, quote_words: bool) -> Value {
    if quote_words {
        return Value::Array(body.split_whitespace().map(Value::coerce).collect());
    }

    Value::Array(items(body).map(literal_item).collect())
}

fn parse_hash(body: &str, quote_words: bool) -> Value {
    let items: Vec<&str> = if quote_words {
        body.split_whitespace().collect()
    } else {
        items(body).collect()
    };

    let mut map = IndexMap::new();

    let fat_comma = items
        .iter()
        .any(|item| split_top_level(item, "=>").len() > 1);

    if fat_comma {
        for item in items {
            match split_top_level(item, "=>").as_slice() {
                [key, value] if !key.trim().is_empty() && !value.trim().is_empty() => {
                    map.insert(key_text(key), literal_item(value));
                }
                _ => tracing::debug!(item, "dropping malformed hash pair"),
            }
        }
    } else {
        for pair in items.chunks(2) {
            match pair {
                [key, value] => {
                    map.insert(key_text(key), literal_item(value));
                }
                _ => tracing::debug!(?pair, "dropping hash key without value"),
            }
        }
    }

    Value::Object(map)
}

/// Non-empty comma separated items
fn items(body: &str) -> impl Iterator<Item = &str> {
    split_top_level(body, ",")
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn key_text(key: &str) -> String {
    let key = key.trim();
    unquote(key).unwrap_or_else(|| key.to_string())
}

fn literal_item(item: &str) -> Value {
    let item = item.trim();

    if let Some(text) = unquote(item) {
        return Value::coerce(&text);
    }

    if expr::bare_reference(item).is_some() {
        return Value::Expression(item.to_string());
    }

    Value::coerce(item)
}

/// Contents of a single- or double-quoted string literal
///
/// `None` if `token` is not exactly one quoted string (e.g. `'a' . 'b'`).
pub(crate) fn unquote(token: &str) -> Option<String> {
    let quote = token.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = token.strip_prefix(quote)?.strip_suffix(quote)?;

    let mut text = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next) if next == quote || next == '\\' => text.push(next),
                Some(next) => {
                    text.push('\\');
                    text.push(next);
                }
                None => return None,
            },
            c if c == quote => return None,
            c => text.push(c),
        }
    }

    Some(text)
}

/// Cut a trailing `#` comment that is not inside a string literal
pub(crate) fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    let mut escaped = false;

    for (idx, ch) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => quote = Some(ch),
            '#' => return &line[..idx],
            _ => {}
        }
    }

    line
}

/// Split a line into statements at top-level `;`, keeping the terminator
///
/// A trailing piece without `;` is kept as well, it may open a multi-line literal.
fn statements(code: &str) -> Vec<String> {
    let mut pieces = split_top_level(code, ";");
    let last = pieces.pop().map(str::trim).unwrap_or_default();

    let mut statements: Vec<String> = pieces
        .into_iter()
        .map(|piece| format!("{};", piece.trim()))
        .collect();
    if !last.is_empty() {
        statements.push(last.to_string());
    }
    statements
}

/// Body of a line that closes a list literal (`...);`)
fn strip_close(code: &str) -> Option<&str> {
    code.trim_end()
        .strip_suffix(';')?
        .trim_end()
        .strip_suffix(')')
}

/// Split on `separator` outside of string literals and brackets
fn split_top_level<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote = None;
    let mut escaped = false;
    let mut depth = 0usize;
    let mut chars = text.char_indices();

    while let Some((idx, ch)) = chars.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && text[idx..].starts_with(separator) => {
                parts.push(&text[start..idx]);
                start = idx + separator.len();
                for _ in 1..separator.chars().count() {
                    chars.next();
                }
            }
            _ => {}
        }
    }

    parts.push(&text[start..]);
    parts
}
