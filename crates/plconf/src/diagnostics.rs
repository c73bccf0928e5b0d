//! Recoverable problems found during a run
//!
//! Nothing in here aborts a conversion. Each [Issue] is logged when it is recorded and ends up in the diagnostics
//! report written next to the configuration document.
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    issues: Vec<Issue>,
}

impl Diagnostics {
    pub fn log(&mut self, issue: Issue) {
        tracing::warn!(%issue, "issue found");
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Number of fields in the output that carry unevaluated source text
    pub fn unresolved_fields(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, Issue::UnresolvedField { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// File could not be read or decoded, none of its declarations were loaded
    DecodeFailure { path: PathBuf, message: String },
    /// Looks like an assignment but does not follow the statement form
    MalformedStatement {
        path: PathBuf,
        line: usize,
        text: String,
    },
    /// End of file inside a multi-line array or hash
    UnterminatedLiteral {
        path: PathBuf,
        line: usize,
        name: String,
    },
    /// Declaration before the first namespace marker
    OutsideNamespace {
        path: PathBuf,
        line: usize,
        name: String,
    },
    /// A variable was referenced before it was assigned
    ForwardReference {
        namespace: String,
        name: String,
        reference: String,
    },
    UnresolvedExpression {
        namespace: String,
        name: String,
        expression: String,
        reason: String,
    },
    /// Output field that holds source text instead of an evaluated value
    UnresolvedField {
        namespace: String,
        name: String,
        text: String,
    },
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::DecodeFailure { path, message } => {
                write!(f, "decode failure in {}: {message}", path.display())
            }
            Issue::MalformedStatement { path, line, text } => {
                write!(f, "malformed statement at {}:{line}: {text}", path.display())
            }
            Issue::UnterminatedLiteral { path, line, name } => write!(
                f,
                "literal {name} starting at {}:{line} is never closed",
                path.display()
            ),
            Issue::OutsideNamespace { path, line, name } => write!(
                f,
                "{name} at {}:{line} is declared before any namespace marker",
                path.display()
            ),
            Issue::ForwardReference {
                namespace,
                name,
                reference,
            } => write!(
                f,
                "{namespace}.{name} references ${reference} before it is defined"
            ),
            Issue::UnresolvedExpression {
                namespace,
                name,
                expression,
                reason,
            } => write!(
                f,
                "unable to evaluate {namespace}.{name} = {expression}: {reason}"
            ),
            Issue::UnresolvedField {
                namespace,
                name,
                text,
            } => write!(f, "{namespace}.{name} kept as text: {text}"),
        }
    }
}
