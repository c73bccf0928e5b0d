//! resolved variables per namespace
//!
//! The store is handed from file to file in processing order. A declaration only sees variables that were recorded
//! before it in the same namespace, which is what makes the require order matter.
use crate::diagnostics::{Diagnostics, Issue};
use crate::expr::{bare_reference, EvalError, Evaluator};
use crate::parser::{Declaration, DeclarationKind};
use crate::value::Value;
use indexmap::IndexMap;

/// Variables of one namespace in assignment order
pub type Scope = IndexMap<String, Value>;

#[derive(Debug, Default)]
pub struct VariableStore {
    namespaces: IndexMap<String, Scope>,
}

impl VariableStore {
    /// Assign a variable, a later assignment to the same name replaces the value
    pub fn define(&mut self, namespace: &str, name: &str, value: Value) {
        let scope = self.namespaces.entry(namespace.to_string()).or_default();

        if scope.insert(name.to_string(), value).is_some() {
            tracing::debug!(namespace, name, "reassigned");
        }
    }

    /// `None` if the variable was not assigned (yet)
    pub fn lookup(&self, namespace: &str, name: &str) -> Option<&Value> {
        self.namespaces.get(namespace)?.get(name)
    }

    pub fn scope(&self, namespace: &str) -> Option<&Scope> {
        self.namespaces.get(namespace)
    }

    /// Number of variables over all namespaces
    pub fn len(&self) -> usize {
        self.namespaces.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_namespaces(self) -> IndexMap<String, Scope> {
        self.namespaces
    }

    /// Evaluate a declaration against the current namespace and record the result
    ///
    /// Literals are stored as they are. Expressions that cannot be evaluated keep their source text as a
    /// [Value::Expression] and are reported to `diagnostics`.
    pub fn record(&mut self, declaration: Declaration, diagnostics: &mut Diagnostics) {
        let Declaration {
            namespace,
            name,
            kind,
            value,
            ..
        } = declaration;

        let evaluator = Evaluator::new(self.scope(&namespace));

        let value = match (kind, value) {
            (DeclarationKind::Scalar, Value::Expression(raw)) => match evaluator.evaluate(&raw) {
                Err(EvalError::UndefinedReference(reference)) if bare_reference(&raw).is_some() => {
                    diagnostics.log(Issue::ForwardReference {
                        namespace: namespace.clone(),
                        name: name.clone(),
                        reference,
                    });
                    Value::Expression(raw)
                }
                Ok(value) => {
                    tracing::trace!(%namespace, %name, ?value, "evaluated");
                    value
                }
                Err(err) => {
                    diagnostics.log(Issue::UnresolvedExpression {
                        namespace: namespace.clone(),
                        name: name.clone(),
                        expression: raw.clone(),
                        reason: err.to_string(),
                    });
                    Value::Expression(raw)
                }
            },
            (_, value) => evaluator.resolve_references(value),
        };

        self.define(&namespace, &name, value);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expr::classify;
    use pretty_assertions::assert_eq;

    fn scalar(name: &str, rhs: &str) -> Declaration {
        Declaration {
            namespace: "Widgets".to_string(),
            name: name.to_string(),
            kind: DeclarationKind::Scalar,
            value: classify(rhs),
            line: 1,
        }
    }

    #[test]
    fn last_write_wins() {
        let mut store = VariableStore::default();
        store.define("Widgets", "a", Value::Integer(1));
        store.define("Widgets", "b", Value::Integer(2));
        store.define("Widgets", "a", Value::Integer(3));

        assert_eq!(store.lookup("Widgets", "a"), Some(&Value::Integer(3)));
        let names: Vec<_> = store.scope("Widgets").unwrap().keys().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn namespaces_are_isolated() {
        let mut store = VariableStore::default();
        let mut diagnostics = Diagnostics::default();
        store.define("Gadgets", "a", Value::Integer(1));

        store.record(scalar("b", "$a + 1"), &mut diagnostics);

        assert_eq!(
            store.lookup("Widgets", "b"),
            Some(&Value::Expression("$a + 1".to_string()))
        );
        assert_eq!(store.lookup("Widgets", "a"), None);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn evaluation_follows_assignment_order() {
        let mut store = VariableStore::default();
        let mut diagnostics = Diagnostics::default();

        store.record(scalar("a", "1"), &mut diagnostics);
        store.record(scalar("b", "$a + 1"), &mut diagnostics);
        assert_eq!(store.lookup("Widgets", "b"), Some(&Value::Integer(2)));
        assert!(diagnostics.is_empty());

        let mut store = VariableStore::default();
        store.record(scalar("b", "$a + 1"), &mut diagnostics);
        store.record(scalar("a", "1"), &mut diagnostics);
        assert_eq!(
            store.lookup("Widgets", "b"),
            Some(&Value::Expression("$a + 1".to_string()))
        );
        assert!(matches!(
            diagnostics.issues(),
            [Issue::UnresolvedExpression { name, .. }] if name == "b"
        ));
    }

    #[test]
    fn decimals_stay_decimal() {
        let mut store = VariableStore::default();
        let mut diagnostics = Diagnostics::default();

        for (name, rhs) in [
            ("a", "2.0"),
            ("b", "$a * 3"),
            ("c", "4 / 2"),
            ("d", "$c ** 70"),
            ("big", "9000000000000000000 / 1"),
            ("e", "$big * 10"),
        ] {
            store.record(scalar(name, rhs), &mut diagnostics);
        }

        assert_eq!(store.lookup("Widgets", "b"), Some(&Value::Decimal(6.0)));
        assert_eq!(store.lookup("Widgets", "d"), Some(&Value::Decimal(2f64.powi(70))));
        assert_eq!(store.lookup("Widgets", "e"), Some(&Value::Decimal(9e19)));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn forward_reference() {
        let mut store = VariableStore::default();
        let mut diagnostics = Diagnostics::default();

        store.record(scalar("copy", "$original"), &mut diagnostics);

        assert_eq!(
            store.lookup("Widgets", "copy"),
            Some(&Value::Expression("$original".to_string()))
        );
        assert_eq!(
            diagnostics.issues(),
            &[Issue::ForwardReference {
                namespace: "Widgets".to_string(),
                name: "copy".to_string(),
                reference: "original".to_string(),
            }]
        );
    }

    #[test]
    fn hash_keys_stay_literal() {
        use crate::parser::{parse_source, Event};
        use crate::settings::NamespaceMode;
        use crate::source::SourceFile;

        let source = SourceFile::new("conf/Widgets/base.pl".into(), "Widgets".to_string());
        let mut store = VariableStore::default();
        let mut diagnostics = Diagnostics::default();

        for event in parse_source("$k = 'size';\n%h = ($k => $k);\n", &source, NamespaceMode::Directory) {
            if let Event::Declaration(declaration) = event {
                store.record(declaration, &mut diagnostics);
            }
        }

        let mut expected = IndexMap::new();
        expected.insert("$k".to_string(), Value::from("size"));
        assert_eq!(store.lookup("Widgets", "h"), Some(&Value::Object(expected)));
    }

    #[test]
    fn literal_references() {
        let mut store = VariableStore::default();
        let mut diagnostics = Diagnostics::default();
        store.define("Widgets", "base", Value::from("S"));

        store.record(
            Declaration {
                namespace: "Widgets".to_string(),
                name: "sizes".to_string(),
                kind: DeclarationKind::Array,
                value: Value::Array(vec![
                    Value::Expression("$base".to_string()),
                    Value::Integer(2),
                ]),
                line: 1,
            },
            &mut diagnostics,
        );

        assert_eq!(
            store.lookup("Widgets", "sizes"),
            Some(&Value::Array(vec![Value::from("S"), Value::Integer(2)]))
        );
    }
}
