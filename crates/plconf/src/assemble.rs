//! final configuration tree
use crate::diagnostics::{Diagnostics, Issue};
use crate::store::{Scope, VariableStore};
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;

/// `namespace -> (name -> value)` without any unevaluated values
#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigTree {
    namespaces: IndexMap<String, Scope>,
}

impl ConfigTree {
    pub fn get(&self, namespace: &str, name: &str) -> Option<&Value> {
        self.namespaces.get(namespace)?.get(name)
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    pub fn variable_count(&self) -> usize {
        self.namespaces.values().map(IndexMap::len).sum()
    }
}

/// Merge all namespaces of the store into one tree
///
/// Values that are still expressions are replaced by their source text and marked in `diagnostics`.
pub fn assemble(store: VariableStore, diagnostics: &mut Diagnostics) -> ConfigTree {
    let namespaces = store
        .into_namespaces()
        .into_iter()
        .map(|(namespace, scope)| {
            let scope = scope
                .into_iter()
                .map(|(name, value)| {
                    let value = settle(value, &namespace, &name, diagnostics);
                    (name, value)
                })
                .collect();
            (namespace, scope)
        })
        .collect();

    ConfigTree { namespaces }
}

/// Replace everything unevaluated with plain text
fn settle(value: Value, namespace: &str, name: &str, diagnostics: &mut Diagnostics) -> Value {
    match value {
        Value::Expression(text) => {
            diagnostics.log(Issue::UnresolvedField {
                namespace: namespace.to_string(),
                name: name.to_string(),
                text: text.clone(),
            });
            Value::String(text)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| settle(item, namespace, name, diagnostics))
                .collect(),
        ),
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, item)| {
                    let item = settle(item, namespace, name, diagnostics);
                    (key, item)
                })
                .collect(),
        ),
        resolved => resolved,
    }
}
