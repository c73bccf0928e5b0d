//! value representation
//!
//! The plconf output model contains the following data types
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! [Value::Expression] only exists while a run is in progress. It holds a right-hand side that has not been evaluated
//! (yet) and never reaches the serializer, the assembler replaces it (see [crate::assemble]).
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// Raw source text of an expression or variable reference
    Expression(String),
}

impl Value {
    /// Interpret a bare token as a number, falling back to a string
    pub fn coerce(token: &str) -> Value {
        parse_number(token).unwrap_or_else(|| Value::String(token.to_string()))
    }

    /// `false` if this value or any nested value still needs evaluation
    pub fn is_resolved(&self) -> bool {
        match self {
            Value::Expression(_) => false,
            Value::Array(items) => items.iter().all(Value::is_resolved),
            Value::Object(entries) => entries.values().all(Value::is_resolved),
            _ => true,
        }
    }

    /// Text that replaces a `$name` reference inside an arithmetic expression
    ///
    /// Aggregates have no scalar form. Decimals always carry a fraction so they read back as decimals.
    pub fn substitution_text(&self) -> Option<String> {
        match self {
            Value::Integer(int) => Some(int.to_string()),
            Value::Decimal(dec) => {
                let text = dec.to_string();
                Some(if text.contains('.') { text } else { text + ".0" })
            }
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Parse integer (`42`, `-7`) or decimal (`1.5`, `.5`, `3.`) literals
///
/// Integers that do not fit into an i64 become decimals.
pub fn parse_number(token: &str) -> Option<Value> {
    let unsigned = token.strip_prefix(['+', '-']).unwrap_or(token);
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    if unsigned.is_empty() {
        return None;
    }

    if is_digits(unsigned) {
        return match token.parse::<i64>() {
            Ok(int) => Some(Value::Integer(int)),
            Err(_) => token.parse::<f64>().ok().map(Value::Decimal),
        };
    }

    let (int_part, frac_part) = unsigned.split_once('.')?;
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !is_digits(int_part) || !is_digits(frac_part) {
        return None;
    }

    token.parse::<f64>().ok().map(Value::Decimal)
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Decimal(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> From<IndexMap<K, V>> for Value {
    fn from(value: IndexMap<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) | Value::Expression(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}
