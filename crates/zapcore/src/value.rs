use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque payload threaded from one step to the next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Json(serde_json::Value),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl Value {
    /// Build an object from key/value pairs.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Convert plain JSON (as typed into a form or a CLI flag) into a
    /// structured value, recursing through arrays and objects.
    pub fn from_plain_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_plain_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_plain_json(v)))
                    .collect(),
            ),
        }
    }

    /// Look up a field when this value is an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Merge the fields of `other` into this value. Non-object values are
    /// wrapped under `"input"` first so nothing is dropped.
    pub fn merged_with(self, other: Value) -> Value {
        let mut base = match self {
            Value::Object(map) => map,
            Value::Null => HashMap::new(),
            v => HashMap::from([("input".to_string(), v)]),
        };
        match other {
            Value::Object(map) => base.extend(map),
            Value::Null => {}
            v => {
                base.insert("output".to_string(), v);
            }
        }
        Value::Object(base)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_becomes_structured() {
        let value = Value::from_plain_json(serde_json::json!({
            "to": "ops@example.com",
            "count": 3,
            "tags": ["a", "b"],
        }));

        assert_eq!(value.get("to").and_then(|v| v.as_str()), Some("ops@example.com"));
        assert_eq!(value.get("count").and_then(|v| v.as_f64()), Some(3.0));
        assert!(matches!(value.get("tags"), Some(Value::Array(items)) if items.len() == 2));
    }

    #[test]
    fn merge_keeps_scalar_input() {
        let merged = Value::from("hello").merged_with(Value::object([("ok", true)]));

        assert_eq!(merged.get("input").and_then(|v| v.as_str()), Some("hello"));
        assert_eq!(merged.get("ok").and_then(|v| v.as_bool()), Some(true));
    }
}
