//! Runtime value types for the devkit evaluator.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A runtime value.
///
/// Supports primitives (null, bool, int, float, string) and lists.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    /// The short type name used in diagnostics and by the `type` builtin.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }

    /// Truthiness: null and false are falsy, empty strings/lists are falsy,
    /// zero is falsy. Everything else is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::String(s) => write!(f, "{s:?}")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        value_to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(json_to_value(json))
    }
}

/// Convert a serde_json::Value to a runtime Value.
///
/// Objects have no direct counterpart and are carried as their compact
/// JSON text.
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::List(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(_) => Value::String(json.to_string()),
    }
}

/// Convert a runtime Value to serde_json::Value for serialization.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}

/// One unit of evaluator output, emitted lazily in program order.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultItem {
    /// Text written via `print(...)` while a statement executed.
    Printed(String),
    /// The value of a captured trailing expression statement.
    Value(Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_emptiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::String(String::new()).truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(Value::String("x".into()).truthy());
    }

    #[test]
    fn display_quotes_strings_inside_lists_only() {
        let v = Value::List(vec![Value::String("a".into()), Value::Int(1)]);
        assert_eq!(v.to_string(), r#"["a", 1]"#);
        assert_eq!(Value::String("a".into()).to_string(), "a");
    }

    #[test]
    fn float_display_keeps_decimal_point() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn json_round_trip_for_lists() {
        let v = Value::List(vec![Value::Int(1), Value::String("two".into()), Value::Null]);
        let json = value_to_json(&v);
        assert_eq!(json_to_value(json), v);
    }

    #[test]
    fn json_objects_become_strings() {
        let json: serde_json::Value = serde_json::json!({"a": 1});
        let v = json_to_value(json);
        assert!(matches!(v, Value::String(ref s) if s.contains("\"a\"")));
    }
}
