//! Sensor reading type.
//!
//! The device emits one JSON object per line, e.g.
//! `{"occupied":0,"motion":1,"distance":150,"lights":0}`. No schema is
//! enforced beyond "JSON object": unknown fields are carried through as-is.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One decoded sensor data point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading(Map<String, Value>);

impl Reading {
    /// Build a reading from an arbitrary JSON value.
    ///
    /// Only objects are accepted; scalars and arrays are rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(CoreError::NotAnObject(other.to_string())),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Numeric field as f64 (booleans map to 0/1).
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.0.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Flag field. The device reports flags as 0/1, JSON booleans also work.
    pub fn flag(&self, field: &str) -> Option<bool> {
        self.number(field).map(|v| v != 0.0)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Reading {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_object() {
        let reading =
            Reading::from_value(json!({"occupied": 1, "distance": 42, "lights": false})).unwrap();
        assert_eq!(reading.len(), 3);
        assert_eq!(reading.flag("occupied"), Some(true));
        assert_eq!(reading.number("distance"), Some(42.0));
        assert_eq!(reading.flag("lights"), Some(false));
        assert_eq!(reading.flag("missing"), None);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(matches!(
            Reading::from_value(json!(42)),
            Err(CoreError::NotAnObject(_))
        ));
        assert!(Reading::from_value(json!([1, 2])).is_err());
        assert!(Reading::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_serializes_transparently() {
        let reading = Reading::from_value(json!({"motion": 1, "extra": "kept"})).unwrap();
        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(json, r#"{"motion":1,"extra":"kept"}"#);
    }
}
