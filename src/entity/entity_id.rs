use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default separator between components of a serialized composite id
pub const DEFAULT_ID_SEPARATOR: &str = "::";

/// Identifying value of one entity instance, single or composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Single(Value),
    Composite(Vec<Value>),
}

impl EntityId {
    /// Build from ordered components; a single component collapses to `Single`
    pub fn from_components(mut components: Vec<Value>) -> Self {
        if components.len() == 1 {
            EntityId::Single(components.remove(0))
        } else {
            EntityId::Composite(components)
        }
    }

    pub fn components(&self) -> Vec<&Value> {
        match self {
            EntityId::Single(value) => vec![value],
            EntityId::Composite(values) => values.iter().collect(),
        }
    }

    pub fn width(&self) -> usize {
        match self {
            EntityId::Single(_) => 1,
            EntityId::Composite(values) => values.len(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, EntityId::Composite(_))
    }

    /// Serialize for use as a map key, e.g. `"7"` or `"7::alice"`
    pub fn serialize_with(&self, separator: &str) -> String {
        self.components()
            .into_iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Parse a serialized id back into components.
    ///
    /// Components that read as JSON numbers or booleans keep that type; anything
    /// else is taken as a string.
    pub fn parse(input: &str, separator: &str) -> Self {
        let components = input
            .split(separator)
            .map(|part| match serde_json::from_str::<Value>(part.trim()) {
                Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
                _ => Value::String(part.to_string()),
            })
            .collect();
        EntityId::from_components(components)
    }
}

/// Render a value the way it appears in serialized ids and labels
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize_with(DEFAULT_ID_SEPARATOR))
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        EntityId::Single(Value::from(value))
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Single(Value::from(value))
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId::Single(Value::String(value))
    }
}

impl From<Value> for EntityId {
    fn from(value: Value) -> Self {
        EntityId::Single(value)
    }
}

impl From<Vec<Value>> for EntityId {
    fn from(values: Vec<Value>) -> Self {
        EntityId::from_components(values)
    }
}
