//! Simple, database-agnostic property types for entity schemas
//!
//! # Supported Types
//!
//! - `integer` - Whole numbers
//! - `float` - Decimal numbers
//! - `string` - Text
//! - `boolean` - True/False
//! - `datetime` - Timestamps
//! - `date` - Dates
//! - `uuid` - UUIDs
//!
//! # Example
//!
//! ```yaml
//! properties:
//!   - name: group_id
//!     type: integer
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Serialized by canonical name; deserialized through [`FromStr`], so schema
/// files may use the aliases too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum PropertyType {
    Integer,
    Float,
    String,
    Boolean,
    DateTime,
    Date,
    Uuid,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Integer => "integer",
            PropertyType::Float => "float",
            PropertyType::String => "string",
            PropertyType::Boolean => "boolean",
            PropertyType::DateTime => "datetime",
            PropertyType::Date => "date",
            PropertyType::Uuid => "uuid",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, with the common aliases (`int`, `text`, `bool`, `timestamp`, ...)
impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim() {
            "integer" | "int" | "long" | "bigint" => Ok(PropertyType::Integer),
            "float" | "double" | "decimal" | "real" => Ok(PropertyType::Float),
            "string" | "text" | "varchar" => Ok(PropertyType::String),
            "boolean" | "bool" => Ok(PropertyType::Boolean),
            "datetime" | "timestamp" => Ok(PropertyType::DateTime),
            "date" => Ok(PropertyType::Date),
            "uuid" => Ok(PropertyType::Uuid),
            _ => Err(format!(
                "Unknown type: '{}'. Supported: integer, float, string, boolean, datetime, date, uuid",
                s
            )),
        }
    }
}

impl TryFrom<String> for PropertyType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
}

/// Ordered property name → type declarations of one entity.
///
/// Deserialized as a list of definitions; a repeated name replaces the earlier
/// type in place, as with [`EntitySchema::insert`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PropertyDefinition>", into = "Vec<PropertyDefinition>")]
pub struct EntitySchema(Vec<PropertyDefinition>);

impl EntitySchema {
    pub fn new() -> Self {
        EntitySchema(Vec::new())
    }

    /// Builder-style insert. Redeclaring a property replaces its type in place.
    pub fn with(mut self, name: impl Into<String>, property_type: PropertyType) -> Self {
        self.insert(name, property_type);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, property_type: PropertyType) {
        let name = name.into();
        match self.0.iter_mut().find(|definition| definition.name == name) {
            Some(existing) => existing.property_type = property_type,
            None => self.0.push(PropertyDefinition {
                name,
                property_type,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<PropertyType> {
        self.0
            .iter()
            .find(|definition| definition.name == name)
            .map(|definition| definition.property_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|definition| definition.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDefinition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PropertyDefinition>> for EntitySchema {
    fn from(definitions: Vec<PropertyDefinition>) -> Self {
        definitions
            .into_iter()
            .map(|definition| (definition.name, definition.property_type))
            .collect()
    }
}

impl From<EntitySchema> for Vec<PropertyDefinition> {
    fn from(schema: EntitySchema) -> Self {
        schema.0
    }
}

impl FromIterator<(String, PropertyType)> for EntitySchema {
    fn from_iter<I: IntoIterator<Item = (String, PropertyType)>>(iter: I) -> Self {
        let mut schema = EntitySchema::new();
        for (name, property_type) in iter {
            schema.insert(name, property_type);
        }
        schema
    }
}
