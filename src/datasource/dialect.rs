use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entity::schema_types::PropertyType;

/// Identifier quoting and column typing for the reference SQL renderer.
///
/// Only the parts of a dialect the relation compiler touches live here: how a
/// set or property name is quoted, and which column type a `PropertyType`
/// becomes when a virtual entity's dataset is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Ansi,
    PostgreSQL,
    MySQL,
    ClickHouse,
    SQLite,
}

impl SqlDialect {
    /// Get the string representation of the dialect
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::Ansi => "ansi",
            SqlDialect::PostgreSQL => "postgresql",
            SqlDialect::MySQL => "mysql",
            SqlDialect::ClickHouse => "clickhouse",
            SqlDialect::SQLite => "sqlite",
        }
    }

    fn quote_char(&self) -> char {
        match self {
            SqlDialect::MySQL | SqlDialect::ClickHouse => '`',
            SqlDialect::Ansi | SqlDialect::PostgreSQL | SqlDialect::SQLite => '"',
        }
    }

    /// Quote a set, alias or property name. Embedded quote characters are doubled.
    pub fn quote_identifier(&self, name: &str) -> String {
        let quote = self.quote_char();
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push(quote);
        for ch in name.chars() {
            if ch == quote {
                quoted.push(quote);
            }
            quoted.push(ch);
        }
        quoted.push(quote);
        quoted
    }

    /// Column type used when creating a dataset for a virtual entity
    pub fn column_type(&self, property_type: &PropertyType) -> &'static str {
        match (self, property_type) {
            (SqlDialect::ClickHouse, PropertyType::Integer) => "Int64",
            (SqlDialect::ClickHouse, PropertyType::Float) => "Float64",
            (SqlDialect::ClickHouse, PropertyType::String) => "String",
            (SqlDialect::ClickHouse, PropertyType::Boolean) => "Bool",
            (SqlDialect::ClickHouse, PropertyType::DateTime) => "DateTime",
            (SqlDialect::ClickHouse, PropertyType::Date) => "Date",
            (SqlDialect::ClickHouse, PropertyType::Uuid) => "UUID",
            (SqlDialect::SQLite, PropertyType::Integer | PropertyType::Boolean) => "INTEGER",
            (SqlDialect::SQLite, PropertyType::Float) => "REAL",
            (SqlDialect::SQLite, _) => "TEXT",
            (SqlDialect::MySQL, PropertyType::String) => "VARCHAR(255)",
            (SqlDialect::MySQL, PropertyType::Uuid) => "CHAR(36)",
            (_, PropertyType::Integer) => "BIGINT",
            (_, PropertyType::Float) => "DOUBLE PRECISION",
            (_, PropertyType::String) => "VARCHAR(255)",
            (_, PropertyType::Boolean) => "BOOLEAN",
            (_, PropertyType::DateTime) => "TIMESTAMP",
            (_, PropertyType::Date) => "DATE",
            (SqlDialect::PostgreSQL, PropertyType::Uuid) => "UUID",
            (_, PropertyType::Uuid) => "CHAR(36)",
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ansi" | "sql" => Ok(SqlDialect::Ansi),
            "postgresql" | "postgres" | "pg" => Ok(SqlDialect::PostgreSQL),
            "mysql" | "mariadb" => Ok(SqlDialect::MySQL),
            "clickhouse" | "ch" => Ok(SqlDialect::ClickHouse),
            "sqlite" => Ok(SqlDialect::SQLite),
            _ => Err(format!(
                "Unknown SQL dialect: '{}'. Supported: ansi, postgresql, mysql, clickhouse, sqlite",
                s
            )),
        }
    }
}
