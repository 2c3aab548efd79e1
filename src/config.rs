use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::datasource::SqlDialect;
use crate::entity::DEFAULT_ID_SEPARATOR;
use crate::utils::identifier::is_identifier;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Relation compiler configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Alias of the target entity's set in compiled queries
    #[validate(length(min = 1, max = 63, message = "Target alias must be 1-63 characters"))]
    pub target_alias: String,

    /// Alias of the source entity's set in compiled queries
    #[validate(length(min = 1, max = 63, message = "Source alias must be 1-63 characters"))]
    pub source_alias: String,

    /// Separator between components of serialized composite ids
    #[validate(length(min = 1, max = 8, message = "Id separator must be 1-8 characters"))]
    pub id_separator: String,

    /// Maximum rows fetched by a selector (0 = unbounded)
    #[validate(range(max = 100000, message = "Selector limit must be at most 100000"))]
    pub selector_limit: u32,

    /// Dialect used when rendering plans to SQL text
    pub dialect: SqlDialect,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            target_alias: "target".to_string(),
            source_alias: "source".to_string(),
            id_separator: DEFAULT_ID_SEPARATOR.to_string(),
            selector_limit: 0,
            dialect: SqlDialect::Ansi,
        }
    }
}

impl CompilerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            target_alias: env::var("RELGRAPH_TARGET_ALIAS").unwrap_or_else(|_| "target".to_string()),
            source_alias: env::var("RELGRAPH_SOURCE_ALIAS").unwrap_or_else(|_| "source".to_string()),
            id_separator: env::var("RELGRAPH_ID_SEPARATOR")
                .unwrap_or_else(|_| DEFAULT_ID_SEPARATOR.to_string()),
            selector_limit: parse_env_var("RELGRAPH_SELECTOR_LIMIT", "0")?,
            dialect: parse_dialect_var("RELGRAPH_DIALECT", "ansi")?,
        };

        config.check()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.check()?;
        Ok(config)
    }

    /// Field validation plus the cross-field rules derive can't express
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        for (field, alias) in [
            ("target_alias", &self.target_alias),
            ("source_alias", &self.source_alias),
        ] {
            if !is_identifier(alias) {
                return Err(ConfigError::Invalid(format!(
                    "{} `{}` is not a valid identifier",
                    field, alias
                )));
            }
        }

        if self.target_alias == self.source_alias {
            return Err(ConfigError::Invalid(format!(
                "target and source aliases must differ (both `{}`)",
                self.target_alias
            )));
        }

        if self.id_separator.chars().any(|c| c.is_alphanumeric()) {
            return Err(ConfigError::Invalid(format!(
                "id separator `{}` must not contain alphanumeric characters",
                self.id_separator
            )));
        }

        Ok(())
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

fn parse_dialect_var(key: &str, default: &str) -> Result<SqlDialect, ConfigError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e: String| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: e.into(),
    })
}
