use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DatasourceError {
    #[error("Failed to create dataset `{set_name}`: {reason}")]
    CreateDataset { set_name: String, reason: String },

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Expected a single row from `{set_name}` but found none")]
    NotFound { set_name: String },
}
