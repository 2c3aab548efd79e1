//! # Definition File Error Types
//!
//! Errors raised while loading a relation definitions file and building the
//! relations it declares.
//!
//! ## Usage Patterns
//!
//! Relation errors are wrapped with the name of the relation being built:
//!
//! ```ignore
//! DefinitionError::Relation {
//!     relation: "group_members".to_string(),
//!     source: RelationError::CircularWaypoint { name: "memberships".to_string() },
//! }
//! ```

use thiserror::Error;

use crate::relation::errors::RelationError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    #[error("Failed to read definitions file {path}: {error}")]
    Read { path: String, error: String },

    #[error("Failed to parse definitions: {error}")]
    Parse { error: String },

    #[error("Relation `{relation}` uses unknown entity `{entity}`")]
    UnknownEntity { relation: String, entity: String },

    #[error("Relation `{name}` is defined more than once")]
    DuplicateRelation { name: String },

    #[error("No relation named `{name}` (defined: {available})")]
    UnknownRelation { name: String, available: String },

    #[error("Entity `{entity}`: {source}")]
    Entity {
        entity: String,
        #[source]
        source: RelationError,
    },

    #[error("Relation `{relation}`: {source}")]
    Relation {
        relation: String,
        #[source]
        source: RelationError,
    },
}
