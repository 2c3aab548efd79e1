//! relgraph - Model relation compiler
//!
//! This crate lets a caller declare how one data entity relates to another and
//! compile that declaration into a query plan for a relational datasource:
//! - Entity descriptors over declared entity types and virtual set descriptions
//! - Relation chains through any number of waypoint entities
//! - Reference direction inference and value binding
//! - Query plans rendered through a pluggable query builder
//! - YAML relation definitions and a command-line compiler

pub mod utils;

pub mod config;
pub mod datasource;
pub mod definition;
pub mod entity;
pub mod relation;

pub use config::{CompilerConfig, ConfigError};
pub use datasource::{Datasource, DatasourceError, ExecutableQuery, QueryBuilder, SqlDialect};
pub use definition::{DefinitionError, DefinitionsFile, RelationSet};
pub use entity::{
    DeclaredEntity, EntityCatalog, EntityDescriptor, EntityId, EntityRef, EntitySchema,
    PropertyType, SchemaRegistry,
};
pub use relation::{ErrorKind, QueryPlan, Relation, RelationError};
