//! Entity descriptors.
//!
//! An [`EntityDescriptor`] gives the relation compiler one uniform view over two
//! kinds of entity:
//!
//! - **declared**: a Rust type implementing [`DeclaredEntity`], which owns its
//!   metadata, label formatting and schema creation
//! - **virtual**: a bare set description (name, schema, id properties) with no
//!   type behind it, typically a join table
//!
//! Descriptors are shared as [`EntityRef`] and cached per set name by
//! [`EntityCatalog`]. Schema creation is memoized by [`SchemaRegistry`].

pub mod catalog;
pub mod entity_id;
pub mod registry;
pub mod schema_types;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::datasource::{self, Datasource, DatasourceError, Row};
use crate::relation::errors::RelationError;
use crate::utils::identifier::is_identifier;

pub use catalog::EntityCatalog;
pub use entity_id::{display_value, EntityId, DEFAULT_ID_SEPARATOR};
pub use registry::SchemaRegistry;
pub use schema_types::{EntitySchema, PropertyDefinition, PropertyType};

/// Ordered property name → value mapping
pub type PropertyValues = serde_json::Map<String, Value>;

pub type EntityRef = Arc<EntityDescriptor>;

/// Metadata contract every declared entity type implements.
///
/// Only the metadata accessors and `format_label` are required; instance lookup
/// and schema creation default to the same generic behavior virtual entities get.
#[async_trait]
pub trait DeclaredEntity: Send + Sync + fmt::Debug {
    fn set_name(&self) -> &str;

    fn id_property_names(&self) -> Vec<String>;

    fn label_property_names(&self) -> Vec<String>;

    fn schema(&self) -> EntitySchema;

    fn format_label(&self, values: &PropertyValues) -> String;

    async fn select_instance(
        &self,
        datasource: &dyn Datasource,
        id: &EntityId,
    ) -> Result<Row, DatasourceError> {
        select_single_row(datasource, self.set_name(), &self.id_property_names(), id).await
    }

    async fn ensure_schema(&self, datasource: &dyn Datasource) -> Result<(), DatasourceError> {
        datasource::create_if_absent(
            datasource,
            self.set_name(),
            &self.schema(),
            &self.id_property_names(),
        )
        .await
        .map(|_| ())
    }
}

#[derive(Debug, Clone)]
enum EntityKind {
    Declared(Arc<dyn DeclaredEntity>),
    Virtual,
}

/// Uniform wrapper around a declared entity type or a virtual set description
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    set_name: String,
    id_properties: Vec<String>,
    label_properties: Vec<String>,
    schema: EntitySchema,
    kind: EntityKind,
}

impl EntityDescriptor {
    /// Wrap a declared entity type, reading its metadata once
    pub fn describe_declared(entity: Arc<dyn DeclaredEntity>) -> Result<Self, RelationError> {
        let set_name = entity.set_name().to_string();
        if !is_identifier(&set_name) {
            return Err(RelationError::InvalidDeclaration(format!(
                "declared entity set name `{}` is not a valid identifier",
                set_name
            )));
        }

        let id_properties = entity.id_property_names();
        if id_properties.is_empty() {
            return Err(RelationError::InvalidDeclaration(format!(
                "declared entity `{}` has no identifying properties",
                set_name
            )));
        }

        let mut label_properties = entity.label_property_names();
        if label_properties.is_empty() {
            label_properties = id_properties.clone();
        }

        Ok(EntityDescriptor {
            schema: entity.schema(),
            set_name,
            id_properties,
            label_properties,
            kind: EntityKind::Declared(entity),
        })
    }

    /// Describe a bare set. Omitted id properties default to every schema property.
    pub fn describe_virtual(
        set_name: &str,
        schema: EntitySchema,
        id_properties: Option<Vec<String>>,
    ) -> Result<Self, RelationError> {
        if !is_identifier(set_name) {
            return Err(RelationError::InvalidDeclaration(format!(
                "virtual entity set name `{}` is not a valid identifier",
                set_name
            )));
        }
        if schema.is_empty() {
            return Err(RelationError::InvalidDeclaration(format!(
                "virtual entity `{}` declares no properties",
                set_name
            )));
        }
        if let Some(invalid) = schema.iter().find(|d| !is_identifier(&d.name)) {
            return Err(RelationError::InvalidDeclaration(format!(
                "property `{}` of `{}` is not a valid identifier",
                invalid.name, set_name
            )));
        }

        let id_properties = match id_properties {
            Some(ids) if ids.is_empty() => {
                return Err(RelationError::InvalidDeclaration(format!(
                    "virtual entity `{}` declares an empty identifier",
                    set_name
                )))
            }
            Some(ids) => {
                if let Some(missing) = ids.iter().find(|id| !schema.contains(id)) {
                    return Err(RelationError::InvalidDeclaration(format!(
                        "id property `{}` is not declared in the schema of `{}`",
                        missing, set_name
                    )));
                }
                ids
            }
            None => schema.names(),
        };

        Ok(EntityDescriptor {
            set_name: set_name.to_string(),
            label_properties: id_properties.clone(),
            id_properties,
            schema,
            kind: EntityKind::Virtual,
        })
    }

    pub fn set_name(&self) -> &str {
        &self.set_name
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, EntityKind::Virtual)
    }

    pub fn id_properties(&self) -> &[String] {
        &self.id_properties
    }

    pub fn label_properties(&self) -> &[String] {
        &self.label_properties
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Whether `property` can be referenced on this entity.
    ///
    /// Declared types with an empty schema vouch for their own properties.
    pub fn has_property(&self, property: &str) -> bool {
        if self.schema.contains(property) || self.id_properties.iter().any(|id| id == property) {
            return true;
        }
        !self.is_virtual() && self.schema.is_empty()
    }

    /// The single identifying property, used when a relation omits one
    pub fn single_id_property(&self) -> Result<&str, RelationError> {
        match self.id_properties.as_slice() {
            [single] => Ok(single.as_str()),
            properties => Err(RelationError::AmbiguousIdentifier {
                set_name: self.set_name.clone(),
                properties: properties.join(", "),
            }),
        }
    }

    /// Create the entity's dataset if it is missing, memoized in `registry`
    pub async fn ensure_schema_present(
        &self,
        registry: &SchemaRegistry,
        datasource: &dyn Datasource,
    ) -> Result<(), RelationError> {
        registry.ensure(self, datasource).await
    }

    /// Unmemoized schema creation; callers go through the registry
    pub(crate) async fn create_schema(
        &self,
        datasource: &dyn Datasource,
    ) -> Result<(), DatasourceError> {
        match &self.kind {
            EntityKind::Declared(entity) => entity.ensure_schema(datasource).await,
            EntityKind::Virtual => datasource::create_if_absent(
                datasource,
                &self.set_name,
                &self.schema,
                &self.id_properties,
            )
            .await
            .map(|_| ()),
        }
    }

    /// Human-readable label for one instance.
    ///
    /// Virtual entities render `<set> #<id1>::<id2>` from their id values.
    pub fn format_label(&self, values: &PropertyValues) -> String {
        match &self.kind {
            EntityKind::Declared(entity) => entity.format_label(values),
            EntityKind::Virtual => {
                let components: Vec<String> = self
                    .id_properties
                    .iter()
                    .map(|property| values.get(property).map(display_value).unwrap_or_default())
                    .collect();
                format!("{} #{}", self.set_name, components.join(DEFAULT_ID_SEPARATOR))
            }
        }
    }

    /// Fetch the single instance identified by `id`
    pub async fn select_instance(
        &self,
        datasource: &dyn Datasource,
        id: &EntityId,
    ) -> Result<Row, RelationError> {
        if id.width() != self.id_properties.len() {
            return Err(RelationError::ArityMismatch {
                expected: self.id_properties.len(),
                actual: id.width(),
            });
        }
        let row = match &self.kind {
            EntityKind::Declared(entity) => entity.select_instance(datasource, id).await?,
            EntityKind::Virtual => {
                select_single_row(datasource, &self.set_name, &self.id_properties, id).await?
            }
        };
        Ok(row)
    }
}

impl PartialEq for EntityDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.set_name == other.set_name
            && self.is_virtual() == other.is_virtual()
            && self.id_properties == other.id_properties
            && self.label_properties == other.label_properties
            && self.schema == other.schema
    }
}

/// Look up one row of `set_name` by its identifying properties
pub async fn select_single_row(
    datasource: &dyn Datasource,
    set_name: &str,
    id_properties: &[String],
    id: &EntityId,
) -> Result<Row, DatasourceError> {
    let quote = |name: &str| datasource.quote_identifier(name);
    let mut query = datasource.create_query(&datasource::set_expression(&quote, set_name, set_name));

    let conditions: Vec<String> = id_properties
        .iter()
        .map(|property| format!("{}.{} = ?", quote(set_name), quote(property)))
        .collect();
    let params: Vec<Value> = id.components().into_iter().cloned().collect();
    query.add_filter(&conditions.join(" AND "), &params);
    query.add_projected_property(&format!("{}.*", quote(set_name)), None);
    query.limit(1, 0);

    let mut cursor = query.execute().await?;
    cursor.next().ok_or_else(|| DatasourceError::NotFound {
        set_name: set_name.to_string(),
    })
}
