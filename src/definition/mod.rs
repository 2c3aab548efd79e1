//! Relation definitions files.
//!
//! A definitions file declares virtual entities and the relations built from
//! them:
//!
//! ```yaml
//! entities:
//!   - name: memberships
//!     properties:
//!       - name: group_id
//!         type: integer
//!       - name: person_id
//!         type: integer
//!     id: [group_id, person_id]
//!
//! relations:
//!   - name: group_members
//!     target: groups
//!     target_property: id
//!     via:
//!       - entity: memberships
//!         referencing: group_id
//!         referenced: person_id
//!     source: persons
//!     source_property: id
//!     showing:
//!       - property: name
//!         alias: member
//! ```
//!
//! Entities not declared in the file (declared types, for instance) must already
//! be registered in the [`EntityCatalog`] passed to [`DefinitionsFile::build`].

pub mod errors;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CompilerConfig;
use crate::entity::{EntityCatalog, EntityRef, EntitySchema};
use crate::relation::{Relation, RelationBuilder, RelationError, WaypointBuilder};

pub use errors::DefinitionError;

/// One property name or an ordered list of them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PropertyList {
    Single(String),
    List(Vec<String>),
}

impl PropertyList {
    pub fn names(&self) -> Vec<&str> {
        match self {
            PropertyList::Single(name) => vec![name.as_str()],
            PropertyList::List(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

fn names_of(properties: &Option<PropertyList>) -> Vec<&str> {
    properties.as_ref().map(PropertyList::names).unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityDefinition {
    pub name: String,
    pub properties: EntitySchema,
    /// Defaults to every property
    #[serde(default)]
    pub id: Option<PropertyList>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionDefinition {
    pub condition: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaypointDefinition {
    pub entity: String,
    pub referencing: PropertyList,
    pub referenced: PropertyList,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub conditions: Vec<ConditionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShowingDefinition {
    pub property: String,
    #[serde(default)]
    pub alias: Option<String>,
}

fn default_ascending() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SortDefinition {
    pub property: String,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitDefinition {
    pub count: u64,
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationDefinition {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub target_property: Option<PropertyList>,
    #[serde(default)]
    pub via: Vec<WaypointDefinition>,
    pub source: String,
    #[serde(default)]
    pub source_property: Option<PropertyList>,
    /// Extra predicates on the source join
    #[serde(default)]
    pub conditions: Vec<ConditionDefinition>,
    #[serde(default)]
    pub showing: Vec<ShowingDefinition>,
    #[serde(default)]
    pub sort: Vec<SortDefinition>,
    #[serde(default)]
    pub limit: Option<LimitDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DefinitionsFile {
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
}

/// Relations built from a definitions file, in file order
#[derive(Debug, Clone)]
pub struct RelationSet {
    entities: Vec<EntityRef>,
    relations: Vec<(String, Relation)>,
}

impl RelationSet {
    pub fn get(&self, name: &str) -> Result<&Relation, DefinitionError> {
        self.relations
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, relation)| relation)
            .ok_or_else(|| DefinitionError::UnknownRelation {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.relations.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.relations
            .iter()
            .map(|(name, relation)| (name.as_str(), relation))
    }

    /// Virtual entities declared by the file
    pub fn entities(&self) -> &[EntityRef] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

enum Chain {
    Start(RelationBuilder),
    Waypoints(WaypointBuilder),
}

impl DefinitionsFile {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| DefinitionError::Read {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, DefinitionError> {
        serde_yaml::from_str(yaml).map_err(|e| DefinitionError::Parse {
            error: e.to_string(),
        })
    }

    /// Register the file's entities in `catalog` and build every relation
    pub fn build(
        &self,
        catalog: &EntityCatalog,
        config: &CompilerConfig,
    ) -> Result<RelationSet, DefinitionError> {
        let mut entities = Vec::with_capacity(self.entities.len());
        for definition in &self.entities {
            let ids = definition
                .id
                .as_ref()
                .map(|id| id.names().into_iter().map(str::to_string).collect());
            let entity = catalog
                .virtual_entity(&definition.name, definition.properties.clone(), ids)
                .map_err(|source| DefinitionError::Entity {
                    entity: definition.name.clone(),
                    source,
                })?;
            entities.push(entity);
        }

        let mut relations: Vec<(String, Relation)> = Vec::with_capacity(self.relations.len());
        for definition in &self.relations {
            if relations.iter().any(|(name, _)| *name == definition.name) {
                return Err(DefinitionError::DuplicateRelation {
                    name: definition.name.clone(),
                });
            }
            let relation = build_relation(definition, catalog, config)?;
            log::debug!(
                "Built relation `{}` with {} waypoints",
                definition.name,
                relation.waypoints().len()
            );
            relations.push((definition.name.clone(), relation));
        }

        log::info!(
            "Loaded {} entities and {} relations",
            entities.len(),
            relations.len()
        );
        Ok(RelationSet {
            entities,
            relations,
        })
    }
}

fn lookup(
    catalog: &EntityCatalog,
    relation: &str,
    entity: &str,
) -> Result<EntityRef, DefinitionError> {
    catalog
        .get(entity)
        .ok_or_else(|| DefinitionError::UnknownEntity {
            relation: relation.to_string(),
            entity: entity.to_string(),
        })
}

fn build_relation(
    definition: &RelationDefinition,
    catalog: &EntityCatalog,
    config: &CompilerConfig,
) -> Result<Relation, DefinitionError> {
    let name = definition.name.as_str();
    let target = lookup(catalog, name, &definition.target)?;
    let source = lookup(catalog, name, &definition.source)?;
    let waypoints = definition
        .via
        .iter()
        .map(|waypoint| Ok((lookup(catalog, name, &waypoint.entity)?, waypoint)))
        .collect::<Result<Vec<_>, DefinitionError>>()?;

    let build = || -> Result<Relation, RelationError> {
        let mut chain = Chain::Start(Relation::create_on_with_config(
            config,
            &target,
            &names_of(&definition.target_property),
        )?);

        for (entity, waypoint) in &waypoints {
            let referencing = waypoint.referencing.names();
            let referenced = waypoint.referenced.names();
            let alias = waypoint.alias.as_deref();
            let mut builder = match chain {
                Chain::Start(builder) => builder.via(entity, &referencing, &referenced, alias)?,
                Chain::Waypoints(builder) => {
                    builder.via(entity, &referencing, &referenced, alias)?
                }
            };
            for condition in &waypoint.conditions {
                builder = builder.on(&condition.condition, condition.params.clone())?;
            }
            chain = Chain::Waypoints(builder);
        }

        let source_property = names_of(&definition.source_property);
        let mut relation = match chain {
            Chain::Start(builder) => builder.from(&source, &source_property)?,
            Chain::Waypoints(builder) => builder.from(&source, &source_property)?,
        };

        for condition in &definition.conditions {
            relation = relation.on(&condition.condition, condition.params.clone())?;
        }
        for showing in &definition.showing {
            relation = relation.showing(&showing.property, showing.alias.as_deref())?;
        }
        for sort in &definition.sort {
            relation = relation.sorted_by(&sort.property, sort.ascending)?;
        }
        if let Some(limit) = definition.limit {
            relation = relation.limit(limit.count, limit.offset);
        }
        Ok(relation)
    };

    build().map_err(|source| DefinitionError::Relation {
        relation: name.to_string(),
        source,
    })
}
