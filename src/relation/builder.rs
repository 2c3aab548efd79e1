//! Typed builder states for declaring a relation.
//!
//! The declaration grammar is
//! `create_on → (via → on*)* → from → on* → showing* → sorted_by* → limit?`
//! and each stage is its own type, so an out-of-order call does not compile:
//!
//! - [`RelationBuilder`]: target set, no waypoints yet (`via`, `from`)
//! - [`WaypointBuilder`]: at least one waypoint (`on`, `via`, `from`)
//! - [`Relation`]: source set, nothing more can be appended to the chain
//!
//! ```compile_fail
//! use std::sync::Arc;
//! use relgraph::entity::{EntityDescriptor, EntitySchema, PropertyType};
//! use relgraph::relation::Relation;
//!
//! let people = Arc::new(EntityDescriptor::describe_virtual(
//!     "people",
//!     EntitySchema::new().with("id", PropertyType::Integer).with("team_id", PropertyType::Integer),
//!     Some(vec!["id".to_string()]),
//! ).unwrap());
//! let teams = Arc::new(EntityDescriptor::describe_virtual(
//!     "teams",
//!     EntitySchema::new().with("id", PropertyType::Integer),
//!     None,
//! ).unwrap());
//!
//! let relation = Relation::create_on(&teams, &[]).unwrap().from(&people, &["team_id"]).unwrap();
//! // A relation whose source is set takes no more waypoints
//! let _ = relation.via(&teams, &["id"], &["id"], Some("again"));
//! ```

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::config::CompilerConfig;
use crate::entity::EntityRef;
use crate::relation::errors::RelationError;
use crate::relation::node::{NodePosition, RelationNode};
use crate::relation::plan::Condition;
use crate::relation::reference::Reference;
use crate::relation::Relation;
use crate::utils::identifier::{count_placeholders, is_identifier};

/// Chain under construction, shared by the builder states
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    pub(crate) config: CompilerConfig,
    pub(crate) nodes: Vec<RelationNode>,
    pub(crate) references: Vec<Reference>,
    pub(crate) waypoint_conditions: BTreeMap<usize, Vec<Condition>>,
}

impl Draft {
    fn start(
        config: &CompilerConfig,
        target: &EntityRef,
        target_property: &[&str],
    ) -> Result<Self, RelationError> {
        config.check().map_err(|e| {
            RelationError::InvalidDeclaration(format!("invalid compiler configuration: {}", e))
        })?;

        let properties = resolve_properties(target, target_property, "create_on")?;
        log::debug!(
            "Declaring relation on `{}` ({})",
            target.set_name(),
            properties.join(", ")
        );

        let node = RelationNode::new(
            target.clone(),
            NodePosition::Target,
            config.target_alias.clone(),
            None,
            Vec::new(),
            properties,
        );

        Ok(Draft {
            config: config.clone(),
            nodes: vec![node],
            references: Vec::new(),
            waypoint_conditions: BTreeMap::new(),
        })
    }

    fn push_waypoint(
        mut self,
        entity: &EntityRef,
        referencing_property: &[&str],
        referenced_proxy_property: &[&str],
        alias: Option<&str>,
    ) -> Result<Self, RelationError> {
        let context = format!("via({})", entity.set_name());
        if referencing_property.is_empty() || referenced_proxy_property.is_empty() {
            return Err(RelationError::declaration_with_context(
                "a waypoint needs both a referencing and a referenced proxy property",
                context,
            ));
        }
        if let Some(alias) = alias {
            if !is_identifier(alias) {
                return Err(RelationError::declaration_with_context(
                    format!("alias `{}` is not a valid identifier", alias),
                    context,
                ));
            }
        }

        let name = alias.unwrap_or(entity.set_name()).to_string();
        if self.is_name_taken(&name) {
            return Err(RelationError::CircularWaypoint { name });
        }

        let referencing = resolve_properties(entity, referencing_property, &context)?;
        let proxy = resolve_properties(entity, referenced_proxy_property, &context)?;

        self.nodes.push(RelationNode::new(
            entity.clone(),
            NodePosition::Waypoint,
            name,
            alias.map(str::to_string),
            referencing,
            proxy,
        ));
        self.connect_last()?;
        Ok(self)
    }

    fn push_source(
        mut self,
        source: &EntityRef,
        referencing_property: &[&str],
    ) -> Result<Self, RelationError> {
        let properties = resolve_properties(source, referencing_property, "from")?;
        let name = self.config.source_alias.clone();
        self.nodes.push(RelationNode::new(
            source.clone(),
            NodePosition::Source,
            name,
            None,
            properties,
            Vec::new(),
        ));
        self.connect_last()?;
        Ok(self)
    }

    fn connect_last(&mut self) -> Result<(), RelationError> {
        let successor = self.nodes.len() - 1;
        let reference =
            Reference::connect(&self.nodes, successor - 1, successor, self.references.len())?;
        self.references.push(reference);
        Ok(())
    }

    fn is_name_taken(&self, name: &str) -> bool {
        name == self.config.target_alias
            || name == self.config.source_alias
            || self.nodes.iter().any(|node| node.name() == name)
    }

    /// Conditions attach to the most recently added waypoint
    fn attach_condition(mut self, condition: Condition) -> Self {
        let waypoint_index = self.nodes.len() - 2;
        self.waypoint_conditions
            .entry(waypoint_index)
            .or_default()
            .push(condition);
        self
    }
}

/// Relation with its target set and no waypoints yet
#[derive(Debug, Clone)]
pub struct RelationBuilder {
    draft: Draft,
}

impl RelationBuilder {
    pub(crate) fn start(
        config: &CompilerConfig,
        target: &EntityRef,
        target_property: &[&str],
    ) -> Result<Self, RelationError> {
        Ok(RelationBuilder {
            draft: Draft::start(config, target, target_property)?,
        })
    }

    /// Traverse `entity`: join it on `referencing_property`, then continue the
    /// chain from `referenced_proxy_property`. The alias defaults to the set name.
    pub fn via(
        self,
        entity: &EntityRef,
        referencing_property: &[&str],
        referenced_proxy_property: &[&str],
        alias: Option<&str>,
    ) -> Result<WaypointBuilder, RelationError> {
        Ok(WaypointBuilder {
            draft: self.draft.push_waypoint(
                entity,
                referencing_property,
                referenced_proxy_property,
                alias,
            )?,
        })
    }

    /// Close the chain with the source entity. An empty property list means
    /// the source's single identifying property.
    pub fn from(self, source: &EntityRef, referencing_property: &[&str]) -> Result<Relation, RelationError> {
        Ok(Relation::from_draft(
            self.draft.push_source(source, referencing_property)?,
        ))
    }
}

/// Relation with at least one waypoint; `on` targets the latest one
#[derive(Debug, Clone)]
pub struct WaypointBuilder {
    draft: Draft,
}

impl WaypointBuilder {
    /// Extra join predicate for the most recent waypoint. Repeated calls AND together.
    pub fn on(self, condition: &str, params: Vec<Value>) -> Result<Self, RelationError> {
        let condition = checked_condition(condition, params)?;
        Ok(WaypointBuilder {
            draft: self.draft.attach_condition(condition),
        })
    }

    pub fn via(
        self,
        entity: &EntityRef,
        referencing_property: &[&str],
        referenced_proxy_property: &[&str],
        alias: Option<&str>,
    ) -> Result<WaypointBuilder, RelationError> {
        Ok(WaypointBuilder {
            draft: self.draft.push_waypoint(
                entity,
                referencing_property,
                referenced_proxy_property,
                alias,
            )?,
        })
    }

    pub fn from(self, source: &EntityRef, referencing_property: &[&str]) -> Result<Relation, RelationError> {
        Ok(Relation::from_draft(
            self.draft.push_source(source, referencing_property)?,
        ))
    }
}

/// Validate a condition template against its parameter count
pub(crate) fn checked_condition(
    template: &str,
    params: Vec<Value>,
) -> Result<Condition, RelationError> {
    if template.trim().is_empty() {
        return Err(RelationError::InvalidDeclaration(
            "empty join condition".to_string(),
        ));
    }
    let placeholders = count_placeholders(template);
    if placeholders != params.len() {
        return Err(RelationError::declaration_with_context(
            format!(
                "condition has {} placeholders but {} parameters",
                placeholders,
                params.len()
            ),
            template,
        ));
    }
    Ok(Condition {
        template: template.to_string(),
        params,
    })
}

/// Explicit property names, or the single id property when none are given
fn resolve_properties(
    entity: &EntityRef,
    properties: &[&str],
    context: &str,
) -> Result<Vec<String>, RelationError> {
    if properties.is_empty() {
        return Ok(vec![entity.single_id_property()?.to_string()]);
    }

    let mut seen = HashSet::new();
    for property in properties {
        if !is_identifier(property) || !entity.has_property(property) {
            return Err(RelationError::declaration_with_context(
                format!(
                    "property `{}` is not declared on `{}`",
                    property,
                    entity.set_name()
                ),
                context,
            ));
        }
        if !seen.insert(*property) {
            return Err(RelationError::declaration_with_context(
                format!("property `{}` is listed twice", property),
                context,
            ));
        }
    }
    Ok(properties.iter().map(|p| p.to_string()).collect())
}
