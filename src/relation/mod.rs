//! # Relations
//!
//! A [`Relation`] declares how a *target* entity is reached from a *source*
//! entity, either directly or through a chain of waypoint entities, and compiles
//! that declaration into a [`QueryPlan`].
//!
//! ```text
//! target ──ref#0── waypoint₁ ──ref#1── … ──ref#N── source
//! ```
//!
//! Every hop is a [`Reference`] whose direction (which side stores the other's
//! identifying values) is inferred once, when the hop is declared.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use relgraph::entity::{EntityDescriptor, EntityId, EntitySchema, PropertyType};
//! use relgraph::relation::Relation;
//!
//! # fn main() -> Result<(), relgraph::relation::RelationError> {
//! let groups = Arc::new(EntityDescriptor::describe_virtual(
//!     "groups",
//!     EntitySchema::new().with("id", PropertyType::Integer).with("title", PropertyType::String),
//!     Some(vec!["id".to_string()]),
//! )?);
//! let memberships = Arc::new(EntityDescriptor::describe_virtual(
//!     "memberships",
//!     EntitySchema::new()
//!         .with("group_id", PropertyType::Integer)
//!         .with("person_id", PropertyType::Integer),
//!     None,
//! )?);
//! let persons = Arc::new(EntityDescriptor::describe_virtual(
//!     "persons",
//!     EntitySchema::new().with("id", PropertyType::Integer).with("name", PropertyType::String),
//!     Some(vec!["id".to_string()]),
//! )?);
//!
//! let relation = Relation::create_on(&groups, &["id"])?
//!     .via(&memberships, &["group_id"], &["person_id"], None)?
//!     .from(&persons, &["id"])?;
//!
//! let plan = relation.compile_query(Some(&EntityId::from(7)))?;
//! assert_eq!(plan.joined_sets().count(), 3);
//! assert_eq!(plan.params(), vec![serde_json::json!(7)]);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod compile;
pub mod errors;
pub mod node;
pub mod plan;
pub mod reference;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::CompilerConfig;
use crate::entity::{EntityId, EntityRef, PropertyValues};

use builder::{checked_condition, Draft};

pub use builder::{RelationBuilder, WaypointBuilder};
pub use compile::{RelationView, SelectorOptions};
pub use errors::{ErrorKind, RelationError};
pub use node::{BindingSide, NodePosition, RelationNode};
pub use plan::{
    Condition, JoinType, JoinedSet, Limit, PlanCondition, ProjectedProperty, QualifiedName,
    QueryPlan, SetReference, SortItem,
};
pub use reference::Reference;

/// A fully declared relation chain.
///
/// Nodes are stored front to back: the target, each waypoint in declaration
/// order, then the source. `references[i]` connects `nodes[i]` and `nodes[i + 1]`.
#[derive(Debug, Clone)]
pub struct Relation {
    config: CompilerConfig,
    nodes: Vec<RelationNode>,
    references: Vec<Reference>,
    /// Keyed by waypoint index (0 = first waypoint)
    waypoint_conditions: BTreeMap<usize, Vec<Condition>>,
    source_conditions: Vec<Condition>,
    visible_properties: Vec<ProjectedProperty>,
    sort_spec: Vec<SortItem>,
    limit: Option<Limit>,
}

impl Relation {
    /// Start declaring a relation towards `target` with the default configuration.
    ///
    /// An empty `target_property` means the target's single identifying property.
    pub fn create_on(
        target: &EntityRef,
        target_property: &[&str],
    ) -> Result<RelationBuilder, RelationError> {
        Self::create_on_with_config(&CompilerConfig::default(), target, target_property)
    }

    pub fn create_on_with_config(
        config: &CompilerConfig,
        target: &EntityRef,
        target_property: &[&str],
    ) -> Result<RelationBuilder, RelationError> {
        RelationBuilder::start(config, target, target_property)
    }

    pub(crate) fn from_draft(draft: Draft) -> Self {
        Relation {
            config: draft.config,
            nodes: draft.nodes,
            references: draft.references,
            waypoint_conditions: draft.waypoint_conditions,
            source_conditions: Vec::new(),
            visible_properties: Vec::new(),
            sort_spec: Vec::new(),
            limit: None,
        }
    }

    // ---------------------------------------------------------------------
    // Declaration
    // ---------------------------------------------------------------------

    /// Extra predicate on the source join. Repeated calls AND together.
    pub fn on(mut self, condition: &str, params: Vec<Value>) -> Result<Self, RelationError> {
        self.source_conditions
            .push(checked_condition(condition, params)?);
        Ok(self)
    }

    /// Add `property` to the projection.
    ///
    /// Unqualified names belong to the source; `<node>.*` projects a whole set.
    /// Showing the same property again replaces its alias in place.
    pub fn showing(mut self, property: &str, alias: Option<&str>) -> Result<Self, RelationError> {
        let qualified = self.resolve_property(property, true)?;
        if let Some(alias) = alias {
            if alias.trim().is_empty() {
                return Err(RelationError::declaration_with_context(
                    "empty output alias",
                    format!("showing({})", property),
                ));
            }
        }
        let alias = alias.map(str::to_string);

        match self
            .visible_properties
            .iter_mut()
            .find(|visible| visible.property == qualified)
        {
            Some(existing) => {
                if existing.alias != alias {
                    log::warn!(
                        "Projection of `{}` shown twice; alias {:?} replaces {:?}",
                        qualified,
                        alias,
                        existing.alias
                    );
                }
                existing.alias = alias;
            }
            None => self.visible_properties.push(ProjectedProperty {
                property: qualified,
                alias,
            }),
        }
        Ok(self)
    }

    /// Append a sort key. Sorting on an already sorted property changes its direction.
    pub fn sorted_by(mut self, property: &str, ascending: bool) -> Result<Self, RelationError> {
        let qualified = self.resolve_property(property, false)?;
        match self
            .sort_spec
            .iter_mut()
            .find(|item| item.property == qualified)
        {
            Some(existing) => existing.ascending = ascending,
            None => self.sort_spec.push(SortItem {
                property: qualified,
                ascending,
            }),
        }
        Ok(self)
    }

    pub fn limit(mut self, count: u64, offset: u64) -> Self {
        self.limit = Some(Limit { count, offset });
        self
    }

    fn resolve_property(
        &self,
        property: &str,
        allow_wildcard: bool,
    ) -> Result<QualifiedName, RelationError> {
        let qualified = QualifiedName::parse(property, self.source().name());
        let node = self.node(&qualified.qualifier).ok_or_else(|| {
            RelationError::declaration_with_context(
                format!("`{}` does not name a set of this relation", qualified.qualifier),
                property,
            )
        })?;

        if qualified.is_wildcard() {
            if allow_wildcard {
                return Ok(qualified);
            }
            return Err(RelationError::declaration_with_context(
                "cannot sort on every property of a set",
                property,
            ));
        }

        if !crate::utils::identifier::is_identifier(&qualified.property)
            || !node.entity().has_property(&qualified.property)
        {
            return Err(RelationError::declaration_with_context(
                format!(
                    "property `{}` is not declared on `{}`",
                    qualified.property,
                    node.entity().set_name()
                ),
                property,
            ));
        }
        Ok(qualified)
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[RelationNode] {
        &self.nodes
    }

    pub fn target(&self) -> &RelationNode {
        &self.nodes[0]
    }

    pub fn source(&self) -> &RelationNode {
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn waypoints(&self) -> &[RelationNode] {
        &self.nodes[1..self.nodes.len() - 1]
    }

    /// Waypoint by name (its alias, or its set name when unaliased)
    pub fn waypoint(&self, name: &str) -> Option<&RelationNode> {
        self.waypoints().iter().find(|node| node.name() == name)
    }

    /// Any node by the name it carries in compiled queries
    pub fn node(&self, name: &str) -> Option<&RelationNode> {
        self.nodes.iter().find(|node| node.name() == name)
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn reference(&self, position: usize) -> Result<&Reference, RelationError> {
        self.references
            .get(position)
            .ok_or(RelationError::ReferenceOutOfRange {
                position,
                count: self.references.len(),
            })
    }

    /// Conditions attached with `on` to the waypoint called `name`
    pub fn waypoint_conditions(&self, name: &str) -> &[Condition] {
        self.waypoints()
            .iter()
            .position(|node| node.name() == name)
            .and_then(|index| self.waypoint_conditions.get(&index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn source_conditions(&self) -> &[Condition] {
        &self.source_conditions
    }

    pub fn visible_properties(&self) -> &[ProjectedProperty] {
        &self.visible_properties
    }

    pub fn sort_spec(&self) -> &[SortItem] {
        &self.sort_spec
    }

    pub fn declared_limit(&self) -> Option<Limit> {
        self.limit
    }

    // ---------------------------------------------------------------------
    // Binding
    // ---------------------------------------------------------------------

    /// Bind the reference at `position`. Values may be keyed by either side's
    /// properties.
    pub fn bind_reference(
        &mut self,
        position: usize,
        values: &PropertyValues,
    ) -> Result<(), RelationError> {
        let reference = self.reference(position)?.clone();
        reference.bind(&mut self.nodes, values)
    }

    /// Bind the first hop to one target instance
    pub fn bind_target_id(&mut self, id: &EntityId) -> Result<(), RelationError> {
        let properties = self.target().properties(BindingSide::Successor);
        if id.width() != properties.len() {
            return Err(RelationError::ArityMismatch {
                expected: properties.len(),
                actual: id.width(),
            });
        }
        let values: PropertyValues = properties
            .iter()
            .cloned()
            .zip(id.components().into_iter().cloned())
            .collect();
        self.bind_reference(0, &values)
    }

    pub fn unbind_reference(&mut self, position: usize) -> Result<(), RelationError> {
        let reference = self.reference(position)?.clone();
        reference.unbind(&mut self.nodes);
        Ok(())
    }

    pub fn is_reference_bound(&self, position: usize) -> Result<bool, RelationError> {
        Ok(self.reference(position)?.is_bound(&self.nodes))
    }

    pub fn reference_binding(
        &self,
        position: usize,
    ) -> Result<Option<&PropertyValues>, RelationError> {
        Ok(self.reference(position)?.binding_values(&self.nodes))
    }

    /// The reference on the far side of `node_index` when walking from the
    /// reference at `position`
    pub fn opposite_reference_at(
        &self,
        position: usize,
        node_index: usize,
    ) -> Result<Option<&Reference>, RelationError> {
        let reference = self.reference(position)?;
        Ok(reference
            .opposite_reference_at(node_index, self.references.len())
            .and_then(|index| self.references.get(index)))
    }
}
