//! Query compilation and execution for declared relations.
//!
//! `compile_query` is pure: it reads the declared chain and produces a
//! [`QueryPlan`]. `selector` and `render` compile, make sure every set in the
//! chain exists, then run the plan against a [`Datasource`].

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::datasource::{Datasource, ResultCursor};
use crate::entity::{EntityId, SchemaRegistry};
use crate::relation::errors::RelationError;
use crate::relation::node::BindingSide;
use crate::relation::plan::{
    JoinType, JoinedSet, Limit, PlanCondition, ProjectedProperty, QualifiedName, QueryPlan,
    SetReference,
};
use crate::relation::Relation;

/// Ordered serialized-id → label pairs for a choice widget
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SelectorOptions {
    entries: Map<String, Value>,
}

impl SelectorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repeated key keeps its first position and takes the new label
    pub fn insert(&mut self, key: String, label: String) {
        self.entries.insert(key, Value::String(label));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|label| (k.as_str(), label)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object in option order
    pub fn to_json(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}

/// Result of `render`: the executed rows plus the projection that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct RelationView {
    pub columns: Vec<ProjectedProperty>,
    pub cursor: ResultCursor,
}

impl Relation {
    /// Compile the declared chain into a query plan.
    ///
    /// With `bound_target_id`, the result is filtered to that target instance.
    /// Bound references add equality filters on their referencing properties.
    pub fn compile_query(
        &self,
        bound_target_id: Option<&EntityId>,
    ) -> Result<QueryPlan, RelationError> {
        let target = self.target();
        let mut plan = QueryPlan::new(SetReference::new(
            target.entity().set_name(),
            target.name(),
        ));

        for reference in self.references() {
            let successor_index = reference.successor_index();
            let successor = &self.nodes()[successor_index];

            let mut joining_on: Vec<PlanCondition> = reference
                .join_anchors(self.nodes())
                .into_iter()
                .map(|(left, right)| PlanCondition::Equals {
                    left: QualifiedName::parse(&left, ""),
                    right: QualifiedName::parse(&right, ""),
                })
                .collect();

            let extra = if successor_index == self.nodes().len() - 1 {
                self.source_conditions()
            } else {
                self.waypoint_conditions(successor.name())
            };
            joining_on.extend(extra.iter().cloned().map(PlanCondition::Template));

            plan.joins.push(JoinedSet {
                set: SetReference::new(successor.entity().set_name(), successor.name()),
                join_type: JoinType::Inner,
                joining_on,
            });
        }

        if let Some(id) = bound_target_id {
            let properties = target.properties(BindingSide::Successor);
            if id.width() != properties.len() {
                return Err(RelationError::ArityMismatch {
                    expected: properties.len(),
                    actual: id.width(),
                });
            }
            for (property, value) in properties.iter().zip(id.components()) {
                plan.filters.push(PlanCondition::Bound {
                    property: QualifiedName::new(target.name(), property.as_str()),
                    value: value.clone(),
                });
            }
        }

        for reference in self.references() {
            if let Some(values) = reference.binding_values(self.nodes()) {
                let node = reference.referencing_node(self.nodes());
                for (property, value) in values {
                    plan.filters.push(PlanCondition::Bound {
                        property: QualifiedName::new(node.name(), property.as_str()),
                        value: value.clone(),
                    });
                }
            }
        }

        plan.projection = if self.visible_properties().is_empty() {
            vec![ProjectedProperty {
                property: QualifiedName::all(self.source().name()),
                alias: None,
            }]
        } else {
            self.visible_properties().to_vec()
        };
        plan.sort = self.sort_spec().to_vec();
        plan.limit = self.declared_limit();

        log::debug!(
            "Compiled relation {} -> {}: {} joins, {} filters, {} params",
            self.source().entity().set_name(),
            target.entity().set_name(),
            plan.joins.len(),
            plan.filters.len(),
            plan.params().len()
        );
        Ok(plan)
    }

    /// Plan projecting the source's id and label properties, aliased by
    /// property name, capped by the configured selector limit
    pub fn compile_selector(
        &self,
        bound_target_id: Option<&EntityId>,
    ) -> Result<QueryPlan, RelationError> {
        let mut plan = self.compile_query(bound_target_id)?;
        let source = self.source();

        let mut seen = HashSet::new();
        plan.projection = source
            .entity()
            .id_properties()
            .iter()
            .chain(source.entity().label_properties())
            .filter(|property| seen.insert(property.as_str()))
            .map(|property| ProjectedProperty {
                property: QualifiedName::new(source.name(), property.as_str()),
                alias: Some(property.clone()),
            })
            .collect();

        let cap = u64::from(self.config().selector_limit);
        if cap > 0 {
            plan.limit = Some(match plan.limit {
                Some(limit) => Limit {
                    count: limit.count.min(cap),
                    offset: limit.offset,
                },
                None => Limit {
                    count: cap,
                    offset: 0,
                },
            });
        }
        Ok(plan)
    }

    /// Create every set the chain touches, memoized in `registry`
    pub async fn ensure_schema(
        &self,
        registry: &SchemaRegistry,
        datasource: &dyn Datasource,
    ) -> Result<(), RelationError> {
        let mut seen = HashSet::new();
        for node in self.nodes() {
            if seen.insert(node.entity().set_name()) {
                node.entity().ensure_schema_present(registry, datasource).await?;
            }
        }
        Ok(())
    }

    /// Serialized source id → formatted label, in result order
    pub async fn selector(
        &self,
        datasource: &dyn Datasource,
        registry: &SchemaRegistry,
        bound_target_id: Option<&EntityId>,
    ) -> Result<SelectorOptions, RelationError> {
        let plan = self.compile_selector(bound_target_id)?;
        self.ensure_schema(registry, datasource).await?;
        let cursor = execute_plan(&plan, datasource).await?;

        let entity = self.source().entity();
        let mut options = SelectorOptions::new();
        for row in cursor {
            let components: Vec<Value> = entity
                .id_properties()
                .iter()
                .map(|property| row.get(property).cloned().unwrap_or(Value::Null))
                .collect();
            let key = EntityId::from_components(components).serialize_with(&self.config().id_separator);
            options.insert(key, entity.format_label(&row));
        }

        log::debug!(
            "Selector for {} returned {} options",
            entity.set_name(),
            options.len()
        );
        Ok(options)
    }

    /// Execute the declared projection
    pub async fn render(
        &self,
        datasource: &dyn Datasource,
        registry: &SchemaRegistry,
        bound_target_id: Option<&EntityId>,
    ) -> Result<RelationView, RelationError> {
        let plan = self.compile_query(bound_target_id)?;
        self.ensure_schema(registry, datasource).await?;
        let cursor = execute_plan(&plan, datasource).await?;
        Ok(RelationView {
            columns: plan.projection,
            cursor,
        })
    }
}

/// Run `plan` through a query created by `datasource`
pub async fn execute_plan(
    plan: &QueryPlan,
    datasource: &dyn Datasource,
) -> Result<ResultCursor, RelationError> {
    let quote = |name: &str| datasource.quote_identifier(name);
    let mut query = datasource.create_query(&plan.root_expression(&quote));
    plan.write_to(query.as_mut(), &quote);
    Ok(query.execute().await?)
}
