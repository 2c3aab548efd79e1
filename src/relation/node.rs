use std::collections::HashSet;

use serde::Serialize;

use crate::entity::{EntityRef, PropertyValues};
use crate::relation::errors::RelationError;

/// Where a node sits in its relation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodePosition {
    Target,
    Waypoint,
    Source,
}

impl NodePosition {
    /// Chain ends accept one neighbour, waypoints accept both
    pub fn accepts_predecessor(&self) -> bool {
        matches!(self, NodePosition::Waypoint | NodePosition::Source)
    }

    pub fn accepts_successor(&self) -> bool {
        matches!(self, NodePosition::Target | NodePosition::Waypoint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSide {
    Predecessor,
    Successor,
}

/// One endpoint of a relation chain
#[derive(Debug, Clone)]
pub struct RelationNode {
    entity: EntityRef,
    name: String,
    alias: Option<String>,
    position: NodePosition,
    predecessor_properties: Vec<String>,
    successor_properties: Vec<String>,
    predecessor_binding: Option<PropertyValues>,
    successor_binding: Option<PropertyValues>,
    accepts_predecessor: bool,
    accepts_successor: bool,
}

impl RelationNode {
    /// `name` is the alias the node's set gets in compiled queries.
    /// Properties on a side the position does not accept are dropped.
    pub fn new(
        entity: EntityRef,
        position: NodePosition,
        name: impl Into<String>,
        alias: Option<String>,
        predecessor_properties: Vec<String>,
        successor_properties: Vec<String>,
    ) -> Self {
        let accepts_predecessor = position.accepts_predecessor();
        let accepts_successor = position.accepts_successor();
        RelationNode {
            entity,
            name: name.into(),
            alias,
            position,
            predecessor_properties: if accepts_predecessor {
                predecessor_properties
            } else {
                Vec::new()
            },
            successor_properties: if accepts_successor {
                successor_properties
            } else {
                Vec::new()
            },
            predecessor_binding: None,
            successor_binding: None,
            accepts_predecessor,
            accepts_successor,
        }
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn position(&self) -> NodePosition {
        self.position
    }

    pub fn accepts_predecessor(&self) -> bool {
        self.accepts_predecessor
    }

    pub fn accepts_successor(&self) -> bool {
        self.accepts_successor
    }

    pub fn properties(&self, side: BindingSide) -> &[String] {
        match side {
            BindingSide::Predecessor => &self.predecessor_properties,
            BindingSide::Successor => &self.successor_properties,
        }
    }

    /// A side can hold the referencing values unless it binds through exactly
    /// the entity's identifying properties, in any order.
    pub fn can_reference(&self, side: BindingSide) -> bool {
        let properties = self.properties(side);
        let ids = self.entity.id_properties();
        if properties.is_empty() {
            return false;
        }
        if properties.len() != ids.len() {
            return true;
        }
        let bound: HashSet<&String> = properties.iter().collect();
        bound != ids.iter().collect::<HashSet<&String>>()
    }

    /// `<node name>.<property>`
    pub fn qualified(&self, property: &str) -> String {
        format!("{}.{}", self.name, property)
    }

    pub fn bind_predecessor(&mut self, values: &PropertyValues) -> Result<(), RelationError> {
        self.bind(BindingSide::Predecessor, values)
    }

    pub fn bind_successor(&mut self, values: &PropertyValues) -> Result<(), RelationError> {
        self.bind(BindingSide::Successor, values)
    }

    /// Replace the binding on `side`.
    ///
    /// Keys must match the side's properties exactly; order does not matter and
    /// the stored binding follows the declared property order.
    pub fn bind(&mut self, side: BindingSide, values: &PropertyValues) -> Result<(), RelationError> {
        let canonical = self.canonicalize(side, values)?;
        match side {
            BindingSide::Predecessor => self.predecessor_binding = Some(canonical),
            BindingSide::Successor => self.successor_binding = Some(canonical),
        }
        Ok(())
    }

    pub fn unbind_predecessor(&mut self) {
        self.predecessor_binding = None;
    }

    pub fn unbind_successor(&mut self) {
        self.successor_binding = None;
    }

    pub fn unbind(&mut self, side: BindingSide) {
        match side {
            BindingSide::Predecessor => self.unbind_predecessor(),
            BindingSide::Successor => self.unbind_successor(),
        }
    }

    pub fn is_bound(&self, side: BindingSide) -> bool {
        self.binding(side).is_some()
    }

    pub fn binding(&self, side: BindingSide) -> Option<&PropertyValues> {
        match side {
            BindingSide::Predecessor => self.predecessor_binding.as_ref(),
            BindingSide::Successor => self.successor_binding.as_ref(),
        }
    }

    fn canonicalize(
        &self,
        side: BindingSide,
        values: &PropertyValues,
    ) -> Result<PropertyValues, RelationError> {
        let declared = self.properties(side);
        let expected: HashSet<&str> = declared.iter().map(String::as_str).collect();
        let actual: HashSet<&str> = values.keys().map(String::as_str).collect();

        if declared.is_empty() || expected != actual || declared.len() != values.len() {
            return Err(RelationError::BindingArityMismatch {
                node: self.name.clone(),
                expected: declared.join(", "),
                actual: values.keys().cloned().collect::<Vec<_>>().join(", "),
            });
        }

        Ok(declared
            .iter()
            .filter_map(|property| {
                values
                    .get(property)
                    .map(|value| (property.clone(), value.clone()))
            })
            .collect())
    }
}
