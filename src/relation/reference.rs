use crate::entity::PropertyValues;
use crate::relation::errors::RelationError;
use crate::relation::node::{BindingSide, RelationNode};

/// Directed edge between two adjacent nodes of a relation chain.
///
/// A reference stores indices into the owning relation's node list rather than
/// the nodes themselves; every accessor takes that list. Endpoints and direction
/// are fixed at construction, only the referencing side's binding changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    predecessor: usize,
    successor: usize,
    position: usize,
    referencing_is_left_to_right: bool,
}

impl Reference {
    /// Connect `nodes[predecessor]` to `nodes[successor]`.
    ///
    /// Validation order: accept flags, binding width, then direction (exactly one
    /// side must be able to reference).
    pub fn connect(
        nodes: &[RelationNode],
        predecessor: usize,
        successor: usize,
        position: usize,
    ) -> Result<Self, RelationError> {
        let left = &nodes[predecessor];
        let right = &nodes[successor];

        if !left.accepts_successor() || !right.accepts_predecessor() {
            return Err(RelationError::IncompatibleEndpoints {
                predecessor: left.name().to_string(),
                successor: right.name().to_string(),
            });
        }

        let left_width = left.properties(BindingSide::Successor).len();
        let right_width = right.properties(BindingSide::Predecessor).len();
        if left_width != right_width {
            return Err(RelationError::WidthMismatch {
                predecessor: left.name().to_string(),
                successor: right.name().to_string(),
                predecessor_width: left_width,
                successor_width: right_width,
            });
        }

        let referencing_is_left_to_right = match (
            left.can_reference(BindingSide::Successor),
            right.can_reference(BindingSide::Predecessor),
        ) {
            (true, false) => true,
            (false, true) => false,
            (both_can_reference, _) => {
                return Err(RelationError::AmbiguousDirection {
                    predecessor: left.name().to_string(),
                    successor: right.name().to_string(),
                    reason: if both_can_reference {
                        "neither side binds through its identifying properties".to_string()
                    } else {
                        "both sides bind through their identifying properties".to_string()
                    },
                })
            }
        };

        log::debug!(
            "Reference #{}: {} -> {} ({} references)",
            position,
            left.name(),
            right.name(),
            if referencing_is_left_to_right {
                left.name()
            } else {
                right.name()
            }
        );

        Ok(Reference {
            predecessor,
            successor,
            position,
            referencing_is_left_to_right,
        })
    }

    pub fn predecessor_index(&self) -> usize {
        self.predecessor
    }

    pub fn successor_index(&self) -> usize {
        self.successor
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn referencing_is_left_to_right(&self) -> bool {
        self.referencing_is_left_to_right
    }

    /// Node index and binding side holding the referencing values
    fn referencing_slot(&self) -> (usize, BindingSide) {
        if self.referencing_is_left_to_right {
            (self.predecessor, BindingSide::Successor)
        } else {
            (self.successor, BindingSide::Predecessor)
        }
    }

    fn referenced_slot(&self) -> (usize, BindingSide) {
        if self.referencing_is_left_to_right {
            (self.successor, BindingSide::Predecessor)
        } else {
            (self.predecessor, BindingSide::Successor)
        }
    }

    pub fn referencing_node<'a>(&self, nodes: &'a [RelationNode]) -> &'a RelationNode {
        &nodes[self.referencing_slot().0]
    }

    pub fn referenced_node<'a>(&self, nodes: &'a [RelationNode]) -> &'a RelationNode {
        &nodes[self.referenced_slot().0]
    }

    pub fn referencing_properties<'a>(&self, nodes: &'a [RelationNode]) -> &'a [String] {
        let (index, side) = self.referencing_slot();
        nodes[index].properties(side)
    }

    pub fn referenced_properties<'a>(&self, nodes: &'a [RelationNode]) -> &'a [String] {
        let (index, side) = self.referenced_slot();
        nodes[index].properties(side)
    }

    /// Pairs of qualified names joined by this edge, predecessor side first
    pub fn join_anchors(&self, nodes: &[RelationNode]) -> Vec<(String, String)> {
        let left = &nodes[self.predecessor];
        let right = &nodes[self.successor];
        left.properties(BindingSide::Successor)
            .iter()
            .zip(right.properties(BindingSide::Predecessor))
            .map(|(l, r)| (left.qualified(l), right.qualified(r)))
            .collect()
    }

    /// Reorder `values` into the referencing property order.
    ///
    /// Keys may name either the referencing properties or the referenced ones; in
    /// the latter case each value is carried over to its positional counterpart.
    pub fn normalize_values_for_binding(
        &self,
        nodes: &[RelationNode],
        values: &PropertyValues,
    ) -> Result<PropertyValues, RelationError> {
        let referencing = self.referencing_properties(nodes);
        if values.len() != referencing.len() {
            return Err(RelationError::ArityMismatch {
                expected: referencing.len(),
                actual: values.len(),
            });
        }

        let referenced = self.referenced_properties(nodes);
        let by_referencing: Option<PropertyValues> = referencing
            .iter()
            .map(|p| values.get(p).map(|v| (p.clone(), v.clone())))
            .collect();
        if let Some(normalized) = by_referencing {
            return Ok(normalized);
        }

        let by_referenced: Option<PropertyValues> = referencing
            .iter()
            .zip(referenced)
            .map(|(p, r)| values.get(r).map(|v| (p.clone(), v.clone())))
            .collect();
        match by_referenced {
            Some(normalized) => Ok(normalized),
            // Let the node report the key mismatch
            None => Ok(values.clone()),
        }
    }

    pub fn bind(
        &self,
        nodes: &mut [RelationNode],
        values: &PropertyValues,
    ) -> Result<(), RelationError> {
        if self.is_bound(nodes) {
            return Err(RelationError::AlreadyBound {
                predecessor: nodes[self.predecessor].name().to_string(),
                successor: nodes[self.successor].name().to_string(),
            });
        }
        let normalized = self.normalize_values_for_binding(nodes, values)?;
        let (index, side) = self.referencing_slot();
        nodes[index].bind(side, &normalized)
    }

    pub fn unbind(&self, nodes: &mut [RelationNode]) {
        let (index, side) = self.referencing_slot();
        nodes[index].unbind(side);
    }

    pub fn is_bound(&self, nodes: &[RelationNode]) -> bool {
        let (index, side) = self.referencing_slot();
        nodes[index].is_bound(side)
    }

    pub fn binding_values<'a>(&self, nodes: &'a [RelationNode]) -> Option<&'a PropertyValues> {
        let (index, side) = self.referencing_slot();
        nodes[index].binding(side)
    }

    /// Index of the neighbouring reference across `node_index`.
    ///
    /// The reference before this one when `node_index` is the predecessor, the one
    /// after it when it is the successor, `None` past either chain end or when the
    /// node is not an endpoint of this reference.
    pub fn opposite_reference_at(&self, node_index: usize, reference_count: usize) -> Option<usize> {
        if node_index == self.predecessor {
            self.position.checked_sub(1)
        } else if node_index == self.successor {
            let next = self.position + 1;
            (next < reference_count).then_some(next)
        } else {
            None
        }
    }
}
