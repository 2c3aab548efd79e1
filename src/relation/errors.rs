//! # Relation Error Types
//!
//! Errors raised while declaring, binding, compiling and executing relations.
//!
//! ## Error Categories
//!
//! - **Declaration**: the relation or one of its entities was declared wrongly.
//!   Raised before any I/O and never recovered; they abort relation construction.
//! - **Binding**: values supplied to a node or reference do not match its arity.
//!   Local to the bind call; the caller may retry with corrected values.
//! - **Datasource**: schema creation or query execution failed. Not retried here.
//! - **Structural**: the relation was used out of order (rebinding a bound
//!   reference, addressing a reference that does not exist).

use thiserror::Error;

use crate::datasource::DatasourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Declaration,
    Binding,
    Datasource,
    Structural,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RelationError {
    #[error("Invalid declaration: {0}")]
    InvalidDeclaration(String),

    #[error("Entity `{set_name}` has a composite identifier [{properties}]; name the property explicitly")]
    AmbiguousIdentifier { set_name: String, properties: String },

    #[error("Waypoint `{name}` is already part of this relation; give it a distinct alias")]
    CircularWaypoint { name: String },

    #[error("`{predecessor}` cannot be followed by `{successor}` in a relation chain")]
    IncompatibleEndpoints {
        predecessor: String,
        successor: String,
    },

    #[error("`{predecessor}` binds {predecessor_width} properties towards `{successor}`, which binds {successor_width}")]
    WidthMismatch {
        predecessor: String,
        successor: String,
        predecessor_width: usize,
        successor_width: usize,
    },

    #[error("Cannot infer reference direction between `{predecessor}` and `{successor}`: {reason}")]
    AmbiguousDirection {
        predecessor: String,
        successor: String,
        reason: String,
    },

    #[error("Binding for `{node}` expects properties [{expected}] but got [{actual}]")]
    BindingArityMismatch {
        node: String,
        expected: String,
        actual: String,
    },

    #[error("Expected {expected} values but got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Reference `{predecessor}` -> `{successor}` is already bound; unbind it first")]
    AlreadyBound {
        predecessor: String,
        successor: String,
    },

    #[error("No reference at position {position} (relation has {count})")]
    ReferenceOutOfRange { position: usize, count: usize },

    #[error(transparent)]
    Datasource(#[from] DatasourceError),
}

impl RelationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelationError::InvalidDeclaration(_)
            | RelationError::AmbiguousIdentifier { .. }
            | RelationError::CircularWaypoint { .. }
            | RelationError::IncompatibleEndpoints { .. }
            | RelationError::WidthMismatch { .. }
            | RelationError::AmbiguousDirection { .. } => ErrorKind::Declaration,
            RelationError::BindingArityMismatch { .. } | RelationError::ArityMismatch { .. } => {
                ErrorKind::Binding
            }
            RelationError::Datasource(_) => ErrorKind::Datasource,
            RelationError::AlreadyBound { .. } | RelationError::ReferenceOutOfRange { .. } => {
                ErrorKind::Structural
            }
        }
    }

    /// Create an InvalidDeclaration error with context information
    ///
    /// # Example
    /// ```ignore
    /// RelationError::declaration_with_context(
    ///     "property `grp_id` not found in `memberships`",
    ///     "via(memberships, grp_id, person_id)",
    /// )
    /// ```
    pub fn declaration_with_context(
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        let msg = message.into();
        let ctx = context.into();
        RelationError::InvalidDeclaration(format!("{}\n  Context: {}", msg, ctx))
    }
}
