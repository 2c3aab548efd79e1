use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::{DeclaredEntity, EntityDescriptor, EntityRef, EntitySchema};
use crate::relation::errors::RelationError;

/// Descriptor cache keyed by set name.
///
/// Describing the same entity twice hands back the first descriptor, so every
/// relation built from one catalog shares a single descriptor per set.
#[derive(Debug, Default)]
pub struct EntityCatalog {
    entries: RwLock<HashMap<String, EntityRef>>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declared(&self, entity: Arc<dyn DeclaredEntity>) -> Result<EntityRef, RelationError> {
        if let Some(existing) = self.get(entity.set_name()) {
            if !existing.is_virtual() {
                return Ok(existing);
            }
        }
        self.register(EntityDescriptor::describe_declared(entity)?)
    }

    pub fn virtual_entity(
        &self,
        set_name: &str,
        schema: EntitySchema,
        id_properties: Option<Vec<String>>,
    ) -> Result<EntityRef, RelationError> {
        self.register(EntityDescriptor::describe_virtual(
            set_name,
            schema,
            id_properties,
        )?)
    }

    /// Insert `descriptor`, or return the cached one when it describes the same set.
    ///
    /// A different definition under a cached set name is a declaration error.
    pub fn register(&self, descriptor: EntityDescriptor) -> Result<EntityRef, RelationError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(descriptor.set_name()) {
            if **existing == descriptor {
                return Ok(existing.clone());
            }
            return Err(RelationError::InvalidDeclaration(format!(
                "set `{}` is already described with a different definition",
                descriptor.set_name()
            )));
        }
        log::debug!(
            "Registered {} entity `{}`",
            if descriptor.is_virtual() { "virtual" } else { "declared" },
            descriptor.set_name()
        );
        let entry = Arc::new(descriptor);
        entries.insert(entry.set_name().to_string(), entry.clone());
        Ok(entry)
    }

    pub fn get(&self, set_name: &str) -> Option<EntityRef> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(set_name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
