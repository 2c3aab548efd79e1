use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

use super::EntityDescriptor;
use crate::datasource::Datasource;
use crate::relation::errors::RelationError;

type RegistryKey = (String, String);

/// Remembers which (set name, datasource identity) pairs already have their schema.
///
/// Owned by the caller and shared by every relation that talks to the same
/// datasources. Each key gets its own once-cell: concurrent first use of one key
/// performs a single creation while other keys proceed independently. A failed
/// creation leaves the key uninitialized so a later call tries again.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: Mutex<HashMap<RegistryKey, Arc<OnceCell<()>>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ensure(
        &self,
        entity: &EntityDescriptor,
        datasource: &dyn Datasource,
    ) -> Result<(), RelationError> {
        let key = (entity.set_name().to_string(), datasource.identity());
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.entry(key).or_default().clone()
        };

        if cell.initialized() {
            return Ok(());
        }

        cell.get_or_try_init(|| async {
            log::debug!(
                "Ensuring schema for `{}` on {}",
                entity.set_name(),
                datasource.identity()
            );
            entity.create_schema(datasource).await
        })
        .await?;
        Ok(())
    }

    /// Whether the schema for `set_name` is known present on `identity`
    pub fn is_present(&self, set_name: &str, identity: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(set_name.to_string(), identity.to_string()))
            .is_some_and(|cell| cell.initialized())
    }
}
