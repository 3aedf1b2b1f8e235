//! Entity alias map - ORM entity names to physical tables and columns

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::extract::EntityMapping;

/// Read-only (after construction) map from ORM entity names to the
/// physical tables and columns they bind to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityAliasMap {
    entities: HashMap<String, EntityMapping>,
}

impl EntityAliasMap {
    pub fn add(&mut self, mapping: EntityMapping) {
        self.entities.insert(mapping.entity.clone(), mapping);
    }

    /// Physical table for an entity name, if the entity is known.
    pub fn table_for(&self, entity: &str) -> Option<&str> {
        self.entities.get(entity).map(|m| m.table.as_str())
    }

    /// Physical column for an entity field. Fields without an explicit
    /// column mapping default to the field name (JPA default).
    pub fn column_for(&self, entity: &str, field: &str) -> String {
        self.entities
            .get(entity)
            .and_then(|m| m.columns.get(field))
            .cloned()
            .unwrap_or_else(|| field.to_string())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
