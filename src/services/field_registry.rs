//! Contact field registry lookup
//!
//! The registry owns the list of contact fields an import may target.
//! The worker only reads it, as an existence set for mapping validation.

use std::collections::HashMap;

#[cfg(test)]
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::db::queries;

/// Metadata of a single contact field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub label: String,
    pub field_type: String,
    pub group: String,
    pub is_published: bool,
    pub is_editable: bool,
}

#[cfg(test)]
impl FieldMetadata {
    /// A published, editable text field in the `core` group
    pub fn text(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            field_type: "text".to_string(),
            group: "core".to_string(),
            is_published: true,
            is_editable: true,
        }
    }

    /// Whether the field passes the registry's list filter
    pub fn is_listed(&self, include_non_editable: bool, published_only: bool) -> bool {
        (include_non_editable || self.is_editable) && (!published_only || self.is_published)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read access to the contact field schema
pub trait FieldRegistry: Send + Sync {
    /// Fields keyed by field key (alias), filtered like the registry's own
    /// "all active fields" listing.
    fn field_list(
        &self,
        include_non_editable: bool,
        published_only: bool,
    ) -> Result<HashMap<String, FieldMetadata>, RegistryError>;
}

// ==========================================================================
// In-memory registry (tests)
// ==========================================================================

/// Registry backed by a fixed field set
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryFieldRegistry {
    fields: RwLock<HashMap<String, FieldMetadata>>,
}

#[cfg(test)]
impl InMemoryFieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry containing published text fields with the given keys
    pub fn with_fields<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let registry = Self::new();
        for key in keys {
            registry.insert(key, FieldMetadata::text(key));
        }
        registry
    }

    pub fn insert(&self, key: impl Into<String>, metadata: FieldMetadata) {
        self.fields.write().insert(key.into(), metadata);
    }
}

#[cfg(test)]
impl FieldRegistry for InMemoryFieldRegistry {
    fn field_list(
        &self,
        include_non_editable: bool,
        published_only: bool,
    ) -> Result<HashMap<String, FieldMetadata>, RegistryError> {
        Ok(self
            .fields
            .read()
            .iter()
            .filter(|(_, meta)| meta.is_listed(include_non_editable, published_only))
            .map(|(key, meta)| (key.clone(), meta.clone()))
            .collect())
    }
}

// ==========================================================================
// PostgreSQL registry
// ==========================================================================

/// Registry reading the `contact_fields` table.
///
/// Must be called from a blocking thread (`spawn_blocking`); the query is
/// driven to completion on the captured runtime handle.
pub struct PgFieldRegistry {
    pool: PgPool,
    handle: Handle,
}

impl PgFieldRegistry {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }
}

impl FieldRegistry for PgFieldRegistry {
    fn field_list(
        &self,
        include_non_editable: bool,
        published_only: bool,
    ) -> Result<HashMap<String, FieldMetadata>, RegistryError> {
        let rows = self.handle.block_on(queries::contact_field::list_fields(
            &self.pool,
            include_non_editable,
            published_only,
        ))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.alias,
                    FieldMetadata {
                        label: row.label,
                        field_type: row.field_type,
                        group: row.field_group,
                        is_published: row.is_published,
                        is_editable: row.is_editable,
                    },
                )
            })
            .collect())
    }
}
