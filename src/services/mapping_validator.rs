//! Column mapping validation against the contact field registry

use tracing::debug;

use crate::types::FieldMapping;

use super::error::IngestError;
use super::field_registry::FieldRegistry;

/// Registry filter used for the existence set: every published field,
/// editable or not.
const INCLUDE_NON_EDITABLE: bool = true;
const PUBLISHED_ONLY: bool = true;

/// Decode the raw `mapping` blob sent with an import.
///
/// Absent, blank, invalid JSON, non-object input and non-string targets
/// are all `MalformedMapping`.
pub fn parse_mapping(raw: Option<&str>) -> Result<FieldMapping, IngestError> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or(IngestError::MalformedMapping)?;
    serde_json::from_str(raw).map_err(|_| IngestError::MalformedMapping)
}

/// Check every mapped target with `field_exists`, in mapping order.
///
/// Stops at the first unknown target and names it.
pub fn validate_with<F>(mapping: &FieldMapping, field_exists: F) -> Result<(), IngestError>
where
    F: Fn(&str) -> bool,
{
    for (column, field) in mapping.iter() {
        if !field_exists(field) {
            debug!("Column '{}' maps to unknown field '{}'", column, field);
            return Err(IngestError::UnknownField(field.to_string()));
        }
    }
    Ok(())
}

/// Validates mappings against a field registry
pub struct MappingValidator<'a> {
    registry: &'a dyn FieldRegistry,
    allow_empty: bool,
}

impl<'a> MappingValidator<'a> {
    pub fn new(registry: &'a dyn FieldRegistry, allow_empty: bool) -> Self {
        Self {
            registry,
            allow_empty,
        }
    }

    pub fn validate(&self, mapping: &FieldMapping) -> Result<(), IngestError> {
        if mapping.is_empty() {
            return if self.allow_empty {
                Ok(())
            } else {
                Err(IngestError::EmptyMapping)
            };
        }

        let fields = self
            .registry
            .field_list(INCLUDE_NON_EDITABLE, PUBLISHED_ONLY)
            .map_err(IngestError::RegistryUnavailable)?;

        validate_with(mapping, |key| fields.contains_key(key))
    }
}
