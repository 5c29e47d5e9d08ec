//! Parser configuration resolution
//!
//! Caller overrides are merged over the defaults key by key. Dialect
//! characters are not checked here; the CSV reader rejects unusable ones
//! when it opens the file.

use crate::types::{ParserConfig, ParserConfigOverrides};

use super::error::IngestError;

/// Decode the raw `config` blob sent with an import.
///
/// A missing or blank blob means "no overrides".
pub fn parse_overrides(raw: Option<&str>) -> Result<ParserConfigOverrides, IngestError> {
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(ParserConfigOverrides::default()),
    };

    let overrides: ParserConfigOverrides =
        serde_json::from_str(raw).map_err(|e| IngestError::MalformedConfig(e.to_string()))?;

    if overrides.batch_limit == Some(0) {
        return Err(IngestError::MalformedConfig(
            "batchLimit must be greater than zero".to_string(),
        ));
    }

    Ok(overrides)
}

/// Shallow merge of `overrides` over the default parser configuration
pub fn resolve(overrides: ParserConfigOverrides) -> ParserConfig {
    let defaults = ParserConfig::default();
    ParserConfig {
        delimiter: overrides.delimiter.unwrap_or(defaults.delimiter),
        enclosure: overrides.enclosure.unwrap_or(defaults.enclosure),
        escape: overrides.escape.unwrap_or(defaults.escape),
        batch_limit: overrides.batch_limit.unwrap_or(defaults.batch_limit),
        extra: overrides.extra,
    }
}

/// Decode and resolve in one step
pub fn resolve_raw(raw: Option<&str>) -> Result<ParserConfig, IngestError> {
    parse_overrides(raw).map(resolve)
}
