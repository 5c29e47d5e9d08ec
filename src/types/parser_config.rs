//! CSV parser configuration stored on an import job

use serde::{Deserialize, Serialize};

pub const DEFAULT_DELIMITER: &str = ",";
pub const DEFAULT_ENCLOSURE: &str = "\"";
pub const DEFAULT_ESCAPE: &str = "\"";
pub const DEFAULT_BATCH_LIMIT: u32 = 200;

/// Dialect and batching settings the processing engine reads the file with.
///
/// The dialect characters are kept as the caller sent them; whether they are
/// usable single characters is decided when the file is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserConfig {
    pub delimiter: String,
    pub enclosure: String,
    pub escape: String,
    pub batch_limit: u32,
    /// Keys the worker does not interpret, passed through to the job record.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            enclosure: DEFAULT_ENCLOSURE.to_string(),
            escape: DEFAULT_ESCAPE.to_string(),
            batch_limit: DEFAULT_BATCH_LIMIT,
            extra: serde_json::Map::new(),
        }
    }
}

/// Caller-supplied overrides; every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserConfigOverrides {
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub enclosure: Option<String>,
    #[serde(default)]
    pub escape: Option<String>,
    #[serde(default, alias = "batchlimit")]
    pub batch_limit: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
