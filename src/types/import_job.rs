//! Import job record types
//!
//! An import job describes a staged CSV file waiting for the batch
//! processing engine. The worker creates jobs in `Queued`; every later
//! transition belongs to the processing engine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FieldMapping, ParserConfig};

// ==========================================================================
// Tests First (TDD)
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> ImportJob {
        ImportJob {
            id: Uuid::nil(),
            created_by: Uuid::nil(),
            created_at: Utc::now(),
            matched_fields: [("email", "email")].into_iter().collect(),
            directory: "/var/imports/u1".to_string(),
            file: "20260101120000_ab.csv".to_string(),
            original_file: "contacts.csv".to_string(),
            headers: vec!["email".to_string()],
            line_count: 3,
            parser_config: ParserConfig::default(),
            default_overrides: default_overrides(),
            status: ImportJobStatus::Queued,
        }
    }

    #[test]
    fn test_import_job_status_serializes_uppercase() {
        let json = serde_json::to_string(&ImportJobStatus::Queued).unwrap();
        assert_eq!(json, "\"QUEUED\"");
    }

    #[test]
    fn test_import_job_status_round_trips_db_string() {
        for status in [
            ImportJobStatus::Queued,
            ImportJobStatus::Processing,
            ImportJobStatus::Completed,
            ImportJobStatus::Failed,
        ] {
            assert_eq!(ImportJobStatus::from_db(status.as_str()), Some(status));
        }
        assert_eq!(ImportJobStatus::from_db("stopped"), None);
    }

    #[test]
    fn test_default_overrides_unset_owner() {
        let defaults = default_overrides();
        assert_eq!(defaults.len(), 1);
        assert!(defaults["owner"].is_null());
    }

    #[test]
    fn test_import_job_serializes_camel_case() {
        let json = serde_json::to_value(sample_job()).unwrap();
        assert_eq!(json["lineCount"], 3);
        assert_eq!(json["originalFile"], "contacts.csv");
        assert_eq!(json["matchedFields"]["email"], "email");
        assert_eq!(json["status"], "QUEUED");
    }

    #[test]
    fn test_summary_wraps_job_under_import_job_key() {
        let summary = ImportJobSummary::from(sample_job());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["importJob"]["file"], "20260101120000_ab.csv");
    }

    #[test]
    fn test_staged_path_joins_directory_and_file() {
        let job = sample_job();
        assert_eq!(
            job.staged_path(),
            PathBuf::from("/var/imports/u1/20260101120000_ab.csv")
        );
    }
}

// ==========================================================================
// Import Job Types
// ==========================================================================

/// Lifecycle status of an import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportJobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ImportJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportJobStatus::Queued => "queued",
            ImportJobStatus::Processing => "processing",
            ImportJobStatus::Completed => "completed",
            ImportJobStatus::Failed => "failed",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(ImportJobStatus::Queued),
            "processing" => Some(ImportJobStatus::Processing),
            "completed" => Some(ImportJobStatus::Completed),
            "failed" => Some(ImportJobStatus::Failed),
            _ => None,
        }
    }
}

/// Field defaults applied by the processing engine to every imported row
pub type DefaultOverrides = serde_json::Map<String, serde_json::Value>;

/// Defaults every new job starts with: imported contacts get no owner.
pub fn default_overrides() -> DefaultOverrides {
    let mut defaults = DefaultOverrides::new();
    defaults.insert("owner".to_string(), serde_json::Value::Null);
    defaults
}

/// An import job before the store has assigned its identity
#[derive(Debug, Clone, PartialEq)]
pub struct NewImportJob {
    pub created_by: Uuid,
    pub matched_fields: FieldMapping,
    pub directory: String,
    pub file: String,
    pub original_file: String,
    pub headers: Vec<String>,
    pub line_count: u64,
    pub parser_config: ParserConfig,
    pub default_overrides: DefaultOverrides,
    pub status: ImportJobStatus,
}

impl NewImportJob {
    /// Attach the identity and creation time assigned by a store.
    pub fn into_persisted(self, id: Uuid, created_at: DateTime<Utc>) -> ImportJob {
        ImportJob {
            id,
            created_by: self.created_by,
            created_at,
            matched_fields: self.matched_fields,
            directory: self.directory,
            file: self.file,
            original_file: self.original_file,
            headers: self.headers,
            line_count: self.line_count,
            parser_config: self.parser_config,
            default_overrides: self.default_overrides,
            status: self.status,
        }
    }
}

/// A persisted import job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub matched_fields: FieldMapping,
    pub directory: String,
    pub file: String,
    pub original_file: String,
    pub headers: Vec<String>,
    pub line_count: u64,
    pub parser_config: ParserConfig,
    pub default_overrides: DefaultOverrides,
    pub status: ImportJobStatus,
}

impl ImportJob {
    pub fn staged_path(&self) -> PathBuf {
        PathBuf::from(&self.directory).join(&self.file)
    }
}

/// Response returned when an import job has been queued
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobSummary {
    pub import_job: ImportJob,
}

impl From<ImportJob> for ImportJobSummary {
    fn from(import_job: ImportJob) -> Self {
        Self { import_job }
    }
}

/// Request to look up a previously queued import job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetImportJobRequest {
    pub id: Uuid,
}
