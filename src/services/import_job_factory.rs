//! Import job record construction

use tracing::info;
use uuid::Uuid;

use crate::types::{
    default_overrides, FieldMapping, ImportJob, ImportJobStatus, NewImportJob, ParserConfig,
};

use super::csv_header_reader::CsvSummary;
use super::error::IngestError;
use super::file_stager::StagedFile;
use super::job_store::ImportJobStore;

/// Everything the pipeline has gathered about an accepted upload
#[derive(Debug, Clone)]
pub struct ImportJobParts {
    pub created_by: Uuid,
    pub mapping: FieldMapping,
    pub config: ParserConfig,
    pub staged: StagedFile,
    pub original_file: String,
    pub summary: CsvSummary,
}

/// Assemble the record the store will persist. Status is always `Queued`.
pub fn build(parts: ImportJobParts) -> NewImportJob {
    NewImportJob {
        created_by: parts.created_by,
        matched_fields: parts.mapping,
        directory: parts.staged.directory.to_string_lossy().into_owned(),
        file: parts.staged.file_name,
        original_file: parts.original_file,
        headers: parts.summary.headers,
        line_count: parts.summary.line_count,
        parser_config: parts.config,
        default_overrides: default_overrides(),
        status: ImportJobStatus::Queued,
    }
}

/// Builds and persists import jobs
pub struct ImportJobFactory<'a> {
    store: &'a dyn ImportJobStore,
}

impl<'a> ImportJobFactory<'a> {
    pub fn new(store: &'a dyn ImportJobStore) -> Self {
        Self { store }
    }

    pub fn create(&self, parts: ImportJobParts) -> Result<ImportJob, IngestError> {
        let job = self
            .store
            .persist(build(parts))
            .map_err(IngestError::PersistenceFailed)?;
        info!(
            "Import job {} queued: {} rows, {} mapped columns from '{}' at {}",
            job.id,
            job.line_count,
            job.matched_fields.len(),
            job.original_file,
            job.staged_path().display()
        );
        Ok(job)
    }
}
