//! Contact CSV ingestion pipeline
//!
//! A request moves through a fixed sequence of stages:
//!
//! `Start → AuthorizationChecked → FileAccepted → ConfigResolved →
//!  MappingValidated → FileStaged → HeadersRead → JobPersisted → Done`
//!
//! The first failing transition ends the run with a `Rejection` naming the
//! stage that could not be reached. Every step is blocking; run the
//! pipeline on a blocking thread.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::auth::{Authorizer, IMPORT_CONTACTS_PERMISSION};
use crate::types::{ImportJobSummary, UploadedFile};

use super::config_resolver;
use super::csv_header_reader;
use super::error::IngestError;
use super::field_registry::FieldRegistry;
use super::file_stager::{self, FileStager};
use super::import_job_factory::{ImportJobFactory, ImportJobParts};
use super::job_store::ImportJobStore;
use super::mapping_validator::{self, MappingValidator};
use super::storage::ImportStorage;

/// Pipeline progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Start,
    AuthorizationChecked,
    FileAccepted,
    ConfigResolved,
    MappingValidated,
    FileStaged,
    HeadersRead,
    JobPersisted,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Terminal failure of a pipeline run
#[derive(Debug)]
pub struct Rejection {
    /// Stage the failing step was trying to reach
    pub stage: Stage,
    pub error: IngestError,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.error, self.stage)
    }
}

/// One import submission, already decoded from the transport
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Identity the import directory and job record are scoped to
    pub owner_id: Uuid,
    pub files: Vec<UploadedFile>,
    pub mapping: Option<String>,
    pub config: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineSettings {
    /// Accept a mapping with zero columns
    pub allow_empty_mapping: bool,
}

/// Runs ingestion requests against shared collaborators
pub struct IngestionPipeline {
    registry: Arc<dyn FieldRegistry>,
    store: Arc<dyn ImportJobStore>,
    storage: Arc<dyn ImportStorage>,
    settings: PipelineSettings,
}

/// Perform one transition: on success the run advances to `next`,
/// on failure it is rejected at `next`.
fn step<T>(
    stage: &mut Stage,
    next: Stage,
    action: impl FnOnce() -> Result<T, IngestError>,
) -> Result<T, Rejection> {
    match action() {
        Ok(value) => {
            debug!("Ingestion {} -> {}", stage, next);
            *stage = next;
            Ok(value)
        }
        Err(error) => Err(Rejection { stage: next, error }),
    }
}

impl IngestionPipeline {
    pub fn new(
        registry: Arc<dyn FieldRegistry>,
        store: Arc<dyn ImportJobStore>,
        storage: Arc<dyn ImportStorage>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            store,
            storage,
            settings,
        }
    }

    pub fn run(
        &self,
        authorizer: &dyn Authorizer,
        request: IngestRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<ImportJobSummary, Rejection> {
        let result = self.execute(authorizer, request, cancel);
        if let Err(rejection) = &result {
            if rejection.error.is_infrastructure() {
                error!("Import rejected: {}", rejection);
            } else {
                warn!("Import rejected: {}", rejection);
            }
        }
        result
    }

    fn execute(
        &self,
        authorizer: &dyn Authorizer,
        request: IngestRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<ImportJobSummary, Rejection> {
        let mut stage = Stage::Start;

        step(&mut stage, Stage::AuthorizationChecked, || {
            if authorizer.is_granted(IMPORT_CONTACTS_PERMISSION) {
                Ok(())
            } else {
                Err(IngestError::Unauthorized)
            }
        })?;

        let IngestRequest {
            owner_id,
            mut files,
            mapping,
            config,
        } = request;

        let file = step(&mut stage, Stage::FileAccepted, || {
            if files.len() != 1 {
                return Err(IngestError::MissingOrMultipleFiles);
            }
            let file = files.remove(0);
            file_stager::ensure_csv_extension(&file)?;
            Ok(file)
        })?;

        let config = step(&mut stage, Stage::ConfigResolved, || {
            config_resolver::resolve_raw(config.as_deref())
        })?;

        let mapping = step(&mut stage, Stage::MappingValidated, || {
            let mapping = mapping_validator::parse_mapping(mapping.as_deref())?;
            MappingValidator::new(self.registry.as_ref(), self.settings.allow_empty_mapping)
                .validate(&mapping)?;
            Ok(mapping)
        })?;

        let staged = step(&mut stage, Stage::FileStaged, || {
            FileStager::new(self.storage.as_ref()).stage(&file, owner_id)
        })?;

        let summary = step(&mut stage, Stage::HeadersRead, || {
            csv_header_reader::read_file(&staged.path(), &config, cancel)
        })?;

        let job = step(&mut stage, Stage::JobPersisted, || {
            ImportJobFactory::new(self.store.as_ref()).create(ImportJobParts {
                created_by: owner_id,
                mapping,
                config,
                staged,
                original_file: file.original_name,
                summary,
            })
        })?;

        step(&mut stage, Stage::Done, || Ok(ImportJobSummary::from(job)))
    }
}
