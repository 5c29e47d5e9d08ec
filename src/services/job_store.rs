//! Import job persistence

#[cfg(test)]
use std::collections::HashMap;

#[cfg(test)]
use chrono::Utc;
#[cfg(test)]
use parking_lot::Mutex;
use sqlx::PgPool;
use thiserror::Error;
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::db::queries;
use crate::types::{ImportJob, NewImportJob};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("stored job {0} has unknown status '{1}'")]
    UnknownStatus(Uuid, String),
    #[error("{0}")]
    Backend(String),
}

/// Durable storage for import job records.
///
/// `persist` writes exactly one record; on error nothing is visible.
pub trait ImportJobStore: Send + Sync {
    fn persist(&self, job: NewImportJob) -> Result<ImportJob, StoreError>;

    /// Look up a job created by `created_by`. Jobs of other owners are
    /// reported as missing.
    fn find(&self, id: Uuid, created_by: Uuid) -> Result<Option<ImportJob>, StoreError>;
}

// ==========================================================================
// In-memory store (tests)
// ==========================================================================

/// Store keeping jobs in a map
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryImportJobStore {
    jobs: Mutex<HashMap<Uuid, ImportJob>>,
    fail_with: Mutex<Option<String>>,
}

#[cfg(test)]
impl InMemoryImportJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `persist` fail with a backend error
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_with.lock() = Some(message.into());
    }

    pub fn get(&self, id: &Uuid) -> Option<ImportJob> {
        self.jobs.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

#[cfg(test)]
impl ImportJobStore for InMemoryImportJobStore {
    fn persist(&self, job: NewImportJob) -> Result<ImportJob, StoreError> {
        if let Some(message) = self.fail_with.lock().take() {
            return Err(StoreError::Backend(message));
        }
        let job = job.into_persisted(Uuid::new_v4(), Utc::now());
        self.jobs.lock().insert(job.id, job.clone());
        Ok(job)
    }

    fn find(&self, id: Uuid, created_by: Uuid) -> Result<Option<ImportJob>, StoreError> {
        Ok(self
            .jobs
            .lock()
            .get(&id)
            .filter(|job| job.created_by == created_by)
            .cloned())
    }
}

// ==========================================================================
// PostgreSQL store
// ==========================================================================

/// Store writing to the `import_jobs` table.
///
/// Must be called from a blocking thread (`spawn_blocking`).
pub struct PgImportJobStore {
    pool: PgPool,
    handle: Handle,
}

impl PgImportJobStore {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }
}

impl ImportJobStore for PgImportJobStore {
    fn persist(&self, job: NewImportJob) -> Result<ImportJob, StoreError> {
        self.handle
            .block_on(queries::import_job::insert_import_job(&self.pool, job))
    }

    fn find(&self, id: Uuid, created_by: Uuid) -> Result<Option<ImportJob>, StoreError> {
        self.handle
            .block_on(queries::import_job::get_import_job(&self.pool, id, created_by))
    }
}
