//! Ingestion error taxonomy

use thiserror::Error;

use super::field_registry::RegistryError;
use super::job_store::StoreError;

/// How a rejection should be reported to the caller and to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller lacks the import permission
    Forbidden,
    /// Caller-correctable input problem
    BadRequest,
    /// Environment problem; alert on these separately
    Infrastructure,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Forbidden => "forbidden",
            ErrorClass::BadRequest => "badRequest",
            ErrorClass::Infrastructure => "infrastructure",
        }
    }
}

/// Reason an ingestion request was rejected
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("You do not have permission to import contacts.")]
    Unauthorized,

    #[error("You must upload exactly one CSV file.")]
    MissingOrMultipleFiles,

    #[error("Only CSV files are supported. Uploaded file type: {0}")]
    UnsupportedFileType(String),

    #[error("CSV column mapping is missing or not in JSON format.")]
    MalformedMapping,

    #[error("CSV column mapping must map at least one column.")]
    EmptyMapping,

    #[error("Import configuration is not a valid JSON object: {0}")]
    MalformedConfig(String),

    #[error("Unrecognized column mapping field: {0}")]
    UnknownField(String),

    #[error("Failed to stage uploaded file: {0}")]
    StagingFailed(#[source] std::io::Error),

    #[error("Parser option '{option}' must be a single ASCII character, got {value:?}")]
    InvalidDialect { option: &'static str, value: String },

    #[error("The uploaded CSV file is empty.")]
    EmptyFile,

    #[error("Failed to read CSV file: {0}")]
    MalformedCsv(#[source] csv::Error),

    #[error("Import was cancelled")]
    Cancelled,

    #[error("Field registry unavailable: {0}")]
    RegistryUnavailable(#[source] RegistryError),

    #[error("Failed to save import job: {0}")]
    PersistenceFailed(#[source] StoreError),
}

impl IngestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            IngestError::Unauthorized => ErrorClass::Forbidden,
            IngestError::StagingFailed(_)
            | IngestError::RegistryUnavailable(_)
            | IngestError::PersistenceFailed(_) => ErrorClass::Infrastructure,
            _ => ErrorClass::BadRequest,
        }
    }

    /// Stable error code used in `ErrorResponse`
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Unauthorized => "UNAUTHORIZED",
            IngestError::MissingOrMultipleFiles => "MISSING_OR_MULTIPLE_FILES",
            IngestError::UnsupportedFileType(_) => "UNSUPPORTED_FILE_TYPE",
            IngestError::MalformedMapping => "MALFORMED_MAPPING",
            IngestError::EmptyMapping => "EMPTY_MAPPING",
            IngestError::MalformedConfig(_) => "MALFORMED_CONFIG",
            IngestError::UnknownField(_) => "UNKNOWN_FIELD",
            IngestError::StagingFailed(_) => "STAGING_FAILED",
            IngestError::InvalidDialect { .. } => "INVALID_DIALECT",
            IngestError::EmptyFile => "EMPTY_FILE",
            IngestError::MalformedCsv(_) => "MALFORMED_CSV",
            IngestError::Cancelled => "CANCELLED",
            IngestError::RegistryUnavailable(_) => "REGISTRY_UNAVAILABLE",
            IngestError::PersistenceFailed(_) => "PERSISTENCE_FAILED",
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        self.class() == ErrorClass::Infrastructure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_field_message_names_the_field() {
        let err = IngestError::UnknownField("bogus_field".to_string());
        assert_eq!(err.to_string(), "Unrecognized column mapping field: bogus_field");
        assert_eq!(err.class(), ErrorClass::BadRequest);
    }

    #[test]
    fn test_unsupported_file_type_message() {
        let err = IngestError::UnsupportedFileType("txt".to_string());
        assert_eq!(
            err.to_string(),
            "Only CSV files are supported. Uploaded file type: txt"
        );
    }

    #[test]
    fn test_infrastructure_errors_are_classified_separately() {
        let staging = IngestError::StagingFailed(std::io::Error::other("disk full"));
        let persistence = IngestError::PersistenceFailed(StoreError::Backend("down".into()));
        assert!(staging.is_infrastructure());
        assert!(persistence.is_infrastructure());
        assert!(!IngestError::EmptyFile.is_infrastructure());
        assert_eq!(IngestError::Unauthorized.class(), ErrorClass::Forbidden);
    }

    #[test]
    fn test_codes_are_distinct_for_infrastructure_errors() {
        let staging = IngestError::StagingFailed(std::io::Error::other("x"));
        let persistence = IngestError::PersistenceFailed(StoreError::Backend("x".into()));
        assert_ne!(staging.code(), persistence.code());
    }
}
