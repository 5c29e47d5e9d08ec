//! Uploaded file and CSV import request types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A file received by the transport layer and written to a temporary path.
///
/// The worker only reads the metadata and moves the content; the temporary
/// file belongs to whoever received the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// File name as sent by the client
    pub original_name: String,
    /// Extension declared by the client (without the dot)
    pub extension: String,
    /// Temporary location of the uploaded bytes
    pub path: PathBuf,
}

impl UploadedFile {
    /// Build from the client file name, deriving the declared extension from it.
    pub fn new(original_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let original_name = original_name.into();
        let extension = Path::new(&original_name)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            original_name,
            extension,
            path: path.into(),
        }
    }
}

/// One file attached to an import submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    /// Client file name, e.g. `contacts.csv`
    pub name: String,
    /// Raw file content
    pub content: String,
}

/// Contact CSV import submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCsvRequest {
    #[serde(default)]
    pub files: Vec<UploadPayload>,
    /// JSON object `{"csv_column": "field_key", ...}` as a string
    #[serde(default)]
    pub mapping: Option<String>,
    /// JSON object overriding parser defaults, as a string
    #[serde(default)]
    pub config: Option<String>,
}
