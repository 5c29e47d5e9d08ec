//! Import directory layout and staged file naming

use std::path::PathBuf;

use chrono::Utc;
use uuid::Uuid;

/// Where staged uploads live and what they are called
pub trait ImportStorage: Send + Sync {
    /// Directory holding the staged imports of one caller
    fn import_dir(&self, owner_id: Uuid) -> PathBuf;

    /// A file name no other staging call will receive
    fn unique_file_name(&self) -> String;
}

/// Local filesystem layout: `<root>/<owner_id>/<timestamp>_<token>.csv`
#[derive(Debug, Clone)]
pub struct LocalImportStorage {
    root: PathBuf,
}

impl LocalImportStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImportStorage for LocalImportStorage {
    fn import_dir(&self, owner_id: Uuid) -> PathBuf {
        self.root.join(owner_id.to_string())
    }

    fn unique_file_name(&self) -> String {
        // the timestamp repeats within a second, the token does not
        let token: [u8; 16] = rand::random();
        format!(
            "{}_{}.csv",
            Utc::now().format("%Y%m%d%H%M%S"),
            hex::encode(token)
        )
    }
}
