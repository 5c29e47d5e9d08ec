//! Staging of uploaded CSV files
//!
//! Moves an upload into the caller's import directory under a fresh,
//! collision-free name. A staged file is not removed when a later step
//! fails; orphans are reclaimed by an external sweep.

use std::fs::{self, DirBuilder};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::UploadedFile;

use super::error::IngestError;
use super::storage::ImportStorage;

#[cfg(unix)]
const IMPORT_DIR_MODE: u32 = 0o755;

/// A file moved into application-owned storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Absolute import directory
    pub directory: PathBuf,
    /// Generated file name inside `directory`
    pub file_name: String,
}

impl StagedFile {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// The client-declared extension must be `csv`, in any case.
pub fn ensure_csv_extension(file: &UploadedFile) -> Result<(), IngestError> {
    if file.extension.eq_ignore_ascii_case("csv") {
        Ok(())
    } else {
        Err(IngestError::UnsupportedFileType(file.extension.clone()))
    }
}

/// Create `dir` and its parents (mode 0755) unless it already exists.
///
/// Succeeds when another caller creates the directory concurrently.
pub fn ensure_import_dir(dir: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(IMPORT_DIR_MODE);
    }
    builder.create(dir)
}

/// Move `source` to `destination`, copying across filesystems when a
/// rename is not possible.
fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            debug!(
                "Rename {} -> {} failed ({}), falling back to copy",
                source.display(),
                destination.display(),
                e
            );
            copy_then_remove(source, destination, |from, to| fs::copy(from, to))
        }
    }
}

/// Copy `source` over with `copy`, then delete it. A failed copy leaves no
/// partial destination behind.
fn copy_then_remove<C>(source: &Path, destination: &Path, copy: C) -> io::Result<()>
where
    C: FnOnce(&Path, &Path) -> io::Result<u64>,
{
    if let Err(e) = copy(source, destination) {
        match fs::remove_file(destination) {
            Ok(()) => debug!("Removed partial copy {}", destination.display()),
            Err(cleanup) if cleanup.kind() == io::ErrorKind::NotFound => {}
            Err(cleanup) => warn!(
                "Failed to remove partial copy {}: {}",
                destination.display(),
                cleanup
            ),
        }
        return Err(e);
    }
    fs::remove_file(source)
}

/// Stages uploads using an `ImportStorage` layout
pub struct FileStager<'a> {
    storage: &'a dyn ImportStorage,
}

impl<'a> FileStager<'a> {
    pub fn new(storage: &'a dyn ImportStorage) -> Self {
        Self { storage }
    }

    pub fn stage(&self, file: &UploadedFile, owner_id: Uuid) -> Result<StagedFile, IngestError> {
        ensure_csv_extension(file)?;

        let directory = self.storage.import_dir(owner_id);
        ensure_import_dir(&directory).map_err(IngestError::StagingFailed)?;
        let directory = directory
            .canonicalize()
            .map_err(IngestError::StagingFailed)?;

        let file_name = self.storage.unique_file_name();
        let destination = directory.join(&file_name);

        match fs::remove_file(&destination) {
            Ok(()) => warn!("Replaced stale file at {}", destination.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(IngestError::StagingFailed(e)),
        }

        move_file(&file.path, &destination).map_err(IngestError::StagingFailed)?;
        debug!(
            "Staged '{}' as {}",
            file.original_name,
            destination.display()
        );

        Ok(StagedFile {
            directory,
            file_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::LocalImportStorage;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    /// Storage that always hands out the same name
    struct FixedNameStorage {
        root: PathBuf,
    }

    impl ImportStorage for FixedNameStorage {
        fn import_dir(&self, owner_id: Uuid) -> PathBuf {
            self.root.join(owner_id.to_string())
        }

        fn unique_file_name(&self) -> String {
            "fixed.csv".to_string()
        }
    }

    fn upload(dir: &Path, name: &str, content: &str) -> UploadedFile {
        let path = dir.join(format!("{}.upload", Uuid::new_v4()));
        fs::write(&path, content).unwrap();
        UploadedFile::new(name, path)
    }

    #[test]
    fn test_ensure_csv_extension_is_case_insensitive() {
        assert!(ensure_csv_extension(&UploadedFile::new("a.CSV", "/x")).is_ok());
        assert!(ensure_csv_extension(&UploadedFile::new("a.Csv", "/x")).is_ok());
        let err = ensure_csv_extension(&UploadedFile::new("a.txt", "/x")).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFileType(ref ext) if ext == "txt"));
    }

    #[test]
    fn test_stage_moves_upload_into_owner_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalImportStorage::new(tmp.path().join("imports"));
        let owner = Uuid::new_v4();
        let file = upload(tmp.path(), "contacts.csv", "email\na@b.cz\n");

        let staged = FileStager::new(&storage).stage(&file, owner).unwrap();

        assert!(staged.directory.is_absolute());
        assert!(staged.directory.ends_with(owner.to_string()));
        assert_eq!(fs::read_to_string(staged.path()).unwrap(), "email\na@b.cz\n");
        assert!(!file.path.exists(), "upload must be moved, not copied");
    }

    #[cfg(unix)]
    #[test]
    fn test_import_dir_created_with_0755() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a/b/c");
        ensure_import_dir(&dir).unwrap();
        let mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        // umask may clear bits but never adds any
        assert_eq!(mode & !IMPORT_DIR_MODE, 0);
        assert!(mode & 0o700 == 0o700);
    }

    #[test]
    fn test_ensure_import_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("imports");
        ensure_import_dir(&dir).unwrap();
        ensure_import_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_stage_twice_into_existing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalImportStorage::new(tmp.path().join("imports"));
        let owner = Uuid::new_v4();
        let stager = FileStager::new(&storage);

        let first = stager.stage(&upload(tmp.path(), "a.csv", "x\n1\n"), owner).unwrap();
        let second = stager.stage(&upload(tmp.path(), "b.csv", "y\n2\n"), owner).unwrap();

        assert_eq!(first.directory, second.directory);
        assert_ne!(first.file_name, second.file_name);
    }

    #[test]
    fn test_stage_replaces_stale_file_at_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FixedNameStorage {
            root: tmp.path().join("imports"),
        };
        let owner = Uuid::new_v4();
        let stale_dir = storage.import_dir(owner);
        fs::create_dir_all(&stale_dir).unwrap();
        fs::write(stale_dir.join("fixed.csv"), "stale content that is longer\n").unwrap();

        let staged = FileStager::new(&storage)
            .stage(&upload(tmp.path(), "a.csv", "new\n"), owner)
            .unwrap();

        assert_eq!(fs::read_to_string(staged.path()).unwrap(), "new\n");
    }

    #[test]
    fn test_stage_rejects_txt_without_touching_storage() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("imports");
        let storage = LocalImportStorage::new(&root);
        let file = upload(tmp.path(), "contacts.txt", "email\n");

        let err = FileStager::new(&storage).stage(&file, Uuid::new_v4()).unwrap_err();

        assert!(matches!(err, IngestError::UnsupportedFileType(_)));
        assert!(!root.exists());
        assert!(file.path.exists());
    }

    #[test]
    fn test_stage_missing_source_is_staging_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalImportStorage::new(tmp.path().join("imports"));
        let file = UploadedFile::new("a.csv", tmp.path().join("does-not-exist"));

        let err = FileStager::new(&storage).stage(&file, Uuid::new_v4()).unwrap_err();

        assert!(matches!(err, IngestError::StagingFailed(ref e) if e.kind() == io::ErrorKind::NotFound));
        assert!(err.is_infrastructure());
    }

    #[test]
    fn test_failed_copy_leaves_no_partial_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("upload");
        let destination = tmp.path().join("staged.csv");
        fs::write(&source, "email\na@b.cz\n").unwrap();

        let err = copy_then_remove(&source, &destination, |_, dst| {
            fs::write(dst, "ema")?;
            Err(io::Error::other("no space left on device"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "no space left on device");
        assert!(!destination.exists());
        assert!(source.exists());
    }

    #[test]
    fn test_copy_then_remove_moves_content() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("upload");
        let destination = tmp.path().join("staged.csv");
        fs::write(&source, "email\n").unwrap();

        copy_then_remove(&source, &destination, |from, to| fs::copy(from, to)).unwrap();

        assert_eq!(fs::read_to_string(&destination).unwrap(), "email\n");
        assert!(!source.exists());
    }

    #[test]
    fn test_parallel_stagings_never_collide() {
        const WORKERS: usize = 16;
        let tmp = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalImportStorage::new(tmp.path().join("imports")));
        let owner = Uuid::new_v4();
        let uploads: Vec<UploadedFile> = (0..WORKERS)
            .map(|i| upload(tmp.path(), "c.csv", &format!("n\n{}\n", i)))
            .collect();

        let handles: Vec<_> = uploads
            .into_iter()
            .map(|file| {
                let storage = Arc::clone(&storage);
                thread::spawn(move || FileStager::new(&*storage).stage(&file, owner))
            })
            .collect();

        let staged: Vec<StagedFile> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        let names: HashSet<&str> = staged.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names.len(), WORKERS);

        let contents: HashSet<String> = staged
            .iter()
            .map(|s| fs::read_to_string(s.path()).unwrap())
            .collect();
        assert_eq!(contents.len(), WORKERS);
    }
}
