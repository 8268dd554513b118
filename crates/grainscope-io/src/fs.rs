//! Directory-backed storage.
//!
//! Layout under the root directory:
//!
//! ```text
//! images/<blob name>
//! samples/<sample id>.json
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::store::{BlobStore, ResultStore, SampleId, SampleRecord, StoreError, check_blob_name};

const IMAGES_DIR: &str = "images";
const SAMPLES_DIR: &str = "samples";
const RECORD_EXTENSION: &str = "json";

/// Stores blobs and records as plain files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Use `root` as the store directory. Subdirectories are created on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a blob, after validating its name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for unusable names.
    pub fn blob_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        check_blob_name(name)?;
        Ok(self.root.join(IMAGES_DIR).join(name))
    }

    fn record_path(&self, id: &SampleId) -> PathBuf {
        self.root
            .join(SAMPLES_DIR)
            .join(format!("{id}.{RECORD_EXTENSION}"))
    }
}

fn not_found_as(name: &str) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |err| {
        if err.kind() == ErrorKind::NotFound {
            StoreError::NotFound(name.to_owned())
        } else {
            StoreError::Io(err)
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

impl BlobStore for DirectoryStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.blob_path(name)?;
        std::fs::read(path).map_err(not_found_as(name))
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.blob_path(name)?.try_exists()?)
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.blob_path(name)?;
        write_file(&path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote blob");
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), StoreError> {
        let path = self.blob_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl ResultStore for DirectoryStore {
    fn load(&self, id: &SampleId) -> Result<SampleRecord, StoreError> {
        let text = std::fs::read_to_string(self.record_path(id)).map_err(not_found_as(id.as_str()))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&mut self, id: &SampleId, record: &SampleRecord) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(record)?;
        write_file(&self.record_path(id), &json)
    }

    fn contains(&self, id: &SampleId) -> Result<bool, StoreError> {
        Ok(self.record_path(id).try_exists()?)
    }

    fn list(&self) -> Result<Vec<SampleId>, StoreError> {
        let dir = self.root.join(SAMPLES_DIR);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| SampleId::new(s).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}
