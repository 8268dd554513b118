//! Storage interfaces for source images and sample records.

use std::fmt;
use std::str::FromStr;

use grainscope_engine::{SampleResults, Scale};
use serde::{Deserialize, Serialize};

/// Errors from a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob or sample with this name exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// A blob name or sample id contains characters that are not allowed.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// The backing filesystem failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be encoded or decoded.
    #[error("malformed sample record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identifier of a sample: ASCII letters, digits, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SampleId(String);

impl SampleId {
    /// Validate a sample id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if `id` is empty or contains
    /// anything other than ASCII alphanumerics, `-` and `_`.
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid { Ok(Self(id)) } else { Err(StoreError::InvalidName(id)) }
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SampleId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SampleId> for String {
    fn from(id: SampleId) -> Self {
        id.0
    }
}

impl FromStr for SampleId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything stored for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Blob name of the source micrograph.
    pub image_name: String,
    /// Calibration, independent of the result document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_pixels_per_mm: Option<Scale>,
    /// The analysis results.
    #[serde(default)]
    pub results: SampleResults,
}

/// Opaque byte storage for source and derived images.
pub trait BlobStore {
    /// Read a blob.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no blob has this name.
    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Whether a blob with this name exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for unusable names, or a
    /// backend error.
    fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Create or replace a blob.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for unusable names, or a
    /// backend error.
    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Remove a blob. Removing a missing blob is not an error.
    ///
    /// # Errors
    ///
    /// Returns a backend error if removal fails.
    fn delete(&mut self, name: &str) -> Result<(), StoreError>;
}

/// Persistence for sample records.
pub trait ResultStore {
    /// Load a sample record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the sample does not exist.
    fn load(&self, id: &SampleId) -> Result<SampleRecord, StoreError>;

    /// Create or replace a sample record.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the record cannot be written.
    fn save(&mut self, id: &SampleId, record: &SampleRecord) -> Result<(), StoreError>;

    /// Whether a record exists for `id`.
    ///
    /// # Errors
    ///
    /// Returns a backend error if existence cannot be determined.
    fn contains(&self, id: &SampleId) -> Result<bool, StoreError>;

    /// Ids of all stored samples, sorted.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the listing fails.
    fn list(&self) -> Result<Vec<SampleId>, StoreError>;
}

/// Reject blob names that could escape a directory or are empty.
pub(crate) fn check_blob_name(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        Err(StoreError::InvalidName(name.to_owned()))
    } else {
        Ok(())
    }
}
