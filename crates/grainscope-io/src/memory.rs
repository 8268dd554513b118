//! In-memory storage.
//!
//! Records are kept as JSON text, so they go through the same
//! serialization as the directory store.

use std::collections::{BTreeMap, HashMap};

use crate::store::{BlobStore, ResultStore, SampleId, SampleRecord, StoreError, check_blob_name};

/// Blob and record storage held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    blobs: HashMap<String, Vec<u8>>,
    records: BTreeMap<SampleId, String>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }
}

impl BlobStore for MemoryStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        check_blob_name(name)?;
        Ok(self.blobs.contains_key(name))
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        check_blob_name(name)?;
        self.blobs.insert(name.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), StoreError> {
        self.blobs.remove(name);
        Ok(())
    }
}

impl ResultStore for MemoryStore {
    fn load(&self, id: &SampleId) -> Result<SampleRecord, StoreError> {
        let json = self
            .records
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(serde_json::from_str(json)?)
    }

    fn save(&mut self, id: &SampleId, record: &SampleRecord) -> Result<(), StoreError> {
        self.records.insert(id.clone(), serde_json::to_string(record)?);
        Ok(())
    }

    fn contains(&self, id: &SampleId) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(id))
    }

    fn list(&self) -> Result<Vec<SampleId>, StoreError> {
        Ok(self.records.keys().cloned().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use grainscope_engine::SampleResults;

    use super::*;

    #[test]
    fn blobs_round_trip_and_delete_is_idempotent() {
        let mut store = MemoryStore::new();
        store.write("a.png", b"abc").unwrap();
        assert!(store.exists("a.png").unwrap());
        assert_eq!(store.read("a.png").unwrap(), b"abc");
        store.delete("a.png").unwrap();
        store.delete("a.png").unwrap();
        assert!(matches!(store.read("a.png"), Err(StoreError::NotFound(_))));
        assert!(!store.exists("a.png").unwrap());
        assert!(matches!(store.write("../a", b""), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn records_are_listed_in_order() {
        let mut store = MemoryStore::new();
        let record = SampleRecord {
            image_name: "x.png".to_owned(),
            scale_pixels_per_mm: None,
            results: SampleResults::default(),
        };
        for id in ["b", "a"] {
            store.save(&SampleId::new(id).unwrap(), &record).unwrap();
        }
        let ids: Vec<String> = store.list().unwrap().into_iter().map(String::from).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(store.contains(&SampleId::new("a").unwrap()).unwrap());
        assert!(matches!(
            store.load(&SampleId::new("zzz").unwrap()),
            Err(StoreError::NotFound(_))
        ));
    }
}
