use crate::face::Embedding;
use crate::report::{ImageRef, ReportId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Cache key: one image of one report
pub type CacheKey = (ReportId, ImageRef);

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    entries: Vec<(CacheKey, Embedding)>,
}

/// Concurrency-safe cache of face embeddings, keyed by (report, image).
///
/// Embeddings are computed once per image and reused across every comparison
/// involving that image. Entries never expire within a run; the whole cache
/// can be persisted to disk and reloaded across runs. A duplicate concurrent
/// computation for the same image is wasteful but not incorrect, so lookups
/// and inserts take no lock jointly.
pub struct EmbeddingCache {
    entries: RwLock<HashMap<CacheKey, Embedding>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, report_id: ReportId, image: &ImageRef) -> Option<Embedding> {
        let entries = self.entries.read().expect("embedding cache lock poisoned");
        entries.get(&(report_id, image.clone())).cloned()
    }

    pub fn insert(&self, report_id: ReportId, image: ImageRef, embedding: Embedding) {
        self.entries
            .write()
            .expect("embedding cache lock poisoned")
            .insert((report_id, image), embedding);
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("embedding cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a previously persisted cache, or an empty one if the file does
    /// not exist yet
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let data = fs::read(path)?;
        let file: CacheFile = bincode::deserialize(&data)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        Ok(Self {
            entries: RwLock::new(file.entries.into_iter().collect()),
        })
    }

    /// Persist the cache so embeddings survive across runs
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CacheError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = self.entries.read().expect("embedding cache lock poisoned");
        let file = CacheFile {
            entries: entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };
        let data = bincode::serialize(&file)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        fs::write(&path, data)?;

        Ok(())
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use uuid::Uuid;

    #[test]
    fn test_insert_and_get() {
        let cache = EmbeddingCache::new();
        let report_id = Uuid::new_v4();
        assert!(cache.get(report_id, &"img0.jpg".to_string()).is_none());

        cache.insert(report_id, "img0.jpg".to_string(), arr1(&[1.0, 0.0]));
        let hit = cache.get(report_id, &"img0.jpg".to_string()).unwrap();
        assert_eq!(hit, arr1(&[1.0, 0.0]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_same_image_different_reports_are_distinct() {
        let cache = EmbeddingCache::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        cache.insert(a, "img.jpg".to_string(), arr1(&[1.0]));
        assert!(cache.get(b, &"img.jpg".to_string()).is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("mafqud-cache-{}", std::process::id()));
        let path = dir.join("embeddings.bin");

        let cache = EmbeddingCache::new();
        let report_id = Uuid::new_v4();
        cache.insert(report_id, "img0.jpg".to_string(), arr1(&[0.5, 0.5]));
        cache.save(&path).unwrap();

        let loaded = EmbeddingCache::load(&path).unwrap();
        assert_eq!(
            loaded.get(report_id, &"img0.jpg".to_string()).unwrap(),
            arr1(&[0.5, 0.5])
        );

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let cache = EmbeddingCache::load("/nonexistent/mafqud/cache.bin").unwrap();
        assert!(cache.is_empty());
    }
}
