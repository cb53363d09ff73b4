//! Bidirectional URL <-> document-id mapping.
//!
//! Ids are handed out densely from 0 in the order URLs are first interned,
//! so a completed build leaves doc_ids dense on `[0, N)`. The mapper is
//! written once by the build and read-only at query time.

use crate::error::{Result, SearchError};
use crate::types::DocId;
use rkyv::rancor::Error as RkyvError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Stable bijection between source URLs and dense document ids.
#[derive(Debug, Default)]
pub struct PathMapper {
    urls: Vec<String>,
    ids: HashMap<String, DocId>,
}

impl PathMapper {
    /// Create an empty mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a URL, assigning the next dense id if it is new.
    pub fn intern(&mut self, url: &str) -> DocId {
        if let Some(&id) = self.ids.get(url) {
            return id;
        }
        let id = self.urls.len() as DocId;
        self.urls.push(url.to_string());
        self.ids.insert(url.to_string(), id);
        id
    }

    /// Look up the URL for a document id.
    pub fn url_of(&self, doc_id: DocId) -> Option<&str> {
        self.urls.get(doc_id as usize).map(String::as_str)
    }

    /// True if the URL has been interned.
    pub fn contains_url(&self, url: &str) -> bool {
        self.ids.contains_key(url)
    }

    /// Number of interned documents.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// True if no documents have been interned.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Persist the mapper to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = rkyv::to_bytes::<RkyvError>(&self.urls)
            .map_err(|e| crate::error::IndexError::Serialization(e.to_string()))?;
        fs::write(path, &bytes)?;
        Ok(())
    }

    /// Load a previously saved mapper from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let urls = rkyv::from_bytes::<Vec<String>, RkyvError>(&bytes)
            .map_err(|e| SearchError::CorruptIndex(format!("path mapper: {}", e)))?;
        let ids = urls
            .iter()
            .enumerate()
            .map(|(id, url)| (url.clone(), id as DocId))
            .collect();
        Ok(Self { urls, ids })
    }
}
