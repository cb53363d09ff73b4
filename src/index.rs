//! Index handle, on-disk layout, and readiness detection.
//!
//! Everything the engine persists lives under one app-data root:
//!
//! ```text
//! <data_dir>/mappers/paths.bin
//! <data_dir>/indexes/<name>/partition_<token>.bin
//! <data_dir>/indexes/<name>/df.bin
//! <data_dir>/indexes/<name>/vectors.bin
//! <data_dir>/indexes/<name>/directory.bin
//! <data_dir>/indexes/<name>/meta.bin
//! <data_dir>/searchers/<name>.bin
//! ```

use crate::builder::IndexBuilder;
use crate::config::IndexOptions;
use crate::error::{IndexError, Result, SearchError};
use crate::searcher::Searcher;
use crate::types::{IndexMeta, IndexStats, FORMAT_VERSION};
use crate::vectors::DfTable;
use rkyv::rancor::Error as RkyvError;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves every persisted artifact's path under the app-data root.
#[derive(Debug, Clone)]
pub struct Layout {
    data_dir: PathBuf,
}

impl Layout {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn mapper_path(&self) -> PathBuf {
        self.data_dir.join("mappers").join("paths.bin")
    }

    pub fn index_dir(&self, name: &str) -> PathBuf {
        self.data_dir.join("indexes").join(name)
    }

    pub fn directory_path(&self, name: &str) -> PathBuf {
        self.index_dir(name).join("directory.bin")
    }

    pub fn df_path(&self, name: &str) -> PathBuf {
        self.index_dir(name).join("df.bin")
    }

    pub fn vectors_path(&self, name: &str) -> PathBuf {
        self.index_dir(name).join("vectors.bin")
    }

    pub fn meta_path(&self, name: &str) -> PathBuf {
        self.index_dir(name).join("meta.bin")
    }

    pub fn searcher_cache_path(&self, name: &str) -> PathBuf {
        self.data_dir.join("searchers").join(format!("{}.bin", name))
    }
}

/// Persist index metadata.
pub(crate) fn write_meta(path: &Path, meta: &IndexMeta) -> Result<()> {
    let bytes = rkyv::to_bytes::<RkyvError>(meta)
        .map_err(|e| IndexError::Serialization(e.to_string()))?;
    fs::write(path, &bytes)?;
    Ok(())
}

/// Load index metadata.
pub(crate) fn read_meta(path: &Path) -> Result<IndexMeta> {
    let bytes = fs::read(path)?;
    rkyv::from_bytes::<IndexMeta, RkyvError>(&bytes)
        .map_err(|e| SearchError::CorruptIndex(format!("index meta: {}", e)).into())
}

/// Handle to a READY on-disk index.
///
/// Constructed once at startup and passed to consumers; all state lives on
/// disk and is immutable until the next wholesale rebuild.
#[derive(Debug)]
pub struct Index {
    layout: Layout,
    options: IndexOptions,
    meta: IndexMeta,
}

impl Index {
    /// Open an existing READY index, or build one from the configured
    /// source if none is usable.
    ///
    /// With `options.rebuild` set, any existing state is discarded first.
    pub fn open_or_build(options: IndexOptions) -> Result<Index> {
        if !options.rebuild {
            if let Some(index) = Self::open_ready(options.clone())? {
                tracing::debug!(name = %index.options.index_name, "existing index is READY");
                return Ok(index);
            }
        }
        IndexBuilder::new(options).build()
    }

    /// Probe for a READY index: all artifacts present and the format
    /// version matches. Returns `None` when a rebuild is needed.
    pub fn open_ready(options: IndexOptions) -> Result<Option<Index>> {
        let layout = Layout::new(options.data_dir.clone());
        let name = options.index_name.as_str();

        let required = [
            layout.meta_path(name),
            layout.directory_path(name),
            layout.df_path(name),
            layout.vectors_path(name),
            layout.mapper_path(),
        ];
        if required.iter().any(|path| !path.exists()) {
            return Ok(None);
        }

        let meta = match read_meta(&layout.meta_path(name)) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable index meta; forcing rebuild");
                return Ok(None);
            }
        };
        if meta.format_version != FORMAT_VERSION {
            tracing::warn!(
                found = meta.format_version,
                expected = FORMAT_VERSION,
                "index format version mismatch; forcing rebuild"
            );
            return Ok(None);
        }

        Ok(Some(Index {
            layout,
            options,
            meta,
        }))
    }

    pub(crate) fn assemble(layout: Layout, options: IndexOptions, meta: IndexMeta) -> Index {
        Index {
            layout,
            options,
            meta,
        }
    }

    /// Number of indexed documents.
    pub fn doc_count(&self) -> u32 {
        self.meta.doc_count
    }

    /// The layout this index lives under.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Options the index was opened with.
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Summary statistics: document count, vocabulary size, bytes on disk.
    pub fn stats(&self) -> Result<IndexStats> {
        let df = DfTable::load(&self.layout.df_path(&self.options.index_name))?;
        let mut disk_bytes = 0u64;
        for dir_entry in fs::read_dir(self.layout.index_dir(&self.options.index_name))? {
            disk_bytes += dir_entry?.metadata()?.len();
        }
        Ok(IndexStats {
            doc_count: self.meta.doc_count,
            token_count: df.len(),
            disk_bytes,
        })
    }

    /// Construct a query handle over this index.
    pub fn searcher(&self) -> Result<Searcher> {
        Searcher::open(&self.layout, &self.options, self.meta.doc_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = Layout::new(PathBuf::from("/data"));
        assert_eq!(
            layout.mapper_path(),
            PathBuf::from("/data/mappers/paths.bin")
        );
        assert_eq!(
            layout.df_path("main"),
            PathBuf::from("/data/indexes/main/df.bin")
        );
        assert_eq!(
            layout.searcher_cache_path("main"),
            PathBuf::from("/data/searchers/main.bin")
        );
    }

    #[test]
    fn test_open_ready_absent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let options = IndexOptions {
            data_dir: tmp.path().to_path_buf(),
            ..IndexOptions::default()
        };
        assert!(Index::open_ready(options).unwrap().is_none());
    }

    #[test]
    fn test_meta_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("meta.bin");
        let meta = IndexMeta {
            format_version: FORMAT_VERSION,
            doc_count: 12,
        };
        write_meta(&path, &meta).unwrap();
        let loaded = read_meta(&path).unwrap();
        assert_eq!(loaded.doc_count, 12);
        assert_eq!(loaded.format_version, FORMAT_VERSION);
    }
}
