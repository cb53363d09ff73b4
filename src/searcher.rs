//! Query engine over a READY index.
//!
//! A query runs through the shared text pipeline, resolves each token to
//! its partition via the directory, accumulates cheap TF-IDF upper bounds
//! to prune the candidate set, and only then pays for cosine similarity
//! against the precomputed document vectors. Results are deterministic:
//! ties break toward the lower doc_id.

use crate::config::IndexOptions;
use crate::error::{IndexError, Result, SearchError};
use crate::index::Layout;
use crate::mapper::PathMapper;
use crate::partition::{PartitionDirectory, PartitionReader};
use crate::spell::SpellChecker;
use crate::text::tokenize;
use crate::types::{DocId, SearchHit, TokenEntry};
use crate::vectors::{DfTable, SparseVector, VectorTable};
use rkyv::rancor::Error as RkyvError;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Precomputed per-token idf values, cached under `searchers/`.
///
/// Derivable from the df table; persisting it saves the ln() sweep on
/// every searcher construction.
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct SearcherCache {
    /// idf per token ordinal, aligned with the df table.
    pub idf: Vec<f32>,
}

impl SearcherCache {
    /// Compute the cache from a df table.
    pub fn from_df(df: &DfTable) -> Self {
        Self {
            idf: df.entries.iter().map(|(_, d)| df.idf(*d)).collect(),
        }
    }

    /// Persist to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = rkyv::to_bytes::<RkyvError>(self)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        std::fs::write(path, &bytes)?;
        Ok(())
    }

    /// Load from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        rkyv::from_bytes::<SearcherCache, RkyvError>(&bytes)
            .map_err(|e| SearchError::CorruptIndex(format!("searcher cache: {}", e)).into())
    }
}

/// Read-only query handle over a READY index.
pub struct Searcher {
    index_dir: PathBuf,
    mapper: PathMapper,
    directory: PartitionDirectory,
    df: DfTable,
    idf: Vec<f32>,
    vectors: VectorTable,
    prune_multiplier: usize,
    tag_boosts: crate::config::TagBoosts,
    spellchecker: Option<SpellChecker>,
}

impl Searcher {
    /// Load the partition directory, df table, document vectors, and path
    /// mapper for `options.index_name`.
    pub(crate) fn open(layout: &Layout, options: &IndexOptions, doc_count: u32) -> Result<Self> {
        let name = options.index_name.as_str();

        let directory = PartitionDirectory::load(&layout.directory_path(name))?;
        let df = DfTable::load(&layout.df_path(name))?;
        if df.doc_count != doc_count {
            return Err(SearchError::CorruptIndex(format!(
                "df table doc count {} does not match index meta {}",
                df.doc_count, doc_count
            ))
            .into());
        }
        let vectors = VectorTable::load(&layout.vectors_path(name))?;
        let mapper = PathMapper::load(&layout.mapper_path())?;

        // The idf cache is derived state; regenerate it if missing.
        let cache_path = layout.searcher_cache_path(name);
        let cache = match SearcherCache::load(&cache_path) {
            Ok(cache) if cache.idf.len() == df.len() => cache,
            _ => {
                let cache = SearcherCache::from_df(&df);
                cache.save(&cache_path)?;
                cache
            }
        };

        Ok(Self {
            index_dir: layout.index_dir(name),
            mapper,
            directory,
            df,
            idf: cache.idf,
            vectors,
            prune_multiplier: options.prune_multiplier.max(1),
            tag_boosts: options.tag_boosts,
            spellchecker: options.use_spellcheck.then(SpellChecker::new),
        })
    }

    /// Number of indexed documents.
    pub fn doc_count(&self) -> u32 {
        self.df.doc_count
    }

    /// Retrieve the top-`k` documents for a free-text query.
    ///
    /// Scores are cosine similarities in [0, 1], descending. An empty
    /// result is normal, never an error.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // Repeated query tokens add no information; dedupe to a set.
        let query_tokens: BTreeSet<String> = tokenize(query).into_iter().collect();
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self.search_tokens(&query_tokens, k)?;
        if !hits.is_empty() {
            return Ok(hits);
        }

        if let Some(spellchecker) = &self.spellchecker {
            if let Some(corrected) = spellchecker.correct_query(&query_tokens, &self.df) {
                debug!(?corrected, "retrying zero-hit query with spell correction");
                return self.search_tokens(&corrected, k);
            }
        }
        Ok(hits)
    }

    fn search_tokens(&self, query_tokens: &BTreeSet<String>, k: usize) -> Result<Vec<SearchHit>> {
        // Resolve each query token to its posting list. Unknown tokens are
        // silently skipped.
        let mut resolved: Vec<(u32, TokenEntry)> = Vec::new();
        for token in query_tokens {
            let Some(ord) = self.df.ord_of(token) else {
                continue;
            };
            if let Some(entry) = self.lookup_postings(token)? {
                resolved.push((ord, entry));
            }
        }
        if resolved.is_empty() {
            return Ok(Vec::new());
        }

        // Sparse query vector over the same weights the index stores.
        let mut query_vector = SparseVector {
            terms: resolved
                .iter()
                .map(|(ord, _)| (*ord, self.idf[*ord as usize]))
                .collect(),
        };
        query_vector.l2_normalize();

        // Upper-bound TF-IDF accumulation: linear in posting size, no
        // vector loads.
        let mut upper_bounds: HashMap<DocId, f32> = HashMap::new();
        for (ord, entry) in &resolved {
            let idf = self.idf[*ord as usize];
            for posting in &entry.postings {
                let tf = 1.0 + (posting.frequency as f32).ln();
                let bound = tf * idf * posting.tag_boost(&self.tag_boosts);
                *upper_bounds.entry(posting.doc_id).or_insert(0.0) += bound;
            }
        }

        // Prune to a small multiple of k before the expensive cosine step.
        let mut candidates: Vec<(DocId, f32)> = upper_bounds.into_iter().collect();
        top_k_by_score(&mut candidates, self.prune_multiplier.saturating_mul(k));

        // Cosine similarity against the stored document vectors.
        let mut scored: Vec<(DocId, f32)> = candidates
            .into_iter()
            .filter_map(|(doc_id, _)| {
                self.vectors
                    .get(doc_id)
                    .map(|vector| (doc_id, query_vector.dot(vector).clamp(0.0, 1.0)))
            })
            .collect();
        top_k_by_score(&mut scored, k);

        Ok(scored
            .into_iter()
            .filter_map(|(doc_id, score)| {
                self.mapper.url_of(doc_id).map(|url| SearchHit {
                    url: url.to_string(),
                    score,
                })
            })
            .collect())
    }

    /// Stream the token's partition for its entry.
    ///
    /// A missing partition file makes its tokens not-found instead of
    /// failing the query; a corrupt one propagates.
    fn lookup_postings(&self, token: &str) -> Result<Option<TokenEntry>> {
        let Some(file_name) = self.directory.locate(token) else {
            return Ok(None);
        };
        let path = self.index_dir.join(file_name);
        let mut reader = match PartitionReader::open(&path) {
            Ok(reader) => reader,
            Err(crate::error::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        while let Some((current, entry)) = reader.next_record()? {
            match current.as_str().cmp(token) {
                std::cmp::Ordering::Less => continue,
                std::cmp::Ordering::Equal => return Ok(Some(entry)),
                // Records are sorted; the token cannot appear later.
                std::cmp::Ordering::Greater => return Ok(None),
            }
        }
        Ok(None)
    }
}

/// Keep the top `k` entries by score, descending, breaking score ties
/// toward the lower doc_id. Partial-sorts before the final ordering pass.
fn top_k_by_score(results: &mut Vec<(DocId, f32)>, k: usize) {
    if results.is_empty() || k == 0 {
        results.clear();
        return;
    }

    let by_rank = |a: &(DocId, f32), b: &(DocId, f32)| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    };

    if results.len() > k {
        results.select_nth_unstable_by(k - 1, by_rank);
        results.truncate(k);
    }
    results.sort_unstable_by(by_rank);
}
