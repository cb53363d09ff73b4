//! Precomputed TF-IDF document vectors and the df table.
//!
//! Both tables are written by the splitter and memory-mapped read-only at
//! query time. Document vectors are sparse over token ordinals (positions
//! in the sorted vocabulary) and stored L2-normalized, so cosine similarity
//! reduces to a sparse dot product.

use crate::error::{IndexError, Result, SearchError};
use memmap2::Mmap;
use rkyv::rancor::Error as RkyvError;
use rkyv::{Archive, Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Position of a token in the sorted vocabulary.
pub type TokenOrd = u32;

/// A sparse vector over token ordinals, ascending by ordinal.
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct SparseVector {
    /// `(token ordinal, weight)` pairs, strictly ascending by ordinal.
    pub terms: Vec<(TokenOrd, f32)>,
}

impl SparseVector {
    /// Euclidean norm.
    pub fn norm(&self) -> f32 {
        self.terms
            .iter()
            .map(|(_, w)| w * w)
            .sum::<f32>()
            .sqrt()
    }

    /// Scale to unit length. A zero vector is left untouched.
    pub fn l2_normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for (_, w) in &mut self.terms {
                *w /= norm;
            }
        }
    }

    /// Sparse dot product by merge-walking both term lists.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let mut sum = 0.0;
        let (mut i, mut j) = (0, 0);
        while i < self.terms.len() && j < other.terms.len() {
            let (a_ord, a_w) = self.terms[i];
            let (b_ord, b_w) = other.terms[j];
            match a_ord.cmp(&b_ord) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// The sorted vocabulary with document frequencies.
///
/// Doubles as the token -> ordinal map: a token's ordinal is its position
/// in the sorted entry list.
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct DfTable {
    /// `(token, df)` pairs, strictly ascending by token. The order is
    /// asserted at construction and checked at load time.
    pub entries: Vec<(String, u32)>,
    /// Total number of indexed documents.
    pub doc_count: u32,
}

impl DfTable {
    /// Build from `(token, df)` pairs already ascending by token.
    pub fn new(entries: Vec<(String, u32)>, doc_count: u32) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        Self { entries, doc_count }
    }

    /// Number of unique tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordinal of `token` in the sorted vocabulary.
    pub fn ord_of(&self, token: &str) -> Option<TokenOrd> {
        self.entries
            .binary_search_by(|(t, _)| t.as_str().cmp(token))
            .ok()
            .map(|idx| idx as TokenOrd)
    }

    /// Document frequency of `token`.
    pub fn df(&self, token: &str) -> Option<u32> {
        self.ord_of(token)
            .map(|ord| self.entries[ord as usize].1)
    }

    /// Inverse document frequency: `ln(N / df)`.
    pub fn idf(&self, df: u32) -> f32 {
        if df == 0 || self.doc_count == 0 {
            return 0.0;
        }
        (self.doc_count as f32 / df as f32).ln()
    }

    /// Iterate the vocabulary in ascending token order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    /// Persist to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = rkyv::to_bytes::<RkyvError>(self)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        std::fs::write(path, &bytes)?;
        Ok(())
    }

    /// Memory-map and deserialize from `path`.
    ///
    /// A table whose tokens are out of order would make every binary
    /// search silently wrong, so it is rejected as corrupt.
    pub fn load(path: &Path) -> Result<Self> {
        let mmap = map_file(path)?;
        let table = rkyv::from_bytes::<DfTable, RkyvError>(&mmap)
            .map_err(|e| SearchError::CorruptIndex(format!("df table: {}", e)))?;
        if !table.entries.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err(
                SearchError::CorruptIndex("df table tokens out of order".to_string()).into(),
            );
        }
        Ok(table)
    }
}

/// Precomputed, L2-normalized document vectors indexed by doc_id.
#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct VectorTable {
    /// One vector per doc_id.
    pub docs: Vec<SparseVector>,
}

impl VectorTable {
    /// Vector for a document.
    pub fn get(&self, doc_id: crate::types::DocId) -> Option<&SparseVector> {
        self.docs.get(doc_id as usize)
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// True if no document vectors are stored.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Persist to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = rkyv::to_bytes::<RkyvError>(self)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        std::fs::write(path, &bytes)?;
        Ok(())
    }

    /// Memory-map and deserialize from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let mmap = map_file(path)?;
        rkyv::from_bytes::<VectorTable, RkyvError>(&mmap)
            .map_err(|e| SearchError::CorruptIndex(format!("vector table: {}", e)).into())
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    // Read-only map over an immutable READY artifact.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}
