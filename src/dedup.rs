//! Duplicate suppression during ingestion.
//!
//! Two layers: an exact hash over the normalized token stream catches
//! byte-equivalent content, and a 64-bit SimHash with a Hamming-distance
//! neighborhood catches near-duplicates. Rejected documents consume no
//! doc_id. The whole stage is optional and skipped when disabled.

use crate::text::DocumentTokens;
use rustc_hash::FxHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Prior fingerprints within this Hamming distance mark a near-duplicate.
const NEAR_DUPLICATE_DISTANCE: u32 = 3;

/// Hash a single token to a 64-bit value.
fn hash_token(token: &str) -> u64 {
    let mut hasher = FxHasher::default();
    token.hash(&mut hasher);
    hasher.finish()
}

/// Exact content hash over the normalized token stream.
///
/// Tokens are visited in sorted order with their counts, so two documents
/// hash equal iff they tokenize identically.
pub fn content_hash(doc: &DocumentTokens) -> u64 {
    let mut hasher = FxHasher::default();
    for (token, counts) in &doc.counts {
        token.hash(&mut hasher);
        counts.total().hash(&mut hasher);
    }
    hasher.finish()
}

/// 64-bit SimHash over token frequencies.
///
/// Each token votes its hash bits up or down, weighted by its frequency;
/// the fingerprint keeps the sign of each bit sum. Similar token
/// distributions land within a few bits of each other.
pub fn simhash(doc: &DocumentTokens) -> u64 {
    let mut sums = [0i64; 64];
    for (token, counts) in &doc.counts {
        let hash = hash_token(token);
        let weight = counts.total() as i64;
        for (bit, sum) in sums.iter_mut().enumerate() {
            if hash >> bit & 1 == 1 {
                *sum += weight;
            } else {
                *sum -= weight;
            }
        }
    }

    let mut fingerprint = 0u64;
    for (bit, sum) in sums.iter().enumerate() {
        if *sum > 0 {
            fingerprint |= 1 << bit;
        }
    }
    fingerprint
}

/// Number of differing bits between two fingerprints.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Tracks fingerprints of accepted documents and rejects repeats.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    exact_hashes: HashSet<u64>,
    fingerprints: Vec<u64>,
}

impl DuplicateDetector {
    /// Create an empty detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a candidate document against everything accepted so far.
    ///
    /// Returns true if the document is an exact or near duplicate. Both
    /// fingerprints are recorded only when the document is accepted.
    pub fn is_duplicate(&mut self, doc: &DocumentTokens) -> bool {
        let exact = content_hash(doc);
        if self.exact_hashes.contains(&exact) {
            return true;
        }

        let fingerprint = simhash(doc);
        if self
            .fingerprints
            .iter()
            .any(|&prior| hamming_distance(prior, fingerprint) <= NEAR_DUPLICATE_DISTANCE)
        {
            return true;
        }

        self.exact_hashes.insert(exact);
        self.fingerprints.push(fingerprint);
        false
    }
}
