//! Core types for the pagelens inverted index.

use rkyv::{Archive, Deserialize, Serialize};

/// Document identifier type. Dense and 0-based over the indexed corpus.
pub type DocId = u32;

/// Structural HTML region a token occurrence was found in.
///
/// Matches in important regions (titles, headings, bold text) are weighted
/// higher at scoring time. Everything outside the weighted tag set counts as
/// `Other` (plain body text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tag {
    Title,
    H1,
    H2,
    H3,
    B,
    Strong,
    Other,
}

impl Tag {
    /// All tags, in the fixed order used for serialized tag-frequency lists.
    pub const ALL: [Tag; 7] = [
        Tag::Title,
        Tag::H1,
        Tag::H2,
        Tag::H3,
        Tag::B,
        Tag::Strong,
        Tag::Other,
    ];

    /// Map an HTML element name to its weighted tag, if it is one.
    pub fn from_element_name(name: &str) -> Option<Tag> {
        match name {
            "title" => Some(Tag::Title),
            "h1" => Some(Tag::H1),
            "h2" => Some(Tag::H2),
            "h3" => Some(Tag::H3),
            "b" => Some(Tag::B),
            "strong" => Some(Tag::Strong),
            _ => None,
        }
    }
}

/// A posting entry: one record that a token occurs in a document.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Posting {
    /// Document ID.
    pub doc_id: DocId,
    /// Total occurrences of the token in this document.
    pub frequency: u32,
    /// Occurrences broken down by structural tag. Sums to `frequency`.
    /// Entries follow the `Tag::ALL` order; zero-count tags are omitted.
    pub tag_frequencies: Vec<(Tag, u32)>,
}

impl Posting {
    /// Sum the per-tag score multipliers over the tags this posting occurs in.
    pub fn tag_boost(&self, boosts: &crate::config::TagBoosts) -> f32 {
        self.tag_frequencies
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(tag, _)| boosts.boost(*tag))
            .sum()
    }
}

/// The serialized unit of the inverted index: document frequency plus the
/// posting list for one token.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct TokenEntry {
    /// Number of documents containing the token. Equals `postings.len()`
    /// once merged.
    pub df: u32,
    /// Postings, strictly ascending by doc_id after merge.
    pub postings: Vec<Posting>,
}

impl TokenEntry {
    /// Append a posting and bump df.
    pub fn push(&mut self, posting: Posting) {
        self.df += 1;
        self.postings.push(posting);
    }

    /// Absorb another entry for the same token: dfs add, postings
    /// concatenate and re-sort by doc_id.
    pub fn merge(&mut self, other: TokenEntry) {
        self.df += other.df;
        self.postings.extend(other.postings);
        self.postings.sort_by_key(|p| p.doc_id);
    }
}

/// A ranked search hit returned from queries.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Source URL of the matching page.
    pub url: String,
    /// Cosine similarity in [0, 1]; higher is better.
    pub score: f32,
}

/// Index-wide metadata persisted alongside the partitions.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct IndexMeta {
    /// On-disk format version. A mismatch at load time forces a rebuild.
    pub format_version: u32,
    /// Number of indexed documents.
    pub doc_count: u32,
}

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Summary statistics for a built index.
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// Number of indexed documents.
    pub doc_count: u32,
    /// Number of unique tokens in the vocabulary.
    pub token_count: usize,
    /// Total size of the index on disk, in bytes.
    pub disk_bytes: u64,
}

/// A corpus page record as stored in the source JSON files.
///
/// Unknown keys are ignored.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PageRecord {
    /// Source URL of the page.
    pub url: String,
    /// Raw HTML content.
    pub content: String,
}
