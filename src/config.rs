//! Typed configuration for index builds and queries.
//!
//! Every recognized option has a default and can be overridden through the
//! environment (`REBUILD`, `SOURCE`, `NO_DUPLICATE_DETECTION`,
//! `USE_SPELLCHECK`, `DEBUG`).

use crate::types::Tag;
use std::path::PathBuf;

/// Default in-memory posting limit before the partition builder flushes.
const DEFAULT_POSTINGS_FLUSH_LIMIT: usize = 50_000;

/// Default target size for a final partition file (1 MiB).
const DEFAULT_PARTITION_TARGET_BYTES: u64 = 1024 * 1024;

/// Default candidate-cap multiplier: the pruning stage keeps
/// `prune_multiplier * k` candidates before cosine scoring.
const DEFAULT_PRUNE_MULTIPLIER: usize = 10;

/// Per-tag score multipliers. Title and top headings weigh highest; plain
/// body text is the 1.0 baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagBoosts {
    pub title: f32,
    pub h1: f32,
    pub h2: f32,
    pub h3: f32,
    pub b: f32,
    pub strong: f32,
    pub other: f32,
}

impl TagBoosts {
    /// Multiplier for a single tag.
    pub fn boost(&self, tag: Tag) -> f32 {
        match tag {
            Tag::Title => self.title,
            Tag::H1 => self.h1,
            Tag::H2 => self.h2,
            Tag::H3 => self.h3,
            Tag::B => self.b,
            Tag::Strong => self.strong,
            Tag::Other => self.other,
        }
    }
}

impl Default for TagBoosts {
    fn default() -> Self {
        Self {
            title: 3.0,
            h1: 2.5,
            h2: 2.0,
            h3: 1.5,
            b: 1.25,
            strong: 1.25,
            other: 1.0,
        }
    }
}

/// Options controlling index building and querying.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Discard any existing index and rebuild from scratch.
    pub rebuild: bool,
    /// Root directory of the JSON page corpus.
    pub source: PathBuf,
    /// Skip the duplicate-detection stage during ingestion.
    pub no_duplicate_detection: bool,
    /// Enable the spell-correction fallback for zero-hit queries.
    pub use_spellcheck: bool,
    /// Verbose progress logging.
    pub debug: bool,

    /// Directory holding all persisted index state.
    pub data_dir: PathBuf,
    /// Name of the index under `data_dir/indexes/`.
    pub index_name: String,

    /// In-memory posting limit before a flush to an intermediate partition.
    pub postings_flush_limit: usize,
    /// Target byte size for a final partition file.
    pub partition_target_bytes: u64,
    /// Candidate cap multiplier for TF-IDF pruning.
    pub prune_multiplier: usize,
    /// Per-tag score multipliers.
    pub tag_boosts: TagBoosts,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            rebuild: false,
            source: PathBuf::from("developer"),
            no_duplicate_detection: true,
            use_spellcheck: false,
            debug: false,
            data_dir: PathBuf::from("pagelens-data"),
            index_name: "main".to_string(),
            postings_flush_limit: DEFAULT_POSTINGS_FLUSH_LIMIT,
            partition_target_bytes: DEFAULT_PARTITION_TARGET_BYTES,
            prune_multiplier: DEFAULT_PRUNE_MULTIPLIER,
            tag_boosts: TagBoosts::default(),
        }
    }
}

impl IndexOptions {
    /// Build options from defaults overridden by the environment.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(v) = read_env_bool("REBUILD") {
            options.rebuild = v;
        }
        if let Some(v) = read_non_empty_env("SOURCE") {
            options.source = PathBuf::from(v);
        }
        if let Some(v) = read_env_bool("NO_DUPLICATE_DETECTION") {
            options.no_duplicate_detection = v;
        }
        if let Some(v) = read_env_bool("USE_SPELLCHECK") {
            options.use_spellcheck = v;
        }
        if let Some(v) = read_env_bool("DEBUG") {
            options.debug = v;
        }
        options
    }
}

fn read_non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    read_non_empty_env(name).map(|raw| {
        !matches!(
            raw.to_ascii_lowercase().as_str(),
            "off" | "none" | "0" | "false" | "no"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = IndexOptions::default();
        assert!(!options.rebuild);
        assert!(options.no_duplicate_detection);
        assert!(!options.use_spellcheck);
        assert!(!options.debug);
        assert_eq!(options.source, PathBuf::from("developer"));
        assert_eq!(options.prune_multiplier, 10);
    }

    #[test]
    fn test_tag_boosts_ordering() {
        let boosts = TagBoosts::default();
        assert!(boosts.boost(Tag::Title) > boosts.boost(Tag::H1));
        assert!(boosts.boost(Tag::H1) > boosts.boost(Tag::Other));
        assert_eq!(boosts.boost(Tag::Other), 1.0);
    }

    #[test]
    fn test_read_env_bool_values() {
        std::env::set_var("PAGELENS_TEST_FLAG", "false");
        assert_eq!(read_env_bool("PAGELENS_TEST_FLAG"), Some(false));
        std::env::set_var("PAGELENS_TEST_FLAG", "1");
        assert_eq!(read_env_bool("PAGELENS_TEST_FLAG"), Some(true));
        std::env::remove_var("PAGELENS_TEST_FLAG");
        assert_eq!(read_env_bool("PAGELENS_TEST_FLAG"), None);
    }
}
