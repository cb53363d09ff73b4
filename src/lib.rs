//! pagelens - a disk-resident inverted-index search engine for HTML page
//! corpora.
//!
//! The library ingests a directory tree of JSON page records
//! (`{"url": ..., "content": <html>}`) and answers free-text ranked queries:
//! - **Bounded-memory builds**: postings accumulate in memory and spill as
//!   sorted partitions, which are K-way merged and rewritten into final
//!   token-range partitions on disk.
//! - **Ranked retrieval**: queries are pruned by cheap TF-IDF upper bounds,
//!   then ranked by cosine similarity against precomputed, L2-normalized
//!   document vectors.
//! - **Optional stages**: SimHash near-duplicate suppression at ingest and
//!   a spell-correction fallback for zero-hit queries.
//!
//! ```no_run
//! use pagelens::{Index, IndexOptions};
//!
//! let options = IndexOptions {
//!     source: "developer".into(),
//!     ..IndexOptions::default()
//! };
//! let index = Index::open_or_build(options)?;
//! let searcher = index.searcher()?;
//! for hit in searcher.search("quick brown fox", 5)? {
//!     println!("{:.3}  {}", hit.score, hit.url);
//! }
//! # Ok::<(), pagelens::Error>(())
//! ```

pub mod builder;
pub mod config;
pub mod dedup;
pub mod error;
pub mod index;
pub mod mapper;
pub mod merge;
pub mod partition;
pub mod searcher;
pub mod spell;
pub mod split;
pub mod text;
pub mod types;
pub mod vectors;

// Re-export commonly used types
pub use builder::IndexBuilder;
pub use config::{IndexOptions, TagBoosts};
pub use error::{Error, IndexError, Result, SearchError};
pub use index::Index;
pub use mapper::PathMapper;
pub use searcher::Searcher;
pub use types::{DocId, IndexStats, Posting, SearchHit, Tag, TokenEntry};
