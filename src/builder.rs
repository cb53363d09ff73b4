//! Index builder: external-memory construction of the partitioned index.
//!
//! Ingestion accumulates postings in memory and spills sorted intermediate
//! partitions whenever the in-memory estimate crosses the configured
//! threshold, so peak memory stays bounded no matter how large the corpus
//! is. The intermediates are then K-way merged and rewritten as final
//! token-range partitions with their derived tables.
//!
//! Lifecycle: `ABSENT -> BUILDING -> MERGING -> SPLITTING -> READY`. A
//! fatal error at any stage wipes the partial state, leaving a clean slate.

use crate::config::IndexOptions;
use crate::dedup::DuplicateDetector;
use crate::error::{IndexError, Result, SkipReason};
use crate::index::{write_meta, Index, Layout};
use crate::mapper::PathMapper;
use crate::merge::MergedStream;
use crate::partition::{intermediate_file_name, PartitionWriter};
use crate::searcher::SearcherCache;
use crate::split::{build_tables, split_stream};
use crate::text::{tokenize_document, DocumentTokens};
use crate::types::{DocId, IndexMeta, PageRecord, TokenEntry, FORMAT_VERSION};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Build lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Absent,
    Building,
    Merging,
    Splitting,
    Ready,
}

/// In-memory accumulator that spills sorted intermediate partitions.
///
/// The memory estimate is the resident posting count: one fixed-size unit
/// per posting held, monotone in entries and cheap to maintain.
pub struct PartitionBuilder {
    dir: PathBuf,
    buf: HashMap<String, TokenEntry>,
    resident_postings: usize,
    flush_limit: usize,
    flush_seq: u32,
    intermediates: Vec<PathBuf>,
}

impl PartitionBuilder {
    /// Create a builder spilling into `dir`.
    pub fn new(dir: PathBuf, flush_limit: usize) -> Self {
        Self {
            dir,
            buf: HashMap::new(),
            resident_postings: 0,
            flush_limit: flush_limit.max(1),
            flush_seq: 0,
            intermediates: Vec::new(),
        }
    }

    /// Add one tokenized document, spilling afterwards if the memory
    /// estimate crossed the flush threshold.
    ///
    /// Documents must arrive in ascending doc_id order so posting lists
    /// stay sorted within every intermediate.
    pub fn add_document(&mut self, doc_id: DocId, tokens: DocumentTokens) -> Result<()> {
        for (token, counts) in tokens.counts {
            let posting = counts.into_posting(doc_id);
            self.buf.entry(token).or_default().push(posting);
            self.resident_postings += 1;
        }

        if self.resident_postings >= self.flush_limit {
            self.flush()?;
        }
        Ok(())
    }

    /// Postings currently held in memory.
    pub fn resident_postings(&self) -> usize {
        self.resident_postings
    }

    /// Number of intermediates spilled so far.
    pub fn flush_count(&self) -> u32 {
        self.flush_seq
    }

    /// Spill the in-memory map as a token-sorted intermediate partition.
    pub fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        debug!(
            postings = self.resident_postings,
            seq = self.flush_seq,
            "flushing in-memory partition"
        );

        let path = self.dir.join(intermediate_file_name(self.flush_seq));
        let mut writer = PartitionWriter::create(path)?;
        let mut tokens: Vec<String> = self.buf.keys().cloned().collect();
        tokens.sort_unstable();
        for token in &tokens {
            if let Some(entry) = self.buf.get(token) {
                writer.write_record(token, entry)?;
            }
        }
        self.intermediates.push(writer.finish()?);

        self.buf.clear();
        self.resident_postings = 0;
        self.flush_seq += 1;
        Ok(())
    }

    /// Flush any residue and hand back the intermediate file paths.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        self.flush()?;
        Ok(self.intermediates)
    }
}

/// Drives a full build: ingest, merge, split, table construction.
pub struct IndexBuilder {
    options: IndexOptions,
}

impl IndexBuilder {
    pub fn new(options: IndexOptions) -> Self {
        Self { options }
    }

    /// Run the build. On any fatal error the partial on-disk state is
    /// removed before the error propagates.
    pub fn build(self) -> Result<Index> {
        let layout = Layout::new(self.options.data_dir.clone());
        clear_state(&layout, &self.options.index_name);

        match self.run(&layout) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!(error = %e, "build failed; clearing partial index state");
                clear_state(&layout, &self.options.index_name);
                Err(e)
            }
        }
    }

    fn run(&self, layout: &Layout) -> Result<Index> {
        let name = self.options.index_name.as_str();
        let index_dir = layout.index_dir(name);
        fs::create_dir_all(&index_dir)?;

        debug!(state = ?BuildState::Building, source = %self.options.source.display(), "starting build");

        let files = corpus_files(&self.options.source);
        let progress = self
            .options
            .debug
            .then(|| build_progress_bar(files.len() as u64, "indexing pages"));

        let mut mapper = PathMapper::new();
        let mut detector =
            (!self.options.no_duplicate_detection).then(DuplicateDetector::new);
        let mut partitions =
            PartitionBuilder::new(index_dir.clone(), self.options.postings_flush_limit);

        for path in &files {
            if let Some(bar) = &progress {
                bar.inc(1);
            }
            let (url, tokens) = match load_page(path) {
                Ok(page) => page,
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "skipping document");
                    continue;
                }
            };
            if mapper.contains_url(&url) {
                warn!(url = %url, reason = %SkipReason::Duplicate, "skipping document");
                continue;
            }
            if let Some(detector) = detector.as_mut() {
                if detector.is_duplicate(&tokens) {
                    warn!(url = %url, reason = %SkipReason::Duplicate, "skipping document");
                    continue;
                }
            }

            let doc_id = mapper.intern(&url);
            partitions.add_document(doc_id, tokens)?;
        }
        if let Some(bar) = &progress {
            bar.finish_with_message("pages indexed");
        }

        if mapper.is_empty() {
            return Err(IndexError::EmptyIndex.into());
        }
        let doc_count = mapper.len() as u32;
        let intermediates = partitions.finish()?;

        debug!(state = ?BuildState::Merging, intermediates = intermediates.len(), "merging intermediates");
        let mut stream = MergedStream::open(&intermediates)?;

        debug!(state = ?BuildState::Splitting, "writing final partitions");
        let split_progress = self.options.debug.then(|| spinner_bar("splitting tokens"));
        let directory = split_stream(
            &mut stream,
            &index_dir,
            self.options.partition_target_bytes,
            split_progress.as_ref(),
        )?;
        if let Some(bar) = &split_progress {
            bar.finish_with_message("partitions written");
        }

        // Intermediates are consumed exactly once; drop them.
        for path in &intermediates {
            let _ = fs::remove_file(path);
        }

        let (df_table, vector_table) =
            build_tables(&index_dir, &directory, doc_count, &self.options.tag_boosts)?;

        directory.save(&layout.directory_path(name))?;
        df_table.save(&layout.df_path(name))?;
        vector_table.save(&layout.vectors_path(name))?;
        SearcherCache::from_df(&df_table).save(&layout.searcher_cache_path(name))?;
        mapper.save(&layout.mapper_path())?;

        let meta = IndexMeta {
            format_version: FORMAT_VERSION,
            doc_count,
        };
        write_meta(&layout.meta_path(name), &meta)?;

        debug!(state = ?BuildState::Ready, doc_count, tokens = df_table.len(), "build complete");
        Ok(Index::assemble(
            layout.clone(),
            self.options.clone(),
            meta,
        ))
    }
}

/// Enumerate the corpus `.json` files in a stable order.
fn corpus_files(source: &Path) -> Vec<PathBuf> {
    WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "unreadable corpus entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Read and tokenize one page record.
///
/// Transient read failures get one retry; every failure mode maps to a
/// [`SkipReason`] confined to this document.
fn load_page(path: &Path) -> std::result::Result<(String, DocumentTokens), SkipReason> {
    let raw = fs::read_to_string(path)
        .or_else(|_| fs::read_to_string(path))
        .map_err(|_| SkipReason::IoTransient)?;

    let record: PageRecord =
        serde_json::from_str(&raw).map_err(|_| SkipReason::InputMalformed)?;
    if record.url.trim().is_empty() {
        return Err(SkipReason::InputMalformed);
    }

    let tokens = tokenize_document(&record.content);
    if tokens.is_empty() {
        return Err(SkipReason::Tokenization);
    }
    Ok((record.url, tokens))
}

/// Remove every artifact belonging to `name`, returning to a clean slate.
fn clear_state(layout: &Layout, name: &str) {
    let _ = fs::remove_dir_all(layout.index_dir(name));
    let _ = fs::remove_file(layout.mapper_path());
    let _ = fs::remove_file(layout.searcher_cache_path(name));
}

fn build_progress_bar(len: u64, msg: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(msg);
    bar
}

fn spinner_bar(msg: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(msg);
    bar
}
