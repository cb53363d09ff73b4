//! Splits the merged stream into final token-range partitions and builds
//! the derived tables.
//!
//! A partition rotates once its byte size crosses the target; rotation only
//! happens between records, so a token's entry never spans two files. The
//! first token written to each file becomes its file-name key and its entry
//! in the partition directory. The df and document-vector tables are then
//! built in a second pass over the final partitions.

use crate::config::TagBoosts;
use crate::error::Result;
use crate::merge::MergedStream;
use crate::partition::{partition_file_name, PartitionDirectory, PartitionReader, PartitionWriter};
use crate::vectors::{DfTable, SparseVector, VectorTable};
use indicatif::ProgressBar;
use std::path::Path;

/// Write the merged stream as final partitions under `index_dir`.
///
/// Returns the partition directory covering the emitted files.
pub fn split_stream(
    stream: &mut MergedStream,
    index_dir: &Path,
    target_bytes: u64,
    progress: Option<&ProgressBar>,
) -> Result<PartitionDirectory> {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut writer: Option<PartitionWriter> = None;

    while let Some((token, entry)) = stream.next_merged()? {
        if let Some(open) = writer.take() {
            if open.bytes_written() >= target_bytes {
                open.finish()?;
            } else {
                writer = Some(open);
            }
        }

        if writer.is_none() {
            let name = partition_file_name(&token);
            entries.push((token.clone(), name.clone()));
            writer = Some(PartitionWriter::create(index_dir.join(name))?);
        }
        if let Some(open) = writer.as_mut() {
            open.write_record(&token, &entry)?;
        }

        if let Some(bar) = progress {
            bar.inc(1);
        }
    }

    if let Some(open) = writer {
        open.finish()?;
    }

    Ok(PartitionDirectory::new(entries))
}

/// Build the df table and the L2-normalized document-vector table by
/// streaming the final partitions.
///
/// The df pass must complete before vector weights can be computed, since
/// idf depends on global document frequencies.
pub fn build_tables(
    index_dir: &Path,
    directory: &PartitionDirectory,
    doc_count: u32,
    boosts: &TagBoosts,
) -> Result<(DfTable, VectorTable)> {
    let mut entries: Vec<(String, u32)> = Vec::new();
    for name in directory.file_names() {
        let mut reader = PartitionReader::open(&index_dir.join(name))?;
        while let Some((token, entry)) = reader.next_record()? {
            entries.push((token, entry.df));
        }
    }
    let df_table = DfTable::new(entries, doc_count);

    let mut docs = vec![SparseVector::default(); doc_count as usize];
    let mut ord: u32 = 0;
    for name in directory.file_names() {
        let mut reader = PartitionReader::open(&index_dir.join(name))?;
        while let Some((_, entry)) = reader.next_record()? {
            let idf = df_table.idf(entry.df);
            for posting in &entry.postings {
                let tf = 1.0 + (posting.frequency as f32).ln();
                let weight = tf * posting.tag_boost(boosts) * idf;
                docs[posting.doc_id as usize].terms.push((ord, weight));
            }
            ord += 1;
        }
    }
    for vector in &mut docs {
        vector.l2_normalize();
    }

    Ok((df_table, VectorTable { docs }))
}
