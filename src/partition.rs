//! On-disk partition format shared by the builder, merger, splitter, and
//! searcher.
//!
//! A partition file is a sequence of length-prefixed records, each one
//! `(token, TokenEntry)`: a `u32` token length, the token's UTF-8 bytes, a
//! `u32` payload length, then the rkyv-serialized [`TokenEntry`]. The
//! prefix framing lets every consumer stream records without loading a
//! partition into memory.

use crate::error::{IndexError, Result, SearchError};
use crate::types::TokenEntry;
use rkyv::rancor::Error as RkyvError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Buffer size for partition I/O (8 MB).
pub const IO_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Sanity cap on a serialized token length.
const MAX_TOKEN_BYTES: u32 = 4096;

/// Sanity cap on a serialized posting-list payload (512 MB).
const MAX_PAYLOAD_BYTES: u32 = 512 * 1024 * 1024;

/// File name for an intermediate partition, keyed by flush sequence.
pub fn intermediate_file_name(seq: u32) -> String {
    format!("intermediate_{:06}.bin", seq)
}

/// File name for a final partition, keyed by its smallest token.
pub fn partition_file_name(min_token: &str) -> String {
    format!("partition_{}.bin", min_token)
}

fn corrupt(path: &Path, reason: impl Into<String>) -> IndexError {
    IndexError::CorruptPartition {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Streaming writer for partition files.
pub struct PartitionWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    bytes_written: u64,
}

impl PartitionWriter {
    /// Create a partition file, truncating any existing one.
    pub fn create(path: PathBuf) -> Result<Self> {
        let file = File::create(&path).map_err(|e| IndexError::IoFatal {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            writer: BufWriter::with_capacity(IO_BUFFER_SIZE, file),
            path,
            bytes_written: 0,
        })
    }

    /// Append one record. Tokens must arrive in ascending order; the writer
    /// does not re-sort.
    pub fn write_record(&mut self, token: &str, entry: &TokenEntry) -> Result<()> {
        let payload = rkyv::to_bytes::<RkyvError>(entry)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        let result = (|| -> std::io::Result<()> {
            self.writer.write_all(&(token.len() as u32).to_le_bytes())?;
            self.writer.write_all(token.as_bytes())?;
            self.writer.write_all(&(payload.len() as u32).to_le_bytes())?;
            self.writer.write_all(&payload)?;
            Ok(())
        })();
        result.map_err(|e| IndexError::IoFatal {
            path: self.path.display().to_string(),
            source: e,
        })?;

        self.bytes_written += 8 + token.len() as u64 + payload.len() as u64;
        Ok(())
    }

    /// Bytes written so far, counting record framing.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and close, returning the file path.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush().map_err(|e| IndexError::IoFatal {
            path: self.path.display().to_string(),
            source: e,
        })?;
        Ok(self.path)
    }
}

/// Streaming reader over a partition file's records.
pub struct PartitionReader {
    reader: BufReader<File>,
    path: PathBuf,
}

impl PartitionReader {
    /// Open a partition file for streaming.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::with_capacity(IO_BUFFER_SIZE, file),
            path: path.to_path_buf(),
        })
    }

    /// Read the next record, or `None` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<(String, TokenEntry)>> {
        let mut len_bytes = [0u8; 4];
        match self.reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let token_len = u32::from_le_bytes(len_bytes);
        if token_len == 0 || token_len > MAX_TOKEN_BYTES {
            return Err(corrupt(&self.path, format!("token length {}", token_len)).into());
        }

        let mut token_bytes = vec![0u8; token_len as usize];
        self.reader
            .read_exact(&mut token_bytes)
            .map_err(|_| corrupt(&self.path, "truncated token"))?;
        let token = String::from_utf8(token_bytes)
            .map_err(|_| corrupt(&self.path, "token is not UTF-8"))?;

        self.reader
            .read_exact(&mut len_bytes)
            .map_err(|_| corrupt(&self.path, "truncated payload length"))?;
        let payload_len = u32::from_le_bytes(len_bytes);
        if payload_len > MAX_PAYLOAD_BYTES {
            return Err(corrupt(&self.path, format!("payload length {}", payload_len)).into());
        }

        let mut payload = vec![0u8; payload_len as usize];
        self.reader
            .read_exact(&mut payload)
            .map_err(|_| corrupt(&self.path, "truncated payload"))?;
        let entry = rkyv::from_bytes::<TokenEntry, RkyvError>(&payload)
            .map_err(|e| corrupt(&self.path, format!("payload: {}", e)))?;

        Ok(Some((token, entry)))
    }
}

/// Ordered list of `(smallest token, file name)` pairs covering the
/// vocabulary. Binary-searched to find the partition a token would live in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionDirectory {
    entries: Vec<(String, String)>,
}

impl PartitionDirectory {
    /// Build from ordered `(min_token, file_name)` pairs.
    pub fn new(entries: Vec<(String, String)>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        Self { entries }
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the index has no partitions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File name of the partition whose token range covers `token`, if any.
    ///
    /// Tokens below the first partition's smallest token cannot exist in
    /// the index.
    pub fn locate(&self, token: &str) -> Option<&str> {
        let idx = self
            .entries
            .partition_point(|(min_token, _)| min_token.as_str() <= token);
        if idx == 0 {
            return None;
        }
        Some(self.entries[idx - 1].1.as_str())
    }

    /// Iterate all partition file names in token order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, name)| name.as_str())
    }

    /// Persist the directory to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = rkyv::to_bytes::<RkyvError>(&self.entries)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        std::fs::write(path, &bytes)?;
        Ok(())
    }

    /// Load a directory from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let entries = rkyv::from_bytes::<Vec<(String, String)>, RkyvError>(&bytes)
            .map_err(|e| SearchError::CorruptIndex(format!("partition directory: {}", e)))?;
        Ok(Self { entries })
    }
}
