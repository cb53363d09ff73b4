//! K-way merge of intermediate partitions into one sorted token stream.
//!
//! Each intermediate file gets a prefetch thread feeding a bounded channel;
//! a min-heap keyed by `(token, file index)` pops the least token across
//! all files. Consecutive equal tokens merge their posting lists, so the
//! output is a lazy stream of globally merged `(token, TokenEntry)` records
//! in strictly ascending token order. Memory stays proportional to the
//! number of intermediates plus one accumulator.

use crate::error::Result;
use crate::partition::PartitionReader;
use crate::types::TokenEntry;
use crossbeam_channel::{bounded, Receiver};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

/// Records buffered per prefetch channel.
const CHANNEL_CAP: usize = 1024;

/// Heap item for the k-way merge (min-heap by token, then file index).
struct HeapItem {
    token: String,
    file_idx: usize,
    entry: TokenEntry,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token && self.file_idx == other.file_idx
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.token
            .cmp(&other.token)
            .then(self.file_idx.cmp(&other.file_idx))
    }
}

/// Lazy stream of merged `(token, TokenEntry)` records.
pub struct MergedStream {
    receivers: Vec<Receiver<Result<(String, TokenEntry)>>>,
    heap: BinaryHeap<Reverse<HeapItem>>,
    accumulator: Option<(String, TokenEntry)>,
    handles: Vec<JoinHandle<()>>,
}

impl MergedStream {
    /// Open all intermediate partitions and seed the merge heap.
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let mut receivers = Vec::with_capacity(paths.len());
        let mut handles = Vec::with_capacity(paths.len());

        for path in paths {
            let (tx, rx) = bounded::<Result<(String, TokenEntry)>>(CHANNEL_CAP);
            let path = path.clone();
            let handle = thread::spawn(move || {
                let mut reader = match PartitionReader::open(&path) {
                    Ok(reader) => reader,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };
                loop {
                    match reader.next_record() {
                        Ok(Some(record)) => {
                            if tx.send(Ok(record)).is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
            });
            receivers.push(rx);
            handles.push(handle);
        }

        let mut stream = Self {
            receivers,
            heap: BinaryHeap::new(),
            accumulator: None,
            handles,
        };
        for idx in 0..stream.receivers.len() {
            stream.advance_file(idx)?;
        }
        Ok(stream)
    }

    /// Pull the next record from file `idx` into the heap, if any remain.
    fn advance_file(&mut self, idx: usize) -> Result<()> {
        match self.receivers[idx].recv() {
            Ok(Ok((token, entry))) => {
                self.heap.push(Reverse(HeapItem {
                    token,
                    file_idx: idx,
                    entry,
                }));
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            // Disconnected: the reader finished its file.
            Err(_) => Ok(()),
        }
    }

    /// Next merged record, or `None` once every input is exhausted.
    pub fn next_merged(&mut self) -> Result<Option<(String, TokenEntry)>> {
        loop {
            let Some(Reverse(item)) = self.heap.pop() else {
                let last = self.accumulator.take();
                if last.is_none() {
                    for handle in self.handles.drain(..) {
                        let _ = handle.join();
                    }
                }
                return Ok(last);
            };

            let file_idx = item.file_idx;
            match &mut self.accumulator {
                Some((token, entry)) if *token == item.token => {
                    entry.merge(item.entry);
                    self.advance_file(file_idx)?;
                }
                Some(_) => {
                    let finished = self.accumulator.take();
                    self.accumulator = Some((item.token, item.entry));
                    self.advance_file(file_idx)?;
                    return Ok(finished);
                }
                None => {
                    self.accumulator = Some((item.token, item.entry));
                    self.advance_file(file_idx)?;
                }
            }
        }
    }

    /// Drain the stream into memory. Test and small-index convenience.
    pub fn collect_all(mut self) -> Result<Vec<(String, TokenEntry)>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_merged()? {
            records.push(record);
        }
        Ok(records)
    }
}
