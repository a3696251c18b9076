use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Static distribution of an element range over workers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Partitioning {
    /// Worker `w` gets the `w`-th of `N` contiguous, nearly equally sized chunks.
    #[default]
    Contiguous,
    /// The range is cut into blocks of `block_size` elements which are dealt to the workers
    /// round robin.
    BlockInterleaved { block_size: usize },
}

/// The elements assigned to one worker, visited in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub worker: usize,
    pub ranges: Vec<Range<usize>>,
}

impl Chunk {
    pub fn num_elements(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).sum()
    }

    pub fn elements(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().flat_map(|r| r.clone())
    }
}

/// Splits `elements` into at most `num_workers` non-empty chunks.
///
/// Every element of the range appears in exactly one chunk.
pub fn partition_elements(elements: Range<usize>, num_workers: usize, partitioning: Partitioning) -> Vec<Chunk> {
    assert!(num_workers > 0, "Need at least one worker");
    let n = elements.len();
    let mut chunks: Vec<Chunk> = (0..num_workers)
        .map(|worker| Chunk {
            worker,
            ranges: Vec::new(),
        })
        .collect();

    match partitioning {
        Partitioning::Contiguous => {
            let base = n / num_workers;
            let remainder = n % num_workers;
            let mut start = elements.start;
            for (w, chunk) in chunks.iter_mut().enumerate() {
                let len = base + usize::from(w < remainder);
                if len > 0 {
                    chunk.ranges.push(start..start + len);
                }
                start += len;
            }
        }
        Partitioning::BlockInterleaved { block_size } => {
            let block_size = block_size.max(1);
            let mut start = elements.start;
            let mut block = 0;
            while start < elements.end {
                let end = (start + block_size).min(elements.end);
                chunks[block % num_workers].ranges.push(start..end);
                start = end;
                block += 1;
            }
        }
    }

    chunks.retain(|chunk| !chunk.ranges.is_empty());
    chunks
}
