//! Chunk type and range planning.

use std::path::PathBuf;

/// A single chunk: byte range [start, end) (half-open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk in file order.
    pub index: usize,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl Chunk {
    /// Length of this chunk in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// HTTP Range header value (inclusive end): `bytes=start-(end-1)`.
    pub fn range_header_value(&self) -> String {
        if self.start >= self.end {
            "bytes=0-0".to_string()
        } else {
            format!("bytes={}-{}", self.start, self.end - 1)
        }
    }
}

/// Split of one file into chunks, plus the private temp file each chunk lands in.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub file_size: u64,
    pub chunks: Vec<Chunk>,
    /// One path per chunk, same order as `chunks`. Empty until assigned.
    pub temp_paths: Vec<PathBuf>,
}

impl ChunkPlan {
    pub fn split_count(&self) -> usize {
        self.chunks.len()
    }

    /// Give every chunk a distinct file under `dir` (`<index>_chunk`).
    pub fn assign_temp_paths(&mut self, dir: &std::path::Path) {
        self.temp_paths = self
            .chunks
            .iter()
            .map(|c| dir.join(format!("{}_chunk", c.index)))
            .collect();
    }
}

/// Builds a chunk plan: `file_size / split_count` bytes per chunk, the last
/// chunk absorbing the remainder.
///
/// The ranges always partition `[0, file_size)`. A `split_count` of 0 is treated as 1.
pub fn plan_chunks(file_size: u64, split_count: usize) -> ChunkPlan {
    let split = split_count.max(1) as u64;
    let base = file_size / split;
    let remainder = file_size % split;

    let chunks = (0..split)
        .map(|i| {
            let start = base * i;
            let mut end = base * (i + 1);
            if i == split - 1 {
                end += remainder;
            }
            Chunk {
                index: i as usize,
                start,
                end,
            }
        })
        .collect();

    ChunkPlan {
        file_size,
        chunks,
        temp_paths: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partitions(size: u64, split: usize) {
        let plan = plan_chunks(size, split);
        assert_eq!(plan.split_count(), split.max(1));
        let mut next = 0u64;
        for (i, c) in plan.chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.start, next, "gap or overlap at chunk {} ({}/{})", i, size, split);
            assert!(c.end >= c.start);
            next = c.end;
        }
        assert_eq!(next, size);
        assert_eq!(plan.chunks.iter().map(Chunk::len).sum::<u64>(), size);
    }

    #[test]
    fn plan_partitions_for_many_sizes_and_splits() {
        for size in [0u64, 1, 2, 3, 7, 99, 100, 101, 300, 1000, 4096, 1_000_003] {
            for split in 1..=17 {
                assert_partitions(size, split);
            }
        }
    }

    #[test]
    fn last_chunk_absorbs_remainder() {
        let plan = plan_chunks(10, 4);
        let lens: Vec<u64> = plan.chunks.iter().map(Chunk::len).collect();
        assert_eq!(lens, vec![2, 2, 2, 4]);
    }

    #[test]
    fn even_split_of_300_in_3() {
        let plan = plan_chunks(300, 3);
        let headers: Vec<String> = plan.chunks.iter().map(Chunk::range_header_value).collect();
        assert_eq!(headers, vec!["bytes=0-99", "bytes=100-199", "bytes=200-299"]);
    }

    #[test]
    fn zero_split_is_single_chunk() {
        let plan = plan_chunks(100, 0);
        assert_eq!(plan.split_count(), 1);
        assert_eq!(plan.chunks[0], Chunk { index: 0, start: 0, end: 100 });
    }

    #[test]
    fn chunk_range_header_single_byte() {
        let c = Chunk { index: 0, start: 42, end: 43 };
        assert_eq!(c.range_header_value(), "bytes=42-42");
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn temp_paths_are_distinct_and_ordered() {
        let mut plan = plan_chunks(30, 3);
        plan.assign_temp_paths(std::path::Path::new("/tmp/x"));
        assert_eq!(plan.temp_paths.len(), 3);
        assert_eq!(plan.temp_paths[0], std::path::Path::new("/tmp/x/0_chunk"));
        assert_eq!(plan.temp_paths[2], std::path::Path::new("/tmp/x/2_chunk"));
    }
}
