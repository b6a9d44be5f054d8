//! Partitioning for distributed reads, consumed by the object store:
//! split a Parquet file's row groups as evenly as possible across
//! `target` partitions, remainder to the lowest-indexed partitions, then
//! read exactly the row groups a partition owns.

use std::path::{Path, PathBuf};

use crate::parquet::reader::{read_selected, Record};
use crate::parquet::types::FileMetadata;
use crate::parquet::{ParquetError, RandomAccessSource, Result};

#[derive(Debug, Clone)]
pub struct PartitionMetadata {
    pub row_group_indices: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct FilePartition {
    pub index: usize,
    pub file_path: PathBuf,
    pub start_offset: u64,
    pub length: u64,
    pub metadata: PartitionMetadata,
}

/// Distribute `meta`'s row groups across `target` partitions as evenly as
/// possible; if `row_groups.len()` doesn't divide evenly, the remainder
/// goes to the lowest-indexed partitions.
pub fn create_partitions(file_path: &Path, meta: &FileMetadata, target: usize) -> Result<Vec<FilePartition>> {
    if target == 0 {
        return Err(ParquetError::FormatError("partition target must be at least 1".into()));
    }
    let total = meta.row_groups.len();
    let base = total / target;
    let remainder = total % target;

    let mut partitions = Vec::with_capacity(target);
    let mut next_index = 0usize;
    for p in 0..target {
        let count = base + if p < remainder { 1 } else { 0 };
        let indices: Vec<usize> = (next_index..next_index + count).collect();
        next_index += count;

        let (start_offset, length) = if indices.is_empty() {
            (0, 0)
        } else {
            let start = indices
                .iter()
                .map(|&i| meta.row_groups[i].byte_offset)
                .min()
                .unwrap();
            let end = indices
                .iter()
                .map(|&i| meta.row_groups[i].byte_offset + meta.row_groups[i].byte_length)
                .max()
                .unwrap();
            (start, end - start)
        };

        partitions.push(FilePartition {
            index: p,
            file_path: file_path.to_path_buf(),
            start_offset,
            length,
            metadata: PartitionMetadata { row_group_indices: indices },
        });
    }
    Ok(partitions)
}

/// Read exactly the row groups `partition` owns.
pub fn read_partition<R: RandomAccessSource>(
    source: &mut R,
    meta: &FileMetadata,
    partition: &FilePartition,
) -> Result<Vec<Record>> {
    read_selected(source, meta, &partition.metadata.row_group_indices, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parquet::types::{ColumnType, RowGroupMeta};
    use std::collections::BTreeMap;

    fn meta_with_row_groups(n: usize) -> FileMetadata {
        let mut row_groups = Vec::new();
        let mut offset = 0u64;
        for _ in 0..n {
            row_groups.push(RowGroupMeta {
                row_count: 10,
                byte_offset: offset,
                byte_length: 100,
                columns: BTreeMap::new(),
            });
            offset += 100;
        }
        FileMetadata { schema: vec![("x".to_string(), ColumnType::Int32)], row_groups }
    }

    #[test]
    fn distributes_evenly_with_remainder_to_lowest_partitions() {
        let meta = meta_with_row_groups(7);
        let partitions = create_partitions(Path::new("f.parquet"), &meta, 3).unwrap();
        let sizes: Vec<usize> = partitions.iter().map(|p| p.metadata.row_group_indices.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);

        let mut all: Vec<usize> = partitions.iter().flat_map(|p| p.metadata.row_group_indices.clone()).collect();
        all.sort();
        assert_eq!(all, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn evenly_divisible_row_groups_split_equally() {
        let meta = meta_with_row_groups(6);
        let partitions = create_partitions(Path::new("f.parquet"), &meta, 3).unwrap();
        for p in &partitions {
            assert_eq!(p.metadata.row_group_indices.len(), 2);
        }
    }
}
