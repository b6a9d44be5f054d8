//! Row-group payload codec, statistics-based predicate pushdown, and
//! selective reads. The payload format below is this core's own (the
//! Apache Parquet byte format itself is produced by an external writer
//! treated as a black box); it only needs to round-trip the
//! `(key, ValueMap)` records the table layer and the partitioned-read
//! contract require.

use std::collections::BTreeMap;

use crate::parquet::types::{ColumnChunkStats, ColumnType, FileMetadata, numeric};
use crate::parquet::{ParquetError, RandomAccessSource, Result};
use crate::value::{self, Cursor, Value, ValueMap};

/// One row of a row group: the key it was written under, plus its decoded
/// column values.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Vec<u8>,
    pub values: ValueMap,
}

/// Encode a row group's records as `[count: u32][key_len u32, key,
/// value_len u32, value]*`, where `value` is the same self-describing
/// value-map wire format used by the B+Tree.
pub fn encode_row_group(records: &[Record]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(records.len() as u32).to_be_bytes());
    for record in records {
        buf.extend_from_slice(&(record.key.len() as u32).to_be_bytes());
        buf.extend_from_slice(&record.key);
        let encoded = value::encode(&record.values);
        buf.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
        buf.extend_from_slice(&encoded);
    }
    buf
}

/// Inverse of [`encode_row_group`].
pub fn decode_row_group(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut cursor = Cursor::new(bytes);
    let count = cursor
        .read_u32()
        .map_err(|e| ParquetError::CorruptValue(e.to_string()))?;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key_len = cursor
            .read_u32()
            .map_err(|e| ParquetError::CorruptValue(e.to_string()))? as usize;
        let key = cursor
            .read_exact(key_len)
            .map_err(|e| ParquetError::CorruptValue(e.to_string()))?
            .to_vec();
        let value_len = cursor
            .read_u32()
            .map_err(|e| ParquetError::CorruptValue(e.to_string()))? as usize;
        let value_bytes = cursor
            .read_exact(value_len)
            .map_err(|e| ParquetError::CorruptValue(e.to_string()))?;
        let values = value::decode(value_bytes).map_err(|e| ParquetError::CorruptValue(e.to_string()))?;
        records.push(Record { key, values });
    }
    Ok(records)
}

/// Per-column min/max/null_count/value_count over one batch of records,
/// for every column the schema declares. Non-numeric bounds (`Text`/
/// `Boolean`) are tracked only as presence; `min`/`max` stay `None` for
/// types pushdown can't order, since pruning only ever compares integers.
pub fn compute_stats(records: &[Record], schema: &[(String, ColumnType)]) -> BTreeMap<String, ColumnChunkStats> {
    let mut stats = BTreeMap::new();
    for (name, ty) in schema {
        let mut min: Option<Value> = None;
        let mut max: Option<Value> = None;
        let mut null_count = 0u64;
        let mut value_count = 0u64;
        let numeric_column = matches!(ty, ColumnType::Int32 | ColumnType::Int64 | ColumnType::Double);
        for record in records {
            match record.values.get(name) {
                None | Some(Value::Null) => null_count += 1,
                Some(v) => {
                    value_count += 1;
                    if numeric_column {
                        if let Some(n) = numeric(v) {
                            if min.as_ref().and_then(numeric).map_or(true, |m| n < m) {
                                min = Some(v.clone());
                            }
                            if max.as_ref().and_then(numeric).map_or(true, |m| n > m) {
                                max = Some(v.clone());
                            }
                        }
                    }
                }
            }
        }
        stats.insert(
            name.clone(),
            ColumnChunkStats { min, max, null_count, value_count },
        );
    }
    stats
}

/// Which side of the predicate pushdown comparison to prune on:
/// "greater-than" keeps a row group when `max >= v`, and the symmetric
/// "less-than" keeps one when `min <= v`, so both directions compose with
/// the same statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    GreaterThan,
    LessThan,
}

/// Select the indices of row groups that *might* satisfy `column
/// {direction} value`. A row group is excluded only when its statistics
/// for `column` are present and conclusively rule it out; an absent
/// column chunk or absent statistics always forces a conservative
/// include.
pub fn select_row_groups(meta: &FileMetadata, column: &str, value: &Value, direction: Direction) -> Vec<usize> {
    let target = numeric(value);
    meta.row_groups
        .iter()
        .enumerate()
        .filter(|(_, rg)| {
            let Some(stats) = rg.columns.get(column) else {
                return true;
            };
            let bound = match direction {
                Direction::GreaterThan => stats.max.as_ref(),
                Direction::LessThan => stats.min.as_ref(),
            };
            let (Some(bound), Some(target)) = (bound.and_then(numeric), target) else {
                return true;
            };
            match direction {
                Direction::GreaterThan => bound >= target,
                Direction::LessThan => bound <= target,
            }
        })
        .map(|(i, _)| i)
        .collect()
}

/// Read and decode exactly the row groups named by `indices`, optionally
/// projecting down to `columns`.
pub fn read_selected<R: RandomAccessSource>(
    source: &mut R,
    meta: &FileMetadata,
    indices: &[usize],
    columns: Option<&[String]>,
) -> Result<Vec<Record>> {
    let mut out = Vec::new();
    for &idx in indices {
        let rg = meta
            .row_group(idx)
            .ok_or(ParquetError::RowGroupOutOfRange { index: idx, count: meta.row_groups.len() })?;
        let bytes = source.read_range(rg.byte_offset, rg.byte_length)?;
        let mut records = decode_row_group(&bytes)?;
        if let Some(cols) = columns {
            for record in &mut records {
                record.values.retain(|k, _| cols.iter().any(|c| c == k));
            }
        }
        out.extend(records);
    }
    Ok(out)
}
