//! A `Storage` adapter over the Parquet read path: a buffered batch
//! writer that accumulates records into row-group-sized chunks, paired
//! with the read path for point reads and range scans. Writing never
//! speaks real Apache Parquet bytes (an external writer is the black
//! box); this rewrites our own self-describing file (see `footer`,
//! `reader`) in full on every flush, which keeps single-writer,
//! no-compaction semantics honest without needing incremental-append
//! bookkeeping.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::parquet::reader::{self, Record};
use crate::parquet::types::{ColumnType, FileMetadata, RowGroupMeta};
use crate::parquet::{footer, ParquetError};
use crate::storage::Storage;
use crate::value::ValueMap;

fn wrap(e: ParquetError) -> Error {
    Error::Parquet(e.to_string())
}

pub struct ParquetStorage {
    path: PathBuf,
    schema: Vec<(String, ColumnType)>,
    row_group_size: usize,
    written: Vec<Record>,
    pending: Vec<Record>,
}

impl ParquetStorage {
    /// Open (or create) a Parquet-backed store at `path`. An existing
    /// file's row groups are eagerly decoded into memory so point reads
    /// and scans see prior writes immediately after reopen.
    pub fn open(path: impl AsRef<Path>, schema: Vec<(String, ColumnType)>, row_group_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut written = Vec::new();
        if path.exists() {
            let mut file = std::fs::File::open(&path)?;
            if file.metadata()?.len() > 0 {
                let meta = footer::read_footer(&mut file).map_err(wrap)?;
                let indices: Vec<usize> = (0..meta.row_groups.len()).collect();
                written = reader::read_selected(&mut file, &meta, &indices, None).map_err(wrap)?;
            }
        }
        Ok(ParquetStorage {
            path,
            schema,
            row_group_size: row_group_size.max(1),
            written,
            pending: Vec::new(),
        })
    }

    pub fn schema(&self) -> &[(String, ColumnType)] {
        &self.schema
    }

    /// Current file metadata, rebuilt from whatever is already flushed;
    /// used to drive predicate pushdown / partitioned reads over this
    /// adapter's own file.
    pub fn file_metadata(&self) -> FileMetadata {
        build_metadata(&self.written, &self.schema, self.row_group_size)
    }

    /// Move every buffered record into a row group and rewrite the file.
    /// A no-op if nothing is pending.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.written.append(&mut self.pending);
        self.rewrite()
    }

    fn rewrite(&self) -> Result<()> {
        let mut data = Vec::new();
        let mut row_groups = Vec::new();
        for chunk in self.written.chunks(self.row_group_size) {
            let byte_offset = data.len() as u64;
            let bytes = reader::encode_row_group(chunk);
            let byte_length = bytes.len() as u64;
            data.extend_from_slice(&bytes);
            let columns = reader::compute_stats(chunk, &self.schema);
            row_groups.push(RowGroupMeta {
                row_count: chunk.len() as u64,
                byte_offset,
                byte_length,
                columns,
            });
        }
        let meta = FileMetadata { schema: self.schema.clone(), row_groups };
        footer::append_footer(&mut data, &meta);
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    fn all_records(&self) -> impl Iterator<Item = &Record> {
        self.written.iter().chain(self.pending.iter())
    }

    /// `all_records()` collapsed to one entry per key, keeping the last
    /// (most recently written) record for each so re-inserted keys read
    /// back the latest value rather than the first one written.
    fn latest_records(&self) -> Vec<&Record> {
        let mut by_key: std::collections::BTreeMap<&[u8], &Record> = std::collections::BTreeMap::new();
        for record in self.all_records() {
            by_key.insert(record.key.as_slice(), record);
        }
        by_key.into_values().collect()
    }
}

fn build_metadata(records: &[Record], schema: &[(String, ColumnType)], row_group_size: usize) -> FileMetadata {
    let row_group_size = row_group_size.max(1);
    let mut data_len = 0u64;
    let mut row_groups = Vec::new();
    for chunk in records.chunks(row_group_size) {
        let byte_offset = data_len;
        let byte_length = reader::encode_row_group(chunk).len() as u64;
        data_len += byte_length;
        row_groups.push(RowGroupMeta {
            row_count: chunk.len() as u64,
            byte_offset,
            byte_length,
            columns: reader::compute_stats(chunk, schema),
        });
    }
    FileMetadata { schema: schema.to_vec(), row_groups }
}

impl Storage for ParquetStorage {
    fn write(&mut self, key: &[u8], values: &ValueMap) -> Result<()> {
        self.pending.push(Record { key: key.to_vec(), values: values.clone() });
        Ok(())
    }

    fn write_batch(&mut self, items: &[(Vec<u8>, ValueMap)]) -> Result<()> {
        self.pending
            .extend(items.iter().map(|(k, v)| Record { key: k.clone(), values: v.clone() }));
        Ok(())
    }

    /// Re-inserting an already-written key replaces its value: lookups
    /// resolve through [`Self::latest_records`] rather than `all_records`,
    /// so a key written twice returns the newest record, not the oldest.
    fn read(&mut self, key: &[u8]) -> Result<Option<ValueMap>> {
        Ok(self
            .latest_records()
            .into_iter()
            .find(|r| r.key == key)
            .map(|r| r.values.clone()))
    }

    fn scan(
        &mut self,
        start_key: Option<&[u8]>,
        end_key: Option<&[u8]>,
        columns: Option<&[String]>,
    ) -> Result<Vec<(Vec<u8>, ValueMap)>> {
        let mut rows: Vec<(Vec<u8>, ValueMap)> = self
            .latest_records()
            .into_iter()
            .filter(|r| start_key.map_or(true, |s| r.key.as_slice() >= s))
            .filter(|r| end_key.map_or(true, |e| r.key.as_slice() < e))
            .map(|r| {
                let mut values = r.values.clone();
                if let Some(cols) = columns {
                    values.retain(|k, _| cols.iter().any(|c| c == k));
                }
                (r.key.clone(), values)
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }

    /// Deletion and compaction of Parquet files are explicitly out of
    /// scope.
    fn delete(&mut self, _key: &[u8]) -> Result<()> {
        Err(Error::Unsupported("delete"))
    }

    fn close(mut self) -> Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use tempfile::tempdir;

    fn record(id: &str, age: i32) -> ValueMap {
        let mut m = ValueMap::new();
        m.insert("id".to_string(), Value::Text(id.to_string()));
        m.insert("age".to_string(), Value::Int32(age));
        m
    }

    fn schema() -> Vec<(String, ColumnType)> {
        vec![("id".to_string(), ColumnType::Text), ("age".to_string(), ColumnType::Int32)]
    }

    #[test]
    fn write_then_read_before_flush_is_visible() {
        let dir = tempdir().unwrap();
        let mut storage = ParquetStorage::open(dir.path().join("t.parquet"), schema(), 10).unwrap();
        storage.write(b"a", &record("a", 30)).unwrap();
        assert_eq!(storage.read(b"a").unwrap(), Some(record("a", 30)));
    }

    #[test]
    fn rewriting_a_key_replaces_it_instead_of_returning_the_oldest_value() {
        let dir = tempdir().unwrap();
        let mut storage = ParquetStorage::open(dir.path().join("t.parquet"), schema(), 10).unwrap();
        storage.write(b"a", &record("a", 30)).unwrap();
        storage.flush().unwrap();
        storage.write(b"a", &record("a", 31)).unwrap();
        assert_eq!(storage.read(b"a").unwrap(), Some(record("a", 31)));

        let rows = storage.scan(None, None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, record("a", 31));
    }

    #[test]
    fn flush_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.parquet");
        {
            let mut storage = ParquetStorage::open(&path, schema(), 10).unwrap();
            for i in 0..25 {
                storage.write(format!("k{i:02}").as_bytes(), &record(&format!("k{i:02}"), i)).unwrap();
            }
            storage.close().unwrap();
        }
        let mut storage = ParquetStorage::open(&path, schema(), 10).unwrap();
        assert_eq!(storage.read(b"k00").unwrap(), Some(record("k00", 0)));
        assert_eq!(storage.read(b"k24").unwrap(), Some(record("k24", 24)));
        assert!(storage.read(b"missing").unwrap().is_none());

        let meta = storage.file_metadata();
        assert_eq!(meta.row_groups.len(), 3);
    }

    #[test]
    fn scan_projects_and_orders_by_key() {
        let dir = tempdir().unwrap();
        let mut storage = ParquetStorage::open(dir.path().join("t.parquet"), schema(), 10).unwrap();
        for i in (0..10).rev() {
            storage.write(format!("k{i:02}").as_bytes(), &record(&format!("k{i:02}"), i)).unwrap();
        }
        let rows = storage.scan(None, None, Some(&["age".to_string()])).unwrap();
        assert_eq!(rows.len(), 10);
        let keys: Vec<_> = rows.iter().map(|(k, _)| k.clone()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        for (_, v) in &rows {
            assert!(!v.contains_key("id"));
        }
    }

    #[test]
    fn delete_is_unsupported() {
        let dir = tempdir().unwrap();
        let mut storage = ParquetStorage::open(dir.path().join("t.parquet"), schema(), 10).unwrap();
        let err = storage.delete(b"k").unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
