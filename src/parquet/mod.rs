//! Columnar Parquet-style read path: footer parsing, row-group statistics,
//! predicate pushdown, partitioned reads for distributed consumers. The
//! core does not parse real Apache Parquet Thrift footers or emit Parquet
//! files; an external writer is treated as a black box, and this module only
//! consumes a row-group / column-chunk statistics model via a
//! self-describing trailer of our own (see `footer`).

pub mod footer;
pub mod partition;
pub mod reader;
pub mod storage;
pub mod types;

use std::io;
use thiserror::Error;

/// Errors surfaced by the Parquet read path.
#[derive(Debug, Error)]
pub enum ParquetError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("parquet footer format error: {0}")]
    FormatError(String),

    #[error("row group {index} out of range ({count} row groups)")]
    RowGroupOutOfRange { index: usize, count: usize },

    #[error("corrupt record payload: {0}")]
    CorruptValue(String),

    #[error("unsupported value type tag {0}")]
    UnsupportedType(u8),
}

pub type Result<T> = std::result::Result<T, ParquetError>;

/// Random-access byte source a footer/row-group reader can be driven from:
/// a local file, or footer-range-reads from an object-store-backed reader
/// built over the distributed key/byte store.
pub trait RandomAccessSource {
    fn byte_len(&mut self) -> Result<u64>;
    fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>>;
}

impl RandomAccessSource for std::fs::File {
    fn byte_len(&mut self) -> Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>> {
        use std::io::{Read, Seek, SeekFrom};
        self.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}
