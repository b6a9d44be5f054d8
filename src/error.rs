use std::io;
use thiserror::Error;

/// Errors surfaced by the page manager, B+Tree, and table layer (C1/C2/C3/C4).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("page file format error: {0}")]
    FormatError(String),

    #[error("page {requested} out of range (file has {file_pages} pages)")]
    PageOutOfRange { requested: u64, file_pages: u64 },

    #[error("slot {index} out of range (page has {count} elements)")]
    SlotOutOfRange { index: usize, count: usize },

    #[error("corrupt value payload: {0}")]
    CorruptValue(String),

    #[error("unsupported value type tag {0}")]
    UnsupportedType(u8),

    #[error("value too large for a single page: {size} bytes")]
    ValueTooLarge { size: usize },

    #[error("page size {page_size} is too small to hold a split: {reason}")]
    PageTooSmall { page_size: usize, reason: String },

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("parquet storage error: {0}")]
    Parquet(String),
}

pub type Result<T> = std::result::Result<T, Error>;
