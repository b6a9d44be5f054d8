//! Paged on-disk storage: fixed-size pages, the file-backed page manager,
//! and the B+Tree engine built over both.

pub mod btree;
pub mod page;
pub mod pager;

use crate::error::Result;
use crate::value::ValueMap;

/// Capability interface the table layer is generic over: any ordered
/// key-value store that can be written, batch-written, point-read,
/// range-scanned, and closed. Swapping implementations (B+Tree, Parquet)
/// requires no inheritance, only this trait.
pub trait Storage {
    fn write(&mut self, key: &[u8], values: &ValueMap) -> Result<()>;
    fn write_batch(&mut self, items: &[(Vec<u8>, ValueMap)]) -> Result<()>;
    fn read(&mut self, key: &[u8]) -> Result<Option<ValueMap>>;
    fn scan(
        &mut self,
        start_key: Option<&[u8]>,
        end_key: Option<&[u8]>,
        columns: Option<&[String]>,
    ) -> Result<Vec<(Vec<u8>, ValueMap)>>;
    fn delete(&mut self, key: &[u8]) -> Result<()>;
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

impl Storage for btree::BTree {
    fn write(&mut self, key: &[u8], values: &ValueMap) -> Result<()> {
        btree::BTree::write(self, key, values)
    }

    fn write_batch(&mut self, items: &[(Vec<u8>, ValueMap)]) -> Result<()> {
        btree::BTree::write_batch(self, items)
    }

    fn read(&mut self, key: &[u8]) -> Result<Option<ValueMap>> {
        btree::BTree::read(self, key)
    }

    fn scan(
        &mut self,
        start_key: Option<&[u8]>,
        end_key: Option<&[u8]>,
        columns: Option<&[String]>,
    ) -> Result<Vec<(Vec<u8>, ValueMap)>> {
        btree::BTree::scan(self, start_key, end_key, columns)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        btree::BTree::delete(self, key)
    }

    fn close(self) -> Result<()> {
        btree::BTree::close(self)
    }
}
