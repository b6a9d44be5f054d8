//! A typed schema projection over a generic [`Storage`] contract.
//! Performs no type validation beyond locating the primary-key column;
//! the value serializer enforces the allowed scalar types.

use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::value::{Value, ValueMap};

/// The scalar types a column may declare (a subset of [`Value`]; `Null`
/// is a possible column *value*, never a column *type*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int32,
    Int64,
    Double,
    Boolean,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub columns: Vec<(String, ColumnType)>,
    pub primary_key: String,
}

impl Schema {
    pub fn new(columns: Vec<(String, ColumnType)>, primary_key: &str) -> Self {
        Schema {
            columns,
            primary_key: primary_key.to_string(),
        }
    }

    fn primary_key_bytes(&self, record: &ValueMap) -> Result<Vec<u8>> {
        match record.get(&self.primary_key) {
            Some(Value::Text(s)) => Ok(s.as_bytes().to_vec()),
            Some(Value::Int32(v)) => Ok(v.to_string().into_bytes()),
            Some(Value::Int64(v)) => Ok(v.to_string().into_bytes()),
            Some(other) => Err(Error::FormatError(format!(
                "primary key column '{}' has unsupported value {:?}",
                self.primary_key, other
            ))),
            None => Err(Error::ColumnNotFound(self.primary_key.clone())),
        }
    }
}

/// A table: schema plus a handle to the storage backend it delegates to.
pub struct Table<S: Storage> {
    schema: Schema,
    storage: S,
}

impl<S: Storage> Table<S> {
    pub fn new(schema: Schema, storage: S) -> Self {
        Table { schema, storage }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// `insert(record)`: primary key bytes = UTF-8 of the PK field.
    pub fn insert(&mut self, record: &ValueMap) -> Result<()> {
        let key = self.schema.primary_key_bytes(record)?;
        self.storage.write(&key, record)
    }

    /// Collapses to many individual writes unless the backend overrides
    /// `write_batch`.
    pub fn insert_batch(&mut self, records: &[ValueMap]) -> Result<()> {
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let key = self.schema.primary_key_bytes(record)?;
            items.push((key, record.clone()));
        }
        self.storage.write_batch(&items)
    }

    pub fn find_by_primary_key(&mut self, pk: &[u8]) -> Result<Option<ValueMap>> {
        self.storage.read(pk)
    }

    pub fn scan(
        &mut self,
        start_pk: Option<&[u8]>,
        end_pk: Option<&[u8]>,
        columns: Option<&[String]>,
    ) -> Result<Vec<(Vec<u8>, ValueMap)>> {
        self.storage.scan(start_pk, end_pk, columns)
    }

    pub fn close(self) -> Result<()> {
        self.storage.close()
    }
}
