//! Value serializer: a pure, self-describing codec for the typed scalar
//! maps that make up a B+Tree record payload. No I/O, no ownership of
//! anything beyond the bytes it is handed.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A typed scalar drawn from the allowed record-payload types.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
}

impl Value {
    fn type_tag(&self) -> u8 {
        match self {
            Value::Null => TAG_NULL,
            Value::Text(_) => TAG_STRING,
            Value::Int32(_) => TAG_INT32,
            Value::Int64(_) => TAG_INT64,
            Value::Double(_) => TAG_DOUBLE,
            Value::Boolean(_) => TAG_BOOLEAN,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
        }
    }
}

const TAG_NULL: u8 = 0;
const TAG_STRING: u8 = 1;
const TAG_INT32: u8 = 2;
const TAG_INT64: u8 = 3;
const TAG_DOUBLE: u8 = 4;
const TAG_BOOLEAN: u8 = 5;

/// A decoded record payload: field name -> typed value.
pub type ValueMap = BTreeMap<String, Value>;

/// Encode a value map into the length-prefixed, type-tagged, big-endian
/// wire format shared across this crate's storage and read-path layers.
pub fn encode(values: &ValueMap) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(values.len() as u32).to_be_bytes());
    for (key, value) in values {
        let key_bytes = key.as_bytes();
        buf.extend_from_slice(&(key_bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(key_bytes);
        buf.push(value.type_tag());
        match value {
            Value::Null => {}
            Value::Text(s) => {
                let bytes = s.as_bytes();
                buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                buf.extend_from_slice(bytes);
            }
            Value::Int32(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::Int64(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::Boolean(v) => buf.push(if *v { 1 } else { 0 }),
        }
    }
    buf
}

/// Decode a value map previously produced by [`encode`]. Fails with
/// `CorruptValue` on truncated input or an unrecognized type tag.
pub fn decode(bytes: &[u8]) -> Result<ValueMap> {
    let mut cursor = Cursor::new(bytes);
    let count = cursor.read_u32()?;
    let mut map = ValueMap::new();
    for _ in 0..count {
        let key_len = cursor.read_u32()? as usize;
        let key_bytes = cursor.read_exact(key_len)?;
        let key = String::from_utf8(key_bytes.to_vec())
            .map_err(|e| Error::CorruptValue(format!("non-utf8 key: {e}")))?;
        let tag = cursor.read_u8()?;
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_STRING => {
                let len = cursor.read_u32()? as usize;
                let bytes = cursor.read_exact(len)?;
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|e| Error::CorruptValue(format!("non-utf8 string: {e}")))?;
                Value::Text(s)
            }
            TAG_INT32 => Value::Int32(i32::from_be_bytes(cursor.read_exact(4)?.try_into().unwrap())),
            TAG_INT64 => Value::Int64(i64::from_be_bytes(cursor.read_exact(8)?.try_into().unwrap())),
            TAG_DOUBLE => Value::Double(f64::from_be_bytes(cursor.read_exact(8)?.try_into().unwrap())),
            TAG_BOOLEAN => Value::Boolean(cursor.read_u8()? != 0),
            other => return Err(Error::CorruptValue(format!("unknown type tag {other}"))),
        };
        map.insert(key, value);
    }
    Ok(map)
}

/// Encode a single scalar as `tag: u8` + body, with no surrounding key or
/// map-length framing. Shared with the Parquet footer codec, which stores
/// row-group statistics bounds using the same scalar wire shape.
pub(crate) fn encode_scalar(value: &Value, buf: &mut Vec<u8>) {
    buf.push(value.type_tag());
    match value {
        Value::Null => {}
        Value::Text(s) => {
            let bytes = s.as_bytes();
            buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            buf.extend_from_slice(bytes);
        }
        Value::Int32(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Int64(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Boolean(v) => buf.push(if *v { 1 } else { 0 }),
    }
}

/// Inverse of [`encode_scalar`]; public so `parquet::footer` (a different
/// module, needing a different error type) can drive it with its own
/// bounds-checked cursor.
pub(crate) fn decode_scalar_tagged(tag: u8, cursor: &mut Cursor<'_>) -> Result<Value> {
    Ok(match tag {
        TAG_NULL => Value::Null,
        TAG_STRING => {
            let len = cursor.read_u32()? as usize;
            let bytes = cursor.read_exact(len)?;
            let s = String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::CorruptValue(format!("non-utf8 string: {e}")))?;
            Value::Text(s)
        }
        TAG_INT32 => Value::Int32(i32::from_be_bytes(cursor.read_exact(4)?.try_into().unwrap())),
        TAG_INT64 => Value::Int64(i64::from_be_bytes(cursor.read_exact(8)?.try_into().unwrap())),
        TAG_DOUBLE => Value::Double(f64::from_be_bytes(cursor.read_exact(8)?.try_into().unwrap())),
        TAG_BOOLEAN => Value::Boolean(cursor.read_u8()? != 0),
        other => return Err(Error::CorruptValue(format!("unknown type tag {other}"))),
    })
}

/// Tiny bounds-checked reader; decode never indexes past `bytes.len()`
/// without surfacing `CorruptValue` first.
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    pub(crate) fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.bytes.len() {
            return Err(Error::CorruptValue("truncated payload".into()));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_exact(1)?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_exact(4)?.try_into().unwrap()))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_exact(8)?.try_into().unwrap()))
    }
}
