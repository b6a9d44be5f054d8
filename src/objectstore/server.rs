//! Object store server: stateless RPC dispatch over a local
//! content-addressed byte store. Each server owns a disjoint directory on
//! disk. No on-disk manifest is persisted; the index of what's stored is
//! in-memory only, so a fresh `Server::open` on an existing directory
//! starts empty by design. Crash recovery beyond the B+Tree's own
//! reopen-and-reload-root is not a claim this core makes for
//! object-store persistence.

use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::net::{NetError, Result};
use crate::objectstore::message::{Op, Request, Response, Status};

fn content_address(key: &[u8]) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

pub struct Server {
    root: PathBuf,
    index: HashMap<Vec<u8>, PathBuf>,
}

impl Server {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Server { root, index: HashMap::new() })
    }

    pub fn put(&mut self, key: &[u8], bytes: &[u8]) -> Result<()> {
        let path = self.root.join(content_address(key));
        fs::write(&path, bytes)?;
        self.index.insert(key.to_vec(), path);
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.index.get(key) {
            Some(path) => Ok(Some(fs::read(path)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        match self.index.remove(key) {
            Some(path) => {
                fs::remove_file(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn list(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = self
            .index
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn size(&self, key: &[u8]) -> Result<Option<u64>> {
        match self.index.get(key) {
            Some(path) => Ok(Some(fs::metadata(path)?.len())),
            None => Ok(None),
        }
    }

    pub fn range(&self, key: &[u8], start: u64, end_inclusive: u64) -> Result<Option<Vec<u8>>> {
        match self.get(key)? {
            None => Ok(None),
            Some(bytes) => {
                let start = start as usize;
                let end = (end_inclusive as usize + 1).min(bytes.len());
                if start >= bytes.len() || start > end {
                    return Ok(Some(Vec::new()));
                }
                Ok(Some(bytes[start..end].to_vec()))
            }
        }
    }

    /// Dispatch one decoded RPC request to the matching local operation
    /// and build the response envelope payload.
    pub fn handle_request(&mut self, req: Request) -> Response {
        let base = |status, payload, size, keys| Response {
            request_id: req.request_id,
            op: req.op,
            status,
            payload,
            size,
            keys,
        };
        match req.op {
            Op::Put => match &req.payload {
                Some(bytes) => match self.put(&req.key, bytes) {
                    Ok(()) => base(Status::Ok, None, None, None),
                    Err(e) => error_response(&req, e),
                },
                None => base(Status::Error, None, None, None),
            },
            Op::Get => match self.get(&req.key) {
                Ok(Some(bytes)) => base(Status::Ok, Some(bytes), None, None),
                Ok(None) => base(Status::NotFound, None, None, None),
                Err(e) => error_response(&req, e),
            },
            Op::Delete => match self.delete(&req.key) {
                Ok(true) => base(Status::Ok, None, None, None),
                Ok(false) => base(Status::NotFound, None, None, None),
                Err(e) => error_response(&req, e),
            },
            Op::List => base(Status::Ok, None, None, Some(self.list(&req.key))),
            Op::Size => match self.size(&req.key) {
                Ok(Some(size)) => base(Status::Ok, None, Some(size), None),
                Ok(None) => base(Status::NotFound, None, None, None),
                Err(e) => error_response(&req, e),
            },
            Op::Range => {
                let (start, end) = req.range.unwrap_or((0, 0));
                match self.range(&req.key, start, end) {
                    Ok(Some(bytes)) => base(Status::Ok, Some(bytes), None, None),
                    Ok(None) => base(Status::NotFound, None, None, None),
                    Err(e) => error_response(&req, e),
                }
            }
        }
    }
}

fn error_response(req: &Request, _err: NetError) -> Response {
    Response {
        request_id: req.request_id,
        op: req.op,
        status: Status::Error,
        payload: None,
        size: None,
        keys: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let mut server = Server::open(dir.path()).unwrap();
        server.put(b"k", b"hello").unwrap();
        assert_eq!(server.get(b"k").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(server.get(b"missing").unwrap(), None);
    }

    #[test]
    fn reopen_on_existing_directory_starts_empty() {
        let dir = tempdir().unwrap();
        {
            let mut server = Server::open(dir.path()).unwrap();
            server.put(b"k", b"hello").unwrap();
        }
        let server = Server::open(dir.path()).unwrap();
        assert_eq!(server.get(b"k").unwrap(), None);
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let dir = tempdir().unwrap();
        let mut server = Server::open(dir.path()).unwrap();
        server.put(b"k", b"v").unwrap();
        assert!(server.delete(b"k").unwrap());
        assert_eq!(server.get(b"k").unwrap(), None);
        assert!(!server.delete(b"k").unwrap());
    }

    #[test]
    fn list_filters_by_prefix() {
        let dir = tempdir().unwrap();
        let mut server = Server::open(dir.path()).unwrap();
        server.put(b"user/1", b"a").unwrap();
        server.put(b"user/2", b"b").unwrap();
        server.put(b"order/1", b"c").unwrap();
        let users = server.list(b"user/");
        assert_eq!(users, vec![b"user/1".to_vec(), b"user/2".to_vec()]);
    }

    #[test]
    fn range_reads_a_byte_slice() {
        let dir = tempdir().unwrap();
        let mut server = Server::open(dir.path()).unwrap();
        server.put(b"k", b"0123456789").unwrap();
        assert_eq!(server.range(b"k", 2, 4).unwrap(), Some(b"234".to_vec()));
    }
}
