//! Consistent-hash routing table: maps a key to the server endpoint
//! first clockwise of it on the ring. `add_server` / `remove_server`
//! never rebalance stored objects: this core does not migrate data, so
//! removing a server simply makes its objects unreachable, which is the
//! observable, tested contract.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::net::Endpoint;

/// A fixed constant folded into every hash so ring layout is reproducible
/// across runs without relying on a cryptographic hash.
/// `std::collections::hash_map::DefaultHasher` is already unseeded/
/// deterministic per process (unlike `RandomState`), so this constant only
/// adds namespacing, not determinism.
const RING_SALT: u64 = 0x656d_6265_7264_62;

fn ring_hash(bytes: &[u8]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    RING_SALT.hash(&mut hasher);
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// Consistent hash ring over a set of server endpoints.
#[derive(Debug, Default)]
pub struct HashRing {
    ring: BTreeMap<u64, Endpoint>,
}

impl HashRing {
    pub fn new() -> Self {
        HashRing { ring: BTreeMap::new() }
    }

    pub fn add_server(&mut self, endpoint: Endpoint) {
        let pos = ring_hash(endpoint.as_str().as_bytes());
        log::debug!("ring: adding server {endpoint} at position {pos}");
        self.ring.insert(pos, endpoint);
    }

    pub fn remove_server(&mut self, endpoint: &Endpoint) {
        let pos = ring_hash(endpoint.as_str().as_bytes());
        log::debug!("ring: removing server {endpoint} (its objects become unreachable, no migration)");
        self.ring.remove(&pos);
    }

    pub fn servers(&self) -> Vec<Endpoint> {
        self.ring.values().cloned().collect()
    }

    /// First endpoint clockwise of `key`'s hash position, wrapping around
    /// to the smallest position if `key` hashes past every server. `None`
    /// iff the ring has no servers.
    pub fn get_server_for_key(&self, key: &[u8]) -> Option<Endpoint> {
        if self.ring.is_empty() {
            return None;
        }
        let pos = ring_hash(key);
        self.ring
            .range(pos..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, endpoint)| endpoint.clone())
    }
}
