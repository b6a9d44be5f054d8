//! Envelope and endpoint types carried on the network simulator.

use std::fmt;

/// A named participant on the simulated network (a server or a client).
/// A thin newtype over `String`: endpoints are passed pervasively through
/// the simulator and the object store built on top of it, so a dedicated
/// type beats raw strings at every call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(pub String);

impl Endpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Endpoint(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Endpoint(s.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(s: String) -> Self {
        Endpoint(s)
    }
}

/// Monotonically assigned by the bus on every `send`.
pub type MessageId = u64;

/// `(id, payload, source_endpoint, destination_endpoint)` plus the tick at
/// which it is due for delivery.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub id: MessageId,
    pub payload: Vec<u8>,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub delivery_tick: u64,
}
