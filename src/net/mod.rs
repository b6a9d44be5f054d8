//! Deterministic network simulator: a single-threaded, tick-driven
//! discrete event queue. Uses the crate's general idiom throughout: a
//! `thiserror` error enum, constructor-argument configuration, plain
//! `#[test]` coverage.

pub mod bus;
pub mod envelope;

use std::io;
use thiserror::Error;

pub use bus::{Handler, NetworkSim};
pub use envelope::{Endpoint, Envelope, MessageId};

/// Errors surfaced by the network simulator and anything layered on it
/// (the object store, C7).
#[derive(Debug, Error)]
pub enum NetError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("no handler registered for endpoint '{0}'")]
    NoHandler(Endpoint),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("corrupt object-store message: {0}")]
    CorruptMessage(String),

    #[error("key not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, NetError>;
